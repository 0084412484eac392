use std::error::Error;

use jiff::SignedDuration;
use serde::Serialize;
use view_webhook_certs::{DecodeError, RemainingValidity};

use crate::{
    service::ServiceResolution,
    webhook::{Rule, WebhookConfigurationKind, WebhookPolicies},
};

/// Everything known about a single webhook entry, ready to be rendered.
///
/// Every field is always populated. Sub-resolutions which failed carry an
/// explicit marker instead of being left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookReport {
    pub kind: WebhookConfigurationKind,
    pub configuration_name: String,
    pub name: String,
    pub service: ServiceTarget,
    pub rules: Vec<Rule>,
    pub active_namespaces: Vec<String>,
    pub certificate: CertificateValidity,

    #[serde(flatten)]
    pub policies: WebhookPolicies,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceTarget {
    Service(ServiceResolution),
    Url(String),
    Unspecified,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CertificateValidity {
    /// Negative if the certificate already expired.
    Remaining { remaining: SignedDuration },
    NoCertificate,
    Invalid { error: String },
}

impl From<Result<RemainingValidity, DecodeError>> for CertificateValidity {
    fn from(result: Result<RemainingValidity, DecodeError>) -> Self {
        match result {
            Ok(RemainingValidity::Remaining(remaining)) => Self::Remaining { remaining },
            Ok(RemainingValidity::NoCertificate) => Self::NoCertificate,
            Err(error) => Self::Invalid {
                error: error_chain(&error),
            },
        }
    }
}

/// Joins the messages of an error and all of its sources with `": "`.
pub(crate) fn error_chain(error: &(dyn Error + 'static)) -> String {
    std::iter::successors(Some(error), |&error| error.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}
