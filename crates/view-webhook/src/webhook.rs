//! A normalized view of admission webhook configurations.
//!
//! Mutating and validating webhooks are modelled by two different API types,
//! which only differ in a handful of fields. Both are translated into a single
//! [`WebhookEntry`] shape here, so the resolution pipeline doesn't need to
//! care which kind of configuration an entry was read from.
use std::{collections::BTreeMap, str::FromStr};

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ValidatingWebhook,
    ValidatingWebhookConfiguration, WebhookClientConfig,
};
use kube::ResourceExt;
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::warn;

/// The API collection a [`WebhookConfiguration`] was read from.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum WebhookConfigurationKind {
    Mutating,
    Validating,
}

/// A named collection of webhooks, as registered in the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfiguration {
    pub kind: WebhookConfigurationKind,
    pub name: String,
    pub webhooks: Vec<WebhookEntry>,
}

/// A single admission webhook within a [`WebhookConfiguration`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebhookEntry {
    pub name: String,
    pub target: WebhookTarget,

    /// Required label values. [`None`] means the webhook applies to all
    /// namespaces.
    pub namespace_selector: Option<BTreeMap<String, String>>,
    pub rules: Vec<Rule>,

    /// PEM-encoded CA bundle used to verify the webhook server.
    pub ca_bundle: Option<Vec<u8>>,
    pub policies: WebhookPolicies,
}

/// Where the API server sends admission reviews to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum WebhookTarget {
    Service(ServiceReference),

    /// An external URL, which is passed through without being resolved.
    Url(String),

    #[default]
    Unspecified,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceReference {
    pub namespace: String,
    pub name: String,
    pub path: Option<String>,
    pub port: Option<i32>,
}

/// Describes which operations on which resources are intercepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub operations: Vec<Operation>,
    pub resources: Vec<String>,
    pub api_groups: Vec<String>,
    pub api_versions: Vec<String>,
    pub scope: Option<String>,
}

#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Hash, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,

    #[strum(serialize = "*")]
    #[serde(rename = "*")]
    All,
}

/// Additional settings which influence how the API server calls the webhook.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPolicies {
    pub failure_policy: Option<String>,
    pub side_effects: Option<String>,
    pub reinvocation_policy: Option<String>,
    pub timeout_seconds: Option<i32>,
}

impl From<MutatingWebhookConfiguration> for WebhookConfiguration {
    fn from(configuration: MutatingWebhookConfiguration) -> Self {
        Self {
            kind: WebhookConfigurationKind::Mutating,
            name: configuration.name_any(),
            webhooks: configuration
                .webhooks
                .unwrap_or_default()
                .into_iter()
                .map(WebhookEntry::from)
                .collect(),
        }
    }
}

impl From<ValidatingWebhookConfiguration> for WebhookConfiguration {
    fn from(configuration: ValidatingWebhookConfiguration) -> Self {
        Self {
            kind: WebhookConfigurationKind::Validating,
            name: configuration.name_any(),
            webhooks: configuration
                .webhooks
                .unwrap_or_default()
                .into_iter()
                .map(WebhookEntry::from)
                .collect(),
        }
    }
}

impl From<MutatingWebhook> for WebhookEntry {
    fn from(webhook: MutatingWebhook) -> Self {
        let (target, ca_bundle) = split_client_config(webhook.client_config);

        Self {
            rules: convert_rules(&webhook.name, webhook.rules),
            namespace_selector: webhook
                .namespace_selector
                .map(|selector| selector.match_labels.unwrap_or_default()),
            policies: WebhookPolicies {
                failure_policy: webhook.failure_policy,
                side_effects: Some(webhook.side_effects),
                reinvocation_policy: webhook.reinvocation_policy,
                timeout_seconds: webhook.timeout_seconds,
            },
            name: webhook.name,
            target,
            ca_bundle,
        }
    }
}

impl From<ValidatingWebhook> for WebhookEntry {
    fn from(webhook: ValidatingWebhook) -> Self {
        let (target, ca_bundle) = split_client_config(webhook.client_config);

        Self {
            rules: convert_rules(&webhook.name, webhook.rules),
            namespace_selector: webhook
                .namespace_selector
                .map(|selector| selector.match_labels.unwrap_or_default()),
            policies: WebhookPolicies {
                failure_policy: webhook.failure_policy,
                side_effects: Some(webhook.side_effects),
                reinvocation_policy: None,
                timeout_seconds: webhook.timeout_seconds,
            },
            name: webhook.name,
            target,
            ca_bundle,
        }
    }
}

fn split_client_config(client_config: WebhookClientConfig) -> (WebhookTarget, Option<Vec<u8>>) {
    let target = match (client_config.service, client_config.url) {
        (Some(service), _) => WebhookTarget::Service(ServiceReference {
            namespace: service.namespace,
            name: service.name,
            path: service.path,
            port: service.port,
        }),
        (None, Some(url)) => WebhookTarget::Url(url),
        (None, None) => WebhookTarget::Unspecified,
    };

    (target, client_config.ca_bundle.map(|bundle| bundle.0))
}

fn convert_rules(webhook_name: &str, rules: Option<Vec<RuleWithOperations>>) -> Vec<Rule> {
    rules
        .unwrap_or_default()
        .into_iter()
        .map(|rule| Rule {
            operations: rule
                .operations
                .unwrap_or_default()
                .iter()
                .filter_map(|operation| match Operation::from_str(operation) {
                    Ok(operation) => Some(operation),
                    Err(_) => {
                        warn!(
                            webhook.name = webhook_name,
                            %operation,
                            "ignoring unknown operation"
                        );
                        None
                    }
                })
                .collect(),
            resources: rule.resources.unwrap_or_default(),
            api_groups: rule.api_groups.unwrap_or_default(),
            api_versions: rule.api_versions.unwrap_or_default(),
            scope: rule.scope,
        })
        .collect()
}
