//! Looks up the Service backing a webhook and reconciles it with what the
//! webhook configuration claims.
use k8s_openapi::{
    api::core::v1::{Service, ServicePort},
    apimachinery::pkg::util::intstr::IntOrString,
};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{client::ClusterApi, report::error_chain, webhook::ServiceReference};

/// The configured service reference together with what was found in the
/// cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResolution {
    pub name: String,
    pub namespace: String,
    pub path: Option<String>,
    pub port: Option<i32>,
    pub status: ServiceStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ServiceStatus {
    #[serde(rename_all = "camelCase")]
    Found {
        cluster_ip: Option<String>,
        #[serde(rename = "type")]
        type_: Option<String>,
        ports: Vec<PortMapping>,
    },

    NotFound,

    /// The lookup failed for another reason than the Service not existing.
    LookupFailed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub port: i32,
    pub target_port: Option<String>,
    pub protocol: Option<String>,
}

impl ServiceStatus {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

impl From<&ServicePort> for PortMapping {
    fn from(port: &ServicePort) -> Self {
        Self {
            port: port.port,
            target_port: port.target_port.as_ref().map(|target_port| match target_port {
                IntOrString::Int(port) => port.to_string(),
                IntOrString::String(name) => name.clone(),
            }),
            protocol: port.protocol.clone(),
        }
    }
}

impl From<Service> for ServiceStatus {
    fn from(service: Service) -> Self {
        let spec = service.spec.unwrap_or_default();

        Self::Found {
            cluster_ip: spec.cluster_ip,
            type_: spec.type_,
            ports: spec
                .ports
                .unwrap_or_default()
                .iter()
                .map(PortMapping::from)
                .collect(),
        }
    }
}

/// Fetches the referenced Service exactly once.
///
/// Lookup failures never propagate, they are recorded in the returned
/// [`ServiceStatus`] instead.
#[instrument(
    skip(api, reference),
    fields(service.namespace = %reference.namespace, service.name = %reference.name)
)]
pub async fn resolve<C>(api: &C, reference: &ServiceReference) -> ServiceResolution
where
    C: ClusterApi + ?Sized,
{
    let status = match api.get_service(&reference.namespace, &reference.name).await {
        Ok(Some(service)) => ServiceStatus::from(service),
        Ok(None) => {
            debug!("webhook service does not exist");
            ServiceStatus::NotFound
        }
        Err(error) => {
            let error = error_chain(&error);
            warn!(%error, "failed to look up webhook service");
            ServiceStatus::LookupFailed { error }
        }
    };

    ServiceResolution {
        name: reference.name.clone(),
        namespace: reference.namespace.clone(),
        path: reference.path.clone(),
        port: reference.port,
        status,
    }
}
