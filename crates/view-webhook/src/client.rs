//! Read-only access to the cluster state needed to build webhook reports.
use std::error::Error as StdError;

use async_trait::async_trait;
use k8s_openapi::api::{
    admissionregistration::v1::{MutatingWebhookConfiguration, ValidatingWebhookConfiguration},
    core::v1::{Namespace, Service},
};
use kube::{Api, Client, api::ListParams};
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    namespace::NamespaceCatalog,
    webhook::{WebhookConfiguration, WebhookConfigurationKind},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list {kind} webhook configurations"))]
    ListWebhookConfigurations {
        source: kube::Error,
        kind: WebhookConfigurationKind,
    },

    #[snafu(display("failed to get {kind} webhook configuration {name:?}"))]
    GetWebhookConfiguration {
        source: kube::Error,
        kind: WebhookConfigurationKind,
        name: String,
    },

    #[snafu(display("failed to list namespaces"))]
    ListNamespaces { source: kube::Error },

    #[snafu(display("failed to get Service {namespace}/{name}"))]
    GetService {
        source: kube::Error,
        namespace: String,
        name: String,
    },
}

/// The cluster queries the aggregation needs.
///
/// Lookups of single objects return [`None`] if the object doesn't exist,
/// every other failure is an error.
//
// We still need to use the async-trait crate, as the futures need to be Send
// for generic callers.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    type Error: StdError + Send + Sync + 'static;

    async fn list_webhook_configurations(
        &self,
        kind: WebhookConfigurationKind,
    ) -> Result<Vec<WebhookConfiguration>, Self::Error>;

    async fn get_webhook_configuration(
        &self,
        kind: WebhookConfigurationKind,
        name: &str,
    ) -> Result<Option<WebhookConfiguration>, Self::Error>;

    async fn list_namespaces(&self) -> Result<NamespaceCatalog, Self::Error>;

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, Self::Error>;
}

/// [`ClusterApi`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    type Error = Error;

    #[instrument(skip(self))]
    async fn list_webhook_configurations(
        &self,
        kind: WebhookConfigurationKind,
    ) -> Result<Vec<WebhookConfiguration>, Error> {
        let params = ListParams::default();

        let configurations = match kind {
            WebhookConfigurationKind::Mutating => {
                Api::<MutatingWebhookConfiguration>::all(self.client.clone())
                    .list(&params)
                    .await
                    .context(ListWebhookConfigurationsSnafu { kind })?
                    .items
                    .into_iter()
                    .map(WebhookConfiguration::from)
                    .collect()
            }
            WebhookConfigurationKind::Validating => {
                Api::<ValidatingWebhookConfiguration>::all(self.client.clone())
                    .list(&params)
                    .await
                    .context(ListWebhookConfigurationsSnafu { kind })?
                    .items
                    .into_iter()
                    .map(WebhookConfiguration::from)
                    .collect()
            }
        };

        Ok(configurations)
    }

    #[instrument(skip(self))]
    async fn get_webhook_configuration(
        &self,
        kind: WebhookConfigurationKind,
        name: &str,
    ) -> Result<Option<WebhookConfiguration>, Error> {
        let configuration = match kind {
            WebhookConfigurationKind::Mutating => {
                Api::<MutatingWebhookConfiguration>::all(self.client.clone())
                    .get_opt(name)
                    .await
                    .context(GetWebhookConfigurationSnafu { kind, name })?
                    .map(WebhookConfiguration::from)
            }
            WebhookConfigurationKind::Validating => {
                Api::<ValidatingWebhookConfiguration>::all(self.client.clone())
                    .get_opt(name)
                    .await
                    .context(GetWebhookConfigurationSnafu { kind, name })?
                    .map(WebhookConfiguration::from)
            }
        };

        Ok(configuration)
    }

    #[instrument(skip(self))]
    async fn list_namespaces(&self) -> Result<NamespaceCatalog, Error> {
        let namespaces = Api::<Namespace>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .context(ListNamespacesSnafu)?;

        Ok(namespaces.items.into_iter().collect())
    }

    #[instrument(skip(self))]
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        Api::<Service>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .context(GetServiceSnafu { namespace, name })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::{
        collections::{BTreeMap, BTreeSet},
        sync::atomic::{AtomicUsize, Ordering},
    };

    use k8s_openapi::{
        api::core::v1::ServiceSpec, apimachinery::pkg::apis::meta::v1::ObjectMeta,
    };

    use super::*;

    #[derive(Debug, Snafu)]
    #[snafu(display("injected failure for {what}"))]
    pub struct InjectedError {
        what: String,
    }

    /// In-memory cluster state with switchable failures.
    #[derive(Debug, Default)]
    pub struct FakeClusterApi {
        configurations: Vec<WebhookConfiguration>,
        namespaces: Vec<(String, BTreeMap<String, String>)>,
        services: BTreeMap<(String, String), Service>,
        failing_services: BTreeSet<(String, String)>,
        fail_configurations: bool,
        fail_namespaces: bool,
        namespace_listings: AtomicUsize,
    }

    impl FakeClusterApi {
        pub fn with_configuration(mut self, configuration: WebhookConfiguration) -> Self {
            self.configurations.push(configuration);
            self
        }

        pub fn with_namespace<const N: usize>(mut self, name: &str, labels: [(&str, &str); N]) -> Self {
            self.namespaces.push((
                name.to_owned(),
                labels
                    .into_iter()
                    .map(|(key, value)| (key.to_owned(), value.to_owned()))
                    .collect(),
            ));
            self
        }

        pub fn with_service(mut self, namespace: &str, name: &str, spec: ServiceSpec) -> Self {
            let service = Service {
                metadata: ObjectMeta {
                    name: Some(name.to_owned()),
                    namespace: Some(namespace.to_owned()),
                    ..Default::default()
                },
                spec: Some(spec),
                ..Default::default()
            };
            self.services
                .insert((namespace.to_owned(), name.to_owned()), service);
            self
        }

        pub fn with_failing_service(mut self, namespace: &str, name: &str) -> Self {
            self.failing_services
                .insert((namespace.to_owned(), name.to_owned()));
            self
        }

        pub fn with_failing_configurations(mut self) -> Self {
            self.fail_configurations = true;
            self
        }

        pub fn with_failing_namespaces(mut self) -> Self {
            self.fail_namespaces = true;
            self
        }

        pub fn namespace_listings(&self) -> usize {
            self.namespace_listings.load(Ordering::SeqCst)
        }

        fn check_configurations(&self, kind: WebhookConfigurationKind) -> Result<(), InjectedError> {
            if self.fail_configurations {
                return InjectedSnafu {
                    what: format!("{kind} webhook configurations"),
                }
                .fail();
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ClusterApi for FakeClusterApi {
        type Error = InjectedError;

        async fn list_webhook_configurations(
            &self,
            kind: WebhookConfigurationKind,
        ) -> Result<Vec<WebhookConfiguration>, InjectedError> {
            self.check_configurations(kind)?;
            Ok(self
                .configurations
                .iter()
                .filter(|configuration| configuration.kind == kind)
                .cloned()
                .collect())
        }

        async fn get_webhook_configuration(
            &self,
            kind: WebhookConfigurationKind,
            name: &str,
        ) -> Result<Option<WebhookConfiguration>, InjectedError> {
            self.check_configurations(kind)?;
            Ok(self
                .configurations
                .iter()
                .find(|configuration| configuration.kind == kind && configuration.name == name)
                .cloned())
        }

        async fn list_namespaces(&self) -> Result<NamespaceCatalog, InjectedError> {
            self.namespace_listings.fetch_add(1, Ordering::SeqCst);
            if self.fail_namespaces {
                return InjectedSnafu {
                    what: "namespaces",
                }
                .fail();
            }
            Ok(self.namespaces.iter().cloned().collect())
        }

        async fn get_service(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<Option<Service>, InjectedError> {
            let key = (namespace.to_owned(), name.to_owned());
            if self.failing_services.contains(&key) {
                return InjectedSnafu {
                    what: format!("Service {namespace}/{name}"),
                }
                .fail();
            }
            Ok(self.services.get(&key).cloned())
        }
    }
}
