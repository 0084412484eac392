//! Merges webhook configurations, namespaces, services and certificates into
//! one [`WebhookReport`] per webhook entry.
use std::{error::Error as StdError, time::SystemTime};

use futures::future::join_all;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, instrument};
use view_webhook_certs::remaining_validity;

use crate::{
    client::ClusterApi,
    namespace::{NamespaceCatalog, active_namespaces},
    report::{CertificateValidity, ServiceTarget, WebhookReport},
    service,
    webhook::{WebhookConfiguration, WebhookConfigurationKind, WebhookEntry, WebhookTarget},
};

/// Failures which prevent any report from being produced.
///
/// Problems with individual webhook entries are never reported here, they
/// are recorded on the affected [`WebhookReport`].
#[derive(Debug, Snafu)]
pub enum Error<E>
where
    E: StdError + 'static,
{
    #[snafu(display("failed to list {kind} webhook configurations"))]
    ListConfigurations {
        source: E,
        kind: WebhookConfigurationKind,
    },

    #[snafu(display("failed to get {kind} webhook configuration {name:?}"))]
    GetConfiguration {
        source: E,
        kind: WebhookConfigurationKind,
        name: String,
    },

    #[snafu(display("failed to list namespaces"))]
    ListNamespaces { source: E },
}

/// Mutating configurations are always reported before validating ones.
const KIND_ORDER: [WebhookConfigurationKind; 2] = [
    WebhookConfigurationKind::Mutating,
    WebhookConfigurationKind::Validating,
];

pub struct WebhookAggregator<C> {
    api: C,
}

impl<C> WebhookAggregator<C>
where
    C: ClusterApi,
{
    pub fn new(api: C) -> Self {
        Self { api }
    }

    /// Builds the reports for all webhook configurations, or for the
    /// configurations called `name`.
    ///
    /// A named configuration which only exists for one kind yields reports
    /// for that kind only. If it exists for neither, the result is empty.
    pub async fn collect(&self, name: Option<&str>) -> Result<Vec<WebhookReport>, Error<C::Error>> {
        self.collect_at(name, SystemTime::now()).await
    }

    /// Like [`Self::collect`], but computes certificate validity relative to
    /// `now`.
    #[instrument(skip(self, now))]
    pub async fn collect_at(
        &self,
        name: Option<&str>,
        now: SystemTime,
    ) -> Result<Vec<WebhookReport>, Error<C::Error>> {
        let catalog = self.api.list_namespaces().await.context(ListNamespacesSnafu)?;
        debug!(namespaces = catalog.len(), "fetched namespace catalog");

        let mut configurations = Vec::new();
        for kind in KIND_ORDER {
            match name {
                None => configurations.extend(
                    self.api
                        .list_webhook_configurations(kind)
                        .await
                        .context(ListConfigurationsSnafu { kind })?,
                ),
                Some(name) => {
                    let configuration = self
                        .api
                        .get_webhook_configuration(kind, name)
                        .await
                        .context(GetConfigurationSnafu { kind, name })?;

                    match configuration {
                        Some(configuration) => configurations.push(configuration),
                        None => debug!(%kind, name, "webhook configuration does not exist"),
                    }
                }
            }
        }

        let reports = join_all(configurations.iter().flat_map(|configuration| {
            configuration
                .webhooks
                .iter()
                .map(|entry| self.resolve_entry(configuration, entry, &catalog, now))
        }))
        .await;

        info!(
            configurations = configurations.len(),
            reports = reports.len(),
            "collected webhook reports"
        );
        Ok(reports)
    }

    #[instrument(
        skip_all,
        fields(
            webhook.kind = %configuration.kind,
            webhook.configuration = %configuration.name,
            webhook.name = %entry.name,
        )
    )]
    async fn resolve_entry(
        &self,
        configuration: &WebhookConfiguration,
        entry: &WebhookEntry,
        catalog: &NamespaceCatalog,
        now: SystemTime,
    ) -> WebhookReport {
        let service = match &entry.target {
            WebhookTarget::Service(reference) => {
                ServiceTarget::Service(service::resolve(&self.api, reference).await)
            }
            WebhookTarget::Url(url) => ServiceTarget::Url(url.clone()),
            WebhookTarget::Unspecified => ServiceTarget::Unspecified,
        };

        let ca_bundle = entry.ca_bundle.as_deref().unwrap_or_default();
        let certificate = CertificateValidity::from(remaining_validity(ca_bundle, now));

        WebhookReport {
            kind: configuration.kind,
            configuration_name: configuration.name.clone(),
            name: entry.name.clone(),
            service,
            rules: entry.rules.clone(),
            active_namespaces: active_namespaces(entry.namespace_selector.as_ref(), catalog),
            certificate,
            policies: entry.policies.clone(),
        }
    }
}
