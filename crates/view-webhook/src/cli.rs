//! Command line arguments of `kubectl-view-webhook`.
use std::path::PathBuf;

use clap::{Args, Parser};
use kube::{
    Client, Config,
    config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError},
};
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;
use view_webhook_telemetry::TelemetryOptions;

use crate::render::OutputFormat;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read kubeconfig from {path:?}"))]
    ReadKubeconfig {
        source: KubeconfigError,
        path: PathBuf,
    },

    #[snafu(display("failed to read the default kubeconfig"))]
    ReadDefaultKubeconfig { source: KubeconfigError },

    #[snafu(display(
        "the kubeconfig has no current context, select one with --context or `kubectl config use-context`"
    ))]
    NoCurrentContext,

    #[snafu(display("failed to load cluster configuration from kubeconfig"))]
    LoadKubeconfig { source: KubeconfigError },

    #[snafu(display("failed to infer cluster configuration"))]
    InferConfig { source: InferConfigError },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },
}

/// View the admission webhooks of a cluster, together with their services,
/// active namespaces and certificate validity.
#[derive(Debug, PartialEq, Eq, Parser)]
#[command(name = "kubectl-view-webhook", author, version, about)]
pub struct Opts {
    /// Only show the mutating and validating webhook configurations with this name
    pub name: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub output: OutputFormat,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub cluster: ClusterOptions,

    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

/// Selects the cluster to inspect, mirroring the matching kubectl flags.
#[derive(Debug, Default, PartialEq, Eq, Args)]
#[command(next_help_heading = "Cluster Options")]
pub struct ClusterOptions {
    /// Path to the kubeconfig file to use
    #[arg(long, value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// The name of the kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// The name of the kubeconfig cluster to use
    #[arg(long)]
    pub cluster: Option<String>,

    /// The name of the kubeconfig user to use
    #[arg(long)]
    pub user: Option<String>,
}

impl ClusterOptions {
    /// Creates a client for the selected cluster.
    ///
    /// Without any option set, the configuration is inferred from the
    /// environment, which also covers running inside of a Pod.
    pub async fn client(&self) -> Result<Client, Error> {
        let config = match &self.kubeconfig {
            Some(path) => {
                let kubeconfig =
                    Kubeconfig::read_from(path).context(ReadKubeconfigSnafu { path })?;
                self.config_from_kubeconfig(kubeconfig).await?
            }
            None if self.selects_kubeconfig_entries() => {
                let kubeconfig = Kubeconfig::read().context(ReadDefaultKubeconfigSnafu)?;
                self.config_from_kubeconfig(kubeconfig).await?
            }
            None => Config::infer().await.context(InferConfigSnafu)?,
        };

        debug!(cluster.url = %config.cluster_url, "connecting to cluster");
        Client::try_from(config).context(CreateClientSnafu)
    }

    fn selects_kubeconfig_entries(&self) -> bool {
        self.context.is_some() || self.cluster.is_some() || self.user.is_some()
    }

    fn kube_config_options(&self) -> KubeConfigOptions {
        KubeConfigOptions {
            context: self.context.clone(),
            cluster: self.cluster.clone(),
            user: self.user.clone(),
        }
    }

    fn ensure_context(&self, kubeconfig: &Kubeconfig) -> Result<(), Error> {
        let has_current_context = kubeconfig
            .current_context
            .as_deref()
            .is_some_and(|context| !context.is_empty());

        ensure!(
            self.context.is_some() || has_current_context,
            NoCurrentContextSnafu
        );
        Ok(())
    }

    async fn config_from_kubeconfig(&self, kubeconfig: Kubeconfig) -> Result<Config, Error> {
        self.ensure_context(&kubeconfig)?;

        Config::from_custom_kubeconfig(kubeconfig, &self.kube_config_options())
            .await
            .context(LoadKubeconfigSnafu)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        Opts::command().debug_assert();
    }

    #[rstest]
    #[case::defaults(&["kubectl-view-webhook"], None, OutputFormat::Table)]
    #[case::named(&["kubectl-view-webhook", "my-webhook"], Some("my-webhook"), OutputFormat::Table)]
    #[case::json(&["kubectl-view-webhook", "-o", "json"], None, OutputFormat::Json)]
    #[case::yaml(&["kubectl-view-webhook", "policy", "--output", "yaml"], Some("policy"), OutputFormat::Yaml)]
    fn parse_arguments(
        #[case] args: &[&str],
        #[case] name: Option<&str>,
        #[case] output: OutputFormat,
    ) {
        let opts = Opts::try_parse_from(args.iter().copied()).unwrap();
        assert_eq!(opts.name.as_deref(), name);
        assert_eq!(opts.output, output);
        assert_eq!(opts.cluster, ClusterOptions::default());
    }

    #[test]
    fn parse_cluster_options() {
        let opts = Opts::try_parse_from([
            "kubectl-view-webhook",
            "--kubeconfig",
            "/tmp/kubeconfig",
            "--context",
            "staging",
            "--user",
            "admin",
        ])
        .unwrap();

        assert_eq!(opts.cluster.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        let options = opts.cluster.kube_config_options();
        assert_eq!(options.context.as_deref(), Some("staging"));
        assert_eq!(options.cluster, None);
        assert_eq!(options.user.as_deref(), Some("admin"));
    }

    #[rstest]
    #[case::no_context(None, None, false)]
    #[case::empty_current_context(Some(""), None, false)]
    #[case::current_context(Some("kind-kind"), None, true)]
    #[case::explicit_context(None, Some("staging"), true)]
    fn requires_a_context(
        #[case] current_context: Option<&str>,
        #[case] context: Option<&str>,
        #[case] accepted: bool,
    ) {
        let kubeconfig = Kubeconfig {
            current_context: current_context.map(ToOwned::to_owned),
            ..Default::default()
        };
        let options = ClusterOptions {
            context: context.map(ToOwned::to_owned),
            ..Default::default()
        };

        let result = options.ensure_context(&kubeconfig);
        assert_eq!(result.is_ok(), accepted, "unexpected result {result:?}");
    }
}
