use std::io;

use clap::Parser;
use snafu::{ResultExt, Snafu};
use tokio::signal;
use view_webhook::{
    aggregator::{self, WebhookAggregator},
    cli::{self, Opts},
    client::{self, KubeClusterApi},
    render,
};
use view_webhook_telemetry::Tracing;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize tracing"))]
    InitTracing {
        source: view_webhook_telemetry::tracing::Error,
    },

    #[snafu(display("failed to connect to the cluster"))]
    Connect { source: cli::Error },

    #[snafu(display("failed to collect webhook reports"))]
    Collect {
        source: aggregator::Error<client::Error>,
    },

    #[snafu(display("failed to render webhook reports"))]
    Render { source: render::Error },

    #[snafu(display("failed to listen for shutdown signals"))]
    ListenForShutdown { source: io::Error },

    #[snafu(display("interrupted before all webhooks were inspected"))]
    Interrupted,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();

    // Keep the guard alive until the end, dropping it flushes pending spans
    let _tracing_guard = Tracing::pre_configured(env!("CARGO_BIN_NAME"), opts.telemetry)
        .init()
        .context(InitTracingSnafu)?;

    let client = opts.cluster.client().await.context(ConnectSnafu)?;
    let aggregator = WebhookAggregator::new(KubeClusterApi::new(client));

    // Dropping the collection on shutdown cancels all in-flight lookups
    let reports = tokio::select! {
        reports = aggregator.collect(opts.name.as_deref()) => reports.context(CollectSnafu)?,
        signal = shutdown_signal() => {
            signal.context(ListenForShutdownSnafu)?;
            return InterruptedSnafu.fail();
        }
    };

    render::render(&reports, opts.output, io::stdout().lock()).context(RenderSnafu)
}

/// Resolves once SIGINT or (on Unix) SIGTERM is received.
async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        io::Result::Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<io::Result<()>>();

    tokio::select! {
        result = signal::ctrl_c() => result,
        result = terminate => result,
    }
}
