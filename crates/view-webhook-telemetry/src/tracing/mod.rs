//! This module contains functionality to initialise tracing subscribers for
//! console output, rolling file output, and OpenTelemetry OTLP trace export.
//!
//! To get started, see [`Tracing`].

use std::path::PathBuf;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::rolling::{InitError, RollingFileAppender};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::Directive, layer::SubscriberExt};

use crate::tracing::settings::*;

pub mod settings;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors which can be encountered when initialising [`Tracing`].
#[derive(Debug, Snafu)]
pub enum Error {
    /// Indicates that [`Tracing`] failed to install the OpenTelemetry trace exporter.
    #[snafu(display("unable to install opentelemetry trace exporter"))]
    InstallOtelTraceExporter {
        #[allow(missing_docs)]
        source: opentelemetry_otlp::ExporterBuildError,
    },

    /// Indicates that [`Tracing`] failed to install the rolling file appender.
    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender {
        #[allow(missing_docs)]
        source: InitError,
    },

    /// Indicates that [`Tracing`] failed to set the global default subscriber.
    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber {
        #[allow(missing_docs)]
        source: SetGlobalDefaultError,
    },
}

/// Initializes a set of pre-configured [`Subscriber`][1] layers.
///
/// The configured subscribers are active as long as the guard returned by
/// [`Tracing::init`] is in scope. Dropping it shuts down the OTLP exporter,
/// which flushes pending spans.
///
/// ```no_run
/// use view_webhook_telemetry::tracing::{Tracing, TelemetryOptions, Error};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let _tracing_guard = Tracing::pre_configured("test", TelemetryOptions::default()).init()?;
///
///     tracing::warn!("log a message");
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables and CLI Arguments
///
/// - `CONSOLE_LOG_DISABLED` (`--console-log-disabled`): Disables console logs when set to `true`.
/// - `CONSOLE_LOG_LEVEL`: Set the log level for the console logs (defaults to `WARN`).
/// - `FILE_LOG_DIRECTORY` (`--file-log-directory`): Enable the file logs and set the file log directory.
/// - `FILE_LOG_ROTATION_PERIOD` (`--file-log-rotation-period`): Set the rotation period of log files.
/// - `FILE_LOG_LEVEL`: Set the log level for file logs.
/// - `OTEL_TRACE_EXPORTER_ENABLED` (`--otel-trace-exporter-enabled`): Enable exporting OTEL traces.
/// - `OTEL_TRACE_EXPORTER_LEVEL`: Set the log level for OTEL traces.
///
/// The OTLP exporter itself is configured through the variables defined in
/// the opentelemetry crates, for example `OTEL_EXPORTER_OTLP_ENDPOINT`.
///
/// [1]: tracing::Subscriber
pub struct Tracing {
    service_name: &'static str,
    console_log_settings: ConsoleLogSettings,
    file_log_settings: FileLogSettings,
    otlp_trace_settings: OtlpTraceSettings,

    tracer_provider: Option<SdkTracerProvider>,
}

impl Tracing {
    /// The environment variable used to set the console log level filter.
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
    /// The environment variable used to set the rolling file log level filter.
    pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";
    /// The filename used for the rolling file logs.
    pub const FILE_LOG_SUFFIX: &str = "tracing-rs.json";
    /// The environment variable used to set the OTEL trace level filter.
    pub const OTEL_TRACE_EXPORTER_LEVEL: &str = "OTEL_TRACE_EXPORTER_LEVEL";

    /// Creates and returns a [`TracingBuilder`].
    pub fn builder(service_name: &'static str) -> TracingBuilder {
        TracingBuilder {
            service_name,
            console_log_settings: ConsoleLogSettings::default(),
            file_log_settings: FileLogSettings::default(),
            otlp_trace_settings: OtlpTraceSettings::default(),
        }
    }

    /// Creates a pre-configured [`Tracing`] instance from CLI arguments.
    ///
    /// Console logs default to `WARN`, because the console shares the
    /// terminal with the rendered report. File logs and OTLP traces default
    /// to `INFO`.
    pub fn pre_configured(service_name: &'static str, options: TelemetryOptions) -> Self {
        let TelemetryOptions {
            console_log_disabled,
            file_log_directory,
            file_log_rotation_period,
            otel_trace_exporter_enabled,
        } = options;

        let file_log_rotation_period = file_log_rotation_period.unwrap_or_default();

        Self::builder(service_name)
            .with_console_output((
                Self::CONSOLE_LOG_LEVEL,
                LevelFilter::WARN,
                !console_log_disabled,
            ))
            .with_file_output(file_log_directory.map(|log_directory| {
                FileLogSettings::new(
                    Self::FILE_LOG_LEVEL,
                    LevelFilter::INFO,
                    log_directory,
                    file_log_rotation_period,
                )
            }))
            .with_otlp_trace_exporter((
                Self::OTEL_TRACE_EXPORTER_LEVEL,
                LevelFilter::INFO,
                otel_trace_exporter_enabled,
            ))
            .build()
    }

    /// Initialize the configured tracing subscribers, returning a guard that
    /// will shutdown the subscribers when dropped.
    pub fn init(mut self) -> Result<Self> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

        if let ConsoleLogSettings::Enabled { common_settings } = &self.console_log_settings {
            let env_filter_layer = env_filter_builder(
                common_settings.environment_variable,
                common_settings.default_level,
            );
            let console_output_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter_layer);
            layers.push(console_output_layer.boxed());
        }

        if let FileLogSettings::Enabled {
            common_settings,
            file_log_dir,
            rotation_period,
        } = &self.file_log_settings
        {
            let env_filter_layer = env_filter_builder(
                common_settings.environment_variable,
                common_settings.default_level,
            );

            let file_appender = RollingFileAppender::builder()
                .rotation(rotation_period.clone())
                .filename_prefix(self.service_name.to_string())
                .filename_suffix(Self::FILE_LOG_SUFFIX)
                .build(file_log_dir)
                .context(InitRollingFileAppenderSnafu)?;

            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(file_appender)
                    .with_filter(env_filter_layer)
                    .boxed(),
            );
        }

        if let OtlpTraceSettings::Enabled { common_settings } = &self.otlp_trace_settings {
            let env_filter_layer = env_filter_builder(
                common_settings.environment_variable,
                common_settings.default_level,
            )
            // The gRPC transport logs through tracing itself, which would feed back into the exporter
            .add_directive("h2=off".parse().expect("invalid directive"));

            let trace_exporter = SpanExporter::builder()
                .with_tonic()
                .build()
                .context(InstallOtelTraceExporterSnafu)?;

            let tracer_provider = SdkTracerProvider::builder()
                .with_batch_exporter(trace_exporter)
                .with_resource(
                    Resource::builder()
                        .with_service_name(self.service_name)
                        .build(),
                )
                .build();

            let tracer = tracer_provider.tracer(self.service_name);

            layers.push(
                tracing_opentelemetry::layer()
                    .with_tracer(tracer)
                    .with_filter(env_filter_layer)
                    .boxed(),
            );
            self.tracer_provider = Some(tracer_provider);
        }

        if !layers.is_empty() {
            tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
                .context(SetGlobalDefaultSubscriberSnafu)?;
        }

        // IMPORTANT: we must return self, otherwise Drop will be called and uninitialise tracing
        Ok(self)
    }
}

impl Drop for Tracing {
    fn drop(&mut self) {
        tracing::debug!(
            opentelemetry.tracing.enabled = self.otlp_trace_settings.is_enabled(),
            "shutting down opentelemetry OTLP providers"
        );

        if let Some(tracer_provider) = &self.tracer_provider
            && let Err(error) = tracer_provider.shutdown()
        {
            tracing::error!(%error, "unable to shutdown TracerProvider");
        }
    }
}

/// Makes it easy to build a valid [`Tracing`] instance.
pub struct TracingBuilder {
    service_name: &'static str,
    console_log_settings: ConsoleLogSettings,
    file_log_settings: FileLogSettings,
    otlp_trace_settings: OtlpTraceSettings,
}

impl TracingBuilder {
    /// Enable the console (stderr) output subscriber.
    pub fn with_console_output(mut self, settings: impl Into<ConsoleLogSettings>) -> Self {
        self.console_log_settings = settings.into();
        self
    }

    /// Enable the rolling JSON file output subscriber.
    pub fn with_file_output(mut self, settings: impl Into<FileLogSettings>) -> Self {
        self.file_log_settings = settings.into();
        self
    }

    /// Enable the OTLP trace exporter.
    pub fn with_otlp_trace_exporter(mut self, settings: impl Into<OtlpTraceSettings>) -> Self {
        self.otlp_trace_settings = settings.into();
        self
    }

    pub fn build(self) -> Tracing {
        Tracing {
            service_name: self.service_name,
            console_log_settings: self.console_log_settings,
            file_log_settings: self.file_log_settings,
            otlp_trace_settings: self.otlp_trace_settings,
            tracer_provider: None,
        }
    }
}

fn env_filter_builder(env_var: &str, default_directive: impl Into<Directive>) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}

/// Telemetry related CLI arguments.
#[cfg_attr(feature = "clap", derive(clap::Args, PartialEq, Eq))]
#[cfg_attr(feature = "clap", command(next_help_heading = "Telemetry Options"))]
#[derive(Debug, Default)]
pub struct TelemetryOptions {
    /// Disable log output to stderr.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub console_log_disabled: bool,

    /// Write JSON logs into rolling files in this directory.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "DIRECTORY", group = "file_log")
    )]
    pub file_log_directory: Option<PathBuf>,

    /// How often the log file is rotated.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "PERIOD", requires = "file_log")
    )]
    pub file_log_rotation_period: Option<RotationPeriod>,

    /// Export spans via OTLP.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub otel_trace_exporter_enabled: bool,
}

#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "PascalCase")]
#[allow(missing_docs)]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}
