//! Turns the collected [`WebhookReport`]s into output for humans or tools.
use std::io::Write;

use snafu::{ResultExt, Snafu};
use strum::Display;

use crate::report::WebhookReport;

mod table;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize reports as JSON"))]
    SerializeJson { source: serde_json::Error },

    #[snafu(display("failed to serialize reports as YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write reports"))]
    WriteOutput { source: std::io::Error },
}

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,

    Json,
    Yaml,
}

/// Writes `reports` to `writer` in the given `format`, keeping the order of
/// the reports.
pub fn render(
    reports: &[WebhookReport],
    format: OutputFormat,
    mut writer: impl Write,
) -> Result<(), Error> {
    match format {
        OutputFormat::Table => writer
            .write_all(table::render(reports).as_bytes())
            .context(WriteOutputSnafu),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, reports).context(SerializeJsonSnafu)?;
            writeln!(writer).context(WriteOutputSnafu)
        }
        OutputFormat::Yaml => serde_yaml::to_writer(writer, reports).context(SerializeYamlSnafu),
    }
}
