//! A bordered, multi-line table with one row per webhook.
use std::{iter, time::Duration};

use jiff::SignedDuration;

use crate::{
    report::{CertificateValidity, ServiceTarget, WebhookReport},
    service::{PortMapping, ServiceResolution, ServiceStatus},
    webhook::{Operation, Rule},
};

const HEADERS: [&str; COLUMNS] = [
    "KIND",
    "NAME",
    "WEBHOOK",
    "SERVICE",
    "RESOURCES & OPERATIONS",
    "REMAINING",
    "ACTIVE NS",
];
const COLUMNS: usize = 7;

const MISSING: &str = "✖";
const EXPIRING: &str = "⚠";

/// Certificates expiring within this span are flagged as [`EXPIRING`].
const EXPIRY_WARNING: SignedDuration = SignedDuration::from_hours(30 * 24);

type Row = [Vec<String>; COLUMNS];

pub(super) fn render(reports: &[WebhookReport]) -> String {
    let header: Row = HEADERS.map(|header| vec![header.to_owned()]);

    let mut previous: Option<&WebhookReport> = None;
    let rows: Vec<Row> = reports
        .iter()
        .map(|report| {
            // Consecutive webhooks of the same configuration only name it once
            let same_configuration = previous.is_some_and(|previous| {
                previous.kind == report.kind
                    && previous.configuration_name == report.configuration_name
            });
            previous = Some(report);
            row(report, same_configuration)
        })
        .collect();

    let mut widths = [0; COLUMNS];
    for row in iter::once(&header).chain(&rows) {
        for (width, cell) in widths.iter_mut().zip(row) {
            let cell_width = cell.iter().map(|line| line.chars().count()).max();
            *width = (*width).max(cell_width.unwrap_or_default());
        }
    }

    let separator = widths
        .iter()
        .map(|width| "-".repeat(width + 2))
        .fold(String::from("+"), |line, dashes| line + &dashes + "+")
        + "\n";

    let mut output = separator.clone();
    for row in iter::once(&header).chain(&rows) {
        write_row(&mut output, row, &widths);
        output.push_str(&separator);
    }

    output
}

fn write_row(output: &mut String, row: &Row, widths: &[usize; COLUMNS]) {
    let height = row.iter().map(Vec::len).max().unwrap_or_default().max(1);

    for line_index in 0..height {
        output.push('|');
        for (cell, width) in row.iter().zip(widths) {
            let line = cell.get(line_index).map_or("", String::as_str);
            let padding = width - line.chars().count();
            output.push(' ');
            output.push_str(line);
            output.push_str(&" ".repeat(padding + 1));
            output.push('|');
        }
        output.push('\n');
    }
}

fn row(report: &WebhookReport, same_configuration: bool) -> Row {
    let (kind, name) = if same_configuration {
        (Vec::new(), Vec::new())
    } else {
        (
            vec![report.kind.to_string()],
            vec![report.configuration_name.clone()],
        )
    };

    [
        kind,
        name,
        vec![report.name.clone()],
        service_lines(&report.service),
        rule_lines(&report.rules),
        vec![format_validity(&report.certificate)],
        namespace_lines(&report.active_namespaces),
    ]
}

fn service_lines(target: &ServiceTarget) -> Vec<String> {
    match target {
        ServiceTarget::Service(resolution) => resolution_lines(resolution),
        ServiceTarget::Url(url) => vec![url.clone()],
        ServiceTarget::Unspecified => vec![format!("{MISSING} No Services")],
    }
}

fn resolution_lines(resolution: &ServiceResolution) -> Vec<String> {
    let namespace = format!("  NS  : {}", resolution.namespace);

    match &resolution.status {
        ServiceStatus::Found {
            cluster_ip,
            type_,
            ports,
        } => {
            let mut lines = vec![resolution.name.clone(), namespace];
            if let Some(path) = &resolution.path {
                lines.push(format!("  Path: {path}"));
            }
            lines.push(format!(
                "  IP  : {} ({})",
                cluster_ip.as_deref().unwrap_or_default(),
                type_.as_deref().unwrap_or_default()
            ));
            lines.extend(ports.iter().map(|port| format!("    {}", format_port(port))));
            lines
        }
        ServiceStatus::NotFound => vec![format!("{MISSING} {}", resolution.name), namespace],
        ServiceStatus::LookupFailed { error } => vec![
            format!("? {}", resolution.name),
            namespace,
            format!("  lookup failed: {error}"),
        ],
    }
}

fn format_port(port: &PortMapping) -> String {
    let protocol = port.protocol.as_deref().unwrap_or("TCP");
    match &port.target_port {
        Some(target_port) => format!("{}::{target_port}/{protocol}", port.port),
        None => format!("{}/{protocol}", port.port),
    }
}

fn rule_lines(rules: &[Rule]) -> Vec<String> {
    rules
        .iter()
        .flat_map(|rule| {
            let operations = rule
                .operations
                .iter()
                .map(|operation| format!("  {}", format_operation(*operation)));
            rule.resources.iter().cloned().chain(operations)
        })
        .collect()
}

fn format_operation(operation: Operation) -> String {
    match operation {
        Operation::Create => format!("+{operation}"),
        Operation::Update => format!("^{operation}"),
        Operation::Delete => format!("-{operation}"),
        Operation::Connect | Operation::All => operation.to_string(),
    }
}

fn format_validity(certificate: &CertificateValidity) -> String {
    match certificate {
        CertificateValidity::Remaining { remaining } if remaining.is_negative() => {
            format!("expired {} ago", humanize(*remaining))
        }
        CertificateValidity::Remaining { remaining } if *remaining < EXPIRY_WARNING => {
            format!("{EXPIRING} {}", humanize(*remaining))
        }
        CertificateValidity::Remaining { remaining } => humanize(*remaining),
        CertificateValidity::NoCertificate => "No CABundle".to_owned(),
        CertificateValidity::Invalid { error } => format!("invalid CABundle: {error}"),
    }
}

/// Formats the magnitude of `duration`, keeping only the most significant
/// unit for spans of two days or more and the two most significant ones
/// otherwise.
fn humanize(duration: SignedDuration) -> String {
    const TWO_DAYS: Duration = Duration::from_secs(2 * 24 * 60 * 60);

    let magnitude = Duration::from_secs(duration.unsigned_abs().as_secs());
    let units = if magnitude < TWO_DAYS { 2 } else { 1 };

    humantime::format_duration(magnitude)
        .to_string()
        .split(' ')
        .take(units)
        .collect::<Vec<_>>()
        .join(" ")
}

fn namespace_lines(namespaces: &[String]) -> Vec<String> {
    if namespaces.is_empty() {
        return vec![format!("{MISSING} No Active Namespaces")];
    }

    namespaces
        .iter()
        .map(|namespace| format!("• {namespace}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::webhook::{WebhookConfigurationKind, WebhookPolicies};

    fn report(configuration_name: &str, name: &str, service: ServiceTarget) -> WebhookReport {
        WebhookReport {
            kind: WebhookConfigurationKind::Validating,
            configuration_name: configuration_name.to_owned(),
            name: name.to_owned(),
            service,
            rules: vec![Rule {
                operations: vec![Operation::Create, Operation::Update],
                resources: vec!["pods".to_owned()],
                ..Default::default()
            }],
            active_namespaces: Vec::new(),
            certificate: CertificateValidity::NoCertificate,
            policies: WebhookPolicies::default(),
        }
    }

    #[rstest]
    #[case::days(SignedDuration::from_hours(10 * 24 + 3), "10days")]
    #[case::one_day(SignedDuration::from_mins(29 * 60 + 3), "1day 5h")]
    #[case::minutes(SignedDuration::from_secs(30 * 60 + 10), "30m 10s")]
    #[case::drops_subseconds(SignedDuration::new(90, 500_000_000), "1m 30s")]
    fn humanizes_remaining_validity(#[case] remaining: SignedDuration, #[case] expected: &str) {
        assert_eq!(humanize(remaining), expected);
    }

    #[rstest]
    #[case::at_threshold(SignedDuration::from_hours(30 * 24), "30days")]
    #[case::just_below_threshold(SignedDuration::from_hours(30 * 24 - 1), "⚠ 29days")]
    #[case::ten_days(SignedDuration::from_hours(10 * 24 + 3), "⚠ 10days")]
    #[case::minutes(SignedDuration::from_secs(30 * 60 + 10), "⚠ 30m 10s")]
    fn flags_certificates_close_to_expiry(
        #[case] remaining: SignedDuration,
        #[case] expected: &str,
    ) {
        assert_eq!(
            format_validity(&CertificateValidity::Remaining { remaining }),
            expected
        );
    }

    #[test]
    fn formats_expired_and_missing_certificates() {
        assert_eq!(
            format_validity(&CertificateValidity::Remaining {
                remaining: SignedDuration::from_hours(-5 * 24),
            }),
            "expired 5days ago"
        );
        assert_eq!(
            format_validity(&CertificateValidity::NoCertificate),
            "No CABundle"
        );
        assert_eq!(
            format_validity(&CertificateValidity::Invalid {
                error: "broken".to_owned()
            }),
            "invalid CABundle: broken"
        );
    }

    #[test]
    fn prefixes_operations() {
        let rules = [Rule {
            operations: vec![
                Operation::Create,
                Operation::Update,
                Operation::Delete,
                Operation::Connect,
            ],
            resources: vec!["deployments".to_owned(), "pods".to_owned()],
            ..Default::default()
        }];

        assert_eq!(rule_lines(&rules), [
            "deployments",
            "pods",
            "  +CREATE",
            "  ^UPDATE",
            "  -DELETE",
            "  CONNECT"
        ]);
    }

    #[test]
    fn lists_found_service_details() {
        let resolution = ServiceResolution {
            name: "policy".to_owned(),
            namespace: "webhooks".to_owned(),
            path: Some("/validate".to_owned()),
            port: Some(443),
            status: ServiceStatus::Found {
                cluster_ip: Some("10.96.0.12".to_owned()),
                type_: Some("ClusterIP".to_owned()),
                ports: vec![PortMapping {
                    port: 443,
                    target_port: Some("8443".to_owned()),
                    protocol: Some("TCP".to_owned()),
                }],
            },
        };

        assert_eq!(resolution_lines(&resolution), [
            "policy",
            "  NS  : webhooks",
            "  Path: /validate",
            "  IP  : 10.96.0.12 (ClusterIP)",
            "    443::8443/TCP",
        ]);
    }

    #[test]
    fn renders_aligned_table() {
        let missing = ServiceResolution {
            name: "missing-svc".to_owned(),
            namespace: "default".to_owned(),
            path: None,
            port: None,
            status: ServiceStatus::NotFound,
        };
        let reports = [
            report("policy", "first.example.com", ServiceTarget::Service(missing)),
            report("policy", "second.example.com", ServiceTarget::Unspecified),
        ];

        let table = render(&reports);
        let lines: Vec<&str> = table.lines().collect();

        let width = lines[0].chars().count();
        assert!(lines.iter().all(|line| line.chars().count() == width));
        assert!(lines[1].starts_with("| KIND "));
        assert!(table.contains("✖ missing-svc"));
        assert!(table.contains("✖ No Services"));
        assert!(table.contains("✖ No Active Namespaces"));

        // The configuration is only named on its first row
        assert_eq!(table.matches("Validating").count(), 1);
        assert_eq!(table.matches("| policy").count(), 1);
    }

    #[test]
    fn renders_header_without_reports() {
        let table = render(&[]);
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("RESOURCES & OPERATIONS"));
    }
}
