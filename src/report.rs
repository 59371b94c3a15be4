//! Report views over the scored signal buffer.
//!
//! Two projections of the same content: a structured JSON document
//! (wire format v1.0) and a human-readable text rendering. Packages are
//! ordered by ascending trust score so the riskiest appear first, and the
//! signal projection applies the metadata allow-list and truncation rules
//! of the signal model.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::bail;
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::{Config, Verbosity};
use crate::score::{score_packages, PackageScore, RiskLevel};
use crate::signal::Signal;

/// Schema version of the structured report.
pub const REPORT_VERSION: &str = "1.0";

/// Output flavor of [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Cli,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cli" => Ok(ReportFormat::Cli),
            "json" => Ok(ReportFormat::Json),
            other => bail!("unknown report format: {other:?} (expected cli or json)"),
        }
    }
}

/// Render a report over the given signals.
pub fn generate(signals: &[Signal], config: &Config, format: ReportFormat) -> String {
    let scores = score_packages(signals, config);
    let mut ordered: Vec<&PackageScore> = scores.values().collect();
    ordered.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.key().cmp(&b.key())));

    match format {
        ReportFormat::Json => {
            let value = build_structured(signals, &ordered, config);
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
        }
        ReportFormat::Cli => render_text(signals, &ordered, config),
    }
}

fn risk_distribution(ordered: &[&PackageScore]) -> BTreeMap<&'static str, usize> {
    let mut distribution = BTreeMap::from([
        ("critical", 0usize),
        ("high", 0),
        ("medium", 0),
        ("low", 0),
    ]);
    for score in ordered {
        let bucket = match score.risk_level {
            RiskLevel::Critical => "critical",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        };
        *distribution.get_mut(bucket).expect("fixed buckets") += 1;
    }
    distribution
}

fn build_structured(signals: &[Signal], ordered: &[&PackageScore], config: &Config) -> Value {
    let packages: Vec<Value> = ordered
        .iter()
        .map(|score| {
            let behaviors: BTreeMap<String, usize> = score
                .stats
                .iter()
                .map(|(signal_type, count)| (signal_type.to_string(), *count))
                .collect();
            json!({
                "name": score.name,
                "version": score.version,
                "trustScore": score.score,
                "riskLevel": score.risk_level.to_string(),
                "signalCount": score.signal_count,
                "behaviors": behaviors,
            })
        })
        .collect();

    let include_stack = config.output.include_stack_traces;
    let projected: Vec<Value> = signals
        .iter()
        .map(|signal| signal.to_report_value(include_stack))
        .collect();

    json!({
        "version": REPORT_VERSION,
        "timestamp": Utc::now().to_rfc3339(),
        "summary": {
            "totalPackages": ordered.len(),
            "totalSignals": signals.len(),
            "riskDistribution": risk_distribution(ordered),
        },
        "packages": packages,
        "signals": projected,
    })
}

fn signal_line(signal: &Signal) -> String {
    use crate::signal::SignalMetadata;
    let when = signal.timestamp().format("%H:%M:%S");
    let detail = match signal.metadata() {
        SignalMetadata::EnvAccess { variable } => format!("EnvAccess: {variable}"),
        SignalMetadata::FsRead { path, operation } => {
            format!("FsRead {operation}: {}", path.display())
        }
        SignalMetadata::FsWrite { path, operation } => {
            format!("FsWrite {operation}: {}", path.display())
        }
        SignalMetadata::NetConnect {
            host,
            port,
            protocol,
        } => format!("NetConnect: {host}:{port} ({protocol})"),
        SignalMetadata::HttpRequest(meta) => {
            format!("HttpRequest {}: {}:{}", meta.method, meta.host, meta.port)
        }
        SignalMetadata::HttpsRequest(meta) => {
            format!("HttpsRequest {}: {}:{}", meta.method, meta.host, meta.port)
        }
        SignalMetadata::ShellExec { command, operation } => {
            format!("ShellExec {operation}: {command}")
        }
    };
    format!("  [{when}] {detail}")
}

fn render_text(signals: &[Signal], ordered: &[&PackageScore], config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "bheeshma behavior report");
    let _ = writeln!(out, "generated: {}", Utc::now().to_rfc3339());
    let _ = writeln!(
        out,
        "packages: {}  signals: {}",
        ordered.len(),
        signals.len()
    );
    let distribution = risk_distribution(ordered);
    let _ = writeln!(
        out,
        "risk: {} critical / {} high / {} medium / {} low",
        distribution["critical"], distribution["high"], distribution["medium"], distribution["low"]
    );

    if ordered.is_empty() {
        let _ = writeln!(out, "\nno attributed signals recorded");
        return out;
    }

    for score in ordered {
        let _ = writeln!(
            out,
            "\n[{}] {}@{}  trust {}/100  ({} signal{})",
            score.risk_level,
            score.name,
            score.version,
            score.score,
            score.signal_count,
            if score.signal_count == 1 { "" } else { "s" }
        );
        let behaviors: BTreeMap<String, usize> = score
            .stats
            .iter()
            .map(|(signal_type, count)| (signal_type.to_string(), *count))
            .collect();
        let summary: Vec<String> = behaviors
            .iter()
            .map(|(name, count)| format!("{name} x{count}"))
            .collect();
        let _ = writeln!(out, "  behaviors: {}", summary.join(", "));

        if config.output.verbosity == Verbosity::Quiet {
            continue;
        }
        for signal in signals
            .iter()
            .filter(|signal| signal.package().key() == score.key())
        {
            let _ = writeln!(out, "{}", signal_line(signal));
            if config.output.verbosity == Verbosity::Verbose {
                for frame in signal.stack().frames() {
                    let _ = writeln!(out, "      at {}", frame.file.display());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{HttpMetadata, PackageIdentity, SignalMetadata, SuspicionReport};
    use crate::stack::CallStack;
    use std::path::PathBuf;

    fn signal(name: &str, metadata: SignalMetadata) -> Signal {
        Signal::new(
            PackageIdentity {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                path: PathBuf::from("/app/node_modules").join(name),
            },
            metadata,
            CallStack::from_files(["/app/node_modules/x/index.js"]),
        )
    }

    fn sample_signals() -> Vec<Signal> {
        vec![
            signal(
                "noisy",
                SignalMetadata::ShellExec {
                    command: "curl http://example.com".to_string(),
                    operation: "exec".to_string(),
                },
            ),
            signal(
                "noisy",
                SignalMetadata::ShellExec {
                    command: "whoami".to_string(),
                    operation: "exec".to_string(),
                },
            ),
            signal(
                "noisy",
                SignalMetadata::ShellExec {
                    command: "id".to_string(),
                    operation: "exec".to_string(),
                },
            ),
            signal(
                "noisy",
                SignalMetadata::ShellExec {
                    command: "uname -a".to_string(),
                    operation: "exec".to_string(),
                },
            ),
            signal(
                "quiet",
                SignalMetadata::EnvAccess {
                    variable: "HOME".to_string(),
                },
            ),
        ]
    }

    #[test]
    fn test_json_report_shape() {
        let signals = sample_signals();
        let report = generate(&signals, &Config::default(), ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();

        assert_eq!(value["version"], "1.0");
        assert_eq!(value["summary"]["totalPackages"], 2);
        assert_eq!(value["summary"]["totalSignals"], 5);
        assert_eq!(value["summary"]["riskDistribution"]["critical"], 1);
        assert_eq!(value["summary"]["riskDistribution"]["low"], 1);

        // Ascending score: the risky package leads.
        assert_eq!(value["packages"][0]["name"], "noisy");
        assert_eq!(value["packages"][0]["trustScore"], 20);
        assert_eq!(value["packages"][0]["riskLevel"], "CRITICAL");
        assert_eq!(value["packages"][0]["behaviors"]["ShellExec"], 4);
        assert_eq!(value["packages"][1]["name"], "quiet");
        assert_eq!(value["packages"][1]["trustScore"], 95);

        // Signal projection: allowed keys only, no stack by default.
        let first = &value["signals"][0];
        assert_eq!(first["type"], "ShellExec");
        assert!(first["metadata"].get("command").is_some());
        assert!(first["metadata"].get("operation").is_some());
        assert!(first.get("stack").is_none());
    }

    #[test]
    fn test_json_report_includes_stack_when_configured() {
        let mut config = Config::default();
        config.output.include_stack_traces = true;
        let report = generate(&sample_signals(), &config, ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert!(value["signals"][0]["stack"][0]
            .as_str()
            .unwrap()
            .contains("node_modules"));
    }

    #[test]
    fn test_text_report_groups_by_package() {
        let report = generate(&sample_signals(), &Config::default(), ReportFormat::Cli);
        assert!(report.contains("packages: 2  signals: 5"));
        let noisy = report.find("[CRITICAL] noisy@1.0.0").unwrap();
        let quiet = report.find("[LOW] quiet@1.0.0").unwrap();
        assert!(noisy < quiet, "riskiest package must come first");
        assert!(report.contains("ShellExec exec: whoami"));
        assert!(report.contains("behaviors: ShellExec x4"));
    }

    #[test]
    fn test_quiet_verbosity_drops_signal_lines() {
        let mut config = Config::default();
        config.output.verbosity = Verbosity::Quiet;
        let report = generate(&sample_signals(), &config, ReportFormat::Cli);
        assert!(report.contains("behaviors: ShellExec x4"));
        assert!(!report.contains("ShellExec exec: whoami"));
    }

    #[test]
    fn test_empty_report() {
        let report = generate(&[], &Config::default(), ReportFormat::Cli);
        assert!(report.contains("no attributed signals recorded"));

        let json = generate(&[], &Config::default(), ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["totalSignals"], 0);
        assert_eq!(value["packages"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("cli".parse::<ReportFormat>().unwrap(), ReportFormat::Cli);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_long_metadata_truncated_in_projection() {
        let long_command = format!("curl {}", "A".repeat(600));
        let signals = vec![signal(
            "chatty",
            SignalMetadata::ShellExec {
                command: long_command,
                operation: "exec".to_string(),
            },
        )];
        let report = generate(&signals, &Config::default(), ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        let command = value["signals"][0]["metadata"]["command"].as_str().unwrap();
        assert!(command.ends_with("…[TRUNCATED]"));
        assert!(command.chars().count() <= 500 + "…[TRUNCATED]".chars().count());
    }

    #[test]
    fn test_http_signal_projection_keeps_path() {
        let signals = vec![signal(
            "needle",
            SignalMetadata::HttpsRequest(HttpMetadata {
                url: "https://api.example.com/v1/users?id=7".to_string(),
                method: "POST".to_string(),
                host: "api.example.com".to_string(),
                port: 443,
                path: "/v1/users".to_string(),
                headers: vec![("Authorization".to_string(), "[REDACTED]".to_string())],
                suspicious: SuspicionReport::default(),
            }),
        )];
        let report = generate(&signals, &Config::default(), ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        let metadata = &value["signals"][0]["metadata"];
        assert_eq!(metadata["host"], "api.example.com");
        assert_eq!(metadata["port"], 443);
        assert_eq!(metadata["path"], "/v1/users");
        // The full URL and its query never appear in the report.
        assert!(!report.contains("id=7"));
    }
}
