// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Signature- and correlation-based threat detection over the signal buffer.
//!
//! Each detector scans the buffer independently and returns named
//! [`ThreatFinding`]s:
//!
//! - **crypto miner**: miner process names, mining pool URLs, miner env vars
//! - **data exfiltration**: exfil service URLs, plus the correlation of a
//!   sensitive-file read with any HTTP(S) request from the same package
//! - **backdoor**: reverse-shell fragments, tunnel/RAT tooling, C2 ports
//! - **credential theft**: secret env names, credential store paths
//! - **obfuscation**: decode-and-execute command chains
//!
//! Analysis is a pure function of the signals and the detector toggles; it
//! never touches the buffer and never fails.

mod signatures;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;

use crate::config::PatternConfig;
use crate::signal::{Signal, SignalMetadata, SignalType};

use signatures::*;

/// Threat category a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatKind {
    CryptoMiner,
    DataExfiltration,
    /// Correlation: sensitive-file read plus outbound HTTP(S) from the same
    /// package.
    SensitiveFilePlusHttp,
    Backdoor,
    CredentialTheft,
    Obfuscation,
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatKind::CryptoMiner => write!(f, "crypto-miner"),
            ThreatKind::DataExfiltration => write!(f, "data-exfiltration"),
            ThreatKind::SensitiveFilePlusHttp => write!(f, "sensitive-file-plus-http"),
            ThreatKind::Backdoor => write!(f, "backdoor"),
            ThreatKind::CredentialTheft => write!(f, "credential-theft"),
            ThreatKind::Obfuscation => write!(f, "obfuscation"),
        }
    }
}

/// Finding severity, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRIT"),
        }
    }
}

/// One named threat detection.
#[derive(Debug, Clone)]
pub struct ThreatFinding {
    pub kind: ThreatKind,
    pub severity: Severity,
    /// `name@version` of the responsible package.
    pub package: String,
    /// What matched, human readable.
    pub indicator: String,
    /// Index of the triggering signal in the analyzed slice, when a single
    /// signal is responsible (correlation findings have none).
    pub signal: Option<usize>,
}

/// Overall label for a set of findings: the stronger of the kind bucket
/// (miner/backdoor outrank exfiltration/credential, which outrank the
/// rest) and the highest individual finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThreatLabel {
    None,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ThreatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatLabel::None => write!(f, "none"),
            ThreatLabel::Medium => write!(f, "medium"),
            ThreatLabel::High => write!(f, "high"),
            ThreatLabel::Critical => write!(f, "critical"),
        }
    }
}

/// Result of one analysis pass.
#[derive(Debug, Clone)]
pub struct ThreatResult {
    pub findings: Vec<ThreatFinding>,
    pub total: usize,
    pub highest: ThreatLabel,
}

impl ThreatResult {
    fn empty() -> Self {
        Self {
            findings: Vec::new(),
            total: 0,
            highest: ThreatLabel::None,
        }
    }
}

/// Run every enabled detector over the signals.
pub fn analyze(signals: &[Signal], config: &PatternConfig) -> ThreatResult {
    if !config.enabled {
        return ThreatResult::empty();
    }

    let mut findings = Vec::new();
    if config.detect_crypto_miners {
        findings.extend(detect_crypto_miners(signals));
    }
    if config.detect_data_exfiltration {
        findings.extend(detect_data_exfiltration(signals));
    }
    if config.detect_backdoors {
        findings.extend(detect_backdoors(signals));
    }
    if config.detect_credential_theft {
        findings.extend(detect_credential_theft(signals));
    }
    if config.detect_obfuscation {
        findings.extend(detect_obfuscation(signals));
    }

    let highest = summarize(&findings);
    ThreatResult {
        total: findings.len(),
        findings,
        highest,
    }
}

fn summarize(findings: &[ThreatFinding]) -> ThreatLabel {
    let by_kind = if findings
        .iter()
        .any(|f| matches!(f.kind, ThreatKind::CryptoMiner | ThreatKind::Backdoor))
    {
        ThreatLabel::Critical
    } else if findings.iter().any(|f| {
        matches!(
            f.kind,
            ThreatKind::DataExfiltration
                | ThreatKind::SensitiveFilePlusHttp
                | ThreatKind::CredentialTheft
        )
    }) {
        ThreatLabel::High
    } else if findings.is_empty() {
        ThreatLabel::None
    } else {
        ThreatLabel::Medium
    };

    let by_severity = findings
        .iter()
        .map(|f| match f.severity {
            Severity::Critical => ThreatLabel::Critical,
            Severity::High => ThreatLabel::High,
            Severity::Medium => ThreatLabel::Medium,
        })
        .max()
        .unwrap_or(ThreatLabel::None);

    by_kind.max(by_severity)
}

/// Request URL of an HTTP(S) signal, if it is one.
fn request_url(signal: &Signal) -> Option<&str> {
    match signal.metadata() {
        SignalMetadata::HttpRequest(meta) | SignalMetadata::HttpsRequest(meta) => {
            Some(meta.url.as_str())
        }
        _ => None,
    }
}

fn detect_crypto_miners(signals: &[Signal]) -> Vec<ThreatFinding> {
    let mut findings = Vec::new();
    for (index, signal) in signals.iter().enumerate() {
        match signal.metadata() {
            SignalMetadata::ShellExec { command, .. } => {
                let lowered = command.to_lowercase();
                for name in MINER_PROCESS_NAMES {
                    if lowered.contains(name) {
                        findings.push(ThreatFinding {
                            kind: ThreatKind::CryptoMiner,
                            severity: Severity::Critical,
                            package: signal.package().key(),
                            indicator: format!("miner process: {name}"),
                            signal: Some(index),
                        });
                        break;
                    }
                }
            }
            SignalMetadata::EnvAccess { variable } => {
                if MINING_ENV_VARS.contains(&variable.as_str()) {
                    findings.push(ThreatFinding {
                        kind: ThreatKind::CryptoMiner,
                        severity: Severity::High,
                        package: signal.package().key(),
                        indicator: format!("mining env var: {variable}"),
                        signal: Some(index),
                    });
                }
            }
            _ => {
                if let Some(url) = request_url(signal) {
                    for domain in MINING_POOL_DOMAINS {
                        if url.contains(domain) {
                            findings.push(ThreatFinding {
                                kind: ThreatKind::CryptoMiner,
                                severity: Severity::Critical,
                                package: signal.package().key(),
                                indicator: format!("mining pool: {domain}"),
                                signal: Some(index),
                            });
                            break;
                        }
                    }
                }
            }
        }
    }
    findings
}

fn detect_data_exfiltration(signals: &[Signal]) -> Vec<ThreatFinding> {
    let mut findings = Vec::new();
    // Per-package: sensitive files read, and whether any HTTP(S) request
    // was seen anywhere in the buffer.
    let mut sensitive_reads: HashMap<String, Vec<String>> = HashMap::new();
    let mut made_request: HashMap<String, bool> = HashMap::new();

    for (index, signal) in signals.iter().enumerate() {
        let key = signal.package().key();
        match signal.metadata() {
            SignalMetadata::FsRead { path, .. } => {
                let path_str = path.to_string_lossy();
                for pattern in SENSITIVE_FILE_PATTERNS {
                    if path_str.contains(pattern) {
                        sensitive_reads
                            .entry(key.clone())
                            .or_default()
                            .push(path_str.into_owned());
                        break;
                    }
                }
            }
            _ => {
                if let Some(url) = request_url(signal) {
                    made_request.insert(key.clone(), true);
                    for service in EXFIL_SERVICE_PATTERNS {
                        if url.contains(service) {
                            findings.push(ThreatFinding {
                                kind: ThreatKind::DataExfiltration,
                                severity: Severity::Critical,
                                package: key.clone(),
                                indicator: format!("exfiltration service: {service}"),
                                signal: Some(index),
                            });
                            break;
                        }
                    }
                }
            }
        }
    }

    for (package, files) in &sensitive_reads {
        if made_request.get(package).copied().unwrap_or(false) {
            findings.push(ThreatFinding {
                kind: ThreatKind::SensitiveFilePlusHttp,
                severity: Severity::Critical,
                package: package.clone(),
                indicator: format!("sensitive files read before HTTP: {}", files.join(", ")),
                signal: None,
            });
        }
    }
    findings
}

fn detect_backdoors(signals: &[Signal]) -> Vec<ThreatFinding> {
    let mut findings = Vec::new();
    for (index, signal) in signals.iter().enumerate() {
        match signal.metadata() {
            SignalMetadata::ShellExec { command, .. } => {
                let mut matched = false;
                for pattern in REVERSE_SHELL_PATTERNS {
                    if command.contains(pattern) {
                        findings.push(ThreatFinding {
                            kind: ThreatKind::Backdoor,
                            severity: Severity::Critical,
                            package: signal.package().key(),
                            indicator: format!("reverse shell: {pattern}"),
                            signal: Some(index),
                        });
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    let lowered = command.to_lowercase();
                    for tool in RAT_TOOL_PATTERNS {
                        if lowered.contains(tool) {
                            findings.push(ThreatFinding {
                                kind: ThreatKind::Backdoor,
                                severity: Severity::High,
                                package: signal.package().key(),
                                indicator: format!("tunnel tool: {tool}"),
                                signal: Some(index),
                            });
                            break;
                        }
                    }
                }
            }
            SignalMetadata::NetConnect { host, port, .. } => {
                if SUSPICIOUS_PORTS.contains(port) {
                    findings.push(ThreatFinding {
                        kind: ThreatKind::Backdoor,
                        severity: Severity::High,
                        package: signal.package().key(),
                        indicator: format!("suspicious port: {host}:{port}"),
                        signal: Some(index),
                    });
                }
            }
            _ => {}
        }
    }
    findings
}

fn detect_credential_theft(signals: &[Signal]) -> Vec<ThreatFinding> {
    let mut findings = Vec::new();
    for (index, signal) in signals.iter().enumerate() {
        match signal.metadata() {
            SignalMetadata::EnvAccess { variable } => {
                if SECRET_ENV_NAMES.contains(&variable.as_str()) {
                    findings.push(ThreatFinding {
                        kind: ThreatKind::CredentialTheft,
                        severity: Severity::High,
                        package: signal.package().key(),
                        indicator: format!("secret env var: {variable}"),
                        signal: Some(index),
                    });
                }
            }
            SignalMetadata::FsRead { path, .. } => {
                let path_str = path.to_string_lossy();
                for pattern in CREDENTIAL_FILE_PATTERNS {
                    if path_str.contains(pattern) {
                        findings.push(ThreatFinding {
                            kind: ThreatKind::CredentialTheft,
                            severity: Severity::High,
                            package: signal.package().key(),
                            indicator: format!("credential file: {path_str}"),
                            signal: Some(index),
                        });
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    findings
}

fn detect_obfuscation(signals: &[Signal]) -> Vec<ThreatFinding> {
    let mut findings = Vec::new();
    for (index, signal) in signals.iter().enumerate() {
        if signal.signal_type() != SignalType::ShellExec {
            continue;
        }
        let SignalMetadata::ShellExec { command, .. } = signal.metadata() else {
            continue;
        };
        for (pattern, description, severity) in OBFUSCATION_EXEC_PATTERNS {
            if command.contains(pattern) {
                findings.push(ThreatFinding {
                    kind: ThreatKind::Obfuscation,
                    severity: *severity,
                    package: signal.package().key(),
                    indicator: description.to_string(),
                    signal: Some(index),
                });
                break;
            }
        }
    }
    findings
}
