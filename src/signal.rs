// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Core signal types shared across all monitor subsystems.
//!
//! A [`Signal`] is one immutable observation of third-party runtime behavior:
//! an env read, a filesystem operation, an outbound connection, an HTTP(S)
//! request, or a child process. Metadata is a tagged union with per-variant
//! fields, so an invalid type/metadata combination cannot be constructed.
//! Signals carry names, paths, hosts, ports and sanitized command templates,
//! never secret values.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::stack::CallStack;

/// Maximum length of any string metadata field in the report projection.
const MAX_PROJECTED_STRING: usize = 500;
const TRUNCATION_MARKER: &str = "…[TRUNCATED]";

/// Closed set of observable behavior categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalType {
    EnvAccess,
    FsRead,
    FsWrite,
    NetConnect,
    HttpRequest,
    HttpsRequest,
    ShellExec,
}

/// Every signal type, in a fixed order (used for stats and validation).
pub const ALL_SIGNAL_TYPES: &[SignalType] = &[
    SignalType::EnvAccess,
    SignalType::FsRead,
    SignalType::FsWrite,
    SignalType::NetConnect,
    SignalType::HttpRequest,
    SignalType::HttpsRequest,
    SignalType::ShellExec,
];

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalType::EnvAccess => "EnvAccess",
            SignalType::FsRead => "FsRead",
            SignalType::FsWrite => "FsWrite",
            SignalType::NetConnect => "NetConnect",
            SignalType::HttpRequest => "HttpRequest",
            SignalType::HttpsRequest => "HttpsRequest",
            SignalType::ShellExec => "ShellExec",
        };
        write!(f, "{name}")
    }
}

/// Wire protocol of a low-level connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Identity of the third-party package a signal is attributed to.
///
/// `(name, version)` is the identity key; `path` is the on-disk package
/// directory the manifest was resolved from. Scoped names (`@scope/name`)
/// are a single `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

impl PackageIdentity {
    /// Canonical `name@version` key used for grouping and report ordering.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Independent suspicion checks computed for every HTTP(S) request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuspicionReport {
    pub is_ip_address: bool,
    pub suspicious_tld: bool,
    pub non_standard_port: bool,
    pub pastebin_like: bool,
    /// Human-readable indicator per triggered check.
    pub indicators: Vec<String>,
}

impl SuspicionReport {
    pub fn any(&self) -> bool {
        !self.indicators.is_empty()
    }
}

/// Metadata of an HTTP or HTTPS request. Header values are redacted before
/// this struct is built; bodies and query values are never captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMetadata {
    pub url: String,
    pub method: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Header names with `[REDACTED]` / `[PRESENT]` placeholder values.
    pub headers: Vec<(String, String)>,
    pub suspicious: SuspicionReport,
}

/// Type-specific signal payload. The variant determines the signal type, so
/// metadata validity is enforced by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMetadata {
    EnvAccess {
        /// Variable name only; the value is never captured.
        variable: String,
    },
    FsRead {
        /// Absolute, lexically normalized path.
        path: PathBuf,
        /// Facade operation name, e.g. `read_to_string`.
        operation: String,
    },
    FsWrite {
        path: PathBuf,
        operation: String,
    },
    NetConnect {
        host: String,
        port: u16,
        protocol: Protocol,
    },
    HttpRequest(HttpMetadata),
    HttpsRequest(HttpMetadata),
    ShellExec {
        /// Sanitized command template: truncated, credentials redacted.
        command: String,
        operation: String,
    },
}

impl SignalMetadata {
    pub fn signal_type(&self) -> SignalType {
        match self {
            SignalMetadata::EnvAccess { .. } => SignalType::EnvAccess,
            SignalMetadata::FsRead { .. } => SignalType::FsRead,
            SignalMetadata::FsWrite { .. } => SignalType::FsWrite,
            SignalMetadata::NetConnect { .. } => SignalType::NetConnect,
            SignalMetadata::HttpRequest(_) => SignalType::HttpRequest,
            SignalMetadata::HttpsRequest(_) => SignalType::HttpsRequest,
            SignalMetadata::ShellExec { .. } => SignalType::ShellExec,
        }
    }
}

/// One immutable observation of third-party runtime behavior.
///
/// Fields are private and exposed through accessors only; a signal cannot be
/// modified after construction. Buffer order equals interception order.
#[derive(Debug, Clone)]
pub struct Signal {
    timestamp: DateTime<Utc>,
    package: PackageIdentity,
    metadata: SignalMetadata,
    stack: CallStack,
}

impl Signal {
    pub fn new(package: PackageIdentity, metadata: SignalMetadata, stack: CallStack) -> Self {
        debug_assert!(
            !package.name.is_empty(),
            "attributed signal must carry a package name"
        );
        if let SignalMetadata::EnvAccess { variable } = &metadata {
            debug_assert!(!variable.is_empty(), "env signal must carry a variable name");
        }
        Self {
            timestamp: Utc::now(),
            package,
            metadata,
            stack,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn package(&self) -> &PackageIdentity {
        &self.package
    }

    pub fn metadata(&self) -> &SignalMetadata {
        &self.metadata
    }

    pub fn signal_type(&self) -> SignalType {
        self.metadata.signal_type()
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    /// Report projection of this signal.
    ///
    /// Drops the stack unless `include_stack`, keeps only the allowed
    /// metadata keys (`variable`, `path`, `operation`, `host`, `port`,
    /// `protocol`, `command`) and truncates long strings.
    pub fn to_report_value(&self, include_stack: bool) -> Value {
        let mut metadata = BTreeMap::new();
        match &self.metadata {
            SignalMetadata::EnvAccess { variable } => {
                metadata.insert("variable", json!(truncate_field(variable)));
            }
            SignalMetadata::FsRead { path, operation }
            | SignalMetadata::FsWrite { path, operation } => {
                metadata.insert("path", json!(truncate_field(&path.to_string_lossy())));
                metadata.insert("operation", json!(truncate_field(operation)));
            }
            SignalMetadata::NetConnect {
                host,
                port,
                protocol,
            } => {
                metadata.insert("host", json!(truncate_field(host)));
                metadata.insert("port", json!(port));
                metadata.insert("protocol", json!(protocol.to_string()));
            }
            SignalMetadata::HttpRequest(meta) | SignalMetadata::HttpsRequest(meta) => {
                metadata.insert("host", json!(truncate_field(&meta.host)));
                metadata.insert("port", json!(meta.port));
                metadata.insert("path", json!(truncate_field(&meta.path)));
            }
            SignalMetadata::ShellExec { command, operation } => {
                metadata.insert("command", json!(truncate_field(command)));
                metadata.insert("operation", json!(truncate_field(operation)));
            }
        }

        let mut value = json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "type": self.signal_type().to_string(),
            "package": self.package.name,
            "version": self.package.version,
            "metadata": metadata,
        });
        if include_stack {
            let frames: Vec<String> = self
                .stack
                .frames()
                .iter()
                .map(|f| f.file.to_string_lossy().into_owned())
                .collect();
            value["stack"] = json!(frames);
        }
        value
    }
}

/// Truncate a metadata string to the projection limit.
pub(crate) fn truncate_field(s: &str) -> String {
    if s.chars().count() <= MAX_PROJECTED_STRING {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_PROJECTED_STRING).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str) -> PackageIdentity {
        PackageIdentity {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            path: PathBuf::from("/app/node_modules").join(name),
        }
    }

    #[test]
    fn test_signal_type_follows_metadata_variant() {
        let meta = SignalMetadata::FsWrite {
            path: PathBuf::from("/tmp/out"),
            operation: "write".to_string(),
        };
        let signal = Signal::new(pkg("left-pad"), meta, CallStack::default());
        assert_eq!(signal.signal_type(), SignalType::FsWrite);
    }

    #[test]
    fn test_truncate_field_limits_long_strings() {
        let long = "a".repeat(600);
        let out = truncate_field(&long);
        assert!(out.starts_with(&"a".repeat(500)));
        assert!(out.ends_with("…[TRUNCATED]"));

        let short = "a".repeat(500);
        assert_eq!(truncate_field(&short), short);
    }

    #[test]
    fn test_projection_keeps_only_allowed_keys_for_http() {
        let meta = SignalMetadata::HttpsRequest(HttpMetadata {
            url: "https://example.com/login?user=hunter2".to_string(),
            method: "POST".to_string(),
            host: "example.com".to_string(),
            port: 443,
            path: "/login".to_string(),
            headers: vec![("authorization".to_string(), "[REDACTED]".to_string())],
            suspicious: SuspicionReport::default(),
        });
        let signal = Signal::new(pkg("needle"), meta, CallStack::default());
        let value = signal.to_report_value(false);
        let keys: Vec<&String> = value["metadata"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["host", "path", "port"]);
        assert_eq!(value["metadata"]["path"], "/login");
        // Full URL, query values, method and headers never reach the
        // projection.
        let rendered = value.to_string();
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("user="));
        assert!(!rendered.contains("POST"));
        assert!(!rendered.contains("authorization"));
        assert!(value.get("stack").is_none());
    }

    #[test]
    fn test_projection_includes_stack_on_request() {
        let meta = SignalMetadata::EnvAccess {
            variable: "HOME".to_string(),
        };
        let stack = CallStack::from_files(["/app/node_modules/dep/index.js"]);
        let signal = Signal::new(pkg("dep"), meta, stack);
        let value = signal.to_report_value(true);
        assert_eq!(
            value["stack"][0].as_str().unwrap(),
            "/app/node_modules/dep/index.js"
        );
    }

    #[test]
    fn test_signal_type_serializes_as_exact_name() {
        assert_eq!(
            serde_json::to_string(&SignalType::HttpsRequest).unwrap(),
            "\"HttpsRequest\""
        );
    }
}
