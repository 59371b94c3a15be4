// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! HTTP(S) request facade.
//!
//! Accepts a URL string, an options struct, or URL + options; normalizes to
//! `{url, method, host, port, path, headers}` with `GET` and the scheme's
//! default port filled in. Emits `HttpRequest` or `HttpsRequest` (by
//! scheme) with redacted headers and the suspicion subrecord, then returns
//! a `reqwest::blocking::RequestBuilder` carrying the caller's exact
//! method, URL and header values. The signal is emitted at call time,
//! before any I/O; bodies, query values and responses are never captured.

use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;

use crate::context::MonitorContext;
use crate::hooks::HookKind;
use crate::signal::{HttpMetadata, Protocol, SignalMetadata, SuspicionReport};

const REDACTED: &str = "[REDACTED]";
const PRESENT: &str = "[PRESENT]";

/// Header name fragments whose values are fully redacted in signals.
const SENSITIVE_HEADER_FRAGMENTS: &[&str] = &["auth", "token", "key"];

/// TLDs disproportionately used by throwaway infrastructure.
const SUSPICIOUS_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf", ".gq", ".xyz"];

/// Ports considered ordinary for web traffic.
const STANDARD_PORTS: &[u16] = &[80, 443];

/// Paste-service hosts, matched as host substrings.
const PASTE_HOSTS: &[&str] = &["pastebin.com", "paste.ee", "hastebin.com", "dpaste.com"];

/// Options-struct calling convention for [`HttpApi::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// `http` when unset.
    pub protocol: Option<Protocol>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    /// `GET` when unset.
    pub method: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// Accepted request inputs.
#[derive(Debug, Clone)]
pub enum RequestTarget {
    Url(String),
    Options(RequestOptions),
    UrlWithOptions(String, RequestOptions),
}

impl From<&str> for RequestTarget {
    fn from(value: &str) -> Self {
        RequestTarget::Url(value.to_string())
    }
}

impl From<String> for RequestTarget {
    fn from(value: String) -> Self {
        RequestTarget::Url(value)
    }
}

impl From<url::Url> for RequestTarget {
    fn from(value: url::Url) -> Self {
        RequestTarget::Url(value.to_string())
    }
}

impl From<RequestOptions> for RequestTarget {
    fn from(value: RequestOptions) -> Self {
        RequestTarget::Options(value)
    }
}

impl From<(&str, RequestOptions)> for RequestTarget {
    fn from((url, options): (&str, RequestOptions)) -> Self {
        RequestTarget::UrlWithOptions(url.to_string(), options)
    }
}

/// A request normalized to the fields the signal model records. Header
/// values here are the caller's originals; redaction happens at emit time.
#[derive(Debug, Clone)]
struct NormalizedRequest {
    url: String,
    method: String,
    host: String,
    port: u16,
    path: String,
    headers: Vec<(String, String)>,
    protocol: Protocol,
}

fn default_port(protocol: Protocol) -> u16 {
    match protocol {
        Protocol::Https => 443,
        _ => 80,
    }
}

fn normalize(target: RequestTarget) -> Result<NormalizedRequest> {
    match target {
        RequestTarget::Url(raw) => {
            let mut normalized = from_url(&raw)?;
            normalized.method = "GET".to_string();
            Ok(normalized)
        }
        RequestTarget::UrlWithOptions(raw, options) => {
            let mut normalized = from_url(&raw)?;
            normalized.method = options.method.unwrap_or_else(|| "GET".to_string());
            normalized.headers = options.headers;
            Ok(normalized)
        }
        RequestTarget::Options(options) => {
            let protocol = options.protocol.unwrap_or(Protocol::Http);
            if protocol == Protocol::Tcp {
                bail!("request protocol must be http or https");
            }
            let host = options
                .host
                .unwrap_or_else(|| "localhost".to_string());
            let port = options.port.unwrap_or_else(|| default_port(protocol));
            let path = options.path.unwrap_or_else(|| "/".to_string());
            Ok(NormalizedRequest {
                url: format!("{protocol}://{host}:{port}{path}"),
                method: options.method.unwrap_or_else(|| "GET".to_string()),
                host,
                port,
                path,
                headers: options.headers,
                protocol,
            })
        }
    }
}

fn from_url(raw: &str) -> Result<NormalizedRequest> {
    let parsed = url::Url::parse(raw).with_context(|| format!("invalid request URL: {raw}"))?;
    let protocol = match parsed.scheme() {
        "http" => Protocol::Http,
        "https" => Protocol::Https,
        other => bail!("unsupported request scheme: {other}"),
    };
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("request URL has no host: {raw}"))?
        .to_string();
    Ok(NormalizedRequest {
        url: raw.to_string(),
        method: "GET".to_string(),
        port: parsed.port().unwrap_or_else(|| default_port(protocol)),
        path: parsed.path().to_string(),
        host,
        headers: Vec::new(),
        protocol,
    })
}

/// Replace every header value with a placeholder. Names whose lowercase
/// form contains an auth/token/key fragment become `[REDACTED]`, the rest
/// `[PRESENT]`; original values never reach a signal.
pub(crate) fn redact_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, _)| {
            let lowered = name.to_lowercase();
            let marker = if SENSITIVE_HEADER_FRAGMENTS
                .iter()
                .any(|fragment| lowered.contains(fragment))
            {
                REDACTED
            } else {
                PRESENT
            };
            (name.clone(), marker.to_string())
        })
        .collect()
}

fn ip_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").expect("static regex"))
}

/// Run the independent suspicion checks for a request destination.
pub(crate) fn analyze_destination(host: &str, port: u16) -> SuspicionReport {
    let mut report = SuspicionReport::default();

    if ip_literal_re().is_match(host) {
        report.is_ip_address = true;
        report.indicators.push("Direct IP request".to_string());
    }
    for tld in SUSPICIOUS_TLDS {
        if host.ends_with(tld) {
            report.suspicious_tld = true;
            report.indicators.push(format!("Suspicious TLD: {tld}"));
            break;
        }
    }
    if !STANDARD_PORTS.contains(&port) {
        report.non_standard_port = true;
        report.indicators.push(format!("Non-standard port: {port}"));
    }
    for paste_host in PASTE_HOSTS {
        if host.contains(paste_host) {
            report.pastebin_like = true;
            report
                .indicators
                .push(format!("Paste service host: {paste_host}"));
            break;
        }
    }
    report
}

/// Monitored facade over HTTP(S) requests.
pub struct HttpApi {
    ctx: Arc<MonitorContext>,
}

impl HttpApi {
    pub(crate) fn new(ctx: Arc<MonitorContext>) -> Self {
        Self { ctx }
    }

    /// Normalize, emit and prepare a request. The returned builder carries
    /// the caller's exact method, URL and headers; send it (with an
    /// optional body) to perform the request.
    pub fn request(
        &self,
        target: impl Into<RequestTarget>,
    ) -> Result<reqwest::blocking::RequestBuilder> {
        let normalized = normalize(target.into())?;

        {
            let normalized = normalized.clone();
            self.ctx.emit(HookKind::Http, move || {
                let protocol = normalized.protocol;
                let metadata = HttpMetadata {
                    suspicious: analyze_destination(&normalized.host, normalized.port),
                    headers: redact_headers(&normalized.headers),
                    url: normalized.url,
                    method: normalized.method,
                    host: normalized.host,
                    port: normalized.port,
                    path: normalized.path,
                };
                if protocol == Protocol::Https {
                    SignalMetadata::HttpsRequest(metadata)
                } else {
                    SignalMetadata::HttpRequest(metadata)
                }
            });
        }

        let client = self
            .ctx
            .http_client()
            .ok_or_else(|| anyhow!("HTTP client unavailable"))?;
        let method = reqwest::Method::from_bytes(normalized.method.as_bytes())
            .with_context(|| format!("invalid request method: {}", normalized.method))?;
        let mut builder = client.request(method, normalized.url.as_str());
        for (name, value) in &normalized.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder)
    }
}
