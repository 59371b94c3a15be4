// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Static signature tables for the pattern analyzer.
//!
//! All `const` arrays used by the detectors are centralized here: miner
//! process and pool names, sensitive file substrings, exfiltration service
//! hosts, reverse-shell fragments, secret-bearing env names, and
//! obfuscation indicators.

use super::Severity;

// ─── Crypto mining ──────────────────────────────────────────────────────────

/// Known miner process names, matched against lowercased commands.
pub(crate) const MINER_PROCESS_NAMES: &[&str] = &[
    "xmrig",
    "ethminer",
    "cpuminer",
    "cgminer",
    "bfgminer",
    "minerd",
    "xmr-stak",
    "phoenixminer",
    "nbminer",
    "lolminer",
    "t-rex",
];

/// Known mining pool hosts, matched as URL substrings.
pub(crate) const MINING_POOL_DOMAINS: &[&str] = &[
    "pool.minexmr.com",
    "xmrpool.eu",
    "supportxmr.com",
    "nanopool.org",
    "f2pool.com",
    "ethermine.org",
    "2miners.com",
    "hashvault.pro",
    "moneroocean.stream",
    "c3pool.com",
];

/// Environment variables miners read for pool and wallet configuration.
pub(crate) const MINING_ENV_VARS: &[&str] = &[
    "XMRIG_CONFIG",
    "POOL_URL",
    "POOL_USER",
    "POOL_PASS",
    "WALLET_ADDRESS",
    "MINING_POOL",
    "STRATUM_URL",
];

// ─── Sensitive files ────────────────────────────────────────────────────────

/// Path substrings of files worth stealing (registry tokens, cloud and SSH
/// credentials, browser and wallet stores).
pub(crate) const SENSITIVE_FILE_PATTERNS: &[&str] = &[
    ".npmrc",
    ".env",
    ".netrc",
    ".aws/credentials",
    ".aws/config",
    ".ssh/id_rsa",
    ".ssh/id_ed25519",
    ".ssh/id_dsa",
    ".gnupg/",
    ".kube/config",
    ".docker/config.json",
    ".git-credentials",
    "wallet.dat",
];

// ─── Exfiltration services ──────────────────────────────────────────────────

/// Hosts commonly used to drop stolen data, matched as URL substrings.
pub(crate) const EXFIL_SERVICE_PATTERNS: &[&str] = &[
    "pastebin.com",
    "paste.ee",
    "hastebin.com",
    "dpaste.com",
    "webhook.site",
    "requestbin",
    "pipedream.net",
    "transfer.sh",
    "file.io",
    "anonfiles.com",
    "0x0.st",
    "termbin.com",
];

// ─── Backdoors ──────────────────────────────────────────────────────────────

/// Reverse-shell command fragments, matched against the raw command.
pub(crate) const REVERSE_SHELL_PATTERNS: &[&str] = &[
    "nc -e",
    "ncat -e",
    "nc.traditional -e",
    "/bin/bash -i",
    "/bin/sh -i",
    "bash -i >&",
    "sh -i >&",
    "/dev/tcp/",
    "mkfifo /tmp/",
    "rm /tmp/f;mkfifo",
    "import socket,subprocess",
    "socket.SOCK_STREAM",
];

/// Tunnel and remote-access tooling, matched against lowercased commands.
pub(crate) const RAT_TOOL_PATTERNS: &[&str] = &[
    "ngrok",
    "localtunnel",
    "lt --port",
    "serveo",
    "pagekite",
    "chisel",
    "frpc",
    "telebit",
];

/// TCP ports associated with backdoor listeners and C2 channels.
pub(crate) const SUSPICIOUS_PORTS: &[u16] = &[1337, 4444, 31337, 12345, 54321, 6666, 9001];

// ─── Credential theft ───────────────────────────────────────────────────────

/// Environment variables that carry secrets; reading one is worth flagging.
pub(crate) const SECRET_ENV_NAMES: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "NPM_TOKEN",
    "NODE_AUTH_TOKEN",
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "GITLAB_TOKEN",
    "CI_JOB_TOKEN",
    "SLACK_TOKEN",
    "STRIPE_SECRET_KEY",
    "DATABASE_URL",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "DOCKER_PASSWORD",
    "AZURE_CLIENT_SECRET",
    "GOOGLE_APPLICATION_CREDENTIALS",
];

/// Path substrings of credential stores.
pub(crate) const CREDENTIAL_FILE_PATTERNS: &[&str] = &[
    ".npmrc",
    ".netrc",
    ".aws/credentials",
    ".ssh/",
    ".gnupg/",
    ".git-credentials",
    ".docker/config.json",
    ".kube/config",
    "id_rsa",
    "id_ed25519",
];

// ─── Obfuscation ────────────────────────────────────────────────────────────

/// Decode-and-execute and payload-hiding command fragments.
/// Each entry is (pattern substring, description, severity); piping a
/// decoder straight into a shell outranks bare decoding.
pub(crate) const OBFUSCATION_EXEC_PATTERNS: &[(&str, &str, Severity)] = &[
    ("base64 -d | sh", "base64 decode piped to sh", Severity::High),
    ("base64 -d | bash", "base64 decode piped to bash", Severity::High),
    (
        "base64 --decode | sh",
        "base64 decode piped to sh",
        Severity::High,
    ),
    (
        "base64 --decode | bash",
        "base64 decode piped to bash",
        Severity::High,
    ),
    ("xxd -r -p | sh", "hex decode piped to sh", Severity::High),
    ("| sh -s", "piped script execution", Severity::High),
    ("eval $(", "eval of command substitution", Severity::High),
    ("eval \"$(", "eval of command substitution", Severity::High),
    ("base64 -d", "base64 decoding", Severity::Medium),
    ("base64 --decode", "base64 decoding", Severity::Medium),
    ("xxd -r", "hex decoding", Severity::Medium),
    ("uudecode", "uudecode of payload", Severity::Medium),
    ("openssl enc -d", "openssl decryption of payload", Severity::Medium),
];
