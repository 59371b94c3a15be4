// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Configuration loading, validation and defaults.
//!
//! The schema is JSON with camelCase keys (`.bheeshmarc.json` and friends).
//! All sections have defaults so partial configs deep-merge over them via
//! `#[serde(default)]`. Disk discovery searches the working directory only,
//! in a fixed priority order, and refuses anything under `node_modules`.
//!
//! Validation is structural and collects every problem instead of stopping
//! at the first. On any validation error the loader falls back to the
//! default configuration and returns the error list so the caller can log
//! it; only [`Config::from_object`] (direct API use) raises.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signal::SignalType;

/// Config file names probed in the working directory, highest priority first.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".bheeshmarc.json",
    ".bheeshmarc",
    "bheeshma.config.json",
    "bheeshma.config.js",
];

const HOOK_NAMES: &[&str] = &["env", "fs", "net", "childProcess", "http"];

/// Root configuration, deserialized from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub hooks: HooksConfig,
    /// Per-type score penalty. Types absent here use the built-in default.
    pub risk_weights: HashMap<SignalType, u32>,
    pub thresholds: Thresholds,
    /// Package glob patterns whose signals are suppressed entirely.
    pub whitelist: Vec<String>,
    /// Package glob patterns pinned to CRITICAL risk regardless of score.
    pub blacklist: Vec<String>,
    pub patterns: PatternConfig,
    pub performance: PerformanceConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hooks: HooksConfig::default(),
            risk_weights: default_risk_weights(),
            thresholds: Thresholds::default(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            patterns: PatternConfig::default(),
            performance: PerformanceConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Per-hook enable flags. Every hook defaults to on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HooksConfig {
    pub env: bool,
    pub fs: bool,
    pub net: bool,
    pub child_process: bool,
    pub http: bool,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            env: true,
            fs: true,
            net: true,
            child_process: true,
            http: true,
        }
    }
}

/// Risk tier thresholds, each the lower bound of the next-better tier:
/// score >= medium is LOW, >= high is MEDIUM, >= critical is HIGH,
/// anything below critical is CRITICAL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical: 30,
            high: 60,
            medium: 80,
        }
    }
}

/// Pattern analyzer detector toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternConfig {
    pub enabled: bool,
    pub detect_crypto_miners: bool,
    pub detect_data_exfiltration: bool,
    pub detect_backdoors: bool,
    pub detect_credential_theft: bool,
    pub detect_obfuscation: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detect_crypto_miners: true,
            detect_data_exfiltration: true,
            detect_backdoors: true,
            detect_credential_theft: true,
            detect_obfuscation: true,
        }
    }
}

/// Buffer and bookkeeping limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceConfig {
    pub track: bool,
    /// Hard cap on buffered signals; once reached, new signals are dropped
    /// and counted, never evicted.
    pub max_signals: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            track: true,
            max_signals: 10_000,
        }
    }
}

/// Report output preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub formats: Vec<String>,
    pub verbosity: Verbosity,
    pub include_stack_traces: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: vec!["cli".to_string()],
            verbosity: Verbosity::Normal,
            include_stack_traces: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// Built-in per-type score penalties.
pub fn default_risk_weights() -> HashMap<SignalType, u32> {
    HashMap::from([
        (SignalType::ShellExec, 20),
        (SignalType::FsWrite, 10),
        (SignalType::HttpRequest, 10),
        (SignalType::NetConnect, 8),
        (SignalType::HttpsRequest, 8),
        (SignalType::EnvAccess, 5),
        (SignalType::FsRead, 3),
    ])
}

impl Config {
    /// Effective penalty for a signal type, falling back to the built-in
    /// default when the config's map does not name the type.
    pub fn weight(&self, signal_type: SignalType) -> u32 {
        if let Some(weight) = self.risk_weights.get(&signal_type) {
            return *weight;
        }
        *default_risk_weights()
            .get(&signal_type)
            .expect("every signal type has a default weight")
    }

    pub fn hook_enabled(&self, hook: crate::hooks::HookKind) -> bool {
        use crate::hooks::HookKind;
        match hook {
            HookKind::Env => self.hooks.env,
            HookKind::Fs => self.hooks.fs,
            HookKind::Net => self.hooks.net,
            HookKind::ChildProcess => self.hooks.child_process,
            HookKind::Http => self.hooks.http,
        }
    }

    /// Build a config from a caller-provided JSON value.
    ///
    /// This is the one fatal path: invalid input raises instead of
    /// defaulting, because it is direct API misuse rather than something
    /// monitored code did.
    pub fn from_object(value: Value) -> Result<Self> {
        let errors = validate_value(&value);
        if !errors.is_empty() {
            bail!("invalid configuration: {}", errors.join("; "));
        }
        serde_json::from_value(value).context("failed to deserialize configuration")
    }
}

/// Outcome of loading a configuration from disk or defaults.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Validation/load errors; non-empty means `config` is the default.
    pub errors: Vec<String>,
    /// File the config came from, if any.
    pub source: Option<PathBuf>,
}

impl LoadedConfig {
    fn defaults() -> Self {
        Self {
            config: Config::default(),
            errors: Vec::new(),
            source: None,
        }
    }

    fn failed(errors: Vec<String>, source: Option<PathBuf>) -> Self {
        Self {
            config: Config::default(),
            errors,
            source,
        }
    }
}

/// Discover and load a configuration from the current working directory.
pub fn discover() -> LoadedConfig {
    match std::env::current_dir() {
        Ok(cwd) => discover_in(&cwd),
        Err(err) => {
            tracing::warn!(%err, "cannot determine working directory, using defaults");
            LoadedConfig::defaults()
        }
    }
}

/// Discover and load a configuration from `dir`. The first existing
/// candidate file wins; later names are not consulted.
pub fn discover_in(dir: &Path) -> LoadedConfig {
    if under_node_modules(dir) {
        return LoadedConfig::failed(
            vec![format!(
                "refusing configuration under node_modules: {}",
                dir.display()
            )],
            None,
        );
    }

    for name in CONFIG_FILE_NAMES {
        let candidate = dir.join(name);
        if !candidate.is_file() {
            continue;
        }
        if name.ends_with(".js") {
            return LoadedConfig::failed(
                vec![format!(
                    "{name}: JavaScript configuration cannot be evaluated, using defaults"
                )],
                Some(candidate),
            );
        }
        return load_file(&candidate);
    }
    LoadedConfig::defaults()
}

fn load_file(path: &Path) -> LoadedConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            return LoadedConfig::failed(
                vec![format!("{}: read failed: {err}", path.display())],
                Some(path.to_path_buf()),
            );
        }
    };
    let value: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(err) => {
            return LoadedConfig::failed(
                vec![format!("{}: parse failed: {err}", path.display())],
                Some(path.to_path_buf()),
            );
        }
    };

    let errors = validate_value(&value);
    if !errors.is_empty() {
        return LoadedConfig::failed(errors, Some(path.to_path_buf()));
    }
    match serde_json::from_value::<Config>(value) {
        Ok(config) => LoadedConfig {
            config,
            errors: Vec::new(),
            source: Some(path.to_path_buf()),
        },
        Err(err) => LoadedConfig::failed(
            vec![format!("{}: deserialize failed: {err}", path.display())],
            Some(path.to_path_buf()),
        ),
    }
}

fn under_node_modules(dir: &Path) -> bool {
    dir.components().any(|c| match c {
        Component::Normal(seg) => seg == "node_modules",
        _ => false,
    })
}

/// Structural validation of a raw configuration value. Returns every
/// problem found; an empty list means the value deserializes cleanly.
pub fn validate_value(value: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(root) = value.as_object() else {
        return vec!["configuration root must be an object".to_string()];
    };

    if let Some(hooks) = root.get("hooks") {
        match hooks.as_object() {
            Some(map) => {
                for (name, flag) in map {
                    if !HOOK_NAMES.contains(&name.as_str()) {
                        errors.push(format!("hooks: unknown hook name {name:?}"));
                    } else if !flag.is_boolean() {
                        errors.push(format!("hooks.{name}: expected a boolean"));
                    }
                }
            }
            None => errors.push("hooks: expected an object".to_string()),
        }
    }

    if let Some(weights) = root.get("riskWeights") {
        match weights.as_object() {
            Some(map) => {
                for (name, weight) in map {
                    if serde_json::from_value::<SignalType>(Value::String(name.clone())).is_err() {
                        errors.push(format!("riskWeights: unknown signal type {name:?}"));
                        continue;
                    }
                    match weight.as_u64() {
                        Some(w) if w <= 100 => {}
                        _ => errors.push(format!(
                            "riskWeights.{name}: expected an integer in [0, 100]"
                        )),
                    }
                }
            }
            None => errors.push("riskWeights: expected an object".to_string()),
        }
    }

    if let Some(thresholds) = root.get("thresholds") {
        match thresholds.as_object() {
            Some(map) => {
                let defaults = Thresholds::default();
                let mut bound = |key: &str, fallback: u32| -> u32 {
                    match map.get(key) {
                        None => fallback,
                        Some(v) => match v.as_u64() {
                            Some(n) if n <= 100 => n as u32,
                            _ => {
                                errors.push(format!(
                                    "thresholds.{key}: expected an integer in [0, 100]"
                                ));
                                fallback
                            }
                        },
                    }
                };
                let critical = bound("critical", defaults.critical);
                let high = bound("high", defaults.high);
                let medium = bound("medium", defaults.medium);
                if !(critical < high && high < medium) {
                    errors.push(format!(
                        "thresholds: require critical < high < medium, got {critical} / {high} / {medium}"
                    ));
                }
            }
            None => errors.push("thresholds: expected an object".to_string()),
        }
    }

    for key in ["whitelist", "blacklist"] {
        if let Some(list) = root.get(key) {
            match list.as_array() {
                Some(items) => {
                    if items.iter().any(|item| !item.is_string()) {
                        errors.push(format!("{key}: expected an array of strings"));
                    }
                }
                None => errors.push(format!("{key}: expected an array")),
            }
        }
    }

    if let Some(patterns) = root.get("patterns") {
        match patterns.as_object() {
            Some(map) => {
                for (name, flag) in map {
                    if !flag.is_boolean() {
                        errors.push(format!("patterns.{name}: expected a boolean"));
                    }
                }
            }
            None => errors.push("patterns: expected an object".to_string()),
        }
    }

    if let Some(performance) = root.get("performance") {
        match performance.as_object() {
            Some(map) => {
                if let Some(track) = map.get("track") {
                    if !track.is_boolean() {
                        errors.push("performance.track: expected a boolean".to_string());
                    }
                }
                if let Some(max) = map.get("maxSignals") {
                    match max.as_u64() {
                        Some(n) if n >= 1 => {}
                        _ => errors
                            .push("performance.maxSignals: expected an integer >= 1".to_string()),
                    }
                }
            }
            None => errors.push("performance: expected an object".to_string()),
        }
    }

    if let Some(output) = root.get("output") {
        match output.as_object() {
            Some(map) => {
                if let Some(formats) = map.get("formats") {
                    match formats.as_array() {
                        Some(items) if items.iter().all(|i| i.is_string()) => {}
                        _ => errors.push("output.formats: expected an array of strings".to_string()),
                    }
                }
                if let Some(verbosity) = map.get("verbosity") {
                    if serde_json::from_value::<Verbosity>(verbosity.clone()).is_err() {
                        errors.push(
                            "output.verbosity: expected quiet, normal or verbose".to_string(),
                        );
                    }
                }
                if let Some(flag) = map.get("includeStackTraces") {
                    if !flag.is_boolean() {
                        errors.push("output.includeStackTraces: expected a boolean".to_string());
                    }
                }
            }
            None => errors.push("output: expected an object".to_string()),
        }
    }

    errors
}
