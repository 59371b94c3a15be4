// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Bheeshma — runtime dependency behavior monitor.
//!
//! Observes the side-effects of third-party packages loaded into a host
//! process, attributes each observation to the responsible package, scores
//! packages for risk and reports named threats. The subsystems:
//!
//! - **hooks**: installable facades over env, fs, net, http(s) and child
//!   process APIs; semantically transparent, emit signals when installed
//! - **attribution**: captured stack → package identity via `node_modules`
//!   path walking and cached `package.json` manifests
//! - **signal**: immutable observation records with per-type metadata
//! - **score**: deterministic trust score and risk tier per package
//! - **patterns**: signature and correlation detection of miners,
//!   exfiltration, backdoors, credential theft and obfuscation
//! - **config**: JSON schema, validation, discovery (`.bheeshmarc.json`)
//! - **report**: structured (v1.0) and text views over the scored buffer
//!
//! A [`Monitor`] owns all state; the crate-level functions operate on a
//! process-wide default monitor for drop-in use:
//!
//! ```no_run
//! let result = bheeshma::install(None);
//! assert!(result.success);
//! // ... host loads and runs third-party modules through the facades ...
//! let report = bheeshma::generate_report(bheeshma::ReportFormat::Json);
//! bheeshma::uninstall();
//! # let _ = report;
//! ```
//!
//! Monitor-internal failures only ever cost coverage (missing signals);
//! they never alter what the wrapped platform APIs return or raise.

pub mod attribution;
pub mod config;
mod context;
pub mod hooks;
pub mod patterns;
pub mod report;
pub mod score;
pub mod signal;
pub mod stack;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub use config::{Config, LoadedConfig, PatternConfig};
pub use context::PerfStats;
pub use hooks::{
    ChildProcessApi, EnvView, FsApi, HookFailure, HookKind, HttpApi, InstallResult, NetApi,
    UninstallResult,
};
pub use patterns::{ThreatFinding, ThreatKind, ThreatLabel, ThreatResult};
pub use report::ReportFormat;
pub use score::{PackageScore, RiskLevel};
pub use signal::{PackageIdentity, Signal, SignalType};
pub use stack::{enter_module, CallStack, ModuleGuard, StackFrame, StackProvider};

use context::MonitorContext;

/// Handle to one monitor: signal buffer, attribution cache, configuration
/// and install state. Cloning shares the same state.
#[derive(Clone)]
pub struct Monitor {
    ctx: Arc<MonitorContext>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            ctx: Arc::new(MonitorContext::new()),
        }
    }

    /// Install the enabled hooks. With no config, discovery runs in the
    /// working directory and any validation errors are logged and the
    /// defaults applied. Idempotent: a second install is a successful
    /// no-op until [`Monitor::uninstall`].
    pub fn install(&self, config: Option<Config>) -> InstallResult {
        let config = match config {
            Some(config) => config,
            None => {
                let loaded = config::discover();
                for error in &loaded.errors {
                    tracing::warn!(%error, "configuration error, using defaults");
                }
                loaded.config
            }
        };
        hooks::install(&self.ctx, config)
    }

    /// Disable every hook and clear the signal buffer.
    pub fn uninstall(&self) -> UninstallResult {
        hooks::uninstall(&self.ctx)
    }

    // ─── facades ────────────────────────────────────────────────────────

    pub fn env(&self) -> EnvView {
        EnvView::new(self.ctx.clone())
    }

    pub fn fs(&self) -> FsApi {
        FsApi::new(self.ctx.clone())
    }

    pub fn net(&self) -> NetApi {
        NetApi::new(self.ctx.clone())
    }

    pub fn http(&self) -> HttpApi {
        HttpApi::new(self.ctx.clone())
    }

    pub fn child_process(&self) -> ChildProcessApi {
        ChildProcessApi::new(self.ctx.clone())
    }

    // ─── host integration ───────────────────────────────────────────────

    /// Mark the current thread as executing code from `file` until the
    /// guard drops. This feeds the default stack capture.
    pub fn enter_module(file: impl AsRef<Path>) -> ModuleGuard {
        stack::enter_module(file)
    }

    /// Replace the stack capture seam, for embedders with real stack
    /// introspection.
    pub fn set_stack_provider(&self, provider: Arc<dyn StackProvider>) {
        self.ctx.set_provider(provider);
    }

    // ─── observations ───────────────────────────────────────────────────

    /// Snapshot copy of the signal buffer, in interception order.
    pub fn signals(&self) -> Vec<Signal> {
        self.ctx.snapshot()
    }

    /// Score every attributed package, keyed `name@version`.
    pub fn scores(&self) -> HashMap<String, PackageScore> {
        score::score_packages(&self.ctx.snapshot(), &self.ctx.config())
    }

    /// Run the pattern analyzer over the current buffer.
    pub fn analyze(&self) -> ThreatResult {
        patterns::analyze(&self.ctx.snapshot(), &self.ctx.config().patterns)
    }

    /// Render a report over the current buffer.
    pub fn generate_report(&self, format: ReportFormat) -> String {
        report::generate(&self.ctx.snapshot(), &self.ctx.config(), format)
    }

    /// Emission counters (gated by `performance.track`).
    pub fn perf_stats(&self) -> PerfStats {
        self.ctx.perf()
    }

    /// Convenience: install, run `f`, build the report, uninstall.
    pub fn run<T>(&self, options: MonitorOptions, f: impl FnOnce() -> T) -> MonitorRun<T> {
        let install = self.install(options.config);
        if !install.success {
            for failure in &install.failed {
                tracing::warn!(hook = %failure.hook, error = %failure.error, "hook unavailable");
            }
        }
        let result = f();
        let format = options.format.unwrap_or(ReportFormat::Cli);
        let report = self.generate_report(format);
        self.uninstall();
        MonitorRun { result, report }
    }
}

/// Options for [`Monitor::run`] / [`monitor`].
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Explicit configuration; discovery when absent.
    pub config: Option<Config>,
    pub format: Option<ReportFormat>,
}

/// Outcome of a monitored run.
pub struct MonitorRun<T> {
    pub result: T,
    pub report: String,
}

static DEFAULT_MONITOR: OnceLock<Monitor> = OnceLock::new();

/// The process-wide default monitor used by the crate-level functions.
pub fn default_monitor() -> &'static Monitor {
    DEFAULT_MONITOR.get_or_init(Monitor::new)
}

/// Install hooks on the default monitor.
pub fn install(config: Option<Config>) -> InstallResult {
    default_monitor().install(config)
}

/// Uninstall the default monitor's hooks and clear its buffer.
pub fn uninstall() -> UninstallResult {
    default_monitor().uninstall()
}

/// Snapshot of the default monitor's signal buffer.
pub fn get_signals() -> Vec<Signal> {
    default_monitor().signals()
}

/// Package scores over the default monitor's buffer.
pub fn get_scores() -> HashMap<String, PackageScore> {
    default_monitor().scores()
}

/// Render a report over the default monitor's buffer.
pub fn generate_report(format: ReportFormat) -> String {
    default_monitor().generate_report(format)
}

/// Pure pattern analysis over arbitrary signals.
pub fn analyze_patterns(signals: &[Signal], config: &PatternConfig) -> ThreatResult {
    patterns::analyze(signals, config)
}

/// Install the default monitor, run `f`, report, uninstall.
pub fn monitor<T>(f: impl FnOnce() -> T, options: MonitorOptions) -> MonitorRun<T> {
    default_monitor().run(options, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_convenience_installs_and_uninstalls() {
        let monitor = Monitor::new();
        let outcome = monitor.run(
            MonitorOptions {
                config: Some(Config::default()),
                format: Some(ReportFormat::Cli),
            },
            || 41 + 1,
        );
        assert_eq!(outcome.result, 42);
        assert!(outcome.report.contains("bheeshma behavior report"));
        // Uninstalled: the buffer is gone and hooks are quiet.
        assert!(monitor.signals().is_empty());
    }

    #[test]
    fn test_install_is_idempotent() {
        let monitor = Monitor::new();
        let first = monitor.install(Some(Config::default()));
        assert!(first.success);
        assert_eq!(first.installed.len(), 5);

        let second = monitor.install(Some(Config::default()));
        assert!(second.success);
        assert_eq!(second.installed, first.installed);

        monitor.uninstall();
    }

    #[test]
    fn test_disabled_hooks_not_installed() {
        let monitor = Monitor::new();
        let config = Config::from_object(serde_json::json!({
            "hooks": { "net": false, "http": false }
        }))
        .unwrap();
        let result = monitor.install(Some(config));
        assert!(result.success);
        assert_eq!(result.installed.len(), 3);
        assert!(!result.installed.contains(&HookKind::Net));
        assert!(!result.installed.contains(&HookKind::Http));
    }
}
