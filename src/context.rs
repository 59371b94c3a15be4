// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Shared monitor state handed to every facade.
//!
//! One [`MonitorContext`] owns the signal buffer, the attribution engine,
//! the effective configuration and the install state. Facades hold an
//! `Arc` to it and call [`MonitorContext::emit`] on every intercepted
//! operation; emission is infallible by construction, so a failing monitor
//! can only ever mean a missing signal, never a broken host call.
//!
//! The buffer is single-writer/append-only between install and uninstall;
//! readers take snapshot copies. Locks recover from poisoning instead of
//! panicking so monitored code can never crash the monitor.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::attribution::AttributionEngine;
use crate::config::Config;
use crate::hooks::HookKind;
use crate::signal::{Signal, SignalMetadata};
use crate::stack::{AmbientStackProvider, CallStack, StackProvider};

/// Lightweight emission counters, snapshot via [`MonitorContext::perf`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfStats {
    /// Signals appended to the buffer.
    pub emitted: u64,
    /// Signals dropped because the buffer hit `performance.maxSignals`.
    pub dropped: u64,
    /// Intercepted calls with no attributable package.
    pub unattributed: u64,
    /// Signals suppressed by a whitelist match.
    pub suppressed: u64,
}

pub(crate) struct MonitorContext {
    buffer: Mutex<Vec<Signal>>,
    attribution: AttributionEngine,
    config: Mutex<Config>,
    whitelist: Mutex<Vec<glob::Pattern>>,
    installed: Mutex<HashSet<HookKind>>,
    provider: Mutex<Arc<dyn StackProvider>>,
    http_client: OnceLock<Option<reqwest::blocking::Client>>,
    perf: Mutex<PerfStats>,
}

fn recover<'a, T>(result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>) -> MutexGuard<'a, T> {
    // A poisoned lock means a panic elsewhere; the data is still usable and
    // the monitor must keep absorbing rather than propagate.
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MonitorContext {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            attribution: AttributionEngine::new(),
            config: Mutex::new(Config::default()),
            whitelist: Mutex::new(Vec::new()),
            installed: Mutex::new(HashSet::new()),
            provider: Mutex::new(Arc::new(AmbientStackProvider)),
            http_client: OnceLock::new(),
            perf: Mutex::new(PerfStats::default()),
        }
    }

    // ─── install state ──────────────────────────────────────────────────

    pub(crate) fn is_installed(&self, hook: HookKind) -> bool {
        recover(self.installed.lock()).contains(&hook)
    }

    pub(crate) fn any_installed(&self) -> bool {
        !recover(self.installed.lock()).is_empty()
    }

    pub(crate) fn installed_hooks(&self) -> Vec<HookKind> {
        let mut hooks: Vec<HookKind> = recover(self.installed.lock()).iter().copied().collect();
        hooks.sort();
        hooks
    }

    pub(crate) fn mark_installed(&self, hook: HookKind) {
        recover(self.installed.lock()).insert(hook);
    }

    pub(crate) fn clear_installed(&self) {
        recover(self.installed.lock()).clear();
    }

    // ─── configuration ──────────────────────────────────────────────────

    pub(crate) fn config(&self) -> Config {
        recover(self.config.lock()).clone()
    }

    pub(crate) fn set_config(&self, config: Config) {
        *recover(self.whitelist.lock()) = crate::score::compile_globs(&config.whitelist);
        *recover(self.config.lock()) = config;
    }

    // ─── stack capture ──────────────────────────────────────────────────

    pub(crate) fn set_provider(&self, provider: Arc<dyn StackProvider>) {
        *recover(self.provider.lock()) = provider;
    }

    pub(crate) fn capture_stack(&self) -> CallStack {
        recover(self.provider.lock()).capture()
    }

    // ─── signal buffer ──────────────────────────────────────────────────

    /// Intercept-time emission: attribute, filter, append.
    ///
    /// `build` runs only when the hook is installed and the call is
    /// attributable, so uninstalled facades pay nothing beyond the check.
    pub(crate) fn emit<F>(&self, hook: HookKind, build: F)
    where
        F: FnOnce() -> SignalMetadata,
    {
        if !self.is_installed(hook) {
            return;
        }
        let stack = self.capture_stack();
        let Some(package) = self.attribution.attribute(&stack) else {
            self.bump(|p| p.unattributed += 1);
            return;
        };

        if recover(self.whitelist.lock())
            .iter()
            .any(|pattern| pattern.matches(&package.name))
        {
            self.bump(|p| p.suppressed += 1);
            return;
        }

        let max_signals = recover(self.config.lock()).performance.max_signals;
        let metadata = build();
        let mut buffer = recover(self.buffer.lock());
        if buffer.len() >= max_signals {
            drop(buffer);
            self.bump(|p| p.dropped += 1);
            return;
        }
        buffer.push(Signal::new(package, metadata, stack));
        drop(buffer);
        self.bump(|p| p.emitted += 1);
    }

    pub(crate) fn snapshot(&self) -> Vec<Signal> {
        recover(self.buffer.lock()).clone()
    }

    pub(crate) fn clear_buffer(&self) {
        recover(self.buffer.lock()).clear();
    }

    // ─── shared platform handles ────────────────────────────────────────

    /// Lazily built blocking HTTP client used by the HTTP facade.
    /// Built eagerly at install so a TLS failure surfaces in `failed[]`.
    pub(crate) fn http_client(&self) -> Option<reqwest::blocking::Client> {
        self.http_client
            .get_or_init(|| match reqwest::blocking::Client::builder().build() {
                Ok(client) => Some(client),
                Err(err) => {
                    tracing::warn!(%err, "failed to build HTTP client");
                    None
                }
            })
            .clone()
    }

    // ─── bookkeeping ────────────────────────────────────────────────────

    pub(crate) fn perf(&self) -> PerfStats {
        *recover(self.perf.lock())
    }

    fn bump<F: FnOnce(&mut PerfStats)>(&self, update: F) {
        if !recover(self.config.lock()).performance.track {
            return;
        }
        update(&mut recover(self.perf.lock()));
    }
}
