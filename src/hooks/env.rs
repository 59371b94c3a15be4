// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Environment facade.
//!
//! Delegates every operation to `std::env` so reads, writes and presence
//! checks are bit-identical to the unwrapped container. Each operation
//! emits an `EnvAccess` signal carrying the variable name only; the value
//! never enters the monitor.

use std::env::VarError;
use std::ffi::{OsStr, OsString};
use std::sync::Arc;

use crate::context::MonitorContext;
use crate::hooks::HookKind;
use crate::signal::SignalMetadata;

/// Name recorded when the whole environment is enumerated rather than a
/// single variable read.
const ENUMERATION_VARIABLE: &str = "*";

/// Value-transparent view over the process environment.
pub struct EnvView {
    ctx: Arc<MonitorContext>,
}

impl EnvView {
    pub(crate) fn new(ctx: Arc<MonitorContext>) -> Self {
        Self { ctx }
    }

    fn touch(&self, variable: &str) {
        self.ctx.emit(HookKind::Env, || SignalMetadata::EnvAccess {
            variable: variable.to_string(),
        });
    }

    /// Read a variable as UTF-8, exactly like `std::env::var`.
    pub fn var(&self, key: &str) -> Result<String, VarError> {
        self.touch(key);
        std::env::var(key)
    }

    /// Read a variable as an `OsString`, exactly like `std::env::var_os`.
    pub fn var_os(&self, key: &str) -> Option<OsString> {
        self.touch(key);
        std::env::var_os(key)
    }

    /// Set a variable, exactly like `std::env::set_var`.
    pub fn set_var(&self, key: &str, value: impl AsRef<OsStr>) {
        self.touch(key);
        std::env::set_var(key, value);
    }

    /// Remove a variable, exactly like `std::env::remove_var`.
    pub fn remove_var(&self, key: &str) {
        self.touch(key);
        std::env::remove_var(key);
    }

    /// Membership test.
    pub fn contains(&self, key: &str) -> bool {
        self.touch(key);
        std::env::var_os(key).is_some()
    }

    /// Iterate all variables, exactly like `std::env::vars`.
    pub fn vars(&self) -> std::env::Vars {
        self.touch(ENUMERATION_VARIABLE);
        std::env::vars()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::signal::{SignalMetadata, SignalType};
    use crate::stack::enter_module;
    use crate::Monitor;
    use std::fs;

    /// Build a monitor plus a tempdir with one attributable package.
    fn monitored() -> (Monitor, tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("node_modules/env-reader");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(
            pkg_dir.join("package.json"),
            r#"{"version":"1.0.0"}"#,
        )
        .unwrap();
        let monitor = Monitor::new();
        monitor.install(Some(Config::default()));
        let module = pkg_dir.join("index.js");
        (monitor, dir, module)
    }

    #[test]
    fn test_reads_are_value_transparent() {
        let (monitor, _dir, module) = monitored();
        let _guard = enter_module(&module);
        std::env::set_var("BHEESHMA_TEST_TRANSPARENT", "sekrit-value");

        let view = monitor.env();
        assert_eq!(
            view.var("BHEESHMA_TEST_TRANSPARENT").unwrap(),
            "sekrit-value"
        );
        assert!(view.contains("BHEESHMA_TEST_TRANSPARENT"));
        assert!(view.var("BHEESHMA_TEST_MISSING_XYZ").is_err());

        // Signal carries the name, never the value.
        let signals = monitor.signals();
        assert!(signals
            .iter()
            .all(|s| s.signal_type() == SignalType::EnvAccess));
        let rendered = format!("{:?}", signals);
        assert!(rendered.contains("BHEESHMA_TEST_TRANSPARENT"));
        assert!(!rendered.contains("sekrit-value"));

        std::env::remove_var("BHEESHMA_TEST_TRANSPARENT");
    }

    #[test]
    fn test_writes_delegate_to_real_environment() {
        let (monitor, _dir, module) = monitored();
        let _guard = enter_module(&module);

        let view = monitor.env();
        view.set_var("BHEESHMA_TEST_WRITE", "42");
        assert_eq!(std::env::var("BHEESHMA_TEST_WRITE").unwrap(), "42");
        view.remove_var("BHEESHMA_TEST_WRITE");
        assert!(std::env::var_os("BHEESHMA_TEST_WRITE").is_none());
    }

    #[test]
    fn test_first_party_access_emits_nothing() {
        let (monitor, _dir, _module) = monitored();
        // No module guard: the ambient stack is empty, so this is
        // first-party code and must not be recorded.
        let _ = monitor.env().var_os("HOME");
        assert!(monitor.signals().is_empty());
    }

    #[test]
    fn test_variable_name_recorded() {
        let (monitor, _dir, module) = monitored();
        let _guard = enter_module(&module);
        let _ = monitor.env().var_os("PATH");

        let signals = monitor.signals();
        assert_eq!(signals.len(), 1);
        match signals[0].metadata() {
            SignalMetadata::EnvAccess { variable } => assert_eq!(variable, "PATH"),
            other => panic!("unexpected metadata: {other:?}"),
        }
        assert_eq!(signals[0].package().name, "env-reader");
    }
}
