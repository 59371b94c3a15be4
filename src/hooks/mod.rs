// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Interception layer: installable facades over platform APIs.
//!
//! Each hook is a facade the host calls instead of the platform API:
//!
//! - **env**: [`EnvView`] over `std::env`
//! - **fs**: [`FsApi`] over `std::fs`
//! - **net**: [`NetApi`] over `std::net` (and Unix sockets)
//! - **http**: [`HttpApi`] over a blocking `reqwest` client
//! - **childProcess**: [`ChildProcessApi`] over `std::process::Command`
//!
//! Facades delegate unconditionally; signal emission happens only while
//! the corresponding hook is installed, and any monitor-internal failure
//! is absorbed. Install is idempotent and per-hook failures are isolated:
//! one hook failing to come up never blocks the others.

pub mod env;
pub mod fs;
pub mod http;
pub mod net;
pub mod process;

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::context::MonitorContext;

pub use env::EnvView;
pub use fs::{FsApi, PathInput};
pub use http::{HttpApi, RequestOptions, RequestTarget};
pub use net::{ConnectOptions, NetApi, TcpTarget};
pub use process::{ChildProcessApi, CommandSpec};

/// The fixed set of installable hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    Env,
    Fs,
    Net,
    Http,
    ChildProcess,
}

/// Every hook, in install order.
pub const ALL_HOOKS: &[HookKind] = &[
    HookKind::Env,
    HookKind::Fs,
    HookKind::Net,
    HookKind::Http,
    HookKind::ChildProcess,
];

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Env => write!(f, "env"),
            HookKind::Fs => write!(f, "fs"),
            HookKind::Net => write!(f, "net"),
            HookKind::Http => write!(f, "http"),
            HookKind::ChildProcess => write!(f, "childProcess"),
        }
    }
}

/// A hook that could not be brought up or torn down.
#[derive(Debug, Clone)]
pub struct HookFailure {
    pub hook: HookKind,
    pub error: String,
}

/// Outcome of [`crate::Monitor::install`].
#[derive(Debug, Clone)]
pub struct InstallResult {
    pub success: bool,
    pub installed: Vec<HookKind>,
    pub failed: Vec<HookFailure>,
}

/// Outcome of [`crate::Monitor::uninstall`].
#[derive(Debug, Clone)]
pub struct UninstallResult {
    pub success: bool,
    pub uninstalled: Vec<HookKind>,
    pub failed: Vec<HookFailure>,
}

/// Install the hooks enabled by `config`.
///
/// A second install without an intervening uninstall is a no-op that
/// reports the already-installed set as success.
pub(crate) fn install(ctx: &Arc<MonitorContext>, config: Config) -> InstallResult {
    if ctx.any_installed() {
        return InstallResult {
            success: true,
            installed: ctx.installed_hooks(),
            failed: Vec::new(),
        };
    }

    ctx.set_config(config.clone());

    let mut installed = Vec::new();
    let mut failed = Vec::new();
    for &hook in ALL_HOOKS {
        if !config.hook_enabled(hook) {
            continue;
        }
        match prepare(ctx, hook) {
            Ok(()) => {
                ctx.mark_installed(hook);
                installed.push(hook);
            }
            Err(error) => {
                tracing::warn!(hook = %hook, %error, "hook install failed");
                failed.push(HookFailure { hook, error });
            }
        }
    }

    InstallResult {
        success: failed.is_empty(),
        installed,
        failed,
    }
}

/// Per-hook setup. Most hooks have nothing that can fail; the HTTP hook
/// eagerly builds its client so a TLS failure is reported here instead of
/// on the first monitored request.
fn prepare(ctx: &Arc<MonitorContext>, hook: HookKind) -> Result<(), String> {
    match hook {
        HookKind::Http => match ctx.http_client() {
            Some(_) => Ok(()),
            None => Err("failed to build HTTP client".to_string()),
        },
        _ => Ok(()),
    }
}

/// Disable all hooks and clear the signal buffer.
pub(crate) fn uninstall(ctx: &Arc<MonitorContext>) -> UninstallResult {
    let uninstalled = ctx.installed_hooks();
    ctx.clear_installed();
    ctx.clear_buffer();
    UninstallResult {
        success: true,
        uninstalled,
        failed: Vec::new(),
    }
}
