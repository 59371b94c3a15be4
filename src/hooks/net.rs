// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Low-level connection facade.
//!
//! Wraps the TCP connect entry point with the three calling conventions
//! `(port, host)`, options struct, and IPC path. Emits a `NetConnect`
//! signal (protocol `tcp`) before forwarding to `std::net::TcpStream` or,
//! for IPC paths, `std::os::unix::net::UnixStream`.

use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::MonitorContext;
use crate::hooks::HookKind;
use crate::signal::{Protocol, SignalMetadata};

const DEFAULT_HOST: &str = "localhost";

/// Options-struct calling convention for [`NetApi::connect`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Destination of a TCP connect, normalized from the accepted conventions.
#[derive(Debug, Clone)]
pub enum TcpTarget {
    /// `(port)` with the default host.
    Port(u16),
    /// `(port, host)`.
    HostPort(u16, String),
    /// Options struct; missing fields default to `localhost` / 0.
    Options(ConnectOptions),
}

impl From<u16> for TcpTarget {
    fn from(port: u16) -> Self {
        TcpTarget::Port(port)
    }
}

impl From<(u16, &str)> for TcpTarget {
    fn from((port, host): (u16, &str)) -> Self {
        TcpTarget::HostPort(port, host.to_string())
    }
}

impl From<(u16, String)> for TcpTarget {
    fn from((port, host): (u16, String)) -> Self {
        TcpTarget::HostPort(port, host)
    }
}

impl From<ConnectOptions> for TcpTarget {
    fn from(options: ConnectOptions) -> Self {
        TcpTarget::Options(options)
    }
}

impl TcpTarget {
    fn host_port(&self) -> (String, u16) {
        match self {
            TcpTarget::Port(port) => (DEFAULT_HOST.to_string(), *port),
            TcpTarget::HostPort(port, host) => (host.clone(), *port),
            TcpTarget::Options(options) => (
                options
                    .host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                options.port.unwrap_or(0),
            ),
        }
    }
}

/// Monitored facade over outbound connections.
pub struct NetApi {
    ctx: Arc<MonitorContext>,
}

impl NetApi {
    pub(crate) fn new(ctx: Arc<MonitorContext>) -> Self {
        Self { ctx }
    }

    /// Open a TCP connection, emitting a `NetConnect` signal first.
    pub fn connect(&self, target: impl Into<TcpTarget>) -> io::Result<TcpStream> {
        let target = target.into();
        let (host, port) = target.host_port();
        {
            let host = host.clone();
            self.ctx.emit(HookKind::Net, move || SignalMetadata::NetConnect {
                host,
                port,
                protocol: Protocol::Tcp,
            });
        }
        TcpStream::connect((host.as_str(), port))
    }

    /// Connect to a local IPC socket. Recorded with the path as the host
    /// and port 0, like the `(ipcPath)` convention.
    #[cfg(unix)]
    pub fn connect_ipc(&self, path: impl AsRef<Path>) -> io::Result<std::os::unix::net::UnixStream> {
        let display: PathBuf = path.as_ref().to_path_buf();
        self.ctx.emit(HookKind::Net, move || SignalMetadata::NetConnect {
            host: display.to_string_lossy().into_owned(),
            port: 0,
            protocol: Protocol::Tcp,
        });
        std::os::unix::net::UnixStream::connect(path)
    }
}
