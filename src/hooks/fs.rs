// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Filesystem facade and path normalizer.
//!
//! Read operations (`read`, `read_to_string`, `read_dir`, `read_link`,
//! `open`) emit `FsRead`; write operations (`write`, `append`,
//! `create_dir`, `remove_dir`, `remove_file`, `rename`, `create`) emit
//! `FsWrite`. The signal carries the absolute, lexically normalized form
//! of the first path argument; the call itself always forwards the
//! caller's original arguments to `std::fs` untouched.

use std::fs::{File, Metadata, OpenOptions, ReadDir};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::context::MonitorContext;
use crate::hooks::HookKind;
use crate::signal::SignalMetadata;

/// Path-like input the normalizer accepts. Numeric descriptors are part of
/// the platform surface but carry no path, so they are unresolvable.
#[derive(Debug, Clone)]
pub enum PathInput {
    Text(String),
    /// Raw bytes, decoded as UTF-8.
    Bytes(Vec<u8>),
    /// A `file://` URL.
    Url(String),
    /// A numeric file descriptor.
    Descriptor(u64),
}

impl From<&str> for PathInput {
    fn from(value: &str) -> Self {
        PathInput::Text(value.to_string())
    }
}

impl From<String> for PathInput {
    fn from(value: String) -> Self {
        PathInput::Text(value)
    }
}

impl From<&Path> for PathInput {
    fn from(value: &Path) -> Self {
        PathInput::Text(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for PathInput {
    fn from(value: PathBuf) -> Self {
        PathInput::Text(value.to_string_lossy().into_owned())
    }
}

impl From<Vec<u8>> for PathInput {
    fn from(value: Vec<u8>) -> Self {
        PathInput::Bytes(value)
    }
}

impl From<u64> for PathInput {
    fn from(value: u64) -> Self {
        PathInput::Descriptor(value)
    }
}

/// Resolve an input to its absolute, lexically normalized path, or `None`
/// when the input carries no usable path.
pub fn resolve_path(input: &PathInput) -> Option<PathBuf> {
    match input {
        PathInput::Text(text) => Some(absolutize(Path::new(text))),
        PathInput::Bytes(bytes) => std::str::from_utf8(bytes)
            .ok()
            .map(|text| absolutize(Path::new(text))),
        PathInput::Url(raw) => {
            let parsed = url::Url::parse(raw).ok()?;
            if parsed.scheme() != "file" {
                return None;
            }
            parsed.to_file_path().ok().map(|p| absolutize(&p))
        }
        PathInput::Descriptor(_) => None,
    }
}

/// Absolute form of `path` (joined to the working directory when relative)
/// with `.` and `..` segments resolved lexically, without touching disk.
fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Monitored facade over `std::fs`.
pub struct FsApi {
    ctx: Arc<MonitorContext>,
}

impl FsApi {
    pub(crate) fn new(ctx: Arc<MonitorContext>) -> Self {
        Self { ctx }
    }

    fn record_read(&self, path: &Path, operation: &str) {
        let operation = operation.to_string();
        let input = PathInput::from(path);
        self.ctx.emit(HookKind::Fs, move || SignalMetadata::FsRead {
            path: resolve_path(&input).unwrap_or_default(),
            operation,
        });
    }

    fn record_write(&self, path: &Path, operation: &str) {
        let operation = operation.to_string();
        let input = PathInput::from(path);
        self.ctx.emit(HookKind::Fs, move || SignalMetadata::FsWrite {
            path: resolve_path(&input).unwrap_or_default(),
            operation,
        });
    }

    // ─── reads ──────────────────────────────────────────────────────────

    pub fn read(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        self.record_read(path.as_ref(), "read");
        std::fs::read(path)
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> io::Result<String> {
        self.record_read(path.as_ref(), "read_to_string");
        std::fs::read_to_string(path)
    }

    pub fn read_dir(&self, path: impl AsRef<Path>) -> io::Result<ReadDir> {
        self.record_read(path.as_ref(), "read_dir");
        std::fs::read_dir(path)
    }

    pub fn read_link(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        self.record_read(path.as_ref(), "read_link");
        std::fs::read_link(path)
    }

    /// Open a file for streamed reading.
    pub fn open(&self, path: impl AsRef<Path>) -> io::Result<File> {
        self.record_read(path.as_ref(), "open");
        File::open(path)
    }

    /// Metadata lookup, recorded as a read of the path.
    pub fn metadata(&self, path: impl AsRef<Path>) -> io::Result<Metadata> {
        self.record_read(path.as_ref(), "metadata");
        std::fs::metadata(path)
    }

    // ─── writes ─────────────────────────────────────────────────────────

    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> io::Result<()> {
        self.record_write(path.as_ref(), "write");
        std::fs::write(path, contents)
    }

    /// Append to a file, creating it if absent.
    pub fn append(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> io::Result<()> {
        self.record_write(path.as_ref(), "append");
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(contents.as_ref())
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) -> io::Result<()> {
        self.record_write(path.as_ref(), "create_dir");
        std::fs::create_dir(path)
    }

    pub fn remove_dir(&self, path: impl AsRef<Path>) -> io::Result<()> {
        self.record_write(path.as_ref(), "remove_dir");
        std::fs::remove_dir(path)
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        self.record_write(path.as_ref(), "remove_file");
        std::fs::remove_file(path)
    }

    /// Rename a file; the signal records the source path.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
        self.record_write(from.as_ref(), "rename");
        std::fs::rename(from, to)
    }

    /// Open a file for streamed writing, truncating it.
    pub fn create(&self, path: impl AsRef<Path>) -> io::Result<File> {
        self.record_write(path.as_ref(), "create");
        File::create(path)
    }
}
