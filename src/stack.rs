// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Call stack capture for attribution.
//!
//! The attribution engine works on an explicit [`CallStack`] of source file
//! paths rather than a language-runtime stack. By default frames come from an
//! ambient per-thread module stack that the host's module loader maintains
//! through [`ModuleGuard`] RAII scopes: push the module's file path when
//! third-party code starts executing, pop when it returns. Embedders with
//! real stack introspection can replace the default via [`StackProvider`].

use std::cell::RefCell;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// One captured frame: the source file the executing code was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file: PathBuf,
}

impl StackFrame {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }
}

/// An ordered list of frames, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<StackFrame>,
}

impl CallStack {
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Build a stack from file paths, innermost first.
    pub fn from_files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            frames: files.into_iter().map(StackFrame::new).collect(),
        }
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Source of the current call stack at interception time.
///
/// Implementations must never block and never fail; an empty stack means
/// "first-party" and suppresses the signal.
pub trait StackProvider: Send + Sync {
    fn capture(&self) -> CallStack;
}

thread_local! {
    static MODULE_STACK: RefCell<Vec<PathBuf>> = const { RefCell::new(Vec::new()) };
}

/// Default provider: snapshots the ambient module stack of the current thread.
#[derive(Debug, Default)]
pub struct AmbientStackProvider;

impl StackProvider for AmbientStackProvider {
    fn capture(&self) -> CallStack {
        MODULE_STACK.with(|stack| {
            // Innermost module first, matching how attribution walks frames.
            CallStack::from_files(stack.borrow().iter().rev().cloned())
        })
    }
}

/// RAII scope marking "code from this module file is now executing".
///
/// Dropping the guard pops the frame. Guards are thread-local and must be
/// dropped in LIFO order, which falls out of normal scoping.
#[must_use = "the module frame is popped when the guard drops"]
pub struct ModuleGuard {
    _not_send: PhantomData<*const ()>,
}

/// Push a module file onto the current thread's ambient stack.
pub fn enter_module(file: impl AsRef<Path>) -> ModuleGuard {
    MODULE_STACK.with(|stack| stack.borrow_mut().push(file.as_ref().to_path_buf()));
    ModuleGuard {
        _not_send: PhantomData,
    }
}

impl Drop for ModuleGuard {
    fn drop(&mut self) {
        MODULE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
