// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Child-process facade and command sanitizer.
//!
//! Every operation extracts a single command template (`exec` uses the raw
//! shell command, `spawn` joins program and args, `fork` prefixes the
//! module path with `node`), sanitizes it, and emits a `ShellExec` signal
//! before forwarding to `std::process::Command`.
//!
//! The sanitizer truncates to 200 characters and redacts credential-bearing
//! flags (`--password`, `--token`, `--api-key`, `--secret`) and env-style
//! assignments (`<WORD>_KEY=`, `<WORD>_TOKEN=`, `<WORD>_SECRET=`). Rules
//! live in a table so new redactions are data edits.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::context::MonitorContext;
use crate::hooks::HookKind;
use crate::signal::SignalMetadata;

/// Maximum length of a sanitized command template.
const MAX_TEMPLATE_CHARS: usize = 200;
const TRUNCATION_MARKER: &str = "…[TRUNCATED]";

/// One credential-redaction rule applied to command templates.
pub struct RedactionRule {
    pub pattern: Regex,
    pub replacement: &'static str,
}

fn redaction_rules() -> &'static [RedactionRule] {
    static RULES: OnceLock<Vec<RedactionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            // --password=X / --password X (and token, api-key, secret)
            RedactionRule {
                pattern: Regex::new(r"(--(?:password|token|api-key|secret))(=|\s+)\S+")
                    .expect("static regex"),
                replacement: "${1}${2}***",
            },
            // FOO_KEY=X / FOO_TOKEN=X / FOO_SECRET=X
            RedactionRule {
                pattern: Regex::new(r"([A-Za-z0-9_]+)_(KEY|TOKEN|SECRET)=\S+")
                    .expect("static regex"),
                replacement: "${1}_${2}=***",
            },
        ]
    })
}

/// Truncate then redact a raw command into a loggable template.
pub fn sanitize_command(raw: &str) -> String {
    let mut template: String = if raw.chars().count() > MAX_TEMPLATE_CHARS {
        let mut truncated: String = raw.chars().take(MAX_TEMPLATE_CHARS).collect();
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    } else {
        raw.to_string()
    };

    for rule in redaction_rules() {
        template = rule
            .pattern
            .replace_all(&template, rule.replacement)
            .into_owned();
    }
    template
}

/// How a child process was requested; determines the command template.
#[derive(Debug, Clone)]
pub enum CommandSpec {
    /// A shell command line.
    Shell(String),
    /// A program with an argument vector.
    Program { program: String, args: Vec<String> },
    /// A script module run under `node`.
    Module(PathBuf),
}

impl CommandSpec {
    /// Raw, unsanitized command template.
    pub(crate) fn template(&self) -> String {
        match self {
            CommandSpec::Shell(command) => command.clone(),
            CommandSpec::Program { program, args } => {
                if args.is_empty() {
                    program.clone()
                } else {
                    format!("{} {}", program, args.join(" "))
                }
            }
            CommandSpec::Module(module) => format!("node {}", module.display()),
        }
    }
}

/// Monitored facade over child process creation.
pub struct ChildProcessApi {
    ctx: Arc<MonitorContext>,
}

impl ChildProcessApi {
    pub(crate) fn new(ctx: Arc<MonitorContext>) -> Self {
        Self { ctx }
    }

    fn record(&self, operation: &str, spec: &CommandSpec) {
        let operation = operation.to_string();
        let raw = spec.template();
        self.ctx
            .emit(HookKind::ChildProcess, move || SignalMetadata::ShellExec {
                command: sanitize_command(&raw),
                operation,
            });
    }

    /// Run a command line through the shell, streaming.
    pub fn exec(&self, command: &str) -> io::Result<Child> {
        self.record("exec", &CommandSpec::Shell(command.to_string()));
        Command::new("sh").arg("-c").arg(command).spawn()
    }

    /// Run a command line through the shell and collect its output.
    pub fn exec_sync(&self, command: &str) -> io::Result<Output> {
        self.record("exec_sync", &CommandSpec::Shell(command.to_string()));
        Command::new("sh").arg("-c").arg(command).output()
    }

    /// Spawn a program directly (no shell), streaming.
    pub fn spawn(&self, program: &str, args: &[&str]) -> io::Result<Child> {
        self.record(
            "spawn",
            &CommandSpec::Program {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        );
        Command::new(program).args(args).spawn()
    }

    /// Spawn a program directly and collect its output.
    pub fn spawn_sync(&self, program: &str, args: &[&str]) -> io::Result<Output> {
        self.record(
            "spawn_sync",
            &CommandSpec::Program {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        );
        Command::new(program).args(args).output()
    }

    /// Run a script module in a new `node` process.
    pub fn fork(&self, module: impl AsRef<Path>) -> io::Result<Child> {
        let module = module.as_ref();
        self.record("fork", &CommandSpec::Module(module.to_path_buf()));
        Command::new("node").arg(module).spawn()
    }
}
