// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Per-package trust scoring.
//!
//! Groups buffered signals by `(name, version)` and walks each group once:
//! every signal subtracts its type's risk weight from a starting score of
//! 100, floored at 0. The result is a pure function of the signals and the
//! weight table; permuting the buffer cannot change it.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::config::{Config, Thresholds};
use crate::signal::{Signal, SignalType};

/// Risk tier derived from a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl RiskLevel {
    /// Tier for a score under the given thresholds (each threshold is the
    /// lower bound of the next-better tier).
    pub fn for_score(score: u32, thresholds: &Thresholds) -> Self {
        if score >= thresholds.medium {
            RiskLevel::Low
        } else if score >= thresholds.high {
            RiskLevel::Medium
        } else if score >= thresholds.critical {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

/// Aggregated risk posture of one `(name, version)` package.
#[derive(Debug, Clone)]
pub struct PackageScore {
    pub name: String,
    pub version: String,
    /// Trust score in [0, 100]; higher is safer.
    pub score: u32,
    pub risk_level: RiskLevel,
    pub signal_count: usize,
    /// Signal count per type.
    pub stats: HashMap<SignalType, usize>,
}

impl PackageScore {
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Score every attributed package in the buffer.
///
/// Packages matching a blacklist glob are pinned to [`RiskLevel::Critical`];
/// the score value itself is left untouched so the report still shows it.
pub fn score_packages(signals: &[Signal], config: &Config) -> HashMap<String, PackageScore> {
    let mut groups: HashMap<String, Vec<&Signal>> = HashMap::new();
    for signal in signals {
        groups
            .entry(signal.package().key())
            .or_default()
            .push(signal);
    }

    let blacklist: Vec<glob::Pattern> = compile_globs(&config.blacklist);

    let mut scores = HashMap::with_capacity(groups.len());
    for (key, group) in groups {
        let first = group[0].package();
        let mut score: u32 = 100;
        let mut stats: HashMap<SignalType, usize> = HashMap::new();
        for signal in &group {
            *stats.entry(signal.signal_type()).or_insert(0) += 1;
        }
        for signal in &group {
            let weight = config.weight(signal.signal_type());
            score = score.saturating_sub(weight);
            if score == 0 {
                break;
            }
        }

        let mut risk_level = RiskLevel::for_score(score, &config.thresholds);
        if blacklist.iter().any(|p| p.matches(&first.name)) {
            risk_level = RiskLevel::Critical;
        }

        scores.insert(
            key,
            PackageScore {
                name: first.name.clone(),
                version: first.version.clone(),
                score,
                risk_level,
                signal_count: group.len(),
                stats,
            },
        );
    }
    scores
}

/// Compile glob patterns, skipping invalid ones with a warning.
pub(crate) fn compile_globs(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|raw| match glob::Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                tracing::warn!(pattern = %raw, %err, "ignoring invalid glob pattern");
                None
            }
        })
        .collect()
}
