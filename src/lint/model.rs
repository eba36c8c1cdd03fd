// SPDX-License-Identifier: MIT
//! Data model for lint findings.
//!
//! Findings from heterogeneous analyzers are normalized into one
//! [`Finding`] shape with a three-level [`Severity`]. Reports are partial by
//! design: an analyzer that fails for one file contributes nothing for that
//! file and never aborts the rest.

use serde::{Deserialize, Serialize};

use crate::lint::language::Language;

// ─── Severity ─────────────────────────────────────────────────────────────────

/// Normalized finding severity, aligned across all analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Normalize a numeric-severity linter signal (ESLint convention):
    /// 2 → error, 1 → warning, anything else → info.
    pub fn from_numeric(raw: u64) -> Self {
        match raw {
            2 => Severity::Error,
            1 => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Normalize a categorical linter signal (pylint convention):
    /// "error"/"fatal" → error, "warning" → warning, anything else → info.
    pub fn from_category(raw: &str) -> Self {
        match raw {
            "error" | "fatal" => Severity::Error,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Finding ──────────────────────────────────────────────────────────────────

/// A single static-analysis observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Repository-relative file path.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
    /// Human-readable diagnostic message.
    pub message: String,
    /// Normalized severity.
    pub severity: Severity,
    /// Tool that produced the finding (e.g. `"pylint"`, `"rules"`).
    pub source: String,
}

// ─── Report ───────────────────────────────────────────────────────────────────

/// All findings for one language bucket, in discovery order. No deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintReport {
    pub language: Language,
    pub findings: Vec<Finding>,
}

impl LintReport {
    pub fn empty(language: Language) -> Self {
        Self {
            language,
            findings: Vec::new(),
        }
    }
}
