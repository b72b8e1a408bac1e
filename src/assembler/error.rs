// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Diagnostics collected during assembly and spec-load errors.

use std::fmt;

use thiserror::Error;

/// Severity of a collected diagnostic. Errors additionally abort line
/// processing; warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One diagnostic, tied to the source line that produced it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub line: u32,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            line,
            severity,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render as `file(line): message`, the report format the CLI emits.
    pub fn format_with_file(&self, file: &str) -> String {
        format!("{file}({}): {}", self.line, self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

/// Failure to load or compile an architecture description. These are
/// configuration errors: the CLI reports them and exits 1.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("architecture description is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rule '{rule}': no variable definition for '~{var}'")]
    UnknownVar { rule: String, var: String },
    #[error("rule '{rule}': bad pattern: {source}")]
    BadRegex {
        rule: String,
        #[source]
        source: Box<regex::Error>,
    },
    #[error("rule '{rule}': '{literal}' is not a binary literal")]
    BadLiteral { rule: String, literal: String },
    #[error("rule '{rule}': variable index {index} out of range")]
    VarIndex { rule: String, index: usize },
}
