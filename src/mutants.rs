use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::MutantError;

/// Closed set of mutation operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    ConditionalBoundary,
    Arithmetic,
    Logical,
    Comparison,
    Negation,
    Return,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::ConditionalBoundary,
        Operator::Arithmetic,
        Operator::Logical,
        Operator::Comparison,
        Operator::Negation,
        Operator::Return,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operator::ConditionalBoundary => "ConditionalBoundary",
            Operator::Arithmetic => "Arithmetic",
            Operator::Logical => "Logical",
            Operator::Comparison => "Comparison",
            Operator::Negation => "Negation",
            Operator::Return => "Return",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutantStatus {
    Pending,
    Killed,
    Survived,
    Timeout,
    Error,
}

impl MutantStatus {
    pub fn is_terminal(self) -> bool {
        self != MutantStatus::Pending
    }

    /// Verdict label used on progress lines.
    pub fn label(self) -> &'static str {
        match self {
            MutantStatus::Pending => "PENDING",
            MutantStatus::Killed => "KILLED",
            MutantStatus::Survived => "SURVIVED",
            MutantStatus::Timeout => "TIMEOUT",
            MutantStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for MutantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutantStatus::Pending => "pending",
            MutantStatus::Killed => "killed",
            MutantStatus::Survived => "survived",
            MutantStatus::Timeout => "timeout",
            MutantStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Identifier assigned in manifest order, displayed as `mutant-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutantId(pub u64);

impl fmt::Display for MutantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutant-{}", self.0)
    }
}

impl MutantId {
    /// Accepts `mutant-3`, `@mutant-3` and `3`.
    pub fn parse(text: &str) -> Option<MutantId> {
        let text = text.trim().trim_start_matches('@');
        let digits = text.strip_prefix("mutant-").unwrap_or(text);
        digits.parse().ok().map(MutantId)
    }
}

/// A mutable construct found by a language's tree walk, before it is
/// bound to a file and given an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSite {
    pub line: usize,
    pub column: usize,
    pub operator: Operator,
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutant {
    pub id: MutantId,
    pub file_path: PathBuf,
    pub line_number: usize,
    pub column: usize,
    pub original_text: String,
    pub mutated_text: String,
    pub operator: Operator,
    pub status: MutantStatus,
    pub source_line: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl Mutant {
    pub fn new(id: MutantId, file_path: PathBuf, site: MutationSite, source_line: &str) -> Self {
        Mutant {
            id,
            file_path,
            line_number: site.line,
            column: site.column,
            original_text: site.original,
            mutated_text: site.replacement,
            operator: site.operator,
            status: MutantStatus::Pending,
            source_line: source_line.to_string(),
            duration_ms: 0,
            error_detail: None,
        }
    }

    /// Move from `pending` to a terminal status. Happens exactly once.
    pub fn resolve(&mut self, status: MutantStatus) -> Result<(), MutantError> {
        if !status.is_terminal() {
            return Err(MutantError::PendingIsNotTerminal);
        }
        if self.status.is_terminal() {
            return Err(MutantError::AlreadyResolved {
                id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        self.status = status;
        Ok(())
    }

    /// The target line with the substitution applied, for display.
    pub fn mutated_line(&self) -> String {
        let col = self.column.saturating_sub(1);
        match self.source_line.get(col..) {
            Some(rest) if rest.starts_with(&self.original_text) => format!(
                "{}{}{}",
                &self.source_line[..col],
                self.mutated_text,
                &rest[self.original_text.len()..]
            ),
            _ => self.source_line.replacen(&self.original_text, &self.mutated_text, 1),
        }
    }
}
