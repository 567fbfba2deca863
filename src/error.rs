//! Error types for each layer of a mutation run.
//!
//! Per-file and per-mutant failures are recorded on the result and never
//! abort a run. Only [`RunError`] is fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce mutants for one file. The file contributes zero mutants.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file type: {0}")]
    UnsupportedLanguage(PathBuf),
    #[error("failed to load grammar: {0}")]
    Grammar(String),
    #[error("parser produced no syntax tree")]
    Parse,
    #[error("syntax error near line {0}")]
    Syntax(usize),
    #[error("{0} looks like a test file; only production sources are mutated")]
    TestFile(PathBuf),
}

/// The recorded substitution no longer matches the file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubstitutionError {
    #[error("line {line} is out of range (file has {line_count} lines)")]
    LineOutOfRange { line: usize, line_count: usize },
    #[error("`{text}` not found on line {line}")]
    TextNotFound { line: usize, text: String },
}

/// Harness-level failure while running the test command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait on test process: {0}")]
    Wait(#[source] std::io::Error),
    #[error("failed to capture test output: {0}")]
    Output(#[source] std::io::Error),
}

/// Violation of the pending → terminal status transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutantError {
    #[error("{id} already resolved as {status}")]
    AlreadyResolved { id: String, status: String },
    #[error("pending is not a terminal status")]
    PendingIsNotTerminal,
}

/// Fatal, environment-level failures that abort the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no target files given")]
    EmptyFileList,
    #[error("test command not found or not executable: `{0}`")]
    TestCommandNotFound(String),
    #[error("tests fail before mutation; fix failing tests first\n{0}")]
    BaselineFailed(String),
    #[error("baseline test run exceeded the {0}s timeout")]
    BaselineTimeout(u64),
    #[error("baseline test run failed: {0}")]
    Baseline(#[from] ExecError),
    #[error("failed to prepare isolated workspace: {0}")]
    Workspace(String),
    #[error("this coordinator has already run")]
    AlreadyStarted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Report persistence errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read report {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed report: {0}")]
    Json(#[from] serde_json::Error),
}
