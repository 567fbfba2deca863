use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::Cancellation;
use crate::error::{ExecError, SubstitutionError};
use crate::mutants::{Mutant, MutantStatus};
use crate::safety::{self, RestoreGuard};

/// Bytes of test output kept for diagnostics.
const OUTPUT_TAIL_BYTES: usize = 4096;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited {
        code: Option<i32>,
        success: bool,
        output: String,
    },
    TimedOut,
    Cancelled,
}

impl ProcessOutcome {
    /// The shell could not find or execute the command.
    pub fn is_command_missing(&self) -> bool {
        match self {
            ProcessOutcome::Exited { code: Some(code), .. } => {
                *code == 126 || *code == 127 || (cfg!(windows) && *code == 9009)
            }
            _ => false,
        }
    }
}

/// Runs the project's test suite once.
pub trait TestRunner: Send + Sync {
    fn run(
        &self,
        working_dir: &Path,
        timeout: Duration,
        cancel: &Cancellation,
    ) -> Result<ProcessOutcome, ExecError>;

    fn describe(&self) -> String;
}

/// Runs a shell command string (`sh -c`, `cmd /C` on Windows).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    command: String,
}

impl ShellRunner {
    pub fn new(command: impl Into<String>) -> Self {
        ShellRunner { command: command.into() }
    }

    fn build_command(&self, working_dir: &Path) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        };
        #[cfg(not(windows))]
        let mut cmd = {
            use std::os::unix::process::CommandExt;
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            // Own process group: the whole test tree can be killed on
            // timeout, and a terminal Ctrl-C reaches only us.
            c.process_group(0);
            c
        };
        cmd.current_dir(working_dir).stdin(Stdio::null());
        cmd
    }
}

impl TestRunner for ShellRunner {
    fn run(
        &self,
        working_dir: &Path,
        timeout: Duration,
        cancel: &Cancellation,
    ) -> Result<ProcessOutcome, ExecError> {
        // Output goes to a temp file rather than a pipe, so a chatty test
        // suite can never block on a full pipe buffer.
        let mut log = tempfile::tempfile().map_err(ExecError::Output)?;
        let stdout = log.try_clone().map_err(ExecError::Output)?;
        let stderr = log.try_clone().map_err(ExecError::Output)?;

        let mut child = self
            .build_command(working_dir)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > timeout {
                        kill_tree(&mut child);
                        return Ok(ProcessOutcome::TimedOut);
                    }
                    if cancel.is_cancelled() {
                        kill_tree(&mut child);
                        return Ok(ProcessOutcome::Cancelled);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    kill_tree(&mut child);
                    return Err(ExecError::Wait(e));
                }
            }
        };

        Ok(exited(status, read_tail(&mut log)))
    }

    fn describe(&self) -> String {
        self.command.clone()
    }
}

fn exited(status: ExitStatus, output: String) -> ProcessOutcome {
    ProcessOutcome::Exited {
        code: status.code(),
        success: status.success(),
        output,
    }
}

fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .arg("-KILL")
            .arg(format!("-{}", child.id()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn read_tail(log: &mut File) -> String {
    let mut buf = Vec::new();
    if log.seek(SeekFrom::Start(0)).is_err() || log.read_to_end(&mut buf).is_err() {
        return String::new();
    }
    let start = buf.len().saturating_sub(OUTPUT_TAIL_BYTES);
    String::from_utf8_lossy(&buf[start..]).into_owned()
}

/// Where one mutant is applied: the file to write, the directory the test
/// command runs in, and the content the file must hold before and after.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub path: &'a Path,
    pub working_dir: &'a Path,
    pub original: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: MutantStatus,
    /// Set when the original content could not be written back.
    pub restore_failure: Option<String>,
}

struct Attempt {
    status: MutantStatus,
    detail: Option<String>,
    restore_failure: Option<String>,
}

impl Attempt {
    fn error(detail: impl Into<String>) -> Self {
        Attempt {
            status: MutantStatus::Error,
            detail: Some(detail.into()),
            restore_failure: None,
        }
    }
}

/// Applies one mutant at a time. Never retries.
pub struct Executor {
    runner: Arc<dyn TestRunner>,
    timeout: Duration,
    cancel: Cancellation,
}

impl Executor {
    pub fn new(runner: Arc<dyn TestRunner>, timeout: Duration, cancel: Cancellation) -> Self {
        Executor { runner, timeout, cancel }
    }

    pub fn runner(&self) -> &dyn TestRunner {
        self.runner.as_ref()
    }

    pub fn execute(&self, mutant: &mut Mutant, target: &Target) -> Verdict {
        if mutant.status.is_terminal() {
            tracing::warn!(id = %mutant.id, status = %mutant.status, "mutant already resolved, not re-run");
            return Verdict { status: mutant.status, restore_failure: None };
        }

        let start = Instant::now();
        let attempt = self.attempt(mutant, target);
        mutant.duration_ms = start.elapsed().as_millis() as u64;
        mutant.error_detail = attempt.detail;
        if let Err(e) = mutant.resolve(attempt.status) {
            tracing::error!(id = %mutant.id, error = %e, "invalid status transition");
        }

        if mutant.status == MutantStatus::Error {
            tracing::warn!(
                id = %mutant.id,
                file = %mutant.file_path.display(),
                line = mutant.line_number,
                detail = mutant.error_detail.as_deref().unwrap_or_default(),
                "mutant errored"
            );
        } else {
            tracing::debug!(id = %mutant.id, status = %mutant.status, ms = mutant.duration_ms, "mutant finished");
        }

        Verdict {
            status: mutant.status,
            restore_failure: attempt.restore_failure,
        }
    }

    fn attempt(&self, mutant: &Mutant, target: &Target) -> Attempt {
        let current = match fs::read_to_string(target.path) {
            Ok(c) => c,
            Err(e) => return Attempt::error(format!("cannot read {}: {e}", target.path.display())),
        };
        if current != target.original {
            return Attempt::error("file content drifted from the generated baseline");
        }
        let mutated = match apply_mutation(&current, mutant) {
            Ok(m) => m,
            Err(e) => return Attempt::error(format!("stale mutant: {e}")),
        };

        let guard = match RestoreGuard::acquire(target.path, &current) {
            Ok(g) => g,
            Err(e) => return Attempt::error(format!("cannot write backup: {e}")),
        };

        let outcome = match fs::write(guard.path(), &mutated) {
            Ok(()) => {
                safety::invalidate_bytecode(target.path);
                self.runner
                    .run(target.working_dir, self.timeout, &self.cancel)
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(format!("cannot write mutant: {e}")),
        };

        let restored = guard.restore();

        if let Ok(ProcessOutcome::Exited { code, output, .. }) = &outcome {
            tracing::debug!(id = %mutant.id, ?code, tail = %output.trim_end(), "test command exited");
        }

        let mut attempt = classify(outcome);
        if let Err(e) = restored {
            let msg = format!("failed to restore {}: {e}", target.path.display());
            tracing::error!(id = %mutant.id, "{msg}");
            attempt.status = MutantStatus::Error;
            attempt.detail = Some(msg.clone());
            attempt.restore_failure = Some(msg);
        }
        attempt
    }
}

fn classify(outcome: Result<ProcessOutcome, String>) -> Attempt {
    let ok = |status: MutantStatus| Attempt { status, detail: None, restore_failure: None };
    match outcome {
        Ok(ref o) if o.is_command_missing() => {
            let output = match o {
                ProcessOutcome::Exited { output, .. } => output.trim(),
                _ => "",
            };
            Attempt::error(format!("test command not found or not executable\n{output}"))
        }
        Ok(ProcessOutcome::Exited { success: true, .. }) => ok(MutantStatus::Survived),
        Ok(ProcessOutcome::Exited { .. }) => ok(MutantStatus::Killed),
        Ok(ProcessOutcome::TimedOut) => ok(MutantStatus::Timeout),
        Ok(ProcessOutcome::Cancelled) => Attempt::error("cancelled"),
        Err(msg) => Attempt::error(msg),
    }
}

/// Swap `original_text` for `mutated_text` on the mutant's line only:
/// at the recorded column when it still matches, otherwise at the first
/// occurrence on that line. Every other byte is left untouched.
pub fn apply_mutation(content: &str, mutant: &Mutant) -> Result<String, SubstitutionError> {
    let line_count = content.split_inclusive('\n').count();
    let (line_start, line) = content
        .split_inclusive('\n')
        .scan(0usize, |offset, line| {
            let start = *offset;
            *offset += line.len();
            Some((start, line))
        })
        .nth(mutant.line_number.wrapping_sub(1))
        .ok_or(SubstitutionError::LineOutOfRange {
            line: mutant.line_number,
            line_count,
        })?;

    let body = line.trim_end_matches(['\n', '\r']);
    let original = mutant.original_text.as_str();
    let col = mutant.column.saturating_sub(1);
    let pos = match body.get(col..) {
        Some(rest) if !original.is_empty() && rest.starts_with(original) => col,
        _ => body
            .find(original)
            .filter(|_| !original.is_empty())
            .ok_or_else(|| SubstitutionError::TextNotFound {
                line: mutant.line_number,
                text: original.to_string(),
            })?,
    };

    let at = line_start + pos;
    let mut result = String::with_capacity(content.len() + mutant.mutated_text.len());
    result.push_str(&content[..at]);
    result.push_str(&mutant.mutated_text);
    result.push_str(&content[at + original.len()..]);
    Ok(result)
}
