//! Sequences a run: generation, baseline, execution and scoring.
//!
//! Mutants of one file form a single work unit and run serially in
//! manifest order. Work units are pulled from a shared queue by up to
//! `workers` threads, so different files are tested in parallel.

use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::cancel::Cancellation;
use crate::config::{Config, WorkspaceMode};
use crate::copy_tree::IsolatedTree;
use crate::error::RunError;
use crate::executor::{Executor, ProcessOutcome, ShellRunner, Target, TestRunner, Verdict};
use crate::generator::{IdAllocator, SourceUnit};
use crate::mutants::{Mutant, MutantId, MutantStatus, Operator};
use crate::safety;
use crate::scorer::{self, GenerationIssue, RunResult};

/// One completed mutant, streamed to the caller as it finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub id: MutantId,
    pub operator: Operator,
    pub status: MutantStatus,
    pub file: PathBuf,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Running,
    Completed,
}

/// One file's original text and its mutants in generation order.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub path: PathBuf,
    pub original: String,
    pub mutants: Vec<Mutant>,
}

/// Everything generated for a run, before any execution.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub files: Vec<ManifestFile>,
    pub issues: Vec<GenerationIssue>,
    pub warnings: Vec<String>,
}

impl Manifest {
    pub fn mutants(&self) -> impl Iterator<Item = &Mutant> {
        self.files.iter().flat_map(|f| f.mutants.iter())
    }

    pub fn len(&self) -> usize {
        self.files.iter().map(|f| f.mutants.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Make every path absolute and drop later aliases of the same file
/// (`..` segments, symlinks). First occurrence wins.
pub fn normalize_paths(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    files
        .iter()
        .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
        .filter(|p| {
            // Missing files keep their lexical key and fail later in generation.
            let key = std::fs::canonicalize(p).unwrap_or_else(|_| p.clone());
            seen.insert(key)
        })
        .collect()
}

/// Generate mutants for every file, one id sequence across the whole run.
/// Files that cannot be generated are recorded and skipped.
pub fn generate_manifest(files: &[PathBuf]) -> Manifest {
    let mut ids = IdAllocator::new();
    let mut manifest = Manifest::default();

    for path in normalize_paths(files) {
        if let Some(backup) = safety::check_interrupted_run(&path) {
            match safety::restore_from_backup(&path, &backup) {
                Ok(()) => {
                    let msg = format!(
                        "restored {} from a backup left by an interrupted run",
                        path.display()
                    );
                    tracing::warn!(file = %path.display(), "recovered leftover backup");
                    manifest.warnings.push(msg);
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "backup recovery failed");
                    manifest.issues.push(GenerationIssue {
                        file: path,
                        message: format!(
                            "leftover backup {} could not be restored: {e}",
                            backup.display()
                        ),
                    });
                    continue;
                }
            }
        }

        match SourceUnit::load(&path) {
            Ok(unit) => {
                let mutants = unit.mutants(&mut ids);
                tracing::debug!(file = %path.display(), count = mutants.len(), "generated mutants");
                manifest.files.push(ManifestFile {
                    path,
                    original: unit.text,
                    mutants,
                });
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping file");
                manifest.issues.push(GenerationIssue {
                    file: path,
                    message: e.to_string(),
                });
            }
        }
    }
    manifest
}

enum WorkerMessage {
    Progress(ProgressEvent),
    Warning(String),
    Done(Vec<Mutant>),
}

/// Where a worker applies mutants.
enum Workspace<'a> {
    InPlace(&'a Path),
    Isolated(&'a IsolatedTree),
}

pub struct Coordinator {
    config: Config,
    runner: Arc<dyn TestRunner>,
    cancel: Cancellation,
    phase: RunPhase,
    session_id: String,
}

impl Coordinator {
    pub fn new(config: Config, runner: Arc<dyn TestRunner>, cancel: Cancellation) -> Self {
        Coordinator {
            config,
            runner,
            cancel,
            phase: RunPhase::NotStarted,
            session_id: format!("{:08x}", fastrand::u32(..)),
        }
    }

    /// Run `config.test_command` through the shell.
    pub fn from_config(config: Config, cancel: Cancellation) -> Self {
        let runner = Arc::new(ShellRunner::new(config.test_command.clone()));
        Self::new(config, runner, cancel)
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs once. A second call returns [`RunError::AlreadyStarted`].
    pub fn run(
        &mut self,
        files: &[PathBuf],
        on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<RunResult, RunError> {
        if self.phase != RunPhase::NotStarted {
            return Err(RunError::AlreadyStarted);
        }
        self.phase = RunPhase::Running;
        let result = self.run_inner(files, on_progress);
        self.phase = RunPhase::Completed;
        result
    }

    fn run_inner(
        &self,
        files: &[PathBuf],
        on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<RunResult, RunError> {
        if files.is_empty() {
            return Err(RunError::EmptyFileList);
        }
        let start = Instant::now();
        let working_dir = self.config.resolved_working_dir();

        let manifest = generate_manifest(files);
        tracing::info!(
            files = manifest.files.len(),
            skipped = manifest.issues.len(),
            mutants = manifest.len(),
            "generation complete"
        );

        let files_generated = manifest.files.len();
        let Manifest {
            files: groups,
            issues,
            mut warnings,
        } = manifest;

        let mut interrupted = false;
        let mut mutants = if groups.iter().all(|g| g.mutants.is_empty()) {
            Vec::new()
        } else if self.config.baseline && !self.baseline(&working_dir)? {
            interrupted = true;
            groups.into_iter().flat_map(|g| g.mutants).collect()
        } else {
            let (done, run_warnings) = self.execute_all(groups, &working_dir, on_progress)?;
            warnings.extend(run_warnings);
            done
        };
        mutants.sort_by_key(|m| m.id);

        let mut result = scorer::score(&mutants);
        result.files_generated = files_generated;
        result.generation_errors = issues;
        result.warnings = warnings;
        result.interrupted = interrupted || self.cancel.is_cancelled();
        result.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            total = result.total_mutants,
            killed = result.killed,
            survived = result.survived,
            score = result.mutation_score,
            interrupted = result.interrupted,
            "run complete"
        );
        Ok(result)
    }

    /// Run the suite against unmutated code. `Ok(false)` when cancelled.
    fn baseline(&self, working_dir: &Path) -> Result<bool, RunError> {
        tracing::info!(command = %self.runner.describe(), "running baseline");
        let outcome = self
            .runner
            .run(working_dir, self.config.timeout(), &self.cancel)?;
        if outcome.is_command_missing() {
            return Err(RunError::TestCommandNotFound(self.runner.describe()));
        }
        match outcome {
            ProcessOutcome::Exited { success: true, .. } => Ok(true),
            ProcessOutcome::Exited { output, .. } => Err(RunError::BaselineFailed(output)),
            ProcessOutcome::TimedOut => Err(RunError::BaselineTimeout(self.config.timeout_secs)),
            ProcessOutcome::Cancelled => Ok(false),
        }
    }

    fn execute_all(
        &self,
        groups: Vec<ManifestFile>,
        working_dir: &Path,
        mut on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<(Vec<Mutant>, Vec<String>), RunError> {
        let workers = self.config.workers.max(1).min(groups.len().max(1));

        let trees = match self.config.workspace {
            WorkspaceMode::InPlace => Vec::new(),
            WorkspaceMode::Isolated => (0..workers)
                .map(|w| IsolatedTree::prepare(working_dir, &self.session_id, w))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| RunError::Workspace(e.to_string()))?,
        };

        tracing::info!(workers, mode = ?self.config.workspace, "executing mutants");

        let executor = Executor::new(
            Arc::clone(&self.runner),
            self.config.timeout(),
            self.cancel.clone(),
        );
        let queue = Mutex::new(groups.into_iter().collect::<VecDeque<_>>());
        let (tx, rx) = mpsc::channel();

        let mut done = Vec::new();
        let mut warnings = Vec::new();

        std::thread::scope(|scope| {
            for w in 0..workers {
                let tx = tx.clone();
                let workspace = match trees.get(w) {
                    Some(tree) => Workspace::Isolated(tree),
                    None => Workspace::InPlace(working_dir),
                };
                let executor = &executor;
                let queue = &queue;
                let cancel = &self.cancel;
                scope.spawn(move || worker_loop(executor, queue, &workspace, cancel, &tx));
            }
            drop(tx);

            for message in rx {
                match message {
                    WorkerMessage::Progress(event) => on_progress(&event),
                    WorkerMessage::Warning(w) => warnings.push(w),
                    WorkerMessage::Done(mutants) => done.extend(mutants),
                }
            }
        });

        Ok((done, warnings))
    }
}

fn next_group(queue: &Mutex<VecDeque<ManifestFile>>) -> Option<ManifestFile> {
    match queue.lock() {
        Ok(mut q) => q.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

fn worker_loop(
    executor: &Executor,
    queue: &Mutex<VecDeque<ManifestFile>>,
    workspace: &Workspace,
    cancel: &Cancellation,
    tx: &Sender<WorkerMessage>,
) {
    while let Some(mut group) = next_group(queue) {
        run_group(executor, &mut group, workspace, cancel, tx);
        let _ = tx.send(WorkerMessage::Done(group.mutants));
    }
}

fn run_group(
    executor: &Executor,
    group: &mut ManifestFile,
    workspace: &Workspace,
    cancel: &Cancellation,
    tx: &Sender<WorkerMessage>,
) {
    let (path, working_dir) = match workspace {
        Workspace::InPlace(dir) => (group.path.clone(), dir.to_path_buf()),
        Workspace::Isolated(tree) => match tree.map(&group.path) {
            Some(mapped) => (mapped, tree.root().to_path_buf()),
            None => {
                let detail = format!(
                    "{} is outside the isolated workspace root",
                    group.path.display()
                );
                for mutant in group.mutants.iter_mut() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    fail(mutant, &detail);
                    let _ = tx.send(WorkerMessage::Progress(progress(mutant)));
                }
                return;
            }
        },
    };

    let target = Target {
        path: &path,
        working_dir: &working_dir,
        original: &group.original,
    };

    for mutant in group.mutants.iter_mut() {
        if cancel.is_cancelled() {
            break;
        }
        let verdict = match panic::catch_unwind(AssertUnwindSafe(|| executor.execute(mutant, &target))) {
            Ok(v) => v,
            Err(payload) => recover_from_panic(mutant, &target, panic_message(&*payload)),
        };
        if let Some(msg) = verdict.restore_failure {
            let _ = tx.send(WorkerMessage::Warning(msg));
        }
        let _ = tx.send(WorkerMessage::Progress(progress(mutant)));
    }
}

/// The guard has already restored during unwinding; confirm it, and
/// resolve the mutant as an error.
fn recover_from_panic(mutant: &mut Mutant, target: &Target, message: String) -> Verdict {
    tracing::error!(id = %mutant.id, panic = %message, "executor panicked");
    let mut restore_failure = None;
    let intact = std::fs::read_to_string(target.path).is_ok_and(|c| c == target.original);
    if !intact {
        if let Err(e) = std::fs::write(target.path, target.original) {
            restore_failure = Some(format!("failed to restore {}: {e}", target.path.display()));
        }
    }
    if !mutant.status.is_terminal() {
        fail(mutant, &format!("executor panicked: {message}"));
    }
    Verdict {
        status: mutant.status,
        restore_failure,
    }
}

fn fail(mutant: &mut Mutant, detail: &str) {
    mutant.error_detail = Some(detail.to_string());
    if let Err(e) = mutant.resolve(MutantStatus::Error) {
        tracing::error!(id = %mutant.id, error = %e, "invalid status transition");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn progress(mutant: &Mutant) -> ProgressEvent {
    ProgressEvent {
        id: mutant.id,
        operator: mutant.operator,
        status: mutant.status,
        file: mutant.file_path.clone(),
        line: mutant.line_number,
    }
}
