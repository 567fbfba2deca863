use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mutscore::cancel::Cancellation;
use mutscore::config::{Config, WorkspaceMode};
use mutscore::coordinator::{self, Coordinator, ProgressEvent, RunPhase};
use mutscore::error::{ExecError, RunError};
use mutscore::executor::{ProcessOutcome, ShellRunner, TestRunner};
use mutscore::mutants::{MutantStatus, Operator};
use mutscore::safety;
use tempfile::TempDir;

const MAX_JS: &str = "function max(a, b) {\n  return a > b ? a : b;\n}\nmodule.exports = { max };\n";

type Suite = dyn Fn(&Path, &Cancellation) -> ProcessOutcome + Send + Sync;

/// A test suite simulated in-process.
struct FnRunner {
    suite: Box<Suite>,
    calls: AtomicUsize,
}

impl FnRunner {
    fn new(suite: impl Fn(&Path, &Cancellation) -> ProcessOutcome + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(FnRunner { suite: Box::new(suite), calls: AtomicUsize::new(0) })
    }
}

impl TestRunner for FnRunner {
    fn run(&self, working_dir: &Path, _: Duration, cancel: &Cancellation) -> Result<ProcessOutcome, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.suite)(working_dir, cancel))
    }

    fn describe(&self) -> String {
        "fake suite".into()
    }
}

fn pass() -> ProcessOutcome {
    ProcessOutcome::Exited { code: Some(0), success: true, output: String::new() }
}

fn fail() -> ProcessOutcome {
    ProcessOutcome::Exited { code: Some(1), success: false, output: "1 failing".into() }
}

fn config_for(dir: &Path) -> Config {
    Config {
        working_dir: Some(dir.to_path_buf()),
        baseline: false,
        timeout_secs: 10,
        ..Config::default()
    }
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap_or_default()
}

// --- Lifecycle ---

#[test]
fn empty_file_list_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut coordinator = Coordinator::new(config_for(dir.path()), FnRunner::new(|_, _| pass()), Cancellation::new());
    let result = coordinator.run(&[], |_| {});
    assert!(matches!(result, Err(RunError::EmptyFileList)));
}

#[test]
fn coordinator_runs_once() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let mut coordinator = Coordinator::new(config_for(dir.path()), FnRunner::new(|_, _| fail()), Cancellation::new());

    assert_eq!(coordinator.phase(), RunPhase::NotStarted);
    coordinator.run(&[file.clone()], |_| {}).unwrap();
    assert_eq!(coordinator.phase(), RunPhase::Completed);
    assert!(matches!(coordinator.run(&[file], |_| {}), Err(RunError::AlreadyStarted)));
}

// --- max(a, b) ---

#[test]
fn weak_suite_lets_the_boundary_mutant_survive() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    // max(3, 1) === 3 holds for both > and >=
    let mut coordinator = Coordinator::new(config_for(dir.path()), FnRunner::new(|_, _| pass()), Cancellation::new());

    let result = coordinator.run(&[file], |_| {}).unwrap();

    assert_eq!(result.total_mutants, 1);
    assert_eq!(result.survived, 1);
    assert_eq!(result.mutation_score, 0.0);
    let survivor = &result.survived_mutants[0];
    assert_eq!(survivor.operator, Operator::ConditionalBoundary);
    assert_eq!(survivor.original_text, ">");
    assert_eq!(survivor.mutated_text, ">=");
    assert_eq!(read(dir.path(), "max.js"), MAX_JS);
}

#[test]
fn boundary_test_kills_the_boundary_mutant() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    // a boundary-distinguishing assertion fails once `>` becomes `>=`
    let suite = |wd: &Path, _: &Cancellation| {
        if read(wd, "max.js").contains("a >= b") { fail() } else { pass() }
    };
    let mut config = config_for(dir.path());
    config.baseline = true;
    let runner = FnRunner::new(suite);
    let mut coordinator = Coordinator::new(config, runner.clone(), Cancellation::new());

    let result = coordinator.run(&[file], |_| {}).unwrap();

    assert_eq!(result.killed, 1);
    assert_eq!(result.survived, 0);
    assert_eq!(result.mutation_score, 1.0);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 2, "baseline plus one mutant");
    assert_eq!(read(dir.path(), "max.js"), MAX_JS);
}

// --- Baseline ---

#[test]
fn failing_baseline_aborts() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let mut config = config_for(dir.path());
    config.baseline = true;
    let mut coordinator = Coordinator::new(config, FnRunner::new(|_, _| fail()), Cancellation::new());

    let result = coordinator.run(&[file], |_| {});
    match result {
        Err(RunError::BaselineFailed(output)) => assert!(output.contains("1 failing")),
        other => panic!("expected baseline failure, got {other:?}"),
    }
    assert_eq!(read(dir.path(), "max.js"), MAX_JS);
}

#[test]
fn missing_test_command_aborts() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let mut config = config_for(dir.path());
    config.baseline = true;
    let runner = Arc::new(ShellRunner::new("definitely-not-a-command-mutscore"));
    let mut coordinator = Coordinator::new(config, runner, Cancellation::new());

    let result = coordinator.run(&[file], |_| {});
    assert!(matches!(result, Err(RunError::TestCommandNotFound(_))));
}

#[test]
fn slow_baseline_aborts() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let mut config = config_for(dir.path());
    config.baseline = true;
    config.timeout_secs = 1;
    let mut coordinator = Coordinator::new(config, FnRunner::new(|_, _| ProcessOutcome::TimedOut), Cancellation::new());

    let result = coordinator.run(&[file], |_| {});
    assert!(matches!(result, Err(RunError::BaselineTimeout(1))));
}

#[test]
fn nothing_to_mutate_skips_the_baseline() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "plain.js", "const x = call(y);\n");
    let mut config = config_for(dir.path());
    config.baseline = true;
    let runner = FnRunner::new(|_, _| fail());
    let mut coordinator = Coordinator::new(config, runner.clone(), Cancellation::new());

    let result = coordinator.run(&[file], |_| {}).unwrap();

    assert_eq!(result.total_mutants, 0);
    assert_eq!(result.mutation_score, 0.0);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
}

// --- Manifest ---

#[test]
fn generation_errors_are_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    let good = write(dir.path(), "max.js", MAX_JS);
    let broken = write(dir.path(), "broken.js", "function (\n");
    let unknown = write(dir.path(), "notes.txt", "a < b");
    let mut coordinator = Coordinator::new(config_for(dir.path()), FnRunner::new(|_, _| fail()), Cancellation::new());

    let result = coordinator.run(&[good, broken.clone(), unknown.clone()], |_| {}).unwrap();

    assert_eq!(result.total_mutants, 1);
    assert_eq!(result.killed, 1);
    let skipped: Vec<&Path> = result.generation_errors.iter().map(|i| i.file.as_path()).collect();
    assert_eq!(skipped, vec![broken.as_path(), unknown.as_path()]);
}

#[test]
fn duplicate_paths_are_processed_once() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let manifest = coordinator::generate_manifest(&[file.clone(), file.clone()]);
    assert_eq!(manifest.files.len(), 1);
    assert_eq!(manifest.len(), 1);
}

#[test]
fn aliased_paths_are_processed_once() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let dotted = dir.path().join("sub").join("..").join("max.js");

    let paths = coordinator::normalize_paths(&[file.clone(), dotted.clone()]);
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("max.js"));

    let mut coordinator = Coordinator::new(
        Config { workers: 2, ..config_for(dir.path()) },
        FnRunner::new(|_, _| pass()),
        Cancellation::new(),
    );
    let result = coordinator.run(&[file, dotted], |_| {}).unwrap();
    assert_eq!(result.total_mutants, 1);
    assert_eq!(result.survived, 1);
    assert_eq!(result.errors, 0);
}

#[cfg(unix)]
#[test]
fn symlinked_paths_are_processed_once() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let link = dir.path().join("alias.js");
    std::os::unix::fs::symlink(&file, &link).unwrap();

    let manifest = coordinator::generate_manifest(&[file.clone(), link]);
    assert_eq!(manifest.files.len(), 1);
    assert_eq!(manifest.files[0].path, file);
    assert_eq!(manifest.len(), 1);
}

#[test]
fn missing_paths_still_reach_generation() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone.js");
    let paths = coordinator::normalize_paths(&[missing.clone(), missing.clone()]);
    assert_eq!(paths, vec![missing.clone()]);

    let manifest = coordinator::generate_manifest(&[missing]);
    assert!(manifest.files.is_empty());
    assert_eq!(manifest.issues.len(), 1);
}

#[test]
fn files_generated_counts_clean_empty_inputs() {
    let dir = TempDir::new().unwrap();
    let quiet = write(dir.path(), "const.js", "const limit = 10;\n");
    let notes = write(dir.path(), "notes.txt", "a < b");
    let mut coordinator = Coordinator::new(config_for(dir.path()), FnRunner::new(|_, _| pass()), Cancellation::new());

    let result = coordinator.run(&[quiet, notes], |_| {}).unwrap();

    assert_eq!(result.total_mutants, 0);
    assert_eq!(result.files_generated, 1);
    assert_eq!(result.generation_errors.len(), 1);
}

#[test]
fn manifest_ids_run_across_files_in_input_order() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.js", "const s = x + y;\nconst t = x * y;\n");
    let b = write(dir.path(), "b.py", "def f(n):\n    return n > 1\n");
    let manifest = coordinator::generate_manifest(&[a.clone(), b.clone()]);

    let ids: Vec<(u64, PathBuf)> = manifest.mutants().map(|m| (m.id.0, m.file_path.clone())).collect();
    assert_eq!(ids, vec![(0, a.clone()), (1, a), (2, b)]);
}

#[test]
fn leftover_backup_is_recovered_before_generation() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", &MAX_JS.replace("a > b", "a >= b"));
    std::fs::write(safety::backup_path(&file), MAX_JS).unwrap();
    let mut coordinator = Coordinator::new(config_for(dir.path()), FnRunner::new(|_, _| fail()), Cancellation::new());

    let result = coordinator.run(&[file.clone()], |_| {}).unwrap();

    assert_eq!(read(dir.path(), "max.js"), MAX_JS);
    assert!(!safety::backup_path(&file).exists());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("interrupted run"));
    assert_eq!(result.survived_mutants.len(), 0);
    assert_eq!(result.mutants[0].original_text, ">");
}

// --- Execution ---

#[test]
fn progress_is_streamed_per_mutant() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "calc.js", "const s = a + b;\nconst ok = a < b && c;\n");
    let mut coordinator = Coordinator::new(config_for(dir.path()), FnRunner::new(|_, _| fail()), Cancellation::new());
    let mut events: Vec<ProgressEvent> = Vec::new();

    let result = coordinator.run(&[file.clone()], |e| events.push(e.clone())).unwrap();

    assert_eq!(events.len(), result.total_mutants);
    assert_eq!(events.len(), 3);
    let ids: Vec<u64> = events.iter().map(|e| e.id.0).collect();
    assert_eq!(ids, vec![0, 1, 2], "one file runs serially in generation order");
    assert!(events.iter().all(|e| e.status == MutantStatus::Killed && e.file == file));
}

#[test]
fn files_run_in_parallel_and_are_all_restored() {
    let dir = TempDir::new().unwrap();
    let names = ["a.js", "b.js", "c.js", "d.js"];
    let files: Vec<PathBuf> = names
        .iter()
        .map(|n| write(dir.path(), n, "const r = x > y ? x - y : y * x;\n"))
        .collect();
    let mut config = config_for(dir.path());
    config.workers = 3;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_suite = Arc::clone(&seen);
    let runner = FnRunner::new(move |wd: &Path, _: &Cancellation| {
        let mutated = ["a.js", "b.js", "c.js", "d.js"]
            .iter()
            .filter(|n| !read(wd, n).contains("x > y ? x - y : y * x"))
            .count();
        seen_in_suite.lock().unwrap().push(mutated);
        std::thread::sleep(Duration::from_millis(5));
        fail()
    });
    let mut coordinator = Coordinator::new(config, runner, Cancellation::new());

    let result = coordinator.run(&files, |_| {}).unwrap();

    assert_eq!(result.total_mutants, 12);
    assert_eq!(result.killed, 12);
    let ids: Vec<u64> = result.mutants.iter().map(|m| m.id.0).collect();
    assert_eq!(ids, (0..12).collect::<Vec<_>>());
    assert!(seen.lock().unwrap().iter().all(|&n| (1..=3).contains(&n)));
    for name in names {
        assert_eq!(read(dir.path(), name), "const r = x > y ? x - y : y * x;\n");
    }
}

#[test]
fn panicking_runner_marks_errors_and_restores() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let runner = FnRunner::new(|_, _| panic!("suite crashed"));
    let mut coordinator = Coordinator::new(config_for(dir.path()), runner, Cancellation::new());

    let result = coordinator.run(&[file.clone()], |_| {}).unwrap();

    assert_eq!(result.errors, 1);
    assert_eq!(result.mutation_score, 0.0);
    let detail = result.mutants[0].error_detail.as_deref().unwrap();
    assert!(detail.contains("suite crashed"), "{detail}");
    assert_eq!(read(dir.path(), "max.js"), MAX_JS);
    assert!(!safety::backup_path(&file).exists());
}

#[test]
fn cancellation_leaves_remaining_mutants_pending() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "calc.js", "const s = a + b;\nconst t = a - b;\nconst u = a * b;\n");
    let runner = FnRunner::new(|_, cancel: &Cancellation| {
        cancel.cancel();
        ProcessOutcome::Cancelled
    });
    let cancel = Cancellation::new();
    let mut coordinator = Coordinator::new(config_for(dir.path()), runner, cancel.clone());

    let result = coordinator.run(&[file], |_| {}).unwrap();

    assert!(result.interrupted);
    assert_eq!(result.errors, 1);
    assert_eq!(result.not_run, 2);
    assert_eq!(result.total_mutants, 1);
    assert_eq!(result.mutants[0].error_detail.as_deref(), Some("cancelled"));
    assert_eq!(read(dir.path(), "calc.js"), "const s = a + b;\nconst t = a - b;\nconst u = a * b;\n");
    assert!(cancel.is_cancelled());
}

// --- Isolated workspace ---

#[test]
fn isolated_mode_never_writes_the_working_tree() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "max.js", MAX_JS);
    let user_tree = dir.path().to_path_buf();
    let dirs = Arc::new(Mutex::new(Vec::new()));
    let dirs_in_suite = Arc::clone(&dirs);
    let runner = FnRunner::new(move |wd: &Path, _: &Cancellation| {
        dirs_in_suite.lock().unwrap().push(wd.to_path_buf());
        assert_eq!(read(&user_tree, "max.js"), MAX_JS);
        if read(wd, "max.js").contains("a >= b") { fail() } else { pass() }
    });
    let mut config = config_for(dir.path());
    config.workspace = WorkspaceMode::Isolated;
    let mut coordinator = Coordinator::new(config, runner, Cancellation::new());

    let result = coordinator.run(&[file.clone()], |_| {}).unwrap();

    assert_eq!(result.killed, 1);
    assert_eq!(result.mutants[0].file_path, file);
    let dirs = dirs.lock().unwrap();
    assert_eq!(dirs.len(), 1);
    assert_ne!(dirs[0], dir.path());
    assert!(dirs[0].to_string_lossy().contains("mutscore-"));
    assert!(!safety::backup_path(&file).exists());
}

#[test]
fn isolated_mode_rejects_files_outside_the_root() {
    let project = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let file = write(elsewhere.path(), "max.js", MAX_JS);
    let mut config = config_for(project.path());
    config.workspace = WorkspaceMode::Isolated;
    let runner = FnRunner::new(|_, _| pass());
    let mut coordinator = Coordinator::new(config, runner.clone(), Cancellation::new());

    let result = coordinator.run(&[file], |_| {}).unwrap();

    assert_eq!(result.errors, 1);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    assert!(result.mutants[0].error_detail.as_deref().unwrap().contains("outside"));
}
