use mutscore::cancel::Cancellation;
use mutscore::config::{Config, WorkspaceMode};
use mutscore::coordinator::{self, Coordinator};
use mutscore::error::RunError;
use mutscore::mutants::{Mutant, MutantId};
use mutscore::output;
use mutscore::scorer::RunResult;
use mutscore::state;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const EXIT_CLEAN: i32 = 0;
const EXIT_SURVIVORS: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_ENVIRONMENT: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "mutscore", version, about = "Mutation testing: measure how well your tests catch injected faults")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate mutants, run the test suite against each, and score
    Run {
        /// Source files to mutate
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Shell command that runs the test suite
        #[arg(long, env = "MUTSCORE_TEST_CMD")]
        test_cmd: Option<String>,
        /// Per-mutant timeout in seconds
        #[arg(long, env = "MUTSCORE_TIMEOUT")]
        timeout: Option<u64>,
        /// Files tested in parallel
        #[arg(long, env = "MUTSCORE_WORKERS")]
        workers: Option<usize>,
        /// Mutate private temp copies of the project instead of the working tree
        #[arg(long)]
        isolated: bool,
        /// Skip the unmutated baseline test run
        #[arg(long)]
        no_baseline: bool,
        /// Where to write the JSON report
        #[arg(long)]
        report: Option<PathBuf>,
        /// Output JSON instead of human-readable text
        #[arg(long)]
        json: bool,
        /// Exit code only, no output
        #[arg(short, long)]
        quiet: bool,
        /// Config file (default: ./mutscore.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the mutants that would be tested, without running anything
    List {
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Summary of the last run
    Status {
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show details for one mutant of the last run
    Show {
        /// Mutant id (e.g. mutant-3, @mutant-3 or 3)
        #[arg(name = "mutant")]
        mutant_ref: String,
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

struct RunArgs {
    files: Vec<PathBuf>,
    test_cmd: Option<String>,
    timeout: Option<u64>,
    workers: Option<usize>,
    isolated: bool,
    no_baseline: bool,
    report: Option<PathBuf>,
    json: bool,
    quiet: bool,
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Run {
            files,
            test_cmd,
            timeout,
            workers,
            isolated,
            no_baseline,
            report,
            json,
            quiet,
            config,
        } => cmd_run(RunArgs {
            files,
            test_cmd,
            timeout,
            workers,
            isolated,
            no_baseline,
            report,
            json,
            quiet,
            config,
        }),
        Commands::List { files, json } => cmd_list(&files, json),
        Commands::Status { report, json } => cmd_status(report, json),
        Commands::Show {
            mutant_ref,
            report,
            json,
        } => cmd_show(&mutant_ref, report, json),
    };

    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            EXIT_CLEAN
        }
        Err(e) => {
            output::print_error(&format!("Failed to serialize output: {e}"));
            EXIT_ENVIRONMENT
        }
    }
}

fn build_config(args: &RunArgs) -> Result<Config, String> {
    let mut config = Config::load(args.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(cmd) = &args.test_cmd {
        config.test_command = cmd.clone();
    }
    if let Some(t) = args.timeout {
        config.timeout_secs = t;
    }
    if let Some(w) = args.workers {
        config.workers = w;
    }
    if args.isolated {
        config.workspace = WorkspaceMode::Isolated;
    }
    if args.no_baseline {
        config.baseline = false;
    }
    if let Some(report) = &args.report {
        config.report_path = report.clone();
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn cmd_run(args: RunArgs) -> i32 {
    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            output::print_error(&e);
            return EXIT_USAGE;
        }
    };
    let report_path = config.report_path.clone();

    let cancel = Cancellation::new();
    if let Err(e) = cancel.install_ctrlc() {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    let show_progress = !args.quiet && !args.json;
    let mut coordinator = Coordinator::from_config(config, cancel);
    let outcome = coordinator.run(&args.files, |event| {
        if show_progress {
            output::print_progress(event.id, event.operator, event.status);
        }
    });

    let result = match outcome {
        Ok(r) => r,
        Err(e) => {
            if !args.quiet {
                output::print_error(&e.to_string());
            }
            return run_error_exit_code(&e);
        }
    };

    if let Err(e) = state::save_report(&result, &report_path) {
        if !args.quiet {
            output::print_warning(&e.to_string());
        }
    }

    if !args.quiet {
        if args.json {
            print_json(&result);
        } else {
            output::print_report(&result);
            if result.total_mutants == 0 && result.not_run == 0 {
                output::print_success("No mutable code found.");
            }
        }
    }

    run_exit_code(&result)
}

fn run_error_exit_code(e: &RunError) -> i32 {
    match e {
        RunError::EmptyFileList => EXIT_USAGE,
        RunError::TestCommandNotFound(_)
        | RunError::BaselineFailed(_)
        | RunError::BaselineTimeout(_)
        | RunError::Baseline(_)
        | RunError::Workspace(_)
        | RunError::AlreadyStarted => EXIT_ENVIRONMENT,
    }
}

fn run_exit_code(result: &RunResult) -> i32 {
    if result.interrupted {
        EXIT_INTERRUPTED
    } else if result.survived > 0 {
        EXIT_SURVIVORS
    } else if result.files_generated == 0 && !result.generation_errors.is_empty() {
        // every input file was rejected
        EXIT_USAGE
    } else {
        EXIT_CLEAN
    }
}

fn cmd_list(files: &[PathBuf], json_mode: bool) -> i32 {
    if files.is_empty() {
        output::print_error("No files given. Usage: mutscore list <files...>");
        return EXIT_USAGE;
    }
    let manifest = coordinator::generate_manifest(files);
    for warning in &manifest.warnings {
        output::print_warning(warning);
    }
    for issue in &manifest.issues {
        output::print_warning(&format!("{}: {}", issue.file.display(), issue.message));
    }

    let mutants: Vec<Mutant> = manifest.mutants().cloned().collect();
    if json_mode {
        return print_json(&mutants);
    }
    output::print_manifest(&mutants);
    if manifest.files.is_empty() && !manifest.issues.is_empty() {
        EXIT_USAGE
    } else {
        EXIT_CLEAN
    }
}

fn default_report_path() -> PathBuf {
    Config::load(None)
        .map(|c| c.report_path)
        .unwrap_or_else(|_| PathBuf::from(state::DEFAULT_REPORT_PATH))
}

fn load_last_run(report: Option<PathBuf>) -> Result<RunResult, i32> {
    let path = report.unwrap_or_else(default_report_path);
    load_report_at(&path)
}

fn load_report_at(path: &Path) -> Result<RunResult, i32> {
    if !path.exists() {
        output::print_error(&format!(
            "No report at {}. Run `mutscore run` first.",
            path.display()
        ));
        return Err(EXIT_USAGE);
    }
    state::load_report(path).map_err(|e| {
        output::print_error(&e.to_string());
        EXIT_ENVIRONMENT
    })
}

fn cmd_status(report: Option<PathBuf>, json_mode: bool) -> i32 {
    let result = match load_last_run(report) {
        Ok(r) => r,
        Err(code) => return code,
    };
    if json_mode {
        print_json(&result)
    } else {
        output::print_status(&result);
        EXIT_CLEAN
    }
}

fn cmd_show(mutant_ref: &str, report: Option<PathBuf>, json_mode: bool) -> i32 {
    let Some(id) = MutantId::parse(mutant_ref) else {
        output::print_error(&format!(
            "Invalid mutant id `{mutant_ref}`. Expected e.g. mutant-3."
        ));
        return EXIT_USAGE;
    };
    let result = match load_last_run(report) {
        Ok(r) => r,
        Err(code) => return code,
    };

    match result.find(id) {
        Some(m) if json_mode => print_json(m),
        Some(m) => {
            output::print_mutant_detail(m);
            EXIT_CLEAN
        }
        None => {
            let valid: Vec<String> = result.survived_mutants.iter().map(|m| m.id.to_string()).collect();
            let hint = if valid.is_empty() {
                String::new()
            } else {
                format!(" Survivors: {}", valid.join(", "))
            };
            output::print_error(&format!("{id} not found in the last report.{hint}"));
            EXIT_USAGE
        }
    }
}
