//! Flowbench CLI Entry Point
//!
//! Runs one simulated test execution of a workflow definition and
//! prints the run's console log, step summary, and aggregate metrics.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in demo pipeline against loan 42
//! flowbench --loan 42
//!
//! # Run a definition exported by the editor
//! flowbench income_verification.yaml --loan 42
//!
//! # Borrower-level test
//! flowbench income_verification.yaml --loan 42 --borrower 2
//!
//! # Keep history somewhere else
//! flowbench --loan 42 --history-dir /data/flowbench
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::info;

use flowbench::execution::record::{ExecutionRecord, ExecutionStatus, RunTarget};
use flowbench::execution::Engine;
use flowbench::history::HistoryStore;
use flowbench::workflow::{load_definition, WorkflowDefinition};
use flowbench::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    definition_path: Option<String>,
    loan_id: Option<u64>,
    borrower_id: Option<u64>,
    history_dir: PathBuf,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            definition_path: None,
            loan_id: None,
            borrower_id: None,
            history_dir: PathBuf::from(".flowbench"),
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Workflow Testing Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: flowbench [OPTIONS] [DEFINITION_FILE]");
    println!();
    println!("Arguments:");
    println!("  [DEFINITION_FILE]   Workflow definition YAML (default: built-in demo)");
    println!();
    println!("Options:");
    println!("  --loan ID           Loan to run the test against (required)");
    println!("  --borrower ID       Narrow the test to one borrower");
    println!("  --history-dir PATH  Directory for the execution history (default: .flowbench)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  flowbench --loan 42");
    println!("  flowbench income_verification.yaml --loan 42 --borrower 2");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--loan" => {
                i += 1;
                if i >= args.len() {
                    return Err("--loan requires an id argument".to_string());
                }
                config.loan_id = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid loan id: {}", args[i]))?,
                );
            }
            "--borrower" => {
                i += 1;
                if i >= args.len() {
                    return Err("--borrower requires an id argument".to_string());
                }
                config.borrower_id = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid borrower id: {}", args[i]))?,
                );
            }
            "--history-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--history-dir requires a path argument".to_string());
                }
                config.history_dir = PathBuf::from(&args[i]);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.definition_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.definition_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Colors a status word for the step summary.
fn colored_status(status: ExecutionStatus) -> colored::ColoredString {
    match status {
        ExecutionStatus::Pending => "pending".dimmed(),
        ExecutionStatus::Running => "running".yellow(),
        ExecutionStatus::Completed => "completed".green(),
        ExecutionStatus::Failed => "failed".red(),
    }
}

/// Prints the run's console log and per-step summary.
fn print_run_report(record: &ExecutionRecord) {
    println!();
    println!("Console log:");
    for line in &record.console_logs {
        println!("  {}", line);
    }

    println!();
    println!("Steps:");
    for step in &record.steps {
        let duration = step
            .duration_seconds
            .map(|d| format!("{:.2}s", d))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {:>2}. {:24} {:10} {:>8}  {:>4} in / {:>4} out  ${:.4}",
            step.step_number,
            step.step_name,
            colored_status(step.status),
            duration,
            step.tokens.input,
            step.tokens.output,
            step.cost
        );
    }

    println!();
    println!(
        "Run {}: {} in {:.2}s (simulated) | {} tokens | ${:.4}",
        record.id,
        colored_status(record.status),
        record.total_duration_seconds,
        record.analytics.total_input_tokens + record.analytics.total_output_tokens,
        record.analytics.total_cost
    );
}

/// Prints the aggregate metrics recomputed over history.
fn print_metrics(engine: &Engine) {
    let accuracy = engine.accuracy_metrics();
    let performance = engine.performance_averages();

    println!();
    println!(
        "History: {} run(s), {} loan(s), {} borrower pair(s)",
        accuracy.total_runs, accuracy.unique_loans, accuracy.unique_borrowers
    );
    println!(
        "Accuracy: {:.1}% runs ({} correct / {} incorrect / {} unverified), {:.1}% steps",
        accuracy.accuracy_rate,
        accuracy.correct_runs,
        accuracy.incorrect_runs,
        accuracy.unverified_runs,
        accuracy.step_accuracy.step_accuracy_rate
    );
    println!(
        "Averages: {:.0} tokens ({:.0} in / {:.0} out), ${:.4}, {:.2}s per run",
        performance.avg_tokens,
        performance.avg_input_tokens,
        performance.avg_output_tokens,
        performance.avg_cost,
        performance.avg_duration
    );
}

/// Main application entry point.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    // Print banner
    print_banner();

    // Load the definition, or fall back to the built-in demo
    let definition = match &config.definition_path {
        Some(path) => load_definition(path).map_err(|e| {
            format!("Could not load workflow definition from '{}': {}", path, e)
        })?,
        None => {
            info!("No definition file given, using built-in demo pipeline");
            WorkflowDefinition::income_verification_demo()
        }
    };

    info!(
        "Definition '{}': {} steps",
        definition.workflow_name,
        definition.len()
    );

    // Resolve the run target from the selection flags
    let target = match config.borrower_id {
        Some(_) => RunTarget::for_borrower(config.loan_id, config.borrower_id)?,
        None => RunTarget::for_loan(config.loan_id)?,
    };

    // Open history and create the engine
    let history = HistoryStore::open(config.history_dir.join("history.json"));
    let engine = Engine::new(definition, history);

    // Execute and wait for the simulated pipeline to finish
    let id = engine.start_execution(target)?;
    info!("Execution {} scheduled, waiting for completion...", id);
    engine.join().await;

    if let Some(record) = engine.current_execution() {
        print_run_report(&record);
    }
    print_metrics(&engine);

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
