//! Workflux CLI - Command-line interface for the work-hour inference engine
//!
//! Commands:
//! - analyze: Run the batch pipeline over a dataset file
//! - profiles: Learn Ground Rules team profiles from historical events
//! - score: Score a single ambiguous transit event

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workflux::ground_rules::{ConfidenceContext, GroundRulesEngine, HistoricalEvent};
use workflux::pipeline::{date_range, BatchProcessor, EmployeeDayResult};
use workflux::report::ReportEncoder;
use workflux::types::{EmployeeId, TagCode};
use workflux::{ComputeError, Dataset, EngineConfig, WORKFLUX_VERSION};

/// Workflux - Infer work hours from badge and presence events
#[derive(Parser)]
#[command(name = "workflux")]
#[command(version = WORKFLUX_VERSION)]
#[command(about = "Infer work-hour metrics from presence events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the batch pipeline over a dataset
    Analyze {
        /// Dataset file path (use - for stdin)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// First date (YYYY-MM-DD); defaults to the first date with events
        #[arg(long)]
        from: Option<String>,

        /// Last date (YYYY-MM-DD); defaults to the last date with events
        #[arg(long)]
        to: Option<String>,

        /// Comma-separated employee ids; defaults to every employee
        #[arg(long, value_delimiter = ',')]
        employees: Vec<EmployeeId>,

        /// Worker threads, overrides the configuration
        #[arg(long)]
        workers: Option<usize>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Learn team profiles from historical events and print them
    Profiles {
        /// Historical events (NDJSON)
        #[arg(long)]
        history: PathBuf,

        /// Team groups need more events than this
        #[arg(long, default_value_t = GroundRulesEngine::DEFAULT_MIN_SAMPLE_SIZE)]
        min_sample_size: u64,
    },

    /// Score one ambiguous transit event
    Score {
        #[arg(long)]
        team: String,

        #[arg(long)]
        schedule: String,

        /// Hour of day (0-23)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: u32,

        /// Tag code of the previous event
        #[arg(long)]
        prev: Option<TagCode>,

        /// Tag code of the next event
        #[arg(long)]
        next: Option<TagCode>,

        /// Duration in minutes
        #[arg(long, default_value = "5")]
        duration: i64,

        /// Historical events (NDJSON) to learn profiles from
        #[arg(long)]
        history: Option<PathBuf>,

        #[arg(long, default_value_t = GroundRulesEngine::DEFAULT_MIN_SAMPLE_SIZE)]
        min_sample_size: u64,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one result per line)
    Ndjson,
    /// Batch report
    Json,
    /// Pretty-printed batch report
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), WorkfluxCliError> {
    match cli.command {
        Commands::Analyze {
            dataset,
            config,
            from,
            to,
            employees,
            workers,
            output,
            output_format,
        } => cmd_analyze(
            &dataset,
            config.as_deref(),
            from.as_deref(),
            to.as_deref(),
            employees,
            workers,
            &output,
            output_format,
        ),

        Commands::Profiles {
            history,
            min_sample_size,
        } => cmd_profiles(&history, min_sample_size),

        Commands::Score {
            team,
            schedule,
            hour,
            prev,
            next,
            duration,
            history,
            min_sample_size,
        } => {
            let engine = match history {
                Some(path) => load_engine(&path, min_sample_size)?,
                None => GroundRulesEngine::default(),
            };
            let context = ConfidenceContext {
                team,
                schedule_type: schedule,
                hour,
                prev_tag: prev,
                next_tag: next,
                duration_minutes: duration,
                employee_id: 0,
                date: NaiveDate::default(),
            };
            let result = engine.calculate_confidence(&context);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    dataset_path: &Path,
    config_path: Option<&Path>,
    from: Option<&str>,
    to: Option<&str>,
    employees: Vec<EmployeeId>,
    workers: Option<usize>,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), WorkfluxCliError> {
    let dataset = Dataset::from_json(&read_input(dataset_path)?)?;

    let mut config = match config_path {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(workers) = workers {
        config = config.with_max_workers(workers);
    }

    let event_dates = dataset.event_dates();
    let from = match from {
        Some(s) => parse_date(s)?,
        None => *event_dates.first().ok_or(WorkfluxCliError::NoEvents)?,
    };
    let to = match to {
        Some(s) => parse_date(s)?,
        None => *event_dates.last().ok_or(WorkfluxCliError::NoEvents)?,
    };
    let employees = if employees.is_empty() {
        dataset.employee_ids()
    } else {
        employees
    };

    info!(
        employees = employees.len(),
        %from,
        %to,
        "Loaded dataset"
    );

    let processor = BatchProcessor::new(&dataset, config)?;
    let results = processor.calculate_batch(&employees, &date_range(from, to))?;
    let output_data = format_output(results, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_profiles(history: &Path, min_sample_size: u64) -> Result<(), WorkfluxCliError> {
    let engine = load_engine(history, min_sample_size)?;
    println!("{}", serde_json::to_string_pretty(&engine.profiles())?);
    Ok(())
}

fn load_engine(history: &Path, min_sample_size: u64) -> Result<GroundRulesEngine, WorkfluxCliError> {
    let data = read_input(history)?;
    let events = data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str::<HistoricalEvent>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GroundRulesEngine::from_history(&events, min_sample_size))
}

fn read_input(path: &Path) -> Result<String, WorkfluxCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, WorkfluxCliError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| ComputeError::DateParseError(format!("{s}: {e}")).into())
}

fn format_output(results: Vec<EmployeeDayResult>, format: &OutputFormat) -> Result<String, WorkfluxCliError> {
    let encoder = ReportEncoder::new();
    let output = match format {
        OutputFormat::Ndjson => encoder.encode_ndjson(&results)?,
        OutputFormat::Json => encoder.encode(results)? + "\n",
        OutputFormat::JsonPretty => encoder.encode_pretty(results)? + "\n",
    };
    Ok(output)
}

enum WorkfluxCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoEvents,
}

impl From<io::Error> for WorkfluxCliError {
    fn from(e: io::Error) -> Self {
        WorkfluxCliError::Io(e)
    }
}

impl From<ComputeError> for WorkfluxCliError {
    fn from(e: ComputeError) -> Self {
        WorkfluxCliError::Compute(e)
    }
}

impl From<serde_json::Error> for WorkfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        WorkfluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<WorkfluxCliError> for CliError {
    fn from(e: WorkfluxCliError) -> Self {
        match e {
            WorkfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            WorkfluxCliError::Compute(ComputeError::InvalidConfig(message)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message,
                hint: Some("max_workers must be at least 1".to_string()),
            },
            WorkfluxCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure the dataset has employees, events, team_statistics and claims arrays".to_string()),
            },
            WorkfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            WorkfluxCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in dataset".to_string(),
                hint: Some("Pass --from and --to, or add events to the dataset".to_string()),
            },
        }
    }
}
