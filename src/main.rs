//! Keystroke Study Agent CLI
//!
//! Runs the two-session typing study and exports its features.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use keystroke_study_agent::{
    collector::JsonLinesCollector,
    config::Config,
    core::{extract_features, write_csv, Condition, ExportBuilder, ExportRow, RecordedStudy},
    study::{format_remaining, prompt, Phase, StudyController},
    transparency::{create_shared_log_with_persistence, read_persisted, SharedTransparencyLog},
    Extraction, SessionLog, PARTICIPANT_NOTICE, VERSION,
};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keystroke-study")]
#[command(version = VERSION)]
#[command(about = "Keystroke timing capture for relaxed/stressed typing studies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a study, reading JSON-lines inputs from a file or stdin
    Run {
        /// Input file (defaults to stdin)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Stressed session time limit in seconds
        #[arg(long)]
        time_limit: Option<u64>,

        /// Output file (defaults to the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },

    /// Extract features from a recorded study file
    Analyze {
        /// JSON file with "relaxed" and/or "stressed" event lists
        file: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },

    /// Show the task prompts
    Prompts,

    /// Show the participant notice
    Notice,

    /// Show cumulative collection statistics
    Status,

    /// Show configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            time_limit,
            output,
            format,
        } => cmd_run(input, time_limit, output, format),
        Commands::Analyze {
            file,
            output,
            format,
        } => cmd_analyze(&file, output, format),
        Commands::Prompts => {
            cmd_prompts();
            Ok(())
        }
        Commands::Notice => {
            println!("{PARTICIPANT_NOTICE}");
            Ok(())
        }
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default configuration: {e}");
            Config::default()
        }
    }
}

fn cmd_run(
    input: Option<PathBuf>,
    time_limit: Option<u64>,
    output: Option<PathBuf>,
    format: ExportFormat,
) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(secs) = time_limit {
        if secs == 0 {
            bail!("--time-limit must be at least one second");
        }
        config.stressed_time_limit = Duration::from_secs(secs);
    }
    if let Err(e) = config.ensure_directories() {
        warn!("Could not create directories: {e}");
    }

    println!("Keystroke Study Agent v{VERSION}");
    println!(
        "  Stressed time limit: {}",
        format_remaining(config.stressed_time_limit)
    );
    println!();

    let source: Box<dyn BufRead + Send> = match input {
        Some(ref path) => Box::new(BufReader::new(
            std::fs::File::open(path).with_context(|| format!("Could not open {path:?}"))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let transparency =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    let runtime = tokio::runtime::Runtime::new().context("Could not start the timer runtime")?;

    let mut collector = JsonLinesCollector::new();
    let mut controller = StudyController::new(
        config.stressed_time_limit,
        collector.sender(),
        runtime.handle().clone(),
    )
    .with_transparency(transparency.clone());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    collector.start(source)?;
    let receiver = collector.receiver().clone();
    let mut last_phase = controller.phase();
    let mut last_tick = Instant::now();

    while running.load(Ordering::SeqCst) && !controller.is_complete() {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(input) => {
                if let Err(e) = controller.handle(input) {
                    warn!("Input rejected: {e}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // Without more input only the countdown can move the study on.
                let idle = !collector.is_running() && receiver.is_empty();
                if idle && controller.remaining().is_none() {
                    info!("Input ended");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                eprintln!("Input channel disconnected unexpectedly");
                break;
            }
        }

        if controller.phase() != last_phase {
            last_phase = controller.phase();
            announce_phase(last_phase, &controller);
        }

        if let Some(remaining) = controller.remaining() {
            if last_tick.elapsed() >= Duration::from_secs(10) {
                println!("  Time left: {}", format_remaining(remaining));
                last_tick = Instant::now();
            }
        }
    }

    collector.stop();
    controller.shutdown();

    println!();
    let rows = controller.export_rows();
    if rows.is_empty() {
        println!("No session reached extraction; nothing to export.");
    } else {
        let path = output.unwrap_or_else(|| default_export_path(&config, format));
        let logs = if config.include_raw_events {
            controller.logs()
        } else {
            Vec::new()
        };
        write_export(&path, &rows, &logs, format, &config)?;
        transparency.record_rows_exported(rows.len() as u64);
        println!("Exported {} session(s) to {path:?}", rows.len());
    }

    if collector.rejected_lines() > 0 {
        println!("Skipped {} unreadable input line(s)", collector.rejected_lines());
    }
    finish_transparency(&transparency);
    Ok(())
}

fn announce_phase(phase: Phase, controller: &StudyController) {
    match phase {
        Phase::Intro => {}
        Phase::Relaxed | Phase::Stressed => {
            let condition = phase.active_condition().unwrap_or(Condition::Relaxed);
            if condition == Condition::Stressed {
                report_extraction(Condition::Relaxed, controller.extraction(Condition::Relaxed));
            }
            println!("[{}] {} session started", Utc::now().format("%H:%M:%S"), condition);
        }
        Phase::Complete => {
            report_extraction(Condition::Stressed, controller.extraction(Condition::Stressed));
            println!("[{}] Study complete", Utc::now().format("%H:%M:%S"));
        }
    }
}

fn report_extraction(condition: Condition, extraction: Option<&Extraction>) {
    match extraction {
        Some(Extraction::Complete(features)) => println!(
            "  {condition}: {} keys, {} backspaces, hold {:.1}ms, latency {:.1}ms",
            features.total_keys_pressed,
            features.total_backspaces,
            features.hold_time_mean,
            features.latency_mean
        ),
        Some(Extraction::InsufficientData { event_count }) => {
            println!("  {condition}: not enough data ({event_count} events)")
        }
        None => {}
    }
}

fn cmd_analyze(file: &Path, output: Option<PathBuf>, format: ExportFormat) -> anyhow::Result<()> {
    let config = load_config();
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Could not read {file:?}"))?;
    let study: RecordedStudy =
        serde_json::from_str(&content).with_context(|| format!("Could not parse {file:?}"))?;

    let logs = study
        .into_logs()
        .map_err(|(condition, e)| anyhow::anyhow!("Invalid {condition} session: {e}"))?;

    let extractions: Vec<(Condition, Extraction)> = logs
        .iter()
        .map(|log| (log.condition(), extract_features(log)))
        .collect();
    let rows: Vec<ExportRow<'_>> = extractions
        .iter()
        .map(|(condition, extraction)| ExportRow::new(*condition, extraction))
        .collect();
    let raw: Vec<&SessionLog> = if config.include_raw_events {
        logs.iter().collect()
    } else {
        Vec::new()
    };

    match output {
        Some(path) => {
            write_export(&path, &rows, &raw, format, &config)?;
            println!("Exported {} session(s) to {path:?}", rows.len());
        }
        None => {
            let stdout = std::io::stdout();
            render_export(stdout.lock(), &rows, &raw, format, &config)?;
        }
    }
    Ok(())
}

fn cmd_prompts() {
    let config = load_config();
    for condition in Condition::ALL {
        println!("[{condition}]");
        println!("{}", prompt(condition));
        println!();
    }
    println!(
        "Stressed time limit: {}",
        format_remaining(config.stressed_time_limit)
    );
}

fn cmd_status() {
    let config = load_config();
    let stats_path = config.data_path.join("transparency.json");

    println!("Keystroke Study Agent Status");
    println!("============================");
    println!();

    match read_persisted(&stats_path) {
        Ok(stats) => {
            println!("Cumulative Statistics:");
            println!("  Key events recorded: {}", stats.key_events);
            println!("  Untracked keys ignored: {}", stats.ignored_keys);
            println!("  Sessions started: {}", stats.sessions_started);
            println!("  Sessions extracted: {}", stats.sessions_extracted);
            println!("  Feature rows exported: {}", stats.rows_exported);
            println!("  Last updated: {}", stats.last_updated.to_rfc3339());
        }
        Err(_) => println!("No previous study data found."),
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn default_export_path(config: &Config, format: ExportFormat) -> PathBuf {
    config.export_path.join(format!(
        "keystroke_study_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

fn write_export(
    path: &Path,
    rows: &[ExportRow<'_>],
    logs: &[&SessionLog],
    format: ExportFormat,
    config: &Config,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {parent:?}"))?;
    }
    let file = std::fs::File::create(path).with_context(|| format!("Could not create {path:?}"))?;
    render_export(file, rows, logs, format, config)
}

fn render_export<W: std::io::Write>(
    mut writer: W,
    rows: &[ExportRow<'_>],
    logs: &[&SessionLog],
    format: ExportFormat,
    config: &Config,
) -> anyhow::Result<()> {
    match format {
        ExportFormat::Csv => write_csv(writer, rows, config.delimiter_byte()?)?,
        ExportFormat::Json => {
            let json = ExportBuilder::new().to_json(rows, logs)?;
            writeln!(writer, "{json}")?;
        }
    }
    Ok(())
}

fn finish_transparency(transparency: &SharedTransparencyLog) {
    if let Err(e) = transparency.save() {
        warn!("Could not save transparency log: {e}");
    }
    println!();
    println!("{}", transparency.summary());
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
