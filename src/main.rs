// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use transqa::app_config::{self, Config};
use transqa::app_controller::Controller;
use transqa::database::models::{RequestStatus, UnitStatus};
use transqa::registry::EngineType;
use transqa::translation::concurrency::CancellationFlag;
use transqa::translation::NewTranslationRequest;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Review states a unit can be moved to from the CLI
#[derive(Debug, Clone, ValueEnum)]
enum CliReviewStatus {
    Reviewed,
    Approved,
}

impl From<CliReviewStatus> for UnitStatus {
    fn from(status: CliReviewStatus) -> Self {
        match status {
            CliReviewStatus::Reviewed => UnitStatus::Reviewed,
            CliReviewStatus::Approved => UnitStatus::Approved,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a DRAFT translation request from a text file (one unit per line)
    Create {
        /// Input text file
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Source language code (e.g., 'en', 'ja')
        #[arg(short, long)]
        source_language: String,

        /// Target language code, repeat for several targets
        #[arg(short, long = "target-language", required = true)]
        target_languages: Vec<String>,

        /// Translation engine (e.g., MARIAN_MT_EN_FR, NLLB_200)
        #[arg(short, long, default_value = "MARIAN_MT_EN_FR")]
        engine: String,

        /// Submit the request right after creating it
        #[arg(long)]
        submit: bool,
    },

    /// Translate every unit of a DRAFT request
    Submit {
        #[arg(value_name = "REQUEST_ID")]
        request_id: String,
    },

    /// Show a request with its unit and label counts
    Status {
        #[arg(value_name = "REQUEST_ID")]
        request_id: String,

        /// Print every unit
        #[arg(short, long)]
        verbose: bool,
    },

    /// List requests, optionally filtered by status
    List {
        /// DRAFT, IN_PROGRESS, COMPLETED or FAILED
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Move a translated unit to a review state
    Review {
        #[arg(value_name = "UNIT_ID")]
        unit_id: String,

        #[arg(short, long, value_enum, default_value = "reviewed")]
        status: CliReviewStatus,

        /// Replace the machine translation with this post-edited text
        #[arg(short, long)]
        edit: Option<String>,
    },

    /// Run quality evaluation
    Evaluate {
        #[command(subcommand)]
        target: EvaluateTarget,
    },

    /// Show every quality record of a unit
    History {
        #[arg(value_name = "UNIT_ID")]
        unit_id: String,
    },

    /// Manage engine registrations
    Engines {
        #[command(subcommand)]
        action: EngineAction,
    },

    /// Show database statistics
    Stats,

    /// Generate shell completions for transqa
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum EvaluateTarget {
    /// Evaluate one unit
    Unit {
        #[arg(value_name = "UNIT_ID")]
        unit_id: String,

        /// Reference translation
        #[arg(short, long)]
        reference: Option<String>,
    },

    /// Evaluate every translated unit of a request
    Batch {
        #[arg(value_name = "REQUEST_ID")]
        request_id: String,

        /// JSON file mapping unit ids to reference translations
        #[arg(short, long)]
        references: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum EngineAction {
    /// List registered engines
    List,

    /// Register or replace an engine
    Register {
        engine: String,

        /// Model path or hub identifier handed to the translator
        resource_handle: String,
    },

    /// Mark an engine available
    Enable { engine: String },

    /// Mark an engine unavailable
    Disable { engine: String },
}

/// transqa - batch translation with quality evaluation
#[derive(Parser, Debug)]
#[command(name = "transqa")]
#[command(version = "0.1.0")]
#[command(about = "Batch machine translation with quality evaluation")]
#[command(long_about = "transqa translates batches of text through registered engines and scores the results.

EXAMPLES:
    transqa engines register MARIAN_MT_EN_FR Helsinki-NLP/opus-mt-en-fr
    transqa create -s en -t fr lines.txt --submit
    transqa status <REQUEST_ID> --verbose
    transqa evaluate batch <REQUEST_ID> --references refs.json
    transqa completions bash > transqa.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Override the number of units translated at the same time
    #[arg(long, global = true, env = "TRANSQA_CONCURRENCY")]
    concurrency: Option<usize>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }

    fn emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌",
            Level::Warn => "🚧",
            Level::Info => " ",
            Level::Debug => "🔍",
            Level::Trace => "📋",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                Self::emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the effective level is set with set_max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "transqa", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.into());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    } else {
        log::set_max_level(config.log_level.into());
    }
    if let Some(concurrency) = cli.concurrency {
        config.pipeline.max_concurrent_units = concurrency;
    }

    config.validate().context("Configuration validation failed")?;

    let controller = Controller::with_config(config)?;
    run_command(&controller, cli.command).await
}

async fn run_command(controller: &Controller, command: Commands) -> Result<()> {
    match command {
        Commands::Create {
            input_file,
            source_language,
            target_languages,
            engine,
            submit,
        } => {
            let source_texts = read_source_texts(&input_file)?;
            let request = controller
                .create_request(NewTranslationRequest {
                    source_language,
                    target_languages,
                    engine_type: EngineType::resolve_alias(&engine),
                    source_texts,
                    file_name: input_file
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string()),
                })
                .await?;

            info!(
                "Created request {} ({} words, {} characters)",
                request.id, request.word_count, request.char_count
            );
            println!("{}", request.id);

            if submit {
                submit_request(controller, &request.id).await?;
            }
        }
        Commands::Submit { request_id } => {
            submit_request(controller, &request_id).await?;
        }
        Commands::Status { request_id, verbose } => {
            let report = controller.status(&request_id).await?;
            let request = &report.request;
            println!(
                "{}  {}  {} -> {}  {}",
                request.id,
                request.status,
                request.source_language,
                request.target_languages.join(","),
                request.engine_type
            );

            for status in [
                UnitStatus::Draft,
                UnitStatus::InProgress,
                UnitStatus::Reviewed,
                UnitStatus::Approved,
                UnitStatus::Failed,
            ] {
                let count = report.count(status);
                if count > 0 {
                    println!("  {:<12} {}", status.to_string(), count);
                }
            }

            let labels = report.label_counts();
            if !labels.is_empty() {
                let mut labels: Vec<_> = labels.into_iter().collect();
                labels.sort_by_key(|(label, _)| *label);
                let line = labels
                    .iter()
                    .map(|(label, count)| format!("{}={}", label, count))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("  quality      {}", line);
            }

            if verbose {
                for unit_report in &report.units {
                    let unit = &unit_report.unit;
                    println!(
                        "  #{:<4} {} [{}] {} {}",
                        unit.seq_num,
                        unit.id,
                        unit.target_language,
                        unit.status,
                        unit_report
                            .latest_label
                            .map(|l| l.to_string())
                            .unwrap_or_default()
                    );
                    if let Some(message) = &unit.error_message {
                        println!("        error: {}", message);
                    }
                }
            }
        }
        Commands::List { status } => {
            let status = status
                .as_deref()
                .map(str::parse::<RequestStatus>)
                .transpose()?;
            for request in controller.list_requests(status).await? {
                println!(
                    "{}  {:<11}  {}  {}  {}",
                    request.id,
                    request.status.to_string(),
                    request.engine_type,
                    request.created_at,
                    request.file_name.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Review {
            unit_id,
            status,
            edit,
        } => {
            let unit = controller
                .review_unit(&unit_id, status.into(), edit.as_deref())
                .await?;
            println!("{} {}", unit.id, unit.status);
            if unit.post_edit().is_some() {
                println!("  machine: {}", unit.machine_translation());
                println!("  edited:  {}", unit.translated_text);
            }
        }
        Commands::Evaluate { target } => match target {
            EvaluateTarget::Unit { unit_id, reference } => {
                let record = controller
                    .evaluate_unit(&unit_id, reference.as_deref())
                    .await?;
                println!(
                    "{} {} ({})",
                    record.unit_id, record.quality_label, record.label_source
                );
            }
            EvaluateTarget::Batch {
                request_id,
                references,
            } => {
                let references = match references {
                    Some(path) => read_references(&path)?,
                    None => HashMap::new(),
                };
                let evaluation = controller.evaluate_batch(&request_id, &references).await?;
                for record in &evaluation.records {
                    println!(
                        "{} {} ({})",
                        record.unit_id, record.quality_label, record.label_source
                    );
                }
                if !evaluation.skipped_unit_ids.is_empty() {
                    warn!(
                        "{} units without translated text were skipped",
                        evaluation.skipped_unit_ids.len()
                    );
                }
            }
        },
        Commands::History { unit_id } => {
            for record in controller.quality_history(&unit_id).await? {
                println!(
                    "{}  {:<9} {:<15} neural={} classical={}",
                    record.created_at,
                    record.quality_label.to_string(),
                    record.label_source.to_string(),
                    record
                        .neural_score
                        .map(|s| format!("{:.2}", s))
                        .unwrap_or_else(|| "-".to_string()),
                    record
                        .classical_label
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Commands::Engines { action } => match action {
            EngineAction::List => {
                for engine in controller.list_engines().await? {
                    println!(
                        "{:<16} {:<5} {} -> {}  {}",
                        engine.engine_type.to_string(),
                        if engine.is_available { "on" } else { "off" },
                        engine.source_language,
                        engine.target_language,
                        engine.resource_handle
                    );
                }
            }
            EngineAction::Register {
                engine,
                resource_handle,
            } => {
                let engine_type = parse_engine(&engine)?;
                controller.register_engine(engine_type, &resource_handle).await?;
            }
            EngineAction::Enable { engine } => {
                controller
                    .set_engine_availability(parse_engine(&engine)?, true)
                    .await?;
            }
            EngineAction::Disable { engine } => {
                controller
                    .set_engine_availability(parse_engine(&engine)?, false)
                    .await?;
            }
        },
        Commands::Stats => {
            println!("{}", controller.database_stats()?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

async fn submit_request(controller: &Controller, request_id: &str) -> Result<()> {
    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no new units will be started");
            on_interrupt.cancel();
        }
    });

    let summary = controller.submit(request_id, &cancel).await?;
    for failure in &summary.failures {
        error!("{}", failure);
    }
    info!(
        "Request {} {}: {}/{} units translated",
        summary.request_id, summary.status, summary.succeeded, summary.total_units
    );
    Ok(())
}

/// Engines named on the command line must be known; no fallback here
fn parse_engine(value: &str) -> Result<EngineType> {
    value.parse::<EngineType>()
}

fn read_source_texts(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(anyhow!("Input file does not exist: {:?}", path));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn read_references(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read references file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse references file: {}", path.display()))
}
