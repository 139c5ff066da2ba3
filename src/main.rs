//! Narrative Oracle - emerging narrative detection
//!
//! A CLI tool that aggregates institutional reports, developer activity and
//! community posts, clusters them into narratives with an Ollama-compatible
//! model, scores every narrative from the evidence and attaches build ideas.
//! `--validate-idea` scores a single product idea instead.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime or validation error (config, generator, clustering, etc.)
//!   2 - No narratives detected and --fail-on-empty set

mod cli;
mod config;
mod error;
mod llm;
mod models;
mod pipeline;
mod report;
mod sources;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use llm::{Generator, OllamaClient};
use models::{NarrativeReport, SignalSet, SourceKind, ValidationReport};
use pipeline::{Aggregator, IdeaValidator, NarrativeClusterer, NarrativeEnricher, NarrativePipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Loaded before logging so `general.verbose` can set the level
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("Narrative Oracle v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, sources, caps and ranking.");
    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides the verbosity settings.
fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the pipeline and run it once or on a schedule. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    config.validate().context("Invalid configuration")?;

    if let Some(ref idea) = args.validate_idea {
        return run_validation(idea, &config, &args).await;
    }

    let sources = sources::default_sources(&config.sources)
        .context("Failed to initialize signal sources")?;
    let aggregator = Aggregator::from_config(sources, &config.sources);

    let ecosystem = ecosystem_name(&config.sources.keyword);
    let generator: Arc<dyn Generator> = Arc::new(
        OllamaClient::new(config.generator.clone()).context("Failed to initialize generator")?,
    );

    let mut pipeline = NarrativePipeline::new(
        aggregator,
        NarrativeClusterer::new(generator.clone(), ecosystem.clone()),
        NarrativeEnricher::new(
            generator.clone(),
            ecosystem,
            config.pipeline.ideas_per_narrative,
        ),
        config.pipeline.clone(),
    );

    let spinner = spinner(args.quiet);
    pipeline = pipeline.with_progress(spinner.clone());

    if args.dry_run {
        let signals = pipeline.collect_signals().await;
        spinner.finish_and_clear();
        print_dry_run(&signals);
        return Ok(0);
    }

    println!("🔭 Detecting narratives for '{}'", config.sources.keyword);
    println!("   Model: {}", config.generator.model);
    println!("   Endpoint: {}", config.generator.endpoint);

    let Some(interval) = args.interval else {
        let result = run_once(&pipeline, generator.model_name(), &config, &args).await;
        spinner.finish_and_clear();
        let report = result?;
        return Ok(exit_code(&report, &args));
    };

    info!("Schedule mode: running every {}s", interval);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                spinner.finish_and_clear();
                println!("\n👋 Stopping schedule.");
                return Ok(0);
            }
        }

        // Runs never overlap: the next tick is awaited only after this one returns.
        match run_once(&pipeline, generator.model_name(), &config, &args).await {
            Ok(report) => debug!("Scheduled run produced {} narrative(s)", report.narratives.len()),
            Err(e) => warn!("Scheduled run failed, waiting for next tick: {:#}", e),
        }
    }
}

/// Run the pipeline once and write the report.
async fn run_once(
    pipeline: &NarrativePipeline,
    model: &str,
    config: &Config,
    args: &Args,
) -> Result<NarrativeReport> {
    let run = pipeline.run().await?;
    let report = report::build_report(run, model);

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let path = config.report_path("narratives_report", args.format);
    std::fs::write(&path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    print_summary(&report, &path);
    Ok(report)
}

/// Handle --validate-idea: score the idea, refining it when configured.
async fn run_validation(idea: &str, config: &Config, args: &Args) -> Result<i32> {
    let generator: Arc<dyn Generator> = Arc::new(
        OllamaClient::new(config.generator.clone()).context("Failed to initialize generator")?,
    );
    let validator = IdeaValidator::new(generator.clone(), ecosystem_name(&config.sources.keyword));
    let rounds = config.validator.refine_iterations;
    let target = config.validator.target_score;

    println!("🧪 Validating idea ({} round(s), target {:.1})", rounds, target);
    println!("   Model: {}", config.generator.model);

    let spinner = spinner(args.quiet);
    spinner.set_message("Scoring idea...");
    let result = validator.refine(idea, rounds, target).await;
    spinner.finish_and_clear();

    let report = report::build_validation_report(result?, generator.model_name());
    let output = match args.format {
        OutputFormat::Json => report::generate_validation_json(&report)?,
        OutputFormat::Markdown => report::generate_validation_markdown(&report),
    };

    let path = config.report_path("idea_validation", args.format);
    std::fs::write(&path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    print_validation_summary(&report, &path);
    Ok(0)
}

fn print_validation_summary(report: &ValidationReport, path: &Path) {
    let refinement = &report.refinement;

    println!("\n📊 Validation Summary:");
    for (i, round) in refinement.rounds.iter().enumerate() {
        println!("   Round {}: {:.1}/10", i + 1, round.average);
    }
    if refinement.target_reached {
        println!("   ✨ Target {:.1} reached", refinement.target_score);
    } else {
        println!("   Target {:.1} not reached", refinement.target_score);
    }
    if refinement.rounds.len() > 1 {
        println!("   Final idea: {}", refinement.final_idea);
    }
    println!("\n✅ Report saved to: {}", path.display());
}

fn exit_code(report: &NarrativeReport, args: &Args) -> i32 {
    if args.fail_on_empty && report.narratives.is_empty() {
        eprintln!("\n⛔ No narratives detected. Failing (exit code 2).");
        2
    } else {
        0
    }
}

fn print_summary(report: &NarrativeReport, path: &Path) {
    let counts = &report.metadata.signal_counts;
    let summary = &report.summary;

    println!("\n📊 Run Summary:");
    println!(
        "   Signals: {} reports | {} repositories | {} community posts",
        counts.reports, counts.developer_activity, counts.community
    );
    for failure in &report.metadata.failed_sources {
        println!("   ⚠️  {}", failure);
    }
    println!("   Narratives: {}", summary.total);
    println!(
        "   - 🔥 High: {} | 🟡 Medium: {} | 🟢 Low: {}",
        summary.high, summary.medium, summary.low
    );
    for (i, narrative) in report.narratives.iter().take(3).enumerate() {
        println!(
            "   {}. {} ({}, {}/100)",
            i + 1,
            narrative.title(),
            narrative.category(),
            narrative.confidence()
        );
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!("\n✅ Report saved to: {}", path.display());
}

/// Handle --dry-run: print what each source returned.
fn print_dry_run(signals: &SignalSet) {
    println!("\n🔍 Dry run: collected signals (no LLM call)...\n");

    for kind in SourceKind::ALL {
        let of_kind = signals.of(kind);
        println!("   {} ({}):", kind, of_kind.len());
        for signal in of_kind {
            let category = signal.category.as_deref().unwrap_or("-");
            println!("     • [{}] {}", category, signal.identity);
        }
    }

    for failure in &signals.failures {
        println!("   ⚠️  {}", failure);
    }

    println!("\n✅ Dry run complete. No LLM calls were made.");
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// "solana" -> "Solana"
fn ecosystem_name(keyword: &str) -> String {
    let keyword = keyword.trim();
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Where the configuration came from, logged once logging is up.
enum ConfigOrigin {
    File(PathBuf),
    Defaults,
    /// The default file exists but could not be loaded.
    Fallback(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
            ConfigOrigin::Defaults => debug!("No config file found, using defaults"),
            ConfigOrigin::Fallback(e) => warn!("Failed to load config, using defaults: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::File(config_path.clone())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Defaults)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Fallback(e))),
    }
}
