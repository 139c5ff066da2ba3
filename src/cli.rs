//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Flags that are not given leave the
//! configuration file values untouched.

use crate::error::ValidationError;
use clap::Parser;
use std::path::PathBuf;

/// Narrative Oracle - detect emerging ecosystem narratives
///
/// Aggregates institutional reports, developer activity and community
/// posts, clusters them into narratives with a local LLM, scores each
/// narrative from the evidence and suggests things to build.
///
/// Examples:
///   narrative-oracle
///   narrative-oracle --model qwen2.5:14b --format json --output narratives.json
///   narrative-oracle --keyword ethereum --min-confidence 30
///   narrative-oracle --dry-run
///   narrative-oracle --interval 120
///   narrative-oracle --validate-idea "Tap-to-pay wallet for street vendors" --refine-iterations 3
///   narrative-oracle --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .narrative-oracle.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to narratives_report.md, or .json with --format json
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Model used for clustering and build ideas
    #[arg(short, long, env = "NARRATIVE_ORACLE_MODEL")]
    pub model: Option<String>,

    /// Ollama-compatible API endpoint URL
    #[arg(long, value_name = "URL", env = "OLLAMA_URL")]
    pub endpoint: Option<String>,

    /// Bearer token for a hosted generator endpoint
    #[arg(long, value_name = "KEY", env = "NARRATIVE_ORACLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Generator request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Ecosystem keyword the sources search for
    #[arg(short, long, value_name = "WORD")]
    pub keyword: Option<String>,

    /// GitHub token for repository search
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Neynar API key for community posts
    ///
    /// Without a key the community source is skipped.
    #[arg(long, value_name = "KEY", env = "NEYNAR_API_KEY", hide_env_values = true)]
    pub neynar_api_key: Option<String>,

    /// Maximum number of narratives in the report
    #[arg(long, value_name = "COUNT")]
    pub max_narratives: Option<usize>,

    /// Drop narratives below this confidence (0-100)
    #[arg(long, value_name = "SCORE")]
    pub min_confidence: Option<u8>,

    /// Run repeatedly, waiting this many seconds between runs
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Dry run: collect signals without calling the LLM
    ///
    /// Shows what each source returned and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Score a product idea on ten product-market-fit dimensions instead
    /// of detecting narratives
    #[arg(long, value_name = "TEXT")]
    pub validate_idea: Option<String>,

    /// Validation rounds; each round below the target rewrites the idea
    #[arg(long, value_name = "COUNT")]
    pub refine_iterations: Option<u32>,

    /// Average score (1-10) at which refinement stops
    #[arg(long, value_name = "SCORE")]
    pub target_score: Option<f64>,

    /// Exit with code 2 when no narratives are detected
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .narrative-oracle.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension for reports in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), ValidationError> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err(ValidationError::new(
                "verbose",
                "cannot use both --verbose and --quiet",
            ));
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ValidationError::new(
                    "endpoint",
                    "must start with 'http://' or 'https://'",
                ));
            }
        }

        if self.timeout_ms == Some(0) {
            return Err(ValidationError::new("timeout_ms", "must be at least 1"));
        }

        if self.max_narratives == Some(0) {
            return Err(ValidationError::new("max_narratives", "must be at least 1"));
        }

        if let Some(min) = self.min_confidence {
            if min > 100 {
                return Err(ValidationError::new(
                    "min_confidence",
                    "must be between 0 and 100",
                ));
            }
        }

        if let Some(ref keyword) = self.keyword {
            if keyword.trim().is_empty() {
                return Err(ValidationError::new("keyword", "must not be empty"));
            }
        }

        if self.interval == Some(0) {
            return Err(ValidationError::new("interval", "must be at least 1 second"));
        }

        if self.dry_run && self.interval.is_some() {
            return Err(ValidationError::new(
                "interval",
                "cannot be combined with --dry-run",
            ));
        }

        if let Some(ref idea) = self.validate_idea {
            if idea.trim().is_empty() {
                return Err(ValidationError::new("validate_idea", "must not be empty"));
            }
            if self.dry_run || self.interval.is_some() {
                return Err(ValidationError::new(
                    "validate_idea",
                    "cannot be combined with --dry-run or --interval",
                ));
            }
        }

        if self.refine_iterations == Some(0) {
            return Err(ValidationError::new("refine_iterations", "must be at least 1"));
        }

        if let Some(target) = self.target_score {
            if !(1.0..=10.0).contains(&target) {
                return Err(ValidationError::new(
                    "target_score",
                    "must be between 1 and 10",
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_by_default` comes from the configuration file; `--quiet`
    /// still wins over it.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "narrative-oracle",
            "--format",
            "json",
            "--model",
            "qwen2.5:14b",
            "--min-confidence",
            "30",
            "--keyword",
            "ethereum",
            "--fail-on-empty",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.model.as_deref(), Some("qwen2.5:14b"));
        assert_eq!(args.min_confidence, Some(30));
        assert_eq!(args.keyword.as_deref(), Some("ethereum"));
        assert!(args.fail_on_empty);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = Args {
            verbose: true,
            quiet: true,
            ..Args::default()
        };
        assert_eq!(args.validate().unwrap_err().field, "verbose");
    }

    #[test]
    fn test_validation_invalid_values() {
        let args = Args {
            endpoint: Some("localhost:11434".to_string()),
            ..Args::default()
        };
        assert!(args.validate().is_err());

        let args = Args {
            min_confidence: Some(150),
            ..Args::default()
        };
        assert_eq!(args.validate().unwrap_err().field, "min_confidence");

        let args = Args {
            dry_run: true,
            interval: Some(60),
            ..Args::default()
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let args = Args {
            init_config: true,
            verbose: true,
            quiet: true,
            ..Args::default()
        };
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = Args::default();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_honours_config_verbose() {
        let mut args = Args::default();
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_validate_idea_flags() {
        let args = Args::try_parse_from([
            "narrative-oracle",
            "--validate-idea",
            "Tap-to-pay wallet",
            "--refine-iterations",
            "3",
            "--target-score",
            "8",
        ])
        .unwrap();
        assert_eq!(args.validate_idea.as_deref(), Some("Tap-to-pay wallet"));
        assert_eq!(args.refine_iterations, Some(3));
        assert_eq!(args.target_score, Some(8.0));
        assert!(args.validate().is_ok());

        let args = Args {
            validate_idea: Some("  ".to_string()),
            ..Args::default()
        };
        assert_eq!(args.validate().unwrap_err().field, "validate_idea");

        let args = Args {
            validate_idea: Some("idea".to_string()),
            dry_run: true,
            ..Args::default()
        };
        assert_eq!(args.validate().unwrap_err().field, "validate_idea");

        let args = Args {
            refine_iterations: Some(0),
            ..Args::default()
        };
        assert_eq!(args.validate().unwrap_err().field, "refine_iterations");

        let args = Args {
            target_score: Some(11.0),
            ..Args::default()
        };
        assert_eq!(args.validate().unwrap_err().field, "target_score");
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert_eq!(OutputFormat::Json.extension(), "json");
    }
}
