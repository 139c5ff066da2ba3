//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.narrative-oracle.toml` files. Every section is passed explicitly into
//! the component that needs it.

use crate::cli::OutputFormat;
use crate::error::ValidationError;
use crate::models::PerSource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".narrative-oracle.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Generative backend settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Signal source settings.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Idea validation settings.
    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report file path. Without one the name follows the output format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Generative backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Base URL of the Ollama-compatible API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_generator_timeout")]
    pub timeout_ms: u64,

    /// Bearer token for hosted endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_ms: default_generator_timeout(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_generator_timeout() -> u64 {
    120_000
}

fn default_temperature() -> f32 {
    0.2
}

/// Signal source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Ecosystem keyword every source filters on.
    #[serde(default = "default_keyword")]
    pub keyword: String,

    /// Timeout for each HTTP request a source makes, in milliseconds.
    #[serde(default = "default_source_timeout")]
    pub timeout_ms: u64,

    /// Budget for one whole source, in milliseconds. Must exceed
    /// `timeout_ms` so a source can outlive its slowest request.
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_ms: u64,

    /// Maximum signals kept per source kind.
    #[serde(default)]
    pub caps: CapsConfig,

    #[serde(default)]
    pub reports: ReportsSourceConfig,

    #[serde(default)]
    pub github: GithubSourceConfig,

    #[serde(default)]
    pub community: CommunitySourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            keyword: default_keyword(),
            timeout_ms: default_source_timeout(),
            adapter_timeout_ms: default_adapter_timeout(),
            caps: CapsConfig::default(),
            reports: ReportsSourceConfig::default(),
            github: GithubSourceConfig::default(),
            community: CommunitySourceConfig::default(),
        }
    }
}

fn default_keyword() -> String {
    "solana".to_string()
}

fn default_source_timeout() -> u64 {
    15_000
}

fn default_adapter_timeout() -> u64 {
    20_000
}

/// Signals kept per source kind after deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsConfig {
    #[serde(default = "default_report_cap")]
    pub reports: usize,

    #[serde(default = "default_developer_cap", rename = "github", alias = "developer_activity")]
    pub developer_activity: usize,

    #[serde(default = "default_community_cap")]
    pub community: usize,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            reports: default_report_cap(),
            developer_activity: default_developer_cap(),
            community: default_community_cap(),
        }
    }
}

impl CapsConfig {
    pub fn per_source(&self) -> PerSource<usize> {
        PerSource {
            reports: self.reports,
            developer_activity: self.developer_activity,
            community: self.community,
        }
    }
}

fn default_report_cap() -> usize {
    5
}

fn default_developer_cap() -> usize {
    10
}

fn default_community_cap() -> usize {
    5
}

/// RSS report feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsSourceConfig {
    /// Feed URLs.
    #[serde(default = "default_feeds")]
    pub feeds: Vec<String>,

    /// Items older than this are ignored.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

impl Default for ReportsSourceConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            lookback_days: default_lookback_days(),
        }
    }
}

fn default_feeds() -> Vec<String> {
    vec![
        "https://messari.io/rss",
        "https://www.helius.dev/blog/rss.xml",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_lookback_days() -> i64 {
    14
}

/// Repository search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSourceConfig {
    #[serde(default = "default_github_api")]
    pub api_url: String,

    /// Optional token, raises the search rate limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Look-back window for both searches.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    #[serde(default = "default_trending_limit")]
    pub trending_limit: u32,

    #[serde(default = "default_trending_min_stars")]
    pub trending_min_stars: u32,

    #[serde(default = "default_recent_limit")]
    pub recent_limit: u32,

    #[serde(default = "default_recent_min_stars")]
    pub recent_min_stars: u32,
}

impl Default for GithubSourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api(),
            token: None,
            window_days: default_window_days(),
            trending_limit: default_trending_limit(),
            trending_min_stars: default_trending_min_stars(),
            recent_limit: default_recent_limit(),
            recent_min_stars: default_recent_min_stars(),
        }
    }
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_window_days() -> i64 {
    30
}

fn default_trending_limit() -> u32 {
    30
}

fn default_trending_min_stars() -> u32 {
    50
}

fn default_recent_limit() -> u32 {
    20
}

fn default_recent_min_stars() -> u32 {
    10
}

/// Community cast search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunitySourceConfig {
    #[serde(default = "default_neynar_api")]
    pub api_url: String,

    /// Neynar API key. The source is skipped without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_community_limit")]
    pub limit: u32,
}

impl Default for CommunitySourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_neynar_api(),
            api_key: None,
            limit: default_community_limit(),
        }
    }
}

fn default_neynar_api() -> String {
    "https://api.neynar.com/v2/farcaster".to_string()
}

fn default_community_limit() -> u32 {
    30
}

/// What to do with a narrative whose enrichment call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentFailurePolicy {
    /// Keep it with no build ideas and the error recorded.
    #[default]
    Retain,
    /// Remove it from the output.
    Drop,
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum narratives in the final output.
    #[serde(default = "default_max_narratives")]
    pub max_narratives: usize,

    /// Narratives below this confidence are dropped by the ranker.
    #[serde(default)]
    pub min_confidence: u8,

    /// Build ideas requested per narrative.
    #[serde(default = "default_ideas_per_narrative")]
    pub ideas_per_narrative: usize,

    #[serde(default)]
    pub on_enrichment_failure: EnrichmentFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_narratives: default_max_narratives(),
            min_confidence: 0,
            ideas_per_narrative: default_ideas_per_narrative(),
            on_enrichment_failure: EnrichmentFailurePolicy::Retain,
        }
    }
}

fn default_max_narratives() -> usize {
    10
}

fn default_ideas_per_narrative() -> usize {
    5
}

/// Idea validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Validation rounds. Rounds after the first rewrite the idea.
    #[serde(default = "default_refine_iterations")]
    pub refine_iterations: u32,

    /// Average score (1-10) at which refinement stops.
    #[serde(default = "default_target_score")]
    pub target_score: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            refine_iterations: default_refine_iterations(),
            target_score: default_target_score(),
        }
    }
}

fn default_refine_iterations() -> u32 {
    1
}

fn default_target_score() -> f64 {
    8.5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the current directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(ref model) = args.model {
            self.generator.model = model.clone();
        }
        if let Some(ref endpoint) = args.endpoint {
            self.generator.endpoint = endpoint.clone();
        }
        if let Some(ref key) = args.api_key {
            self.generator.api_key = Some(key.clone());
        }
        if let Some(timeout) = args.timeout_ms {
            self.generator.timeout_ms = timeout;
        }

        if let Some(ref keyword) = args.keyword {
            self.sources.keyword = keyword.clone();
        }
        if let Some(ref token) = args.github_token {
            self.sources.github.token = Some(token.clone());
        }
        if let Some(ref key) = args.neynar_api_key {
            self.sources.community.api_key = Some(key.clone());
        }

        if let Some(max) = args.max_narratives {
            self.pipeline.max_narratives = max;
        }
        if let Some(min) = args.min_confidence {
            self.pipeline.min_confidence = min;
        }

        if let Some(iterations) = args.refine_iterations {
            self.validator.refine_iterations = iterations;
        }
        if let Some(target) = args.target_score {
            self.validator.target_score = target;
        }
    }

    /// Where to write a report: the configured path, else `<stem>.<ext>`.
    pub fn report_path(&self, stem: &str, format: OutputFormat) -> PathBuf {
        match self.general.output {
            Some(ref output) => PathBuf::from(output),
            None => PathBuf::from(format!("{}.{}", stem, format.extension())),
        }
    }

    /// Check values that serde accepts but the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let endpoint = &self.generator.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ValidationError::new(
                "generator.endpoint",
                "must start with 'http://' or 'https://'",
            ));
        }
        if self.generator.model.trim().is_empty() {
            return Err(ValidationError::new("generator.model", "must not be empty"));
        }
        if self.generator.timeout_ms == 0 {
            return Err(ValidationError::new("generator.timeout_ms", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.generator.temperature) {
            return Err(ValidationError::new(
                "generator.temperature",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.sources.keyword.trim().is_empty() {
            return Err(ValidationError::new("sources.keyword", "must not be empty"));
        }
        if self.sources.timeout_ms == 0 {
            return Err(ValidationError::new("sources.timeout_ms", "must be at least 1"));
        }
        if self.sources.adapter_timeout_ms <= self.sources.timeout_ms {
            return Err(ValidationError::new(
                "sources.adapter_timeout_ms",
                format!(
                    "must be greater than sources.timeout_ms ({})",
                    self.sources.timeout_ms
                ),
            ));
        }
        let caps = &self.sources.caps;
        if caps.reports == 0 || caps.developer_activity == 0 || caps.community == 0 {
            return Err(ValidationError::new("sources.caps", "every cap must be at least 1"));
        }
        if self.pipeline.max_narratives == 0 {
            return Err(ValidationError::new(
                "pipeline.max_narratives",
                "must be at least 1",
            ));
        }
        if self.pipeline.min_confidence > 100 {
            return Err(ValidationError::new(
                "pipeline.min_confidence",
                "must be between 0 and 100",
            ));
        }
        if self.pipeline.ideas_per_narrative == 0 {
            return Err(ValidationError::new(
                "pipeline.ideas_per_narrative",
                "must be at least 1",
            ));
        }
        if self.validator.refine_iterations == 0 {
            return Err(ValidationError::new(
                "validator.refine_iterations",
                "must be at least 1",
            ));
        }
        if !(1.0..=10.0).contains(&self.validator.target_score) {
            return Err(ValidationError::new(
                "validator.target_score",
                "must be between 1 and 10",
            ));
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
