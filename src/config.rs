//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.examgrader.toml` files.

use crate::grading::RoundingPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".examgrader.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Grading settings.
    #[serde(default)]
    pub grading: GradingConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Worker threads for grading and concurrent model calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "grade_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on failure.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_model() -> String {
    "qwen2.5:14b".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    600 // whole-exam extraction on a local model is slow
}

fn default_retries() -> usize {
    2
}

/// Scoring and answer matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Score awarded for a fully correct sheet.
    #[serde(default = "default_max_score")]
    pub max_score: u32,

    /// Minimum score that counts as passing.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u32,

    /// Score rounding: "nearest" or "floor".
    #[serde(default)]
    pub rounding: RoundingPolicy,

    /// Compare answers ignoring letter case.
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    /// Treat "A. text", "A)" and "(A)" as the bare letter "A".
    #[serde(default = "default_true")]
    pub strip_option_prefix: bool,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            max_score: default_max_score(),
            pass_threshold: default_pass_threshold(),
            rounding: RoundingPolicy::default(),
            case_insensitive: true,
            strip_option_prefix: true,
        }
    }
}

fn default_max_score() -> u32 {
    100
}

fn default_pass_threshold() -> u32 {
    60
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Accuracy (percent) at or above which a question counts as easy.
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy_threshold: f64,

    /// Accuracy (percent) below which a question counts as hard.
    #[serde(default = "default_low_accuracy")]
    pub low_accuracy_threshold: f64,

    /// Include a section per student in Markdown reports.
    #[serde(default = "default_true")]
    pub include_student_details: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            high_accuracy_threshold: default_high_accuracy(),
            low_accuracy_threshold: default_low_accuracy(),
            include_student_details: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_high_accuracy() -> f64 {
    80.0
}

fn default_low_accuracy() -> f64 {
    60.0
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

    /// Try to load configuration from the default location.
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
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(max_score) = args.max_score {
            self.grading.max_score = max_score;
        }
        if let Some(pass_threshold) = args.pass_threshold {
            self.grading.pass_threshold = pass_threshold;
        }
        if let Some(rounding) = args.rounding {
            self.grading.rounding = rounding.into();
        }
        if args.strict_matching {
            self.grading.case_insensitive = false;
            self.grading.strip_option_prefix = false;
        }

        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if args.no_student_details {
            self.report.include_student_details = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
