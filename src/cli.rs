//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::grading::RoundingPolicy;
use clap::Parser;
use std::path::PathBuf;

/// ExamGrader - batch grading and analytics for English exams
///
/// Builds an answer key from an exam, grades a class of answer sheets
/// against it, and reports class, question, and student statistics.
///
/// Examples:
///   examgrader --exam exam.json --answers sheets/
///   examgrader --exam exam.txt --answers roster.txt --analyze-students
///   examgrader --standard key.json --answers roster.json --format json
///   examgrader --exam exam.pdf.txt --dry-run --save-standard key.json
///   examgrader --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Exam document to build the answer key from
    ///
    /// A `.json` file is read as already extracted questions; any other
    /// file is sent as text to the extraction model.
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["standard", "init_config"],
        conflicts_with = "standard"
    )]
    pub exam: Option<PathBuf>,

    /// Previously saved answer key (JSON) to grade against
    #[arg(long, value_name = "FILE")]
    pub standard: Option<PathBuf>,

    /// Answer sheet file or directory of answer sheets
    ///
    /// `.json` sheets are read directly; `.txt` and `.md` sheets are sent
    /// to the extraction model. Not needed with --dry-run.
    #[arg(
        short,
        long,
        value_name = "PATH",
        required_unless_present_any = ["dry_run", "init_config"]
    )]
    pub answers: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the normalized answer key to this JSON file
    #[arg(long, value_name = "FILE")]
    pub save_standard: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .examgrader.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ollama model used for extraction and student analysis
    #[arg(short, long, env = "EXAMGRADER_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Score awarded for a fully correct sheet
    #[arg(long, value_name = "POINTS")]
    pub max_score: Option<u32>,

    /// Minimum score that counts as passing
    #[arg(long, value_name = "POINTS")]
    pub pass_threshold: Option<u32>,

    /// How fractional scores are rounded [default: nearest, half up]
    #[arg(long, value_name = "MODE")]
    pub rounding: Option<RoundingArg>,

    /// Require exact answers (no case folding or option prefix stripping)
    #[arg(long)]
    pub strict_matching: bool,

    /// Worker threads and concurrent model requests
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Ask the model for a qualitative analysis of every student
    #[arg(long)]
    pub analyze_students: bool,

    /// Leave per-student sections out of the Markdown report
    #[arg(long)]
    pub no_student_details: bool,

    /// Exit with code 2 when the pass rate is below this percentage
    ///
    /// Useful for automated checks on a class result.
    #[arg(long, value_name = "PERCENT")]
    pub fail_below: Option<f64>,

    /// Build and print the answer key without grading
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .examgrader.toml configuration file
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
    /// Default report file name for the format.
    pub fn default_output(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "grade_report.md",
            OutputFormat::Json => "grade_report.json",
        }
    }
}

/// Rounding mode for --rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RoundingArg {
    /// Round to the nearest point, halves round up
    Nearest,
    /// Drop the fractional part
    Floor,
}

impl From<RoundingArg> for RoundingPolicy {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Nearest => RoundingPolicy::Nearest,
            RoundingArg::Floor => RoundingPolicy::Floor,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate input files
        for path in [&self.exam, &self.standard].into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("File does not exist: {}", path.display()));
            }
        }
        if let Some(ref answers) = self.answers {
            if !answers.exists() {
                return Err(format!(
                    "Answer sheet path does not exist: {}",
                    answers.display()
                ));
            }
        }

        // Validate Ollama URL format
        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate temperature range
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_score == Some(0) {
            return Err("Max score must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(rate) = self.fail_below {
            if !(0.0..=100.0).contains(&rate) {
                return Err("--fail-below must be between 0 and 100".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Human-readable exam title for the report.
    pub fn exam_title(&self) -> String {
        self.exam
            .as_ref()
            .or(self.standard.as_ref())
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Exam".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            exam: None,
            standard: None,
            answers: None,
            output: None,
            save_standard: None,
            format: OutputFormat::Markdown,
            config: None,
            model: None,
            ollama_url: None,
            temperature: None,
            timeout: None,
            max_score: None,
            pass_threshold: None,
            rounding: None,
            strict_matching: false,
            concurrency: None,
            analyze_students: false,
            no_student_details: false,
            fail_below: None,
            dry_run: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_minimal_invocation() {
        let args = Args::try_parse_from(["examgrader", "--exam", "e.json", "--answers", "a/"])
            .unwrap();
        assert_eq!(args.exam, Some(PathBuf::from("e.json")));
        assert_eq!(args.format, OutputFormat::Markdown);
        assert!(!args.analyze_students);
    }

    #[test]
    fn test_answers_required_unless_dry_run() {
        assert!(Args::try_parse_from(["examgrader", "--exam", "e.json"]).is_err());
        assert!(Args::try_parse_from(["examgrader", "--exam", "e.json", "--dry-run"]).is_ok());
        assert!(Args::try_parse_from(["examgrader", "--init-config"]).is_ok());
    }

    #[test]
    fn test_exam_conflicts_with_standard() {
        let result = Args::try_parse_from([
            "examgrader", "--exam", "e.json", "--standard", "k.json", "--answers", "a",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_missing_file() {
        let mut args = make_args();
        args.exam = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        args.fail_below = Some(120.0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.max_score = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.ollama_url = Some("localhost:11434".into());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_rounding_help_names_default() {
        use clap::CommandFactory;

        let command = Args::command();
        let rounding = command
            .get_arguments()
            .find(|arg| arg.get_id() == "rounding")
            .unwrap();
        let help = rounding.get_help().unwrap().to_string();
        assert!(help.contains("nearest"));

        let args = Args::try_parse_from([
            "examgrader", "--exam", "e.json", "--answers", "a/", "--rounding", "floor",
        ])
        .unwrap();
        assert_eq!(args.rounding.map(RoundingPolicy::from), Some(RoundingPolicy::Floor));
    }

    #[test]
    fn test_exam_title() {
        let mut args = make_args();
        assert_eq!(args.exam_title(), "Exam");
        args.standard = Some(PathBuf::from("keys/midterm-2024.json"));
        assert_eq!(args.exam_title(), "midterm-2024");
    }
}
