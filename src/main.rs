//! ExamGrader - batch grading and analytics for English exams
//!
//! Builds a validated answer key from an exam, grades a class of answer
//! sheets against it in parallel, and reports class, question, and
//! student statistics with optional model-written student analyses.
//!
//! Exit codes:
//!   0 - Success (pass rate at or above --fail-below, or no --fail-below set)
//!   1 - Runtime error (extraction, integrity, I/O, connection, etc.)
//!   2 - Pass rate below --fail-below

mod agent;
mod analysis;
mod cli;
mod config;
mod error;
mod grading;
mod loader;
mod models;
mod report;
mod schema;

use agent::{ClientConfig, OllamaClient};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use error::GradingError;
use futures::stream::{self, StreamExt};
use grading::GradingOptions;
use indicatif::{ProgressBar, ProgressStyle};
use loader::{Source, SourceKind};
use models::{
    QualitativeAnalysis, Report, ReportMetadata, StandardAnswerSet, StudentAnswer, StudentInsight,
    StudentReport,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("ExamGrader v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_grading(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Grading failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .examgrader.toml.
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
    println!("   Edit it to customize the model, scoring, and report thresholds.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
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

/// Run the complete grading workflow. Returns exit code (0 or 2).
async fn run_grading(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    debug!("Effective config: {:?}", config);

    // Created on first use; JSON-only runs never talk to the model
    let mut client: Option<OllamaClient> = None;

    // Step 1: Build the answer key
    let answer_set = build_answer_set(&args, &config, &mut client).await?;
    let counts = answer_set.counts();
    println!(
        "📋 Answer key: {} questions (grammar {}, reading {}, language use {})",
        counts.total_questions, counts.grammar_count, counts.reading_count, counts.language_use_count
    );

    if let Some(ref path) = args.save_standard {
        let json = serde_json::to_string_pretty(&answer_set)
            .context("Failed to serialize answer key")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write answer key to {}", path.display()))?;
        println!("💾 Answer key saved to: {}", path.display());
    }

    if args.dry_run {
        return handle_dry_run(&answer_set);
    }

    // Step 2: Load answer sheets
    let answers_path = args
        .answers
        .clone()
        .context("--answers is required unless --dry-run is set")?;
    println!("\n📥 Loading answer sheets from: {}", answers_path.display());
    let students = load_students(&answers_path, &config, &mut client).await?;
    println!("   {} students loaded", students.len());

    // Step 3: Grade
    println!("\n✏️  Grading...");
    let options = GradingOptions::from(&config.grading);
    let batch = grading::grade_batch(&answer_set, &students, &options, config.general.concurrency)?;
    info!("Graded {} students", batch.len());

    // Step 4: Aggregate
    let statistics = analysis::population_statistics(&batch, config.grading.pass_threshold);
    let mut questions = analysis::question_statistics(&batch, &answer_set);
    analysis::sort_by_number(&mut questions);
    let question_summary = analysis::summarize_questions(
        &questions,
        config.report.high_accuracy_threshold,
        config.report.low_accuracy_threshold,
    );

    let ranked = batch.ranked();
    let insights: Vec<StudentInsight> = ranked
        .iter()
        .map(|result| analysis::compose_insight(result, &answer_set))
        .collect();

    // Step 5: Optional qualitative analysis
    let analyses = if args.analyze_students {
        let client = ensure_client(&mut client, &config)?;
        println!("\n🤖 Analyzing students with {}...", client.model_name());
        analyze_students(client, &insights, config.general.concurrency, !args.quiet).await
    } else {
        vec![None; insights.len()]
    };

    // Step 6: Build and write the report
    println!("\n📝 Generating report...");
    let duration = start_time.elapsed().as_secs_f64();

    let students: Vec<StudentReport> = ranked
        .into_iter()
        .cloned()
        .zip(insights)
        .zip(analyses)
        .map(|((result, insight), analysis)| StudentReport {
            result,
            insight,
            analysis,
        })
        .collect();

    let report = Report {
        metadata: ReportMetadata {
            exam_title: args.exam_title(),
            analysis_date: Utc::now(),
            answer_set_fingerprint: answer_set.fingerprint().to_string(),
            model_used: client.as_ref().map(|c| c.model_name().to_string()),
            max_score: batch.max_score,
            duration_seconds: duration,
        },
        answer_set,
        statistics,
        questions,
        question_summary,
        students,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, config.report.include_student_details)
        }
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let stats = &report.statistics;
    println!("\n📊 Class Summary:");
    println!("   Students: {}", stats.total_students);
    if let Some(average) = stats.average_score {
        println!("   Average: {:.1} / {}", average, report.metadata.max_score);
    }
    if let (Some(high), Some(low)) = (stats.highest_score, stats.lowest_score) {
        println!("   Highest: {} | Lowest: {}", high, low);
    }
    if let Some(pass_rate) = stats.pass_rate {
        println!("   Pass rate: {:.1}% (pass mark {})", pass_rate, stats.pass_threshold);
    }
    if let Some(number) = report.question_summary.hardest_question {
        println!(
            "   Hardest question: Q{} ({:.1}%)",
            number,
            report.question_summary.hardest_accuracy.unwrap_or(0.0)
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Grading complete! Report saved to: {}",
        output_path.display()
    );

    // Check --fail-below threshold
    if let Some(threshold) = args.fail_below {
        let pass_rate = stats.pass_rate.unwrap_or(0.0);
        if pass_rate < threshold {
            eprintln!(
                "\n⛔ Pass rate {:.1}% is below {:.1}%. Failing (exit code 2).",
                pass_rate, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Build the answer key from --standard or --exam.
async fn build_answer_set(
    args: &Args,
    config: &Config,
    client: &mut Option<OllamaClient>,
) -> Result<StandardAnswerSet> {
    let answer_set = if let Some(ref path) = args.standard {
        info!("Loading saved answer key: {}", path.display());
        let stored = loader::read_stored_answer_set(path)?;
        schema::restore(stored)?
    } else {
        let path = args
            .exam
            .as_ref()
            .context("Either --exam or --standard is required")?;
        let source = loader::read_exam(path)?;

        let raw = match source.kind {
            SourceKind::Json => loader::parse_exam_json(&source.content)?,
            SourceKind::Text => {
                let client = ensure_client(client, config)?;
                println!("🤖 Extracting questions with {}...", client.model_name());
                agent::extract_exam(client, &source.content).await?
            }
        };
        schema::normalize(&raw)?
    };

    if answer_set.is_empty() {
        return Err(GradingError::extraction("the answer key has no questions").into());
    }

    Ok(answer_set)
}

/// Handle --dry-run: print the answer key and exit.
fn handle_dry_run(answer_set: &StandardAnswerSet) -> Result<i32> {
    println!("\n🔍 Dry run: answer key (no grading)\n");

    for question in answer_set.questions() {
        let passage = question
            .passage_id
            .as_deref()
            .map(|id| format!(" [{}]", id))
            .unwrap_or_default();
        println!(
            "   Q{:<4} {:<14} {}{}",
            question.number,
            question.section.to_string(),
            question.correct_answer,
            passage
        );
    }

    if !answer_set.passages().is_empty() {
        println!("\n   Passages:");
        for passage in answer_set.passages() {
            println!(
                "     {} \"{}\" ({}): {:?}",
                passage.id, passage.title, passage.section, passage.question_numbers
            );
        }
    }

    println!("\n   Fingerprint: {}", answer_set.fingerprint());
    println!("\n✅ Dry run complete. No answer sheets were graded.");
    Ok(0)
}

/// Load and parse every answer sheet.
///
/// Any unreadable sheet fails the run, as does ending up with no students.
async fn load_students(
    path: &Path,
    config: &Config,
    client: &mut Option<OllamaClient>,
) -> Result<Vec<StudentAnswer>> {
    let sources = loader::discover_answer_sheets(path)?;
    info!("Found {} answer sheet files", sources.len());

    if sources.iter().any(|s| s.kind == SourceKind::Text) {
        ensure_client(client, config)?;
    }
    let client = client.as_ref();

    // `buffered` keeps file order so results follow the sheets
    let parsed: Vec<(String, Result<Vec<StudentAnswer>>)> = stream::iter(sources)
        .map(|source| async move {
            let students = parse_source(&source, client).await;
            (source.origin, students)
        })
        .buffered(config.general.concurrency.max(1))
        .collect()
        .await;

    let mut students = Vec::new();
    for (origin, result) in parsed {
        let found = result.with_context(|| format!("Failed to load answer sheet {}", origin))?;
        debug!("{}: {} students", origin, found.len());
        students.extend(found);
    }

    if students.is_empty() {
        return Err(GradingError::extraction(format!(
            "no students found in {}",
            path.display()
        ))
        .into());
    }

    Ok(students)
}

async fn parse_source(source: &Source, client: Option<&OllamaClient>) -> Result<Vec<StudentAnswer>> {
    match source.kind {
        SourceKind::Json => Ok(loader::parse_answer_sheet_json(&source.content, &source.origin)?),
        SourceKind::Text => {
            let client = client.context("No model client for text answer sheets")?;
            agent::extract_answer_sheet(client, &source.content, &source.origin).await
        }
    }
}

/// Run the qualitative analysis for every student with bounded concurrency.
///
/// Returns one entry per insight, in insight order. Failed students get
/// `None` and a warning.
async fn analyze_students(
    client: &OllamaClient,
    insights: &[StudentInsight],
    concurrency: usize,
    show_progress: bool,
) -> Vec<Option<QualitativeAnalysis>> {
    let progress_bar = if show_progress {
        let pb = ProgressBar::new(insights.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        Some(pb)
    } else {
        None
    };

    let mut results: Vec<(usize, Option<QualitativeAnalysis>)> = stream::iter(insights.iter().enumerate())
        .map(|(index, insight)| {
            let progress_bar = progress_bar.as_ref();
            async move {
                let analysis = match agent::analyze_student(client, insight).await {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        warn!("Analysis failed for {}: {:#}", insight.student_name, e);
                        None
                    }
                };
                if let Some(pb) = progress_bar {
                    pb.set_message(insight.student_name.clone());
                    pb.inc(1);
                }
                (index, analysis)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Analysis complete");
    }

    results.sort_by_key(|(index, _)| *index);
    let failed = results.iter().filter(|(_, a)| a.is_none()).count();
    if failed > 0 {
        eprintln!("⚠️  {} student analyses failed and were omitted", failed);
    }

    results.into_iter().map(|(_, analysis)| analysis).collect()
}

/// Create the model client on first use.
fn ensure_client<'a>(
    client: &'a mut Option<OllamaClient>,
    config: &Config,
) -> Result<&'a OllamaClient> {
    if client.is_none() {
        info!(
            "Using model {} at {}",
            config.model.name, config.model.ollama_url
        );
        *client = Some(OllamaClient::new(ClientConfig::from(&config.model))?);
    }
    client.as_ref().context("Model client was not created")
}

/// Report path: --output, then the config file, then the format default.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }
    match args.format {
        OutputFormat::Markdown => PathBuf::from(&config.general.output),
        OutputFormat::Json => PathBuf::from(args.format.default_output()),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
