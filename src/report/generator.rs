//! Markdown and JSON report generation.
//!
//! This module renders a finished grading report for teachers. It only
//! formats values computed upstream; nothing is recalculated here except
//! display ordering.

use crate::analysis::ScoreBucket;
use crate::models::{
    Outcome, PopulationStatistics, QualitativeAnalysis, QuestionStatistic, QuestionSummary,
    Report, ReportMetadata, Section, SectionCounts, StudentReport,
};
use anyhow::Result;

/// Generate a complete Markdown report.
///
/// Per-student sections are rendered only when `include_student_details`
/// is set; the ranked results table is always present.
pub fn generate_markdown_report(report: &Report, include_student_details: bool) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# Grading Report: {}\n\n", report.metadata.exam_title));

    output.push_str(&generate_metadata_section(&report.metadata, report.students.len()));
    output.push_str(&generate_table_of_contents(include_student_details && !report.students.is_empty()));
    output.push_str(&generate_overview_section(&report.answer_set.counts()));
    output.push_str(&generate_statistics_section(&report.statistics, report.metadata.max_score));
    output.push_str(&generate_questions_section(&report.questions, &report.question_summary));

    output.push_str(&generate_results_section(&report.students));

    if include_student_details && !report.students.is_empty() {
        output.push_str("## Student Details\n\n");
        for student in &report.students {
            output.push_str(&generate_student_section(student, report.metadata.max_score));
        }
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, students: usize) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Exam:** {}\n", metadata.exam_title));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Answer Key:** `{}`\n",
        short_fingerprint(&metadata.answer_set_fingerprint)
    ));
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push_str(&format!("- **Students Graded:** {}\n", students));
    section.push_str(&format!("- **Max Score:** {}\n", metadata.max_score));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(with_details: bool) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Exam Overview](#exam-overview)\n");
    toc.push_str("- [Class Statistics](#class-statistics)\n");
    toc.push_str("- [Question Performance](#question-performance)\n");
    toc.push_str("- [Student Results](#student-results)\n");
    if with_details {
        toc.push_str("- [Student Details](#student-details)\n");
    }
    toc.push('\n');

    toc
}

/// Generate the exam overview with per-section question counts.
fn generate_overview_section(counts: &SectionCounts) -> String {
    let mut section = String::new();

    section.push_str("## Exam Overview\n\n");
    section.push_str("| Section | Questions |\n");
    section.push_str("|:---|:---:|\n");
    for s in Section::ALL {
        section.push_str(&format!("| {} | {} |\n", s, counts.for_section(s)));
    }
    section.push_str(&format!("| **Total** | **{}** |\n\n", counts.total_questions));

    section
}

/// Generate class statistics and the score distribution.
fn generate_statistics_section(stats: &PopulationStatistics, max_score: u32) -> String {
    let mut section = String::new();

    section.push_str("## Class Statistics\n\n");

    if stats.is_empty {
        section.push_str("No answer sheets were graded.\n\n");
        return section;
    }

    section.push_str(&format!("- **Students:** {}\n", stats.total_students));
    section.push_str(&format!(
        "- **Average Score:** {} / {}\n",
        fmt_decimal(stats.average_score),
        max_score
    ));
    section.push_str(&format!(
        "- **Highest Score:** {}\n",
        fmt_score(stats.highest_score)
    ));
    section.push_str(&format!(
        "- **Lowest Score:** {}\n",
        fmt_score(stats.lowest_score)
    ));
    section.push_str(&format!(
        "- **Pass Rate:** {} (pass mark {})\n\n",
        fmt_percent(stats.pass_rate),
        stats.pass_threshold
    ));

    section.push_str("### Score Distribution\n\n");
    section.push_str("| Range (%) | Students | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for bucket in ScoreBucket::ALL {
        let count = stats
            .score_distribution
            .get(bucket.label())
            .copied()
            .unwrap_or(0);
        let share = count as f64 / stats.total_students as f64 * 100.0;
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            bucket.label(),
            count,
            share
        ));
    }
    section.push('\n');

    section
}

/// Generate the per-question table and its summary.
fn generate_questions_section(questions: &[QuestionStatistic], summary: &QuestionSummary) -> String {
    let mut section = String::new();

    section.push_str("## Question Performance\n\n");

    if questions.is_empty() {
        section.push_str("No question statistics are available.\n\n");
        return section;
    }

    section.push_str(&format!(
        "- **Average Accuracy:** {}\n",
        fmt_percent(summary.average_accuracy)
    ));
    if let Some(number) = summary.hardest_question {
        section.push_str(&format!(
            "- **Hardest Question:** Q{} ({})\n",
            number,
            fmt_percent(summary.hardest_accuracy)
        ));
    }
    section.push_str(&format!(
        "- **High Accuracy (>= {:.0}%):** {} questions\n",
        summary.high_accuracy_threshold, summary.high_accuracy_count
    ));
    section.push_str(&format!(
        "- **Low Accuracy (< {:.0}%):** {} questions\n\n",
        summary.low_accuracy_threshold, summary.low_accuracy_count
    ));

    section.push_str("| Question | Answer | Correct | Wrong | Missing | Accuracy |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    for q in questions {
        let flag = match q.accuracy_rate {
            Some(rate) if rate < summary.low_accuracy_threshold => " ⚠️",
            _ => "",
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {}{} |\n",
            q.question_number,
            q.correct_answer,
            q.correct_count,
            q.wrong_count,
            q.missing_count,
            fmt_percent(q.accuracy_rate),
            flag
        ));
    }
    section.push('\n');

    section
}

/// Generate the results table. Students are already ranked.
fn generate_results_section(ranked: &[StudentReport]) -> String {
    let mut section = String::new();

    section.push_str("## Student Results\n\n");

    if ranked.is_empty() {
        section.push_str("No students were graded.\n\n");
        return section;
    }

    section.push_str("| Rank | Student | Score | Correct | Wrong | Missing |\n");
    section.push_str("|:---:|:---|:---:|:---:|:---:|:---:|\n");
    for (i, student) in ranked.iter().enumerate() {
        let r = &student.result;
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            i + 1,
            escape_cell(&r.student_name),
            r.score,
            r.correct_count,
            r.wrong_count,
            r.missing_count
        ));
    }
    section.push('\n');

    section
}

/// Generate the detail block for one student.
fn generate_student_section(student: &StudentReport, max_score: u32) -> String {
    let mut section = String::new();
    let insight = &student.insight;

    section.push_str(&format!(
        "### {} ({} / {})\n\n",
        insight.student_name, insight.score, max_score
    ));
    section.push_str(&format!(
        "{} of {} questions correct.\n\n",
        student.result.correct_count,
        student.result.total_questions()
    ));

    section.push_str("| Section | Correct | Wrong | Missing | Sub-score |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for rollup in Section::ALL
        .iter()
        .filter_map(|s| insight.subject(*s))
        .filter(|s| s.total > 0)
    {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            rollup.section,
            rollup.correct,
            rollup.wrong,
            rollup.missing,
            fmt_percent(rollup.sub_score)
        ));
    }
    section.push('\n');

    let misses: Vec<String> = insight
        .evidence
        .iter()
        .filter(|e| e.outcome != Outcome::Correct)
        .map(|e| match e.submitted {
            Some(ref answer) => format!("Q{} {} {} (key {})", e.number, e.outcome.symbol(), answer, e.correct_answer),
            None => format!("Q{} {} (key {})", e.number, e.outcome.symbol(), e.correct_answer),
        })
        .collect();
    if !misses.is_empty() {
        section.push_str(&format!("**Missed:** {}\n\n", misses.join(", ")));
    }

    if let Some(ref analysis) = student.analysis {
        section.push_str(&generate_analysis_block(analysis));
    }

    section.push_str("---\n\n");

    section
}

/// Render a qualitative analysis narrative.
fn generate_analysis_block(analysis: &QualitativeAnalysis) -> String {
    let mut block = String::new();

    if !analysis.overall_assessment.is_empty() {
        block.push_str(&format!("> {}\n\n", analysis.overall_assessment));
    }

    push_list(&mut block, "Strengths", &analysis.strengths);
    push_list(&mut block, "Weaknesses", &analysis.weaknesses);

    if !analysis.subject_abilities.is_empty() {
        block.push_str("**Subject Abilities:**\n\n");
        for (subject, ability) in &analysis.subject_abilities {
            let score = ability
                .score
                .map(|s| format!(" ({:.0})", s))
                .unwrap_or_default();
            block.push_str(&format!("- *{}*{}: {}\n", subject, score, ability.analysis));
        }
        block.push('\n');
    }

    push_list(&mut block, "Error Patterns", &analysis.error_patterns);
    push_list(&mut block, "Suggestions", &analysis.improvement_suggestions);

    block
}

fn push_list(block: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    block.push_str(&format!("**{}:**\n\n", title));
    for item in items {
        block.push_str(&format!("- {}\n", item));
    }
    block.push('\n');
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by ExamGrader v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn fmt_percent(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}%", v)).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_decimal(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_score(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string())
}
