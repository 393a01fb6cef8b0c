//! Output renderers for edit reports and job sequences.

use anyhow::anyhow;
use quire_editor::EditReport;
use quire_runtime::{JobRecord, JobSequence};
use serde::Serialize;

use crate::cli::{CliError, CliResult, OutputFormat};

pub(crate) fn render_report(report: &EditReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            for line in report_lines(report) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_sequence(sequence: &JobSequence, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(sequence)?,
        OutputFormat::Table => {
            for line in sequence_lines(sequence) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn report_lines(report: &EditReport) -> Vec<String> {
    let mut lines = vec![
        format!("status: {}", report.status.as_str()),
        format!("edit: {}", report.description),
    ];
    if let Some(sequence_id) = &report.sequence_id {
        lines.push(format!("sequence: {sequence_id}"));
    }
    if let Some(summary) = &report.summary {
        lines.push(format!("summary: {summary}"));
    }
    if let Some(created) = &report.created_id {
        lines.push(format!("created: {created}"));
    }
    if let Some(hash) = &report.commit_hash {
        lines.push(format!("commit: {hash}"));
    }
    if let Some(failure) = &report.failure {
        lines.push(format!(
            "failure: {} at {}: {}",
            failure.kind.as_str(),
            failure.state.as_str(),
            failure.message
        ));
    }
    for warning in &report.warnings {
        lines.push(format!(
            "warning: {}: {}",
            warning.state.as_str(),
            warning.message
        ));
    }
    if !report.states.is_empty() {
        lines.push(format!("  {:<24} {:<10} DETAIL", "STATE", "STATUS"));
        for record in &report.states {
            lines.push(
                format!(
                    "  {:<24} {:<10} {}",
                    record.state.as_str(),
                    record.status.as_str(),
                    record.detail.as_deref().unwrap_or("")
                )
                .trim_end()
                .to_string(),
            );
        }
    }
    lines
}

pub(crate) fn sequence_lines(sequence: &JobSequence) -> Vec<String> {
    let mut lines = vec![
        format!("sequence: {}", sequence.id),
        format!("course: {}", sequence.meta.course_id),
        format!("description: {}", sequence.meta.description),
        format!("status: {}", sequence.status.as_str()),
        format!("started: {}", sequence.created_at.to_rfc3339()),
    ];
    if let Some(finished) = &sequence.finished_at {
        lines.push(format!("finished: {}", finished.to_rfc3339()));
    }
    lines.push(format!(
        "  {:>3} {:<24} {:<10} {:>4} DESCRIPTION",
        "#", "KIND", "STATUS", "EXIT"
    ));
    for job in &sequence.jobs {
        lines.push(job_line(job));
        if let Some(error) = &job.error {
            lines.push(format!("      error: {error}"));
        }
    }
    lines
}

fn job_line(job: &JobRecord) -> String {
    let exit = job
        .exit_code
        .map_or_else(|| "-".to_string(), |code| code.to_string());
    format!(
        "  {:>3} {:<24} {:<10} {:>4} {}",
        job.number,
        job.kind,
        job.status.as_str(),
        exit,
        job.description
    )
}
