use colored::{ColoredString, Colorize};

use super::OutputFormat;
use crate::outcome::{DispatchResult, TaskOutcome, TaskStatus};

fn status_label(status: TaskStatus) -> ColoredString {
    let label = format!("{:<16}", status.as_str());
    match status {
        TaskStatus::Success => label.bold().green(),
        TaskStatus::EmptyResult => label.bold().yellow(),
        TaskStatus::ToolMissing | TaskStatus::ExecutionFailed => label.bold().red(),
    }
}

fn outcome_line(outcome: &TaskOutcome) -> String {
    let what = match (&outcome.output_path, &outcome.detail) {
        (Some(path), _) => path.display().to_string(),
        (None, Some(detail)) => detail.lines().next().unwrap_or_default().to_string(),
        (None, None) => String::new(),
    };
    format!(
        ":: {:<14}: {} {:>6.1}s  {}",
        outcome.kind.as_str(),
        status_label(outcome.status),
        outcome.elapsed.as_secs_f64(),
        what
    )
}

pub fn render_text(result: &DispatchResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(":: Target        : {}\n", result.target));
    for outcome in &result.outcomes {
        out.push_str(&outcome_line(outcome));
        out.push('\n');
    }
    out.push_str(&format!(
        ":: Completed     : {} ok, {} empty, {} failed\n",
        result.count(TaskStatus::Success),
        result.count(TaskStatus::EmptyResult),
        result.failures().count()
    ));
    out
}

pub fn render_json(result: &DispatchResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
}

pub fn render(result: &DispatchResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(result),
        OutputFormat::Json => render_json(result),
    }
}
