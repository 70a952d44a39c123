//! Output formatting for netcheck

use crate::resources::{status_category, StatusCategory, Tabular};
use crate::suite::{Spec, SuiteReport};
use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

/// Format a list of resources as a table
pub fn format_table<T: Tabular>(resources: &[T]) -> String {
    if resources.is_empty() {
        return "No resources found".to_string();
    }

    let rows: Vec<Vec<String>> = resources
        .iter()
        .map(|r| {
            let row = r.row();
            // Apply coloring to status column if applicable
            if let Some(status) = r.status_for_color() {
                row.into_iter()
                    .map(|cell| {
                        if cell == status {
                            colorize_status(&cell)
                        } else {
                            cell
                        }
                    })
                    .collect()
            } else {
                row
            }
        })
        .collect();

    format_table_raw(&T::headers(), &rows)
}

/// Format raw headers and rows as a table
pub fn format_table_raw(headers: &[&str], rows: &[Vec<String>]) -> String {
    let num_cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < num_cols {
                widths[i] = widths[i].max(strip_ansi_codes(cell).chars().count());
            }
        }
    }

    let mut output = String::new();

    let mut header_line = String::new();
    for (i, header) in headers.iter().enumerate() {
        let padding = widths[i].saturating_sub(header.len());
        header_line.push_str(header);
        header_line.push_str(&" ".repeat(padding + 2));
    }
    output.push_str(&bold(header_line.trim_end()));
    output.push('\n');

    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            if i < num_cols {
                let stripped_len = strip_ansi_codes(cell).chars().count();
                let padding = widths[i].saturating_sub(stripped_len);
                line.push_str(cell);
                line.push_str(&" ".repeat(padding + 2));
            }
        }
        output.push_str(line.trim_end());
        output.push('\n');
    }

    output.trim_end().to_string()
}

/// Strip ANSI escape codes for length calculation
pub fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut in_escape = false;

    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c == 'm' {
                in_escape = false;
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Style text for stdout, honoring `--no-color` and non-terminal output
fn paint(text: &str, style: Style) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.style(style))
        .to_string()
}

fn bold(text: &str) -> String {
    paint(text, Style::new().bold())
}

/// Colorize a status string based on its category
pub fn colorize_status(status: &str) -> String {
    match status_category(status) {
        StatusCategory::Healthy => paint(status, Style::new().green()),
        StatusCategory::Warning => paint(status, Style::new().yellow()),
        StatusCategory::Error => paint(status, Style::new().red()),
        StatusCategory::Unknown => status.to_string(),
    }
}

pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

pub fn format_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}

/// Serializable description of a registered spec
#[derive(Debug, Clone, Serialize)]
pub struct SpecSummary {
    pub index: usize,
    /// Parallel process that owns the spec
    pub process: usize,
    pub container: Vec<String>,
    pub text: String,
    pub full_text: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
}

impl SpecSummary {
    pub fn new(index: usize, spec: &Spec, parallel_total: usize) -> Self {
        Self {
            index,
            process: index % parallel_total.max(1) + 1,
            container: spec.container.clone(),
            text: spec.text.clone(),
            full_text: spec.full_text(),
            tags: spec.tags(),
            test_id: spec.test_id(),
        }
    }
}

/// Table of specs: index, owning process, tags and full text
pub fn format_spec_list(specs: &[SpecSummary]) -> String {
    if specs.is_empty() {
        return "No specs matched".to_string();
    }
    let rows: Vec<Vec<String>> = specs
        .iter()
        .map(|s| {
            vec![
                s.index.to_string(),
                s.process.to_string(),
                s.tags.join(","),
                s.full_text.clone(),
            ]
        })
        .collect();
    format_table_raw(&["INDEX", "PROCESS", "TAGS", "SPEC"], &rows)
}

/// Multi-line description of one spec
pub fn format_spec_detail(spec: &SpecSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}  {}\n", bold("Spec:"), spec.text));
    out.push_str(&format!("{}  {}\n", bold("Index:"), spec.index));
    out.push_str(&format!("{}  {}\n", bold("Process:"), spec.process));
    out.push_str(&format!("{}\n", bold("Containers:")));
    for (depth, container) in spec.container.iter().enumerate() {
        out.push_str(&format!("{}{}\n", "  ".repeat(depth + 1), container));
    }
    if !spec.tags.is_empty() {
        out.push_str(&format!("{}  {}\n", bold("Tags:"), spec.tags.join(", ")));
    }
    if let Some(id) = &spec.test_id {
        out.push_str(&format!("{}  {}\n", bold("Test ID:"), id));
    }
    out.trim_end().to_string()
}

/// Per-spec results followed by a one-line tally
pub fn format_run_summary(report: &SuiteReport) -> String {
    let mut rows: Vec<Vec<String>> = report
        .specs
        .iter()
        .map(|s| {
            vec![
                colorize_status(&s.state.to_string()),
                format!("{:.1}s", s.duration_secs),
                s.full_text.clone(),
            ]
        })
        .collect();
    if let Some(msg) = &report.setup_failure {
        rows.insert(0, vec![colorize_status("Failed"), "-".to_string(), format!("[BeforeSuite] {}", msg)]);
    }
    if let Some(msg) = &report.teardown_failure {
        rows.push(vec![colorize_status("Failed"), "-".to_string(), format!("[AfterSuite] {}", msg)]);
    }

    let counts = report.counts();
    let verdict = if report.succeeded() {
        paint("SUCCESS!", Style::new().green().bold())
    } else {
        paint("FAIL!", Style::new().red().bold())
    };
    let mut out = if rows.is_empty() {
        "No specs ran".to_string()
    } else {
        format_table_raw(&["STATE", "TIME", "SPEC"], &rows)
    };
    out.push_str(&format!(
        "\n\n{} -- {} Passed | {} Failed | {} Errored | {} Skipped ({:.1}s)",
        verdict, counts.passed, counts.failed, counts.errored, counts.skipped, report.duration_secs
    ));
    out
}

/// Failure messages of the specs that did not pass
pub fn format_failures(report: &SuiteReport) -> Vec<String> {
    report
        .specs
        .iter()
        .filter(|s| s.is_failure())
        .map(|s| {
            format!(
                "[{}] {}\n  {}",
                s.state,
                s.full_text,
                s.failure.as_deref().unwrap_or("no message")
            )
        })
        .collect()
}
