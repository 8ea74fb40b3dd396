//! Plain-text rendering of lifecycle reports and status snapshots.

use std::fmt::Write;

use dl_core::models::{DevConfig, DownReport, StatusSnapshot, UpReport, Warning};

/// Left-aligned columns separated by two spaces. The last column is not
/// padded so lines carry no trailing whitespace.
fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    for row in std::iter::once(&header).chain(rows) {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            if i + 1 == row.len() {
                line.push_str(cell);
            } else {
                let _ = write!(line, "{cell:<width$}  ", width = widths[i]);
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn warnings(out: &mut String, warnings: &[Warning]) {
    if warnings.is_empty() {
        return;
    }
    out.push('\n');
    for warning in warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
}

pub fn render_up(report: &UpReport, config: &DevConfig) -> String {
    let mut out = String::new();
    let total = report.allocation.len();
    if report.reused {
        let _ = writeln!(out, "Reusing running session '{}'.", config.session);
    } else if report.launched.len() == total {
        let _ = writeln!(
            out,
            "Session '{}' is up with {total} components.",
            config.session
        );
    } else {
        let _ = writeln!(
            out,
            "Session '{}' is up with {} of {total} components.",
            config.session,
            report.launched.len()
        );
    }
    out.push('\n');

    let rows: Vec<Vec<String>> = report
        .allocation
        .entries()
        .iter()
        .map(|entry| {
            let state = if report.reused {
                "reused"
            } else if report.launched.contains(&entry.name) {
                "started"
            } else {
                "failed"
            };
            vec![
                entry.name.clone(),
                entry.port.to_string(),
                state.to_string(),
                config.ui.url_for(entry.port),
            ]
        })
        .collect();
    out.push_str(&table(&["COMPONENT", "PORT", "STATE", "UI"], &rows));

    warnings(&mut out, &report.warnings);
    let _ = writeln!(out, "\nAttach with `tmux attach -t {}`.", config.session);
    out
}

pub fn render_down(report: &DownReport, session: &str) -> String {
    let mut out = String::new();
    if report.session_found {
        let _ = writeln!(
            out,
            "Stopped {} component windows and closed session '{session}'.",
            report.stopped.len()
        );
    } else {
        let _ = writeln!(out, "No session '{session}' was running.");
    }
    if report.cleaned_up {
        let _ = writeln!(
            out,
            "Cleanup finished; reaped {} leftover processes.",
            report.reaped_processes
        );
    }
    warnings(&mut out, &report.warnings);
    out
}

fn ready(flag: bool) -> &'static str {
    if flag {
        "ready"
    } else {
        "down"
    }
}

pub fn render_status(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    let session_state = if snapshot.session_exists {
        "running"
    } else {
        "not running"
    };
    let _ = writeln!(out, "Session   {} ({session_state})", snapshot.session);
    let _ = writeln!(out, "Registry  {}", ready(snapshot.registry_ready));
    let _ = writeln!(out, "Cluster   {}", ready(snapshot.cluster_ready));
    out.push('\n');

    let rows: Vec<Vec<String>> = snapshot
        .components
        .iter()
        .map(|c| {
            let name = if c.prerequisite {
                format!("{} *", c.name)
            } else {
                c.name.clone()
            };
            let (window, process, ui) = if c.window {
                (
                    "open",
                    if c.backed { "running" } else { "exited" },
                    ready(c.ui_ready),
                )
            } else {
                ("-", "-", "-")
            };
            vec![
                name,
                c.port.to_string(),
                window.to_string(),
                process.to_string(),
                ui.to_string(),
            ]
        })
        .collect();
    out.push_str(&table(
        &["COMPONENT", "PORT", "WINDOW", "PROCESS", "UI"],
        &rows,
    ));

    if !snapshot.drift.is_empty() {
        out.push('\n');
        for drift in &snapshot.drift {
            let _ = writeln!(out, "drift: {drift}");
        }
    }
    out
}
