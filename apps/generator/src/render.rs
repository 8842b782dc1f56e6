//! Terminal rendering of session state.

use std::fmt::Write as _;

use client_core::Session;
use shared::domain::{CostBreakdown, GenerationResult, GenerationStep};

pub fn progress_line(session: &Session) -> String {
    match session.step() {
        Some(step) => format!(
            "[{}/{}] {}... {}%",
            step.ordinal(),
            GenerationStep::ALL.len(),
            step.label(),
            session.progress()
        ),
        None => format!("Starting... {}%", session.progress()),
    }
}

/// One line per step: done, active or pending.
pub fn step_checklist(session: &Session) -> Vec<String> {
    let current = session.current_step();
    GenerationStep::ALL
        .into_iter()
        .map(|step| {
            let marker = match step.ordinal().cmp(&current) {
                std::cmp::Ordering::Less => "[x]",
                std::cmp::Ordering::Equal => "[>]",
                std::cmp::Ordering::Greater => "[ ]",
            };
            format!("{marker} {}", step.label())
        })
        .collect()
}

pub fn cost_lines(costs: &CostBreakdown) -> Vec<String> {
    vec![
        format!("Enhancement:    ${:.2}", costs.enhancement),
        format!("Side angles:    ${:.2}", costs.side_angles),
        format!("Video creation: ${:.2}", costs.video_creation),
        format!("Total:          ${:.2}", costs.total),
    ]
}

pub fn result_summary(result: &GenerationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Video: {}", result.video_url);
    for (label, image) in result.labelled_images() {
        let _ = writeln!(out, "{label}: {image}");
    }
    if let Some(costs) = &result.costs {
        let _ = writeln!(out, "Cost breakdown:");
        for line in cost_lines(costs) {
            let _ = writeln!(out, "  {line}");
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
