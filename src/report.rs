//! Report rendering for verification runs
//!
//! Text mode prints one table per environment with pass/fail coloring;
//! JSON mode emits the raw check records for downstream tooling.

use crate::error::Result;
use crate::stages::EnvOutcome;
use chrono::Utc;
use comfy_table::{Cell, Table};
use console::style;
use serde_json::json;

/// Print all outcomes in the requested format and return whether every
/// environment passed
pub fn render(outcomes: &[EnvOutcome], output_format: &str) -> Result<bool> {
    if output_format == "json" {
        render_json(outcomes)
    } else {
        render_table(outcomes)
    }
}

fn render_json(outcomes: &[EnvOutcome]) -> Result<bool> {
    let mut all_passed = true;
    let mut environments = Vec::new();

    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                if !report.passed() {
                    all_passed = false;
                }
                environments.push(json!({
                    "environment": outcome.environment.clone(),
                    "passed": report.passed(),
                    "checks": report.checks.clone(),
                }));
            }
            Err(e) => {
                all_passed = false;
                environments.push(json!({
                    "environment": outcome.environment.clone(),
                    "passed": false,
                    "error": e.to_string(),
                }));
            }
        }
    }

    let doc = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "passed": all_passed,
        "environments": environments,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(all_passed)
}

fn render_table(outcomes: &[EnvOutcome]) -> Result<bool> {
    let mut all_passed = true;

    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                let mut table = Table::new();
                table.set_header(vec!["Check", "Expected", "Actual", "Result"]);
                for check in &report.checks {
                    let result_cell = if check.passed {
                        Cell::new("PASS").fg(comfy_table::Color::Green)
                    } else {
                        Cell::new("FAIL").fg(comfy_table::Color::Red)
                    };
                    table.add_row(vec![
                        Cell::new(&check.name),
                        Cell::new(&check.expected),
                        Cell::new(&check.actual),
                        result_cell,
                    ]);
                }

                let headline = if report.passed() {
                    style(format!("{}: all checks passed", outcome.environment)).green()
                } else {
                    all_passed = false;
                    style(format!(
                        "{}: {} check(s) failed",
                        outcome.environment,
                        report.failures().len()
                    ))
                    .red()
                };
                println!("\n{}", headline);
                println!("{table}");
            }
            Err(e) => {
                all_passed = false;
                println!(
                    "\n{}",
                    style(format!("{}: error - {}", outcome.environment, e)).red()
                );
            }
        }
    }

    Ok(all_passed)
}
