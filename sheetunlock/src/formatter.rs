//! Output formatters for unlock results

use anyhow::Result;
use colored::*;
use sheetunlock_core::{BatchReport, OperationResult};

/// Print results in human-readable format with colors
pub fn print_human(report: &BatchReport, dry_run: bool) {
    if dry_run {
        println!("{}", "[DRY RUN] No file will be modified.".bold());
        println!();
    }

    for result in &report.results {
        print_result(result);
    }

    if report.results.len() != 1 {
        println!();
        let summary = report.summary();
        if report.all_succeeded() {
            println!("{}", summary.green().bold());
        } else {
            println!("{}", summary.red().bold());
        }
    }
}

fn print_result(result: &OperationResult) {
    if result.is_success() {
        println!("{} {}", "✓".green().bold(), result.message);
    } else {
        let stage = result
            .failed_at
            .map(|s| format!("{:?}", s))
            .unwrap_or_default();
        println!(
            "{} {} {}",
            "✗".red().bold(),
            format!("[{}]", stage).bright_black(),
            result.message
        );
    }
}

/// Print results in JSON format
pub fn print_json(report: &BatchReport, dry_run: bool) -> Result<()> {
    let output = serde_json::json!({
        "dry_run": dry_run,
        "results": report.results,
        "summary": {
            "total": report.results.len(),
            "succeeded": report.succeeded(),
            "failed": report.failed(),
            "all_succeeded": report.all_succeeded(),
            "message": report.summary(),
        }
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
