//! Import and copy commands.

use super::{print_errors, report_line, spinner, Context};
use anyhow::{Context as _, Result};
use cairn_core::ImportReport;
use console::style;
use std::path::PathBuf;

/// Import files on the repository's filesystem by hardlink.
pub fn import(ctx: &Context, paths: &[PathBuf], prefix: &str) -> Result<()> {
    let mut repo = ctx.open()?;
    let pb = spinner("Importing...")?;
    let tick = pb.clone();
    let report = repo
        .import(paths, prefix, Some(&move |n: usize, name: &str| {
            tick.set_message(format!("{} {}", n, name));
        }))
        .context("Import failed")?;
    pb.finish_and_clear();

    print_report("Import Report:", &report);
    Ok(())
}

/// Import files from another filesystem by copying them into the store.
pub fn copy(ctx: &Context, paths: &[PathBuf], prefix: &str) -> Result<()> {
    let mut repo = ctx.open()?;
    let pb = spinner("Copying...")?;
    let tick = pb.clone();
    let report = repo
        .copy(paths, prefix, Some(&move |n: usize, name: &str| {
            tick.set_message(format!("{} {}", n, name));
        }))
        .context("Copy failed")?;
    pb.finish_and_clear();

    print_report("Copy Report:", &report);
    Ok(())
}

fn print_report(title: &str, report: &ImportReport) {
    println!("{}", style(title).bold());
    report_line("Files", report.files);
    report_line("Stored", report.stored);
    report_line("Already stored", report.deduplicated);
    if report.relinked > 0 {
        report_line("Relinked", report.relinked);
    }
    report_line("Hashed", report.hashed);
    report_line("Names added", report.names_added);
    if report.skipped > 0 {
        report_line("Skipped non-files", report.skipped);
    }

    if !report.conflicts.is_empty() {
        println!();
        println!(
            "{} {} names map to other content and were kept:",
            style("⚠").yellow(),
            report.conflicts.len()
        );
        for name in &report.conflicts {
            println!("    {}", name);
        }
        println!(
            "  {} Re-run with {} to overwrite them.",
            style("Tip:").cyan(),
            style("--force").cyan()
        );
    }

    print_errors(report.errors.iter().map(|(p, e)| (p.display(), e)));
}
