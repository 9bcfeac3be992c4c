//! Repair commands: fix-times, fix-paths, reindex.

use super::{print_errors, report_line, spinner, Context};
use anyhow::{Context as _, Result};
use console::style;

/// Reset object mtimes to the recorded ones.
pub fn fix_times(ctx: &Context) -> Result<()> {
    let repo = ctx.open()?;
    let report = repo.fix_times().context("Failed to fix times")?;
    println!("{}", style("Fix Times Report:").bold());
    report_line("Objects checked", report.checked);
    report_line("Times reset", report.fixed);
    if report.missing > 0 {
        println!(
            "  {:<20} {}",
            "Missing objects:",
            style(report.missing).yellow()
        );
    }
    Ok(())
}

/// Normalize names.
pub fn fix_paths(ctx: &Context) -> Result<()> {
    let mut repo = ctx.open()?;
    let report = repo.fix_paths();
    println!("{}", style("Fix Paths Report:").bold());
    report_line("Renamed", report.renamed);
    report_line("Merged", report.merged);
    if !report.collisions.is_empty() {
        println!();
        println!("{} Left alone, the clean name is taken:", style("⚠").yellow());
        for name in &report.collisions {
            println!("    {}", name.escape_debug());
        }
    }
    ctx.commit(&mut repo)
}

/// Fold legacy sidecars into the index.
pub fn reindex(ctx: &Context) -> Result<()> {
    let mut repo = ctx.open()?;
    let pb = spinner("Reading sidecars...")?;
    let report = repo.reindex().context("Reindex failed")?;
    pb.finish_and_clear();

    println!("{}", style("Reindex Report:").bold());
    report_line("Sidecars read", report.sidecars);
    report_line("Names added", report.names_added);
    report_line("Names suffixed", report.names_suffixed);
    report_line("Unindexed objects", report.unindexed_objects);
    print_errors(report.errors.iter().map(|e| ("sidecar", e)));
    ctx.commit(&mut repo)
}
