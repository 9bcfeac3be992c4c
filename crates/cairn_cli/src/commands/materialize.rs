//! Materializing stored names: link and pull.

use super::{print_errors, report_line, spinner, Context};
use anyhow::{Context as _, Result};
use cairn_core::MaterializeReport;
use console::style;
use std::path::Path;

/// Hardlink names under `prefix` into `dest`.
pub fn link(ctx: &Context, dest: &Path, prefix: &str) -> Result<()> {
    let repo = ctx.open()?;
    let pb = spinner("Linking...")?;
    let tick = pb.clone();
    let report = repo
        .link(dest, prefix, Some(&move |_: usize, name: &str| tick.set_message(name.to_string())))
        .context("Link failed")?;
    pb.finish_and_clear();
    print_report("Link Report:", &report);
    Ok(())
}

/// Copy names under `prefix` into `dest`.
pub fn pull(ctx: &Context, dest: &Path, prefix: &str) -> Result<()> {
    let repo = ctx.open()?;
    let pb = spinner("Pulling...")?;
    let tick = pb.clone();
    let report = repo
        .pull(dest, prefix, Some(&move |_: usize, name: &str| tick.set_message(name.to_string())))
        .context("Pull failed")?;
    pb.finish_and_clear();
    print_report("Pull Report:", &report);
    Ok(())
}

fn print_report(title: &str, report: &MaterializeReport) {
    println!("{}", style(title).bold());
    report_line("Created", report.created);
    report_line("Replaced", report.replaced);
    report_line("Left in place", report.existing);
    if report.existing > 0 && report.replaced == 0 {
        println!(
            "  {} Existing files are never overwritten without {}.",
            style("Tip:").cyan(),
            style("--force").cyan()
        );
    }
    print_errors(report.errors.iter().map(|(n, e)| (n, e)));
}
