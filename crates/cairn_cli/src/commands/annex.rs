//! git-annex bridge commands.

use super::{print_errors, report_line, spinner, Context};
use anyhow::{Context as _, Result};
use console::style;
use std::path::PathBuf;

/// Restore annex objects behind annex symlinks from the repository.
pub fn fix(ctx: &Context, paths: &[PathBuf]) -> Result<()> {
    let repo = ctx.open()?;
    let pb = spinner("Checking annex links...")?;
    let report = repo.annex_fix(paths).context("annex-fix failed")?;
    pb.finish_and_clear();

    println!("{}", style("Annex Fix Report:").bold());
    report_line("Linked", report.linked);
    report_line("Replaced", report.replaced);
    report_line("Already present", report.present);
    report_line("Not in repository", report.not_in_repository);
    report_line("Not annex links", report.skipped);
    print_errors(report.errors.iter().map(|(p, e)| (p.display(), e)));
    Ok(())
}

/// Move hash-cached files into the annex.
pub fn add(ctx: &Context, paths: &[PathBuf]) -> Result<()> {
    let repo = ctx.open()?;
    let pb = spinner("Adding to annex...")?;
    let report = repo.annex_add(paths).context("annex-add failed")?;
    pb.finish_and_clear();

    println!("{}", style("Annex Add Report:").bold());
    report_line("Added", report.added);
    report_line("Already annexed", report.already_annexed);
    if report.skipped > 0 {
        println!(
            "  {:<20} {}",
            "No cached digest:",
            style(report.skipped).yellow()
        );
        println!(
            "  {} Import the files first so their digest is cached.",
            style("Tip:").cyan()
        );
    }
    print_errors(report.errors.iter().map(|(p, e)| (p.display(), e)));
    Ok(())
}
