//! Repository scrub command.

use super::{progress_bar, report_line, Context};
use anyhow::{Context as _, Result};
use cairn_core::{Digest, ScrubOptions, ScrubStatus};
use console::style;

/// Verify stored objects against their metadata.
pub fn run(
    ctx: &Context,
    fast: bool,
    modified: bool,
    resume: Option<&str>,
    max_size: Option<u64>,
) -> Result<()> {
    let repo = ctx.open()?;
    let resume_from = resume
        .map(|hex| hex.parse::<Digest>())
        .transpose()
        .context("Invalid --resume digest")?;
    let options = ScrubOptions {
        fast,
        modified_only: modified,
        resume_from,
        max_size,
        error_log: None,
    };

    let pb = progress_bar(repo.index().meta().len() as u64)?;
    let pb_clone = pb.clone();
    let report = repo.scrub(
        &options,
        Some(&move |current: usize, _total: usize, digest: &Digest| {
            pb_clone.set_position(current as u64);
            pb_clone.set_message(digest.as_hex());
        }),
    )?;
    pb.finish_and_clear();

    println!();
    println!("{}", style("Scrub Report:").bold());
    report_line("Digests", report.total);
    report_line("Checked", report.checked);
    report_line("Skipped", report.skipped);
    if report.cache_repaired > 0 {
        report_line("Caches repaired", report.cache_repaired);
    }

    if !report.failures.is_empty() {
        println!();
        for (digest, status) in &report.failures {
            let mark = match status {
                ScrubStatus::ChecksumMismatch { .. } => style("×").red().bold(),
                _ => style("×").red(),
            };
            println!("  {} {} {}", mark, digest, status);
        }
    }

    println!();
    if report.has_issues() {
        println!("{}", style(report.summary()).yellow().bold());
        println!(
            "  {} Findings were appended to {}",
            style("→").cyan(),
            repo.root().join(&repo.config().scrub.error_log).display()
        );
        println!(
            "  {} Run {} to drop entries whose object is gone",
            style("→").cyan(),
            style("cairn clean-missing").cyan()
        );
    } else {
        println!("{} {}", style("✓").green(), style(report.summary()).green());
    }

    Ok(())
}
