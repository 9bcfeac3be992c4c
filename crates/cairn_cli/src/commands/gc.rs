//! Garbage collection and dangling-entry cleanup.

use super::{print_errors, progress_bar, report_line, Context};
use anyhow::Result;
use console::style;

/// Delete objects that no name refers to.
pub fn gc(ctx: &Context) -> Result<()> {
    let mut repo = ctx.open()?;

    let pb = progress_bar(0)?;
    let pb_clone = pb.clone();
    let report = repo.gc(Some(&move |current: usize, total: usize, digest: &str| {
        pb_clone.set_length(total as u64);
        pb_clone.set_position(current as u64);
        pb_clone.set_message(digest.to_string());
    }))?;
    pb.finish_and_clear();

    println!("{}", style("Garbage Collection Report:").bold());
    report_line("Unreferenced", report.orphans);
    report_line("Objects deleted", report.objects_deleted);
    println!(
        "  {:<20} {} ({:.2} MB)",
        "Bytes freed:",
        style(report.bytes_freed).cyan(),
        report.bytes_freed as f64 / 1_048_576.0
    );
    print_errors(report.errors.iter().map(|e| ("gc", e)));

    ctx.commit(&mut repo)?;
    if ctx.options.dry_run && report.objects_deleted > 0 {
        println!();
        println!("This was a dry run. To actually delete objects, run:");
        println!("  {}", style("cairn gc").cyan());
    }
    Ok(())
}

/// Drop index entries whose object is gone.
pub fn clean_missing(ctx: &Context) -> Result<()> {
    let mut repo = ctx.open()?;
    let report = repo.clean_missing()?;
    println!("{}", style("Clean Report:").bold());
    report_line("Missing objects", report.missing_objects);
    report_line("Names removed", report.names_removed);
    ctx.commit(&mut repo)
}
