//! Index editing: delete and rename.

use super::Context;
use anyhow::{Context as _, Result};
use cairn_core::MoveOutcome;
use console::style;

/// Remove names and every alias of their content.
pub fn delete(ctx: &Context, names: &[String]) -> Result<()> {
    let mut repo = ctx.open()?;
    let removed = repo.delete(names);
    println!("{} Removed {} names.", style("✓").green(), removed);
    ctx.commit(&mut repo)?;
    if removed > 0 {
        println!(
            "  {} Content stays in the store until {}.",
            style("Tip:").cyan(),
            style("cairn gc").cyan()
        );
    }
    Ok(())
}

/// Remove exactly the given names.
pub fn delete_names(ctx: &Context, names: &[String]) -> Result<()> {
    let mut repo = ctx.open()?;
    let removed = repo.delete_names(names);
    println!("{} Removed {} of {} names.", style("✓").green(), removed, names.len());
    ctx.commit(&mut repo)
}

/// Rename a name or a directory of names.
pub fn rename(ctx: &Context, from: &str, to: &str) -> Result<()> {
    let mut repo = ctx.open()?;
    let outcome = repo
        .rename(from, to)
        .with_context(|| format!("Failed to rename {}", from))?;
    match outcome {
        MoveOutcome::Moved => println!("{} {} -> {}", style("✓").green(), from, to),
        MoveOutcome::Discarded => println!(
            "{} {} already holds the same content; dropped {}",
            style("✓").green(),
            to,
            from
        ),
        MoveOutcome::Collision => println!(
            "{} {} holds different content; nothing renamed",
            style("⚠").yellow(),
            to
        ),
        MoveOutcome::Invalid => println!("{} Cannot move {} to {}", style("⚠").yellow(), from, to),
    }
    ctx.commit(&mut repo)
}
