//! Read-only inspection commands.

use super::Context;
use anyhow::{Context as _, Result};
use cairn_core::FileStatus;
use chrono::{Local, TimeZone};
use console::style;
use std::io::{self, Write};
use std::path::PathBuf;

fn format_mtime(mtime: i64) -> String {
    match Local.timestamp_opt(mtime, 0).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => mtime.to_string(),
    }
}

/// List names starting with `prefix`.
pub fn ls(ctx: &Context, prefix: &str, long: bool) -> Result<()> {
    let repo = ctx.open()?;
    let index = repo.index();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (name, digest) in index.list_names(prefix) {
        if long {
            match index.meta_of(&digest) {
                Some(meta) => writeln!(
                    out,
                    "{} {:>12} {} {}",
                    digest,
                    meta.size,
                    format_mtime(meta.mtime),
                    name
                )?,
                None => writeln!(out, "{} {:>12} {:>19} {}", digest, "?", "?", name)?,
            }
        } else {
            writeln!(out, "{}", name)?;
        }
    }
    Ok(())
}

/// Compare working files against the index.
pub fn status(ctx: &Context, paths: &[PathBuf], prefix: &str) -> Result<()> {
    let repo = ctx.open()?;
    for (path, status) in repo.status(paths, prefix) {
        let path = path.display();
        match status {
            FileStatus::Tracked => println!("{} {}", style("tracked ").green(), path),
            FileStatus::New => println!("{} {}", style("new     ").cyan(), path),
            FileStatus::Stored => println!("{} {}", style("stored  ").cyan(), path),
            FileStatus::Modified { recorded } => {
                println!("{} {} (recorded {})", style("modified").yellow(), path, recorded)
            }
            FileStatus::KnownAs(names) => {
                println!("{} {}", style("known as").blue(), path);
                for name in names {
                    println!("           {}", name);
                }
            }
            FileStatus::Unreadable(e) => println!("{} {}: {}", style("error   ").red(), path, e),
        }
    }
    Ok(())
}

/// List digests with more than one name.
pub fn find_dups(ctx: &Context) -> Result<()> {
    let repo = ctx.open()?;
    let dups = repo.index().duplicates();
    for (digest, names) in &dups {
        let size = repo.index().meta_of(digest).map(|m| m.size).unwrap_or(0);
        println!("{} {}", style(digest).bold(), style(format!("({} bytes)", size)).dim());
        for name in names {
            println!("    {}", name);
        }
    }
    if dups.is_empty() {
        println!("{} No duplicates.", style("✓").green());
    }
    Ok(())
}

/// List digests that no name refers to.
pub fn show_deleted(ctx: &Context) -> Result<()> {
    let repo = ctx.open()?;
    let mut count = 0;
    let mut bytes = 0;
    for digest in repo.index().deleted() {
        let meta = repo.index().meta_of(&digest);
        let size = meta.map(|m| m.size).unwrap_or(0);
        println!("{} {:>12}", digest, size);
        count += 1;
        bytes += size;
    }
    if count > 0 {
        println!();
        println!(
            "{} unreferenced objects, {:.2} MB. Run {} to reclaim them.",
            count,
            bytes as f64 / 1_048_576.0,
            style("cairn gc").cyan()
        );
    }
    Ok(())
}

/// Write a stored file to stdout.
pub fn cat(ctx: &Context, name: &str) -> Result<()> {
    let repo = ctx.open()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    repo.cat(name, &mut out)
        .with_context(|| format!("Failed to read {}", name))?;
    out.flush()?;
    Ok(())
}
