//! CLI commands.

pub mod annex;
pub mod edit;
pub mod gc;
pub mod import;
pub mod init;
pub mod list;
pub mod materialize;
pub mod repair;
pub mod scrub;

use anyhow::{Context as _, Result};
use cairn_core::{Options, Repo};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

/// Global flags shared by every command.
pub struct Context {
    pub repo: PathBuf,
    pub options: Options,
}

impl Context {
    /// Opens the repository with the global switches applied.
    pub fn open(&self) -> Result<Repo> {
        let repo = Repo::open(&self.repo).map_err(|e| {
            let hint = e.recovery_suggestion();
            let err = anyhow::Error::new(e);
            match hint {
                Some(hint) => err.context(hint),
                None => err,
            }
        });
        let repo = repo.with_context(|| format!("Failed to open repository at {}", self.repo.display()))?;
        if self.options.dry_run {
            println!("{} Dry run: nothing will be changed.", style("ℹ").blue());
        }
        Ok(repo.with_options(self.options))
    }

    /// Commits pending index changes, saying so when something was written.
    pub fn commit(&self, repo: &mut Repo) -> Result<()> {
        if repo.commit().context("Failed to commit index")? {
            println!("{} Index committed.", style("✓").green());
        }
        Ok(())
    }
}

/// A steady-ticking spinner on stderr.
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// A counted progress bar on stderr.
pub fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:40!} [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("█▓▒░  "),
    );
    Ok(pb)
}

/// Prints one line of a report block.
pub fn report_line(label: &str, value: impl Display) {
    println!("  {:<20} {}", format!("{}:", label), style(value).cyan());
}

/// Prints per-item failures, if any.
pub fn print_errors<P: Display, E: Display>(errors: impl IntoIterator<Item = (P, E)>) {
    let mut first = true;
    for (item, error) in errors {
        if first {
            println!();
            println!("{}", style("Errors encountered:").red().bold());
            first = false;
        }
        println!("  {} {}: {}", style("×").red(), item, error);
    }
}
