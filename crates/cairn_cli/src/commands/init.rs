//! Initialize a new repository.

use super::Context;
use anyhow::{bail, Context as _, Result};
use cairn_core::{BackendKind, Config, Repo};
use console::style;

/// Initialize a new repository at `--repo`.
pub fn run(ctx: &Context, backend: &str) -> Result<()> {
    let mut config = Config::default();
    config.index.backend = match backend {
        "flat" => BackendKind::Flat,
        "redb" => BackendKind::Redb,
        other => bail!("Unknown index backend '{}' (expected flat or redb)", other),
    };

    if ctx.options.dry_run {
        println!(
            "{} Would initialize a repository at {}",
            style("ℹ").blue(),
            ctx.repo.display()
        );
        return Ok(());
    }

    let repo = Repo::init_with_config(&ctx.repo, config)
        .context("Failed to initialize cairn repository")?;

    println!(
        "{} Initialized cairn repository in {}",
        style("✓").green(),
        repo.root().display()
    );
    println!();
    println!("Layout:");
    println!("  objects/       - Content-addressed object storage");
    match repo.config().index.backend {
        BackendKind::Flat => {
            println!("  index.txt      - Name to digest map");
            println!("  meta.txt       - Digest size and modification time");
        }
        BackendKind::Redb => println!("  index.redb     - Name and metadata tables"),
    }
    println!("  tmp/           - Staging for cross-filesystem copies");
    println!();
    println!("Configuration written to config.toml");

    Ok(())
}
