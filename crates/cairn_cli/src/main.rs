//! cairn CLI - Command-line interface for the cairn content-addressed file repository.

use anyhow::Result;
use cairn_core::Options;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "Content-addressed file repository", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository root
    #[arg(short, long, global = true, default_value = ".")]
    repo: PathBuf,
    /// Report what would change without touching anything
    #[arg(short = 'n', long = "dryrun", global = true)]
    dry_run: bool,
    /// Overwrite existing destinations and names
    #[arg(short, long, global = true)]
    force: bool,
    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new repository
    Init {
        /// Index backend (flat, redb)
        #[arg(long, default_value = "flat")]
        backend: String,
    },
    /// Import files on the repository's filesystem by hardlink
    Import {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Name prefix
        #[arg(short, long, default_value = "")]
        prefix: String,
    },
    /// Import files from another filesystem by copying
    Copy {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Name prefix
        #[arg(short, long, default_value = "")]
        prefix: String,
    },
    /// Hardlink stored names into a directory
    Link {
        /// Destination directory
        dest: PathBuf,
        /// Only names under this prefix
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Copy stored names into a directory on another filesystem
    Pull {
        /// Destination directory
        dest: PathBuf,
        /// Only names under this prefix
        #[arg(default_value = "")]
        prefix: String,
    },
    /// List names
    Ls {
        /// Only names starting with this
        #[arg(default_value = "")]
        prefix: String,
        /// Show digest, size and modification time
        #[arg(short, long)]
        long: bool,
    },
    /// Compare working files with the repository
    Status {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Name prefix the files were imported under
        #[arg(short, long, default_value = "")]
        prefix: String,
    },
    /// List content stored under more than one name
    FindDups,
    /// List stored content that no name refers to
    ShowDeleted,
    /// Remove names together with every alias of the same content
    Delete {
        /// Names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Remove just the given names
    DeleteNames {
        /// Names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Rename a name or a directory of names
    RenameFiles {
        /// Current name
        from: String,
        /// New name
        to: String,
    },
    /// Delete objects that no name refers to
    Gc,
    /// Drop names and metadata whose object is missing
    CleanMissing,
    /// Reset object modification times to the recorded ones
    FixTimes,
    /// Normalize names
    FixPaths,
    /// Write a stored file to stdout
    Cat {
        /// Name
        name: String,
    },
    /// Verify stored objects
    Scrub {
        /// Check presence and size only
        #[arg(long)]
        fast: bool,
        /// Skip objects whose hash cache is still valid
        #[arg(long)]
        modified: bool,
        /// Resume from this digest
        #[arg(long)]
        resume: Option<String>,
        /// Skip objects larger than this many bytes
        #[arg(long)]
        max_size: Option<u64>,
    },
    /// Restore git-annex objects from the repository
    AnnexFix {
        /// Annex worktree paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Move hash-cached files into git-annex
    AnnexAdd {
        /// Worktree paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Fold legacy per-object sidecars into the index
    Reindex,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // RUST_LOG wins over -v
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = Context {
        repo: cli.repo,
        options: Options {
            dry_run: cli.dry_run,
            force: cli.force,
        },
    };

    match cli.command {
        Commands::Init { backend } => commands::init::run(&ctx, &backend),
        Commands::Import { paths, prefix } => commands::import::import(&ctx, &paths, &prefix),
        Commands::Copy { paths, prefix } => commands::import::copy(&ctx, &paths, &prefix),
        Commands::Link { dest, prefix } => commands::materialize::link(&ctx, &dest, &prefix),
        Commands::Pull { dest, prefix } => commands::materialize::pull(&ctx, &dest, &prefix),
        Commands::Ls { prefix, long } => commands::list::ls(&ctx, &prefix, long),
        Commands::Status { paths, prefix } => commands::list::status(&ctx, &paths, &prefix),
        Commands::FindDups => commands::list::find_dups(&ctx),
        Commands::ShowDeleted => commands::list::show_deleted(&ctx),
        Commands::Delete { names } => commands::edit::delete(&ctx, &names),
        Commands::DeleteNames { names } => commands::edit::delete_names(&ctx, &names),
        Commands::RenameFiles { from, to } => commands::edit::rename(&ctx, &from, &to),
        Commands::Gc => commands::gc::gc(&ctx),
        Commands::CleanMissing => commands::gc::clean_missing(&ctx),
        Commands::FixTimes => commands::repair::fix_times(&ctx),
        Commands::FixPaths => commands::repair::fix_paths(&ctx),
        Commands::Cat { name } => commands::list::cat(&ctx, &name),
        Commands::Scrub {
            fast,
            modified,
            resume,
            max_size,
        } => commands::scrub::run(&ctx, fast, modified, resume.as_deref(), max_size),
        Commands::AnnexFix { paths } => commands::annex::fix(&ctx, &paths),
        Commands::AnnexAdd { paths } => commands::annex::add(&ctx, &paths),
        Commands::Reindex => commands::repair::reindex(&ctx),
    }
}
