use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use metro::CancelToken;
use tracing_subscriber::EnvFilter;

mod commands;

/// Metro — version control that stays out of your way
///
/// Metro is a workflow layer over ordinary git repositories. Uncommitted
/// work follows you around: switching branches, syncing and cloning all
/// carry your work in progress along in a companion '#wip' branch, and
/// diverging histories are kept side by side as numbered branches instead
/// of forcing a merge.
#[derive(Parser)]
#[command(name = "metro")]
#[command(version, about)]
#[command(after_help = "See 'metro <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repo in the current (or given) directory
    Create {
        /// Directory to create the repo in
        directory: Option<String>,
    },

    /// Clone a remote repo
    Clone {
        /// URL of the remote repository
        url: String,
    },

    /// Make a commit
    Commit {
        /// The commit message
        message: String,
    },

    /// Update the last commit with the current work
    Patch {
        /// Replacement commit message (defaults to the existing one)
        message: Option<String>,
        /// Patch even if the last commit belongs to someone else
        #[arg(long)]
        force: bool,
    },

    /// Delete a branch
    Delete {
        /// The branch to delete
        branch: String,
    },

    /// Create a new branch and switch to it
    Branch {
        /// Name of the new branch
        name: String,
    },

    /// Switch to a different branch
    Switch {
        /// The branch to switch to
        branch: String,
    },

    /// Show the state of the repo
    Info,

    /// Merge the changes in another branch into this one
    Absorb {
        /// The branch to absorb
        branch: String,
    },

    /// Commit resolved conflicts after absorb
    Resolve,

    /// Sync the repo with the remote
    Sync {
        /// Only push local changes
        #[arg(long, conflicts_with = "pull")]
        push: bool,
        /// Only pull remote changes
        #[arg(long)]
        pull: bool,
    },

    /// List commits or branches
    #[command(subcommand)]
    List(commands::list::ListCommands),

    /// Rename a branch
    Rename {
        /// Branch to rename (defaults to the current branch)
        from: String,
        /// New name (when two names are given)
        to: Option<String>,
        /// Overwrite an existing branch of the target name
        #[arg(long)]
        force: bool,
    },

    /// Save, restore or squash the WIP branch
    #[command(subcommand)]
    Wip(commands::wip::WipCommands),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("METRO_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelToken::new();
    #[cfg(unix)]
    {
        if let Err(err) =
            signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.request_flag())
        {
            tracing::warn!(%err, "could not install SIGINT handler");
        }
    }

    match run(Cli::parse(), &cancel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            // Every surfaced error exits with -1.
            ExitCode::from(255)
        }
    }
}

fn run(cli: Cli, cancel: &CancelToken) -> Result<()> {
    match cli.command {
        Commands::Create { directory } => commands::create::run(directory.as_deref()),
        Commands::Clone { url } => commands::clone::run(&url, cancel),
        Commands::Commit { message } => commands::commit::run(&message),
        Commands::Patch { message, force } => commands::patch::run(message.as_deref(), force),
        Commands::Delete { branch } => commands::delete::run(&branch),
        Commands::Branch { name } => commands::branch::run(&name),
        Commands::Switch { branch } => commands::switch::run(&branch),
        Commands::Info => commands::info::run(),
        Commands::Absorb { branch } => commands::absorb::run(&branch),
        Commands::Resolve => commands::resolve::run(),
        Commands::Sync { push, pull } => commands::sync::run(push, pull, cancel),
        Commands::List(cmd) => commands::list::run(cmd),
        Commands::Rename { from, to, force } => commands::rename::run(&from, to.as_deref(), force),
        Commands::Wip(cmd) => commands::wip::run(cmd),
    }
}
