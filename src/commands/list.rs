use anyhow::Result;
use chrono::DateTime;
use clap::Subcommand;
use git2::{BranchType, Commit};
use metro::{is_wip, to_wip};

use super::open_current;

#[derive(Subcommand)]
pub enum ListCommands {
    /// List the commits leading up to HEAD
    Commits,
    /// List local branches
    Branches,
}

pub fn run(command: ListCommands) -> Result<()> {
    let repo = open_current()?;
    metro::merging::assert_not_merging(&repo)?;

    match command {
        ListCommands::Commits => {
            if !metro::repo::head_exists(&repo) {
                println!("No commits at this location");
                return Ok(());
            }

            let mut walk = repo.revwalk()?;
            walk.push_head()?;
            for oid in walk {
                let commit = repo.find_commit(oid?)?;
                print_commit(&repo, &commit)?;
                println!();
            }
        }
        ListCommands::Branches => {
            for entry in repo.branches(Some(BranchType::Local))? {
                let (branch, _) = entry?;
                let Some(name) = branch.name()? else { continue };
                if is_wip(name) {
                    continue;
                }

                let marker = if metro::head::is_on_branch(&repo, name)? {
                    " * "
                } else {
                    "   "
                };
                let wip_note = if metro::repo::branch_exists(&repo, &to_wip(name)) {
                    " (wip)"
                } else {
                    ""
                };
                println!("{marker}{name}{wip_note}");
            }
        }
    }
    Ok(())
}

fn print_commit(repo: &git2::Repository, commit: &Commit<'_>) -> Result<()> {
    print!("Commit {}", commit.id());

    // Every branch pointing at this commit, current branch first.
    let mut pointing = Vec::new();
    for entry in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = entry?;
        if branch.get().target() == Some(commit.id()) {
            if let Some(name) = branch.name()? {
                pointing.push(name.to_owned());
            }
        }
    }
    if pointing.is_empty() {
        println!();
    } else {
        println!(" ({})", pointing.join(", "));
    }

    let author = commit.author();
    println!(
        "Author: {} ({})",
        author.name().unwrap_or("?"),
        author.email().unwrap_or("?")
    );
    let when = author.when();
    let stamp = DateTime::from_timestamp(when.seconds(), 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| when.seconds().to_string());
    println!("Date: {stamp}");
    println!(
        "\n    {}",
        commit.message().unwrap_or("").replace('\n', "\n    ")
    );
    Ok(())
}
