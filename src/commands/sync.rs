use anyhow::Result;
use metro::sync::BranchAction;
use metro::{to_wip, CancelToken, CredentialStore, SyncDirection};

use super::open_current;

pub fn run(push: bool, pull: bool, cancel: &CancelToken) -> Result<()> {
    let direction = if push {
        SyncDirection::Up
    } else if pull {
        SyncDirection::Down
    } else {
        SyncDirection::Both
    };

    let repo = open_current()?;
    {
        let origin = repo.find_remote("origin")?;
        println!("Syncing with {}.", origin.url().unwrap_or("origin"));
    }
    println!("Fetching all branches from remote...");

    let mut credentials = CredentialStore::with_default_source();
    let outcome = metro::sync::sync(&repo, &mut credentials, direction, cancel)?;

    for action in &outcome.actions {
        match action {
            BranchAction::UpToDate { branch } => {
                println!("Branch {branch} is already synced.");
            }
            BranchAction::Pushed { branch } => {
                println!("Pushing {branch}...");
            }
            BranchAction::Pulled { branch } => {
                println!("Pulling {branch}...");
            }
            BranchAction::ForkedOnConflict {
                branch,
                moved_to,
                head_moved,
            } => {
                println!(
                    "Branch {branch} had remote changes that conflicted with yours; \
                     your commits have been moved to {moved_to}."
                );
                if *head_moved {
                    println!("You've been moved to {moved_to}.");
                }
            }
            BranchAction::SkippedConflict { branch } => {
                println!("Branch {branch} conflicts with remote, not pushing.");
            }
            BranchAction::SkippedBrokenWip {
                branch,
                local_broken,
            } => {
                let side = if *local_broken { "Local" } else { "Remote" };
                println!(
                    "{side} wip branch for {branch} is not a valid work in progress branch \
                     for {branch}, so neither branch can be synced. Delete {} to resolve \
                     the issue.",
                    to_wip(branch)
                );
            }
        }
    }
    Ok(())
}
