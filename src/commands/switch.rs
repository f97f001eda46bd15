use anyhow::Result;
use metro::to_wip;

use super::open_current;

pub fn run(branch: &str) -> Result<()> {
    let repo = open_current()?;

    let wip_exists = metro::repo::branch_exists(&repo, &to_wip(branch));

    // Switching to the branch we're already on just reloads its WIP.
    if metro::head::is_on_branch(&repo, branch)? {
        if wip_exists {
            metro::wip::restore_wip(&repo)?;
            println!("Loaded changes from WIP");
        } else {
            println!("You are already on branch {branch}");
        }
        return Ok(());
    }

    if metro::repo::has_uncommitted_changes(&repo)? {
        println!("Saved changes to WIP");
    }

    metro::repo::switch_branch(&repo, branch, true)?;
    println!("Switched to branch {branch}.");

    if wip_exists {
        println!("Loaded changes from WIP");
    }
    Ok(())
}
