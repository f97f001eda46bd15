use anyhow::Result;
use metro::MetroError;

use super::open_current;

pub fn run(name: &str) -> Result<()> {
    metro::branch::validate_user_branch_name(name)?;

    let repo = open_current()?;
    if metro::repo::branch_exists(&repo, name) {
        return Err(MetroError::unsupported(format!("Branch {name} already exists.")).into());
    }

    metro::repo::create_branch(&repo, name)?;
    println!("Created branch {name}.");

    if metro::repo::has_uncommitted_changes(&repo)? {
        println!("Saved changes to WIP");
    }
    metro::repo::switch_branch(&repo, name, true)?;
    println!("Switched to branch {name}.");
    Ok(())
}
