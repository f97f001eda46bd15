use anyhow::Result;
use git2::BranchType;
use metro::{to_wip, MetroError};

use super::open_current;

pub fn run(first: &str, second: Option<&str>, force: bool) -> Result<()> {
    let repo = open_current()?;

    let (from, to) = match second {
        Some(to) => (first.to_owned(), to.to_owned()),
        None => {
            let head = metro::get_head(&repo)?;
            if head.detached {
                return Err(MetroError::unsupported(format!(
                    "The HEAD is not pointing at any branch, so cannot rename.\n\
                     Try using 'metro rename <branch> {first}'."
                ))
                .into());
            }
            (head.name, first.to_owned())
        }
    };
    metro::branch::validate_user_branch_name(&to)?;

    if metro::repo::branch_exists(&repo, &to) && !force {
        return Err(MetroError::unsupported(
            "There is already a branch with that name.\n\
             To overwrite it, use 'metro rename --force'.",
        )
        .into());
    }
    if metro::repo::branch_exists(&repo, &to_wip(&to)) && !force {
        return Err(MetroError::unsupported(
            "There is a WIP branch for the target branch name.\n\
             To overwrite it, use 'metro rename --force'.",
        )
        .into());
    }

    let mut current = repo.find_branch(&from, BranchType::Local)?;
    current.rename(&to, force)?;

    // Clear out a leftover WIP for the target name before moving ours over.
    if metro::repo::branch_exists(&repo, &to_wip(&to)) {
        metro::repo::delete_branch(&repo, &to_wip(&to))?;
    }
    if metro::repo::branch_exists(&repo, &to_wip(&from)) {
        let mut wip = repo.find_branch(&to_wip(&from), BranchType::Local)?;
        wip.rename(&to_wip(&to), force)?;
    }

    println!("Renamed branch {from} to {to}.");
    Ok(())
}
