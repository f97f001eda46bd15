use anyhow::Result;
use metro::MetroError;

use super::open_current;

pub fn run(branch: &str) -> Result<()> {
    let repo = open_current()?;
    if repo.head_detached()? {
        return Err(MetroError::unsupported("You must be on a branch to absorb.").into());
    }

    let has_conflicts = metro::merging::absorb(&repo, branch)?;
    if has_conflicts {
        println!("Conflicts occurred, please resolve.");
    } else {
        let head = metro::get_head(&repo)?;
        println!("Successfully absorbed {branch} into {}.", head.name);
    }
    Ok(())
}
