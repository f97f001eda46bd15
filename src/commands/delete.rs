use anyhow::Result;

use super::open_current;

pub fn run(branch: &str) -> Result<()> {
    let repo = open_current()?;
    metro::merging::assert_not_merging(&repo)?;

    metro::repo::delete_branch(&repo, branch)?;
    println!("Deleted branch {branch}.");
    Ok(())
}
