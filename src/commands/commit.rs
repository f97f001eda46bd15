use anyhow::Result;
use metro::MetroError;

use super::{current_change_counts, open_current, print_change_counts};

pub fn run(message: &str) -> Result<()> {
    let repo = open_current()?;
    metro::merging::assert_not_merging(&repo)?;
    if repo.head_detached()? {
        return Err(MetroError::unsupported(
            "Cannot commit while head is detached. \
             Try switching to an existing branch, or creating a new one.",
        )
        .into());
    }

    if metro::repo::head_exists(&repo) {
        // Stage everything first so new files show up in the diff.
        metro::repo::add_all(&repo)?;
        let counts = current_change_counts(&repo)?;
        if counts.total() == 0 {
            return Err(MetroError::unsupported("No files to commit").into());
        }

        metro::repo::commit_revs(&repo, "HEAD", message, &["HEAD"])?;
        print_change_counts(&counts, ["added", "deleted", "modified", "renamed", "copied"]);

        let head = metro::get_head(&repo)?;
        println!("Saved commit to branch {}.", head.name);
    } else {
        // Initial commit of a repo with no parent.
        metro::repo::commit_revs(&repo, "HEAD", message, &[])?;
        let head = metro::get_head(&repo)?;
        println!("Made initial commit in branch {}.", head.name);
    }
    Ok(())
}
