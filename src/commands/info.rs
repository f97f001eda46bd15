use anyhow::Result;

use super::{current_change_counts, open_current, print_change_counts};

pub fn run() -> Result<()> {
    let repo = open_current()?;

    let head = metro::get_head(&repo)?;
    if head.detached {
        println!("Head is detached at commit {}", head.name);
    } else {
        println!("Current branch is {}", head.name);
    }
    println!(
        "{}",
        if metro::merging::merge_ongoing(&repo)? {
            "Merge ongoing"
        } else {
            "Not merging"
        }
    );

    metro::repo::add_all(&repo)?;
    let counts = current_change_counts(&repo)?;
    if counts.total() == 0 {
        println!("Nothing to commit");
    } else {
        print_change_counts(
            &counts,
            ["to add", "to delete", "to modify", "to rename", "to copy"],
        );
    }
    Ok(())
}
