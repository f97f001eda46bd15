//! Merge lifecycle: starting, finishing and aborting absorbs.
//!
//! A merge in Metro is always an *absorb*: the other branch's head is merged
//! into the current branch, conflicts are left in the index, and the user
//! finishes with `resolve`. The merge message lives in the `MERGE_MSG` file
//! under the repository metadata directory so that the WIP engine can carry
//! it across branch switches.

use std::fs;

use git2::build::CheckoutBuilder;
use git2::{MergeOptions, Repository};
use tracing::debug;

use crate::error::{MetroError, Result};
use crate::repo::{branch_exists, commit_revs, get_commit};

/// True iff the repository is in merging state.
pub fn merge_ongoing(repo: &Repository) -> Result<bool> {
    // The revision only exists while merging.
    Ok(repo.revparse_single("MERGE_HEAD").is_ok())
}

/// Error with [`MetroError::CurrentlyMerging`] if a merge is ongoing.
pub fn assert_not_merging(repo: &Repository) -> Result<()> {
    if merge_ongoing(repo)? {
        Err(MetroError::CurrentlyMerging)
    } else {
        Ok(())
    }
}

/// The merge message git would generate for merging `name`.
pub fn default_merge_message(name: &str) -> String {
    format!("Merge commit '{name}'")
}

/// Read the persisted merge message.
pub fn get_merge_message(repo: &Repository) -> Result<String> {
    Ok(fs::read_to_string(repo.path().join("MERGE_MSG"))?)
}

/// Overwrite the persisted merge message.
pub fn set_merge_message(repo: &Repository, message: &str) -> Result<()> {
    fs::write(repo.path().join("MERGE_MSG"), message)?;
    Ok(())
}

/// Start merging the commit named by `name` into the working directory.
///
/// Merge analysis gates the operation: nothing to merge surfaces
/// [`MetroError::UnnecessaryMerge`], and anything other than a normal merge
/// is unsupported. Conflicts are left in the index for the user to resolve.
pub fn start_merge(repo: &Repository, name: &str) -> Result<()> {
    let other_head = get_commit(repo, name)?;
    let annotated = repo.find_annotated_commit(other_head.id())?;

    let (analysis, _preference) = repo.merge_analysis(&[&annotated])?;
    if analysis.is_none() || analysis.is_up_to_date() {
        return Err(MetroError::UnnecessaryMerge);
    }
    if !analysis.is_normal() {
        return Err(MetroError::unsupported("Non-normal absorb not supported."));
    }

    debug!(name, "starting merge");
    let mut merge_opts = MergeOptions::new();
    let mut checkout_opts = CheckoutBuilder::new();
    checkout_opts.force().allow_conflicts(true);
    repo.merge(&[&annotated], Some(&mut merge_opts), Some(&mut checkout_opts))?;
    Ok(())
}

/// Merge another branch into the current one.
///
/// Returns `true` when conflicts were produced and the repository was left
/// in merging state; otherwise the merge commit has been created and the
/// state cleaned up.
pub fn absorb(repo: &Repository, name: &str) -> Result<bool> {
    assert_not_merging(repo)?;
    if !branch_exists(repo, name) {
        return Err(MetroError::branch_not_found(name));
    }

    start_merge(repo, name)?;
    let index = repo.index()?;
    if index.has_conflicts() {
        return Ok(true);
    }

    // The merge wrote MERGE_MSG from the annotated commit's OID; name the
    // branch the user asked for instead.
    commit_revs(repo, "HEAD", &default_merge_message(name), &["HEAD", name])?;
    repo.cleanup_state()?;
    Ok(false)
}

/// Commit the resolved state of an ongoing merge.
///
/// Uses the persisted merge message and parents `[HEAD, MERGE_HEAD]`, then
/// clears the merging state.
pub fn resolve(repo: &Repository) -> Result<()> {
    if !merge_ongoing(repo)? {
        return Err(MetroError::NotMerging);
    }

    let message = get_merge_message(repo)?;
    commit_revs(repo, "HEAD", &message, &["HEAD", "MERGE_HEAD"])?;
    repo.cleanup_state()?;
    Ok(())
}
