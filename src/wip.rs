//! The WIP engine: saving and restoring work-in-progress branches.
//!
//! Every branch `B` may have a companion branch `B#wip` holding uncommitted
//! changes and in-progress merges. `save_wip` captures the working
//! directory into a commit on that branch and leaves the repository clean;
//! `restore_wip` re-applies the captured state and deletes the branch.
//!
//! A WIP commit's first parent is the partner branch's head. When a merge
//! was ongoing, the commit gets `MERGE_HEAD` as a second parent and the
//! merge message is stored after the first line of the commit message, so
//! the whole merge (including index conflicts) survives the round trip.

use git2::{Index, IndexConflict, IndexEntry, Repository};
use tracing::debug;

use crate::branch::to_wip;
use crate::error::{MetroError, Result};
use crate::head::get_head;
use crate::merging::{get_merge_message, merge_ongoing, set_merge_message, start_merge};
use crate::repo::{
    branch_exists, checkout, commit_exists, commit_revs, delete_branch, get_commit,
    get_conflicts, has_uncommitted_changes,
};

// Stage bits inside an index entry's flags word.
const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;

/// Save uncommitted changes and any ongoing merge to the WIP branch.
///
/// Does nothing on a clean, non-merging repository. After a successful
/// save the working directory and index match HEAD's commit and the merge
/// state (if any) has been cleared.
pub fn save_wip(repo: &Repository) -> Result<()> {
    // If there are no changes since the last commit, don't bother with a
    // WIP commit.
    if !(has_uncommitted_changes(repo)? || merge_ongoing(repo)?) {
        return Ok(());
    }

    let head = get_head(repo)?;
    if head.detached {
        return Err(MetroError::unsupported(
            "Attempted to save WIP with detached head",
        ));
    }
    let wip_name = to_wip(&head.name);

    // Tried just in case; a missing branch is fine.
    if let Err(err) = delete_branch(repo, &wip_name) {
        if !err.is_not_found() {
            return Err(err);
        }
    }

    let head_exists = commit_exists(repo, "HEAD");
    let update_ref = format!("refs/heads/{wip_name}");
    if merge_ongoing(repo)? {
        // Store the merge message in the second line (and beyond) of the
        // WIP commit message.
        let message = format!("WIP\n{}", get_merge_message(repo)?);
        let parents: &[&str] = if head_exists {
            &["HEAD", "MERGE_HEAD"]
        } else {
            &["MERGE_HEAD"]
        };
        commit_revs(repo, &update_ref, &message, parents)?;
        repo.cleanup_state()?;
    } else {
        let parents: &[&str] = if head_exists { &["HEAD"] } else { &[] };
        commit_revs(repo, &update_ref, "WIP", parents)?;
    }
    debug!(branch = %wip_name, "saved WIP");
    Ok(())
}

/// Restore the WIP branch for the current branch, if one exists.
///
/// Re-applies the captured working directory, restarts a captured merge
/// (including its message and index conflicts) and deletes the WIP branch.
pub fn restore_wip(repo: &Repository) -> Result<()> {
    let head = get_head(repo)?;
    if head.detached {
        return Err(MetroError::unsupported(
            "Attempted to restore WIP with detached head",
        ));
    }
    let wip_name = to_wip(&head.name);
    if !branch_exists(repo, &wip_name) {
        return Ok(());
    }

    let (second_parent, message) = {
        let wip_commit = get_commit(repo, &wip_name)?;
        let second = if wip_commit.parent_count() > 1 {
            Some(wip_commit.parent_id(1)?)
        } else {
            None
        };
        (second, wip_commit.message().unwrap_or("").to_owned())
    };

    let mut index = repo.index()?;
    let mut conflicts: Vec<IndexConflict> = Vec::new();

    // Two or more parents means the WIP captured a merge.
    if let Some(merge_head) = second_parent {
        start_merge(repo, &merge_head.to_string())?;

        // Reload the merge message from before, stored in the second line
        // (and beyond) of the WIP commit message. A single-line message
        // (only possible if the commit was tampered with) keeps the default
        // message the restarted merge wrote.
        if let Some(newline) = message.find('\n') {
            set_merge_message(repo, &message[newline + 1..])?;
        }

        // Remove the conflicts from the index temporarily so the checkout
        // below is allowed. They are re-applied afterwards so the index and
        // working directory match their state when the WIP was saved.
        conflicts = get_conflicts(&index)?;
        for conflict in &conflicts {
            remove_conflict_paths(&mut index, conflict);
        }
    }

    checkout(repo, &wip_name)?;
    delete_branch(repo, &wip_name)?;

    for conflict in &conflicts {
        add_conflict(&mut index, conflict)?;
    }
    index.write()?;
    debug!(branch = %wip_name, "restored WIP");
    Ok(())
}

/// Rebuild the WIP branch as a single WIP commit.
///
/// The squashed commit keeps the WIP tree and gets the partner branch's
/// head as its only parent. A WIP that captured a merge is refused, since
/// flattening it would lose the recorded merge target.
pub fn squash_wip(repo: &Repository) -> Result<()> {
    let head = get_head(repo)?;
    if head.detached {
        return Err(MetroError::unsupported(
            "Attempted to squash WIP with detached head",
        ));
    }
    let wip_name = to_wip(&head.name);
    if !branch_exists(repo, &wip_name) {
        return Err(MetroError::AttachedWip);
    }

    let wip_commit = get_commit(repo, &wip_name)?;
    if wip_commit.parent_count() > 1 {
        return Err(MetroError::unsupported(
            "Can't squash a WIP that captured a merge.",
        ));
    }

    let signature = repo.signature()?;
    let tree = wip_commit.tree()?;
    let parents = if commit_exists(repo, &head.name) {
        vec![get_commit(repo, &head.name)?]
    } else {
        Vec::new()
    };
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
    let oid = repo.commit(None, &signature, &signature, "WIP", &tree, &parent_refs)?;
    repo.reference(&format!("refs/heads/{wip_name}"), oid, true, "metro: squash WIP")?;
    Ok(())
}

/// Drop every index entry (staged or conflicted) at the conflict's paths.
fn remove_conflict_paths(index: &mut Index, conflict: &IndexConflict) {
    for entry in [&conflict.ancestor, &conflict.our, &conflict.their]
        .into_iter()
        .flatten()
    {
        let path = String::from_utf8_lossy(&entry.path).into_owned();
        // A missing entry just means nothing was staged there.
        let _ = index.remove_path(std::path::Path::new(&path));
    }
}

/// Put a snapshotted conflict back into the index.
///
/// Any staged entries at the conflict's paths are removed first, then the
/// ancestor/ours/theirs entries are re-added at their conflict stages.
fn add_conflict(index: &mut Index, conflict: &IndexConflict) -> Result<()> {
    remove_conflict_paths(index, conflict);

    let sides = [
        (conflict.ancestor.as_ref(), 1u16),
        (conflict.our.as_ref(), 2u16),
        (conflict.their.as_ref(), 3u16),
    ];
    for (entry, stage) in sides {
        if let Some(entry) = entry {
            index.add(&staged_entry(entry, stage))?;
        }
    }
    Ok(())
}

/// Copy an index entry, forcing its conflict stage.
fn staged_entry(entry: &IndexEntry, stage: u16) -> IndexEntry {
    IndexEntry {
        ctime: entry.ctime,
        mtime: entry.mtime,
        dev: entry.dev,
        ino: entry.ino,
        mode: entry.mode,
        uid: entry.uid,
        gid: entry.gid,
        file_size: entry.file_size,
        id: entry.id,
        flags: (entry.flags & !STAGE_MASK) | (stage << STAGE_SHIFT),
        flags_extended: entry.flags_extended,
        path: entry.path.clone(),
    }
}
