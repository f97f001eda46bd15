//! High-level repository primitives over the git object database.
//!
//! Everything here treats the staging area the Metro way: operations stage
//! the whole working directory first (`metro` has no partial staging), so a
//! commit always captures exactly what is on disk. Branch deletion and
//! switching are WIP-aware: deleting a branch removes its `#wip` companion,
//! and switching passes through the WIP engine on both sides.

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Commit, Delta, Diff, DiffOptions, Index, IndexAddOption, IndexConflict, Oid,
    Remote, Repository, RepositoryInitOptions, ResetType, StatusOptions, StatusShow, Tree,
};
use tracing::debug;

use crate::branch::{is_wip, to_wip};
use crate::error::{MetroError, Result};
use crate::head::is_on_branch;
use crate::merging::assert_not_merging;
use crate::wip;

/// Initialize an empty Metro repository with its root commit.
///
/// Fails with [`MetroError::RepositoryExists`] if `<path>/.git` is already
/// present. The initial branch is `master` and the root commit's message is
/// `"Create repository"`.
pub fn create(path: &Path) -> Result<Repository> {
    if path.join(".git").exists() {
        return Err(MetroError::RepositoryExists);
    }

    debug!(path = %path.display(), "creating repository");
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master").mkpath(true);
    let repo = Repository::init_opts(path, &opts)?;
    commit_revs(&repo, "HEAD", "Create repository", &[])?;
    Ok(repo)
}

/// Open the repository at `path`, mapping failure to
/// [`MetroError::RepositoryNotExists`].
pub fn open(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|_| MetroError::RepositoryNotExists)
}

/// Stage every change in the working directory (respecting ignore rules)
/// and return the index.
pub fn add_all(repo: &Repository) -> Result<Index> {
    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    Ok(index)
}

/// Stage everything and write the index out as a tree.
///
/// Fails if the index holds conflicts. The index is persisted afterwards so
/// that it stays in sync with the working directory; without this, removals
/// of every file would be left staged.
pub fn working_tree(repo: &Repository) -> Result<Tree<'_>> {
    let mut index = add_all(repo)?;
    let oid = index.write_tree()?;
    let tree = repo.find_tree(oid)?;
    index.write()?;
    Ok(tree)
}

/// Diff HEAD's tree against the working directory with the index.
///
/// A branch with no commits yet diffs against an empty tree.
pub fn current_changes(repo: &Repository) -> Result<Diff<'_>> {
    let tree = match get_commit(repo, "HEAD") {
        Ok(commit) => Some(commit.tree()?),
        // The current branch might have no commits, which is ok.
        Err(_) => None,
    };
    let mut opts = DiffOptions::new();
    let diff = repo.diff_tree_to_workdir_with_index(tree.as_ref(), Some(&mut opts))?;
    Ok(diff)
}

/// Per-kind counts of changed files in a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub renamed: usize,
    pub copied: usize,
}

impl ChangeCounts {
    /// Total number of counted changes.
    pub fn total(&self) -> usize {
        self.added + self.deleted + self.modified + self.renamed + self.copied
    }
}

/// Count the deltas in a diff by change kind.
pub fn change_counts(diff: &Diff<'_>) -> ChangeCounts {
    let mut counts = ChangeCounts::default();
    for delta in diff.deltas() {
        match delta.status() {
            Delta::Added | Delta::Untracked => counts.added += 1,
            Delta::Deleted => counts.deleted += 1,
            Delta::Modified => counts.modified += 1,
            Delta::Renamed => counts.renamed += 1,
            Delta::Copied => counts.copied += 1,
            _ => {}
        }
    }
    counts
}

/// Commit the staged working tree to `update_ref`.
///
/// The repository's default signature is used as both author and committer.
pub fn commit(
    repo: &Repository,
    update_ref: &str,
    message: &str,
    parents: &[&Commit<'_>],
) -> Result<Oid> {
    let signature = repo.signature()?;
    let tree = working_tree(repo)?;
    let oid = repo.commit(Some(update_ref), &signature, &signature, message, &tree, parents)?;
    debug!(%oid, update_ref, "created commit");
    Ok(oid)
}

/// Like [`commit`], resolving each parent from a revision string first.
pub fn commit_revs(
    repo: &Repository,
    update_ref: &str,
    message: &str,
    parent_revs: &[&str],
) -> Result<Oid> {
    let mut parents = Vec::with_capacity(parent_revs.len());
    for rev in parent_revs {
        parents.push(get_commit(repo, rev)?);
    }
    let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();
    commit(repo, update_ref, message, &parent_refs)
}

/// Amend HEAD's commit with the current working tree and a new message,
/// keeping its parents. Not allowed during a merge.
pub fn patch(repo: &Repository, message: &str) -> Result<Oid> {
    assert_not_merging(repo)?;

    let signature = repo.signature()?;
    let tree = working_tree(repo)?;
    let head = get_commit(repo, "HEAD")?;
    let oid = head.amend(
        Some("HEAD"),
        Some(&signature),
        Some(&signature),
        None,
        Some(message),
        Some(&tree),
    )?;
    Ok(oid)
}

/// Look up the commit for a revision string.
pub fn get_commit<'r>(repo: &'r Repository, revision: &str) -> Result<Commit<'r>> {
    Ok(repo.revparse_single(revision)?.peel_to_commit()?)
}

/// Whether `revision` resolves to a commit.
pub fn commit_exists(repo: &Repository, revision: &str) -> bool {
    get_commit(repo, revision).is_ok()
}

/// Whether HEAD resolves to a commit.
pub fn head_exists(repo: &Repository) -> bool {
    commit_exists(repo, "HEAD")
}

/// Create a local branch at HEAD's commit.
pub fn create_branch(repo: &Repository, name: &str) -> Result<()> {
    let commit = get_commit(repo, "HEAD")?;
    repo.branch(name, &commit, false)?;
    Ok(())
}

/// Whether a local branch with this name exists.
pub fn branch_exists(repo: &Repository, name: &str) -> bool {
    repo.find_branch(name, BranchType::Local).is_ok()
}

/// Delete a local branch and its `#wip` companion.
///
/// Deleting the current branch switches away first: to `master` when it
/// exists and is not the target, otherwise to any other non-WIP branch,
/// otherwise the deletion is refused.
pub fn delete_branch(repo: &Repository, name: &str) -> Result<()> {
    if is_on_branch(repo, name)? {
        if branch_exists(repo, "master") && name != "master" {
            switch_branch(repo, "master", false)?;
        } else {
            let mut escape = None;
            for entry in repo.branches(Some(BranchType::Local))? {
                let (branch, _) = entry?;
                if let Some(other) = branch.name()? {
                    if other != name && !is_wip(other) {
                        escape = Some(other.to_owned());
                        break;
                    }
                }
            }
            match escape {
                Some(other) => switch_branch(repo, &other, false)?,
                None => {
                    return Err(MetroError::unsupported("Can't delete only non-WIP branch"));
                }
            }
        }
    }

    if !branch_exists(repo, name) {
        return Err(MetroError::branch_not_found(name));
    }
    debug!(name, "deleting branch");
    repo.find_branch(name, BranchType::Local)?.delete()?;

    // Also delete the WIP branch if present.
    let wip_name = to_wip(name);
    if branch_exists(repo, &wip_name) {
        repo.find_branch(&wip_name, BranchType::Local)?.delete()?;
    }
    Ok(())
}

/// Force-checkout the tree of the commit named by `name` into the working
/// directory.
pub fn checkout(repo: &Repository, name: &str) -> Result<()> {
    let tree = get_commit(repo, name)?.tree()?;
    let mut opts = CheckoutBuilder::new();
    opts.force();
    repo.checkout_tree(tree.as_object(), Some(&mut opts))?;
    Ok(())
}

/// Whether the index or working directory differ from HEAD.
pub fn has_uncommitted_changes(repo: &Repository) -> Result<bool> {
    let mut opts = StatusOptions::new();
    opts.show(StatusShow::IndexAndWorkdir).include_untracked(true);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(!statuses.is_empty())
}

/// Deep-copy every conflict out of the index.
///
/// The returned records own their entries (paths included), so the caller
/// may clear the index's conflict state and re-apply them later.
pub fn get_conflicts(index: &Index) -> Result<Vec<IndexConflict>> {
    let mut conflicts = Vec::new();
    for conflict in index.conflicts()? {
        conflicts.push(conflict?);
    }
    Ok(conflicts)
}

/// Reset HEAD to the given commit.
///
/// A hard reset stages everything first so that deletions are reverted too.
pub fn reset_head(repo: &Repository, commit: &Commit<'_>, hard: bool) -> Result<()> {
    if hard {
        // Changes must be staged, or else they won't get reverted.
        let mut index = add_all(repo)?;
        index.write()?;
    }

    let mut opts = CheckoutBuilder::new();
    opts.force();
    let kind = if hard { ResetType::Hard } else { ResetType::Soft };
    repo.reset(commit.as_object(), kind, Some(&mut opts))?;
    Ok(())
}

/// Remove the last commit, resetting HEAD to its first parent.
///
/// The root commit can't be removed.
pub fn delete_last_commit(repo: &Repository, reset: bool) -> Result<()> {
    let last = get_commit(repo, "HEAD")?;
    if last.parent_count() == 0 {
        return Err(MetroError::unsupported("Can't delete initial commit."));
    }
    let parent = last.parent(0)?;
    reset_head(repo, &parent, reset)
}

/// Switch to another branch.
///
/// Switching to a WIP branch is disallowed. With `save_wip` the current
/// work is captured by the WIP engine; without it the working directory is
/// hard-reset to HEAD. Any WIP stored for the target branch is restored
/// after the switch.
pub fn switch_branch(repo: &Repository, name: &str, save_wip: bool) -> Result<()> {
    if is_wip(name) {
        return Err(MetroError::unsupported("Can't switch to WIP branch."));
    }
    if !branch_exists(repo, name) {
        return Err(MetroError::branch_not_found(name));
    }

    debug!(name, save_wip, "switching branch");
    if save_wip {
        wip::save_wip(repo)?;
    } else {
        let head = get_commit(repo, "HEAD")?;
        reset_head(repo, &head, true)?;
    }

    checkout(repo, name)?;
    move_head(repo, name)?;
    wip::restore_wip(repo)?;
    Ok(())
}

/// Point HEAD at the branch's reference without touching the working
/// directory.
pub fn move_head(repo: &Repository, name: &str) -> Result<()> {
    let branch = repo.find_branch(name, BranchType::Local)?;
    let refname = branch
        .get()
        .name()
        .ok_or_else(|| MetroError::unsupported("branch name is not valid UTF-8"))?;
    repo.set_head(refname)?;
    Ok(())
}

/// Set the url of the `origin` remote, creating it if missing.
pub fn add_remote<'r>(repo: &'r Repository, url: &str) -> Result<Remote<'r>> {
    let remotes = repo.remotes()?;
    if remotes.len() == 0 {
        Ok(repo.remote("origin", url)?)
    } else {
        repo.remote_set_url("origin", url)?;
        Ok(repo.find_remote("origin")?)
    }
}
