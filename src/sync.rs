//! The bidirectional sync engine.
//!
//! Sync reconciles three views of every branch: the local refs, the remote
//! refs fetched from `origin`, and the sync cache recording the last state
//! both sides agreed on. Each branch and its `#wip` companion are treated
//! as one unit (a [`DualTarget`]); WIP commits are compared by a content
//! hash that ignores author, committer and timestamps, so the same work in
//! progress saved on two machines still counts as identical.
//!
//! Per-branch classification:
//!
//! - heads equal on both sides → nothing to do;
//! - local head matches the cached state → only the remote changed → pull;
//! - remote head matches the cached state → only local changed → push;
//! - both changed → conflict, unless one head is the merge base of the
//!   other (then the richer side wins as a fast-forward). A true conflict
//!   moves the local commits to a fresh `base#N` branch and pulls the
//!   remote under the original name.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use git2::build::RepoBuilder;
use git2::{
    BranchType, FetchOptions, FetchPrune, ObjectType, Oid, Progress, PushOptions,
    ReferenceType, RemoteCallbacks, Repository,
};
use tracing::{debug, trace};

use crate::branch::{is_wip, to_wip, un_wip, BranchDescriptor};
use crate::cancel::CancelToken;
use crate::credentials::CredentialStore;
use crate::error::{MetroError, Result};
use crate::head::is_on_branch;
use crate::repo::{branch_exists, checkout, delete_branch, move_head};
use crate::sync_cache;
use crate::wip::{restore_wip, save_wip};

/// Which way changes are allowed to flow during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Push only.
    Up,
    /// Pull only.
    Down,
    /// Both directions.
    Both,
}

/// What the classifier decided for one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncType {
    Push,
    Pull,
    Conflict,
}

/// The action sync took for a branch, for the caller to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchAction {
    /// The branch already matched the remote (reported for the current
    /// branch only).
    UpToDate { branch: String },
    /// Local commits were pushed (possibly after a fast-forward downgrade
    /// from a would-be conflict).
    Pushed { branch: String },
    /// Remote commits were pulled.
    Pulled { branch: String },
    /// Local and remote diverged: local commits moved to `moved_to`, the
    /// remote state was pulled under the original name.
    ForkedOnConflict {
        branch: String,
        moved_to: String,
        /// Whether HEAD followed the local commits to the new branch.
        head_moved: bool,
    },
    /// Divergence detected but pushing was requested, so nothing was done.
    SkippedConflict { branch: String },
    /// One side's WIP branch is not a valid work-in-progress commit, so the
    /// branch pair was left untouched.
    SkippedBrokenWip { branch: String, local_broken: bool },
}

/// Everything sync did, in branch order.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub actions: Vec<BranchAction>,
}

/// The local, remote or cached target of a branch pair.
///
/// `base` is the plain branch's commit and `wip` the `#wip` companion's
/// commit (or its content hash, once hashed). The *head* of the pair is the
/// WIP when present, the base otherwise: the head is what actually differs
/// when any work differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DualTarget {
    pub base: Option<Oid>,
    pub wip: Option<Oid>,
}

impl DualTarget {
    fn add_target(&mut self, target: Oid, wip: bool) {
        if wip {
            self.wip = Some(target);
        } else {
            self.base = Some(target);
        }
    }

    /// The pair's effective head.
    pub fn head(&self) -> Option<Oid> {
        self.wip.or(self.base)
    }

    /// Whether a WIP branch exists on this side.
    pub fn has_wip(&self) -> bool {
        self.wip.is_some()
    }

    /// A WIP commit is valid only if its first parent is the base branch's
    /// head. A missing base disables the check: any commit would do.
    fn is_valid(&self, repo: &Repository, wip_commits: &HashMap<Oid, Oid>) -> bool {
        let (Some(wip_hash), Some(base)) = (self.wip, self.base) else {
            return true;
        };
        wip_commits
            .get(&wip_hash)
            .and_then(|oid| repo.find_commit(*oid).ok())
            .and_then(|commit| commit.parent_id(0).ok())
            .map_or(false, |parent| parent == base)
    }
}

/// The three views of one branch pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefTargets {
    pub local: DualTarget,
    pub remote: DualTarget,
    pub synced: DualTarget,
}

/// Fingerprint of a WIP commit that ignores author, committer and time.
///
/// `hash(tree ∥ hash(message) ∥ parent₀ ∥ parent₁ ∥ …)` using the object
/// database's content hash with a blob type tag. The result is only ever
/// compared for equality; it does not name a real object and must not be
/// looked up in the object database.
pub fn wip_commit_hash(repo: &Repository, commit_oid: Oid) -> Result<Oid> {
    let commit = repo.find_commit(commit_oid)?;
    let message_hash = Oid::hash_object(ObjectType::Blob, commit.message_raw_bytes())?;

    let mut data = Vec::with_capacity((commit.parent_count() + 2) * 20);
    data.extend_from_slice(commit.tree_id().as_bytes());
    data.extend_from_slice(message_hash.as_bytes());
    for parent in commit.parent_ids() {
        data.extend_from_slice(parent.as_bytes());
    }

    Ok(Oid::hash_object(ObjectType::Blob, &data)?)
}

/// Collect the local, remote and cached targets of every branch pair.
///
/// Only direct references participate; `refs/heads/` and
/// `refs/remotes/origin/` prefixes select the side. Cached targets come in
/// pre-hashed for WIP branches.
fn get_branch_targets(repo: &Repository) -> Result<BTreeMap<String, RefTargets>> {
    let mut targets: BTreeMap<String, RefTargets> = BTreeMap::new();

    for (name, oid) in sync_cache::read(repo)? {
        let wip = is_wip(&name);
        let key = un_wip(&name);
        targets.entry(key).or_default().synced.add_target(oid, wip);
    }

    for reference in repo.references()? {
        let reference = reference?;
        if reference.kind() != Some(ReferenceType::Direct) {
            continue;
        }
        let (Some(full_name), Some(oid)) = (reference.name(), reference.target()) else {
            continue;
        };

        let (name, local) = if let Some(name) = full_name.strip_prefix("refs/heads/") {
            (name, true)
        } else if let Some(name) = full_name.strip_prefix("refs/remotes/origin/") {
            (name, false)
        } else {
            continue;
        };

        let wip = is_wip(name);
        let key = un_wip(name);
        let entry = targets.entry(key).or_default();
        if local {
            entry.local.add_target(oid, wip);
        } else {
            entry.remote.add_target(oid, wip);
        }
    }

    Ok(targets)
}

/// Replace local and remote WIP targets with their WIP commit hashes.
///
/// Returns the side map from hash back to a commit carrying it, so pulled
/// WIP branches can still reach the underlying commit. Cached targets are
/// untouched: they are stored as hashes already.
fn hash_wip_commits(
    repo: &Repository,
    targets: &mut BTreeMap<String, RefTargets>,
) -> Result<HashMap<Oid, Oid>> {
    let mut wip_commits = HashMap::new();
    for entry in targets.values_mut() {
        if let Some(oid) = entry.local.wip {
            let hash = wip_commit_hash(repo, oid)?;
            wip_commits.insert(hash, oid);
            entry.local.wip = Some(hash);
        }
        if let Some(oid) = entry.remote.wip {
            let hash = wip_commit_hash(repo, oid)?;
            wip_commits.insert(hash, oid);
            entry.remote.wip = Some(hash);
        }
    }
    Ok(wip_commits)
}

/// Pick the next unused conflict-branch name sharing `name`'s base.
fn next_conflict_branch_name(name: &str, targets: &BTreeMap<String, RefTargets>) -> String {
    let mut descriptor = BranchDescriptor::parse(name);
    for existing in targets.keys() {
        let d = BranchDescriptor::parse(existing);
        if d.base == descriptor.base {
            descriptor.version = descriptor.version.max(d.version);
        }
    }
    descriptor.version += 1;
    descriptor.wip = false;
    descriptor.full_name()
}

/// Refspec pushing (or deleting) one branch on the remote.
fn make_push_refspec(branch_name: &str, deleting: bool) -> String {
    if deleting {
        format!(":refs/heads/{branch_name}")
    } else {
        format!("+refs/heads/{branch_name}:refs/heads/{branch_name}")
    }
}

/// Queue refspecs for a branch pair whose local side should win.
///
/// The base is pushed only when the two sides differ. The WIP is pushed
/// when exactly one side has one, or both do with different heads; a
/// remote-only WIP is deleted.
fn queue_push(branch_name: &str, targets: &RefTargets, refspecs: &mut Vec<String>) {
    if targets.local.base != targets.remote.base {
        refspecs.push(make_push_refspec(branch_name, targets.local.base.is_none()));
    }

    if (targets.local.has_wip() || targets.remote.has_wip())
        && targets.local.head() != targets.remote.head()
    {
        refspecs.push(make_push_refspec(
            &to_wip(branch_name),
            !targets.local.has_wip(),
        ));
    }
}

/// Point a local branch at a new target, creating or deleting as needed.
/// The working directory follows when the branch is current.
fn change_branch_target(repo: &Repository, branch_name: &str, new_target: Option<Oid>) -> Result<()> {
    match new_target {
        None => {
            // A WIP branch may already be gone if its base was deleted first.
            if branch_exists(repo, branch_name) {
                delete_branch(repo, branch_name)?;
            }
        }
        Some(oid) => {
            repo.reference(&format!("refs/heads/{branch_name}"), oid, true, "metro: pull")?;
            if is_on_branch(repo, branch_name)? {
                checkout(repo, branch_name)?;
            }
        }
    }
    Ok(())
}

/// Pull a branch pair: set the local refs to the fetched remote targets.
fn pull(
    repo: &Repository,
    branch_name: &str,
    targets: &RefTargets,
    wip_commits: &HashMap<Oid, Oid>,
) -> Result<()> {
    if targets.local.base != targets.remote.base {
        change_branch_target(repo, branch_name, targets.remote.base)?;
    }

    if (targets.local.has_wip() || targets.remote.has_wip())
        && targets.local.head() != targets.remote.head()
    {
        let new_target = targets
            .remote
            .wip
            .and_then(|hash| wip_commits.get(&hash).copied());
        change_branch_target(repo, &to_wip(branch_name), new_target)?;
    }
    Ok(())
}

/// Handle a genuinely diverged branch.
///
/// The local commits move to a fresh `base#N` branch (HEAD follows if it
/// was on the conflicting branch; no checkout is needed since the contents
/// don't change), then the remote state is pulled under the original name.
/// With pushing allowed, the new branches are queued for push.
#[allow(clippy::too_many_arguments)]
fn create_conflict_branches(
    repo: &Repository,
    branch_name: &str,
    targets: &RefTargets,
    direction: SyncDirection,
    branch_targets: &BTreeMap<String, RefTargets>,
    refspecs: &mut Vec<String>,
    synced_branches: &mut Vec<String>,
    wip_commits: &HashMap<Oid, Oid>,
) -> Result<BranchAction> {
    let new_name = next_conflict_branch_name(branch_name, branch_targets);
    debug!(branch = branch_name, moved_to = %new_name, "conflict: moving local commits");

    if let Some(base) = targets.local.base {
        repo.reference(
            &format!("refs/heads/{new_name}"),
            base,
            false,
            "metro: conflict branch",
        )?;
    }
    if let Some(wip_oid) = targets.local.wip.and_then(|hash| wip_commits.get(&hash)) {
        repo.reference(
            &format!("refs/heads/{}", to_wip(&new_name)),
            *wip_oid,
            false,
            "metro: conflict branch",
        )?;
    }

    // Keep the user on their own version of the branch.
    let head_moved = is_on_branch(repo, branch_name)?;
    if head_moved {
        move_head(repo, &new_name)?;
    }

    pull(repo, branch_name, targets, wip_commits)?;
    synced_branches.push(branch_name.to_owned());
    synced_branches.push(to_wip(branch_name));

    if direction != SyncDirection::Down {
        refspecs.push(make_push_refspec(&new_name, false));
        if targets.local.has_wip() {
            refspecs.push(make_push_refspec(&to_wip(&new_name), false));
        }
        synced_branches.push(new_name.clone());
        synced_branches.push(to_wip(&new_name));
    }

    Ok(BranchAction::ForkedOnConflict {
        branch: branch_name.to_owned(),
        moved_to: new_name,
        head_moved,
    })
}

/// Update the sync cache for the given branches.
///
/// Existing branches get their commit OID stored (WIP branches their WIP
/// commit hash); branches that no longer exist lose their entry.
fn update_sync_cache(repo: &Repository, branches: &[String]) -> Result<()> {
    for name in branches {
        if branch_exists(repo, name) {
            let branch = repo.find_branch(name, BranchType::Local)?;
            let Some(mut oid) = branch.get().target() else {
                continue;
            };
            if is_wip(name) {
                oid = wip_commit_hash(repo, oid)?;
            }
            sync_cache::write_entry(repo, name, oid)?;
        } else {
            sync_cache::delete_entry(repo, name)?;
        }
    }
    Ok(())
}

/// Build the callbacks shared by fetch, push and clone: on-demand
/// credentials and a transfer-progress callback that reports counters and
/// polls the cancellation token.
fn remote_callbacks<'a>(
    credentials: &'a mut CredentialStore,
    cancel: &CancelToken,
) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed_types| {
        credentials.acquire(url, username_from_url, allowed_types)
    });

    let fetch_cancel = cancel.clone();
    callbacks.transfer_progress(move |progress: Progress<'_>| {
        if progress.total_objects() > 0 {
            trace!(
                received = progress.received_objects(),
                indexed = progress.indexed_objects(),
                total = progress.total_objects(),
                bytes = progress.received_bytes(),
                "fetch progress"
            );
        }
        if fetch_cancel.requested() {
            fetch_cancel.mark_received();
            return false;
        }
        true
    });

    callbacks.push_transfer_progress(|current, total, bytes| {
        if total > 0 {
            trace!(current, total, bytes, "push progress");
        }
    });

    callbacks
}

/// Map a failed transfer to [`MetroError::Cancelled`] when the cancellation
/// token aborted it; the library error is the consequence, not the cause.
fn suppress_cancelled(err: git2::Error, cancel: &CancelToken) -> MetroError {
    if cancel.received() {
        MetroError::Cancelled
    } else {
        MetroError::Git(err)
    }
}

/// Synchronise the repository with `origin`.
///
/// Brackets the whole operation with a WIP save and restore so in-flight
/// work participates in the sync and is never discarded.
pub fn sync(
    repo: &Repository,
    credentials: &mut CredentialStore,
    direction: SyncDirection,
    cancel: &CancelToken,
) -> Result<SyncOutcome> {
    save_wip(repo)?;

    let mut origin = repo.find_remote("origin")?;
    {
        credentials.reset_tried();
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.prune(FetchPrune::On);
        fetch_opts.remote_callbacks(remote_callbacks(credentials, cancel));
        debug!("fetching all branches from origin");
        origin
            .fetch(&[] as &[&str], Some(&mut fetch_opts), None)
            .map_err(|err| suppress_cancelled(err, cancel))?;
    }

    let mut branch_targets = get_branch_targets(repo)?;
    // Compare WIP commits by content hash so that irrelevant metadata such
    // as timestamps and authors is ignored.
    let wip_commits = hash_wip_commits(repo, &mut branch_targets)?;

    let mut outcome = SyncOutcome::default();
    let mut push_refspecs: Vec<String> = Vec::new();
    // Branches known to have matching local and remote targets once this
    // sync completes.
    let mut synced_branches: Vec<String> = Vec::new();

    for (branch_name, targets) in &branch_targets {
        if targets.local.base == targets.remote.base {
            synced_branches.push(branch_name.clone());
        }

        if targets.local.head() == targets.remote.head() {
            // Queue the WIP name even when neither side has one, so a stale
            // cache entry for a WIP deleted on both sides gets reaped.
            synced_branches.push(to_wip(branch_name));
            if is_on_branch(repo, branch_name)? {
                outcome.actions.push(BranchAction::UpToDate {
                    branch: branch_name.clone(),
                });
            }
            continue;
        }

        let local_ok = targets.local.is_valid(repo, &wip_commits);
        let remote_ok = targets.remote.is_valid(repo, &wip_commits);
        if !(local_ok && remote_ok) {
            // Hard to tell what the user intended with a broken WIP, so
            // leave the pair alone.
            outcome.actions.push(BranchAction::SkippedBrokenWip {
                branch: branch_name.clone(),
                local_broken: !local_ok,
            });
            continue;
        }

        let mut sync_type = if targets.local.head() == targets.synced.head() {
            // Only remote has changed.
            SyncType::Pull
        } else if targets.remote.head() == targets.synced.head() {
            // Only local has changed.
            SyncType::Push
        } else {
            SyncType::Conflict
        };

        // Before forking a conflict branch, check whether one head is an
        // ancestor of the other; retaining all commits from both sides
        // beats a conflict branch that adds nothing past the divergence
        // point. WIP heads are hashes and never resolve, so WIP-bearing
        // pairs keep their conflict.
        if sync_type == SyncType::Conflict {
            let merge_base = match (targets.local.head(), targets.remote.head()) {
                (Some(local), Some(remote)) => repo.merge_base(local, remote).ok(),
                _ => None,
            };
            if targets.local.head() == merge_base {
                sync_type = SyncType::Pull;
            } else if targets.remote.head() == merge_base {
                sync_type = SyncType::Push;
            }
        }

        match sync_type {
            SyncType::Push => {
                if matches!(direction, SyncDirection::Up | SyncDirection::Both) {
                    queue_push(branch_name, targets, &mut push_refspecs);
                    synced_branches.push(branch_name.clone());
                    synced_branches.push(to_wip(branch_name));
                    outcome.actions.push(BranchAction::Pushed {
                        branch: branch_name.clone(),
                    });
                }
            }
            SyncType::Pull => {
                if matches!(direction, SyncDirection::Down | SyncDirection::Both) {
                    pull(repo, branch_name, targets, &wip_commits)?;
                    synced_branches.push(branch_name.clone());
                    synced_branches.push(to_wip(branch_name));
                    outcome.actions.push(BranchAction::Pulled {
                        branch: branch_name.clone(),
                    });
                }
            }
            SyncType::Conflict => {
                if direction == SyncDirection::Up {
                    outcome.actions.push(BranchAction::SkippedConflict {
                        branch: branch_name.clone(),
                    });
                } else {
                    let action = create_conflict_branches(
                        repo,
                        branch_name,
                        targets,
                        direction,
                        &branch_targets,
                        &mut push_refspecs,
                        &mut synced_branches,
                        &wip_commits,
                    )?;
                    outcome.actions.push(action);
                }
            }
        }
    }

    if !push_refspecs.is_empty() {
        credentials.reset_tried();
        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(remote_callbacks(credentials, cancel));
        debug!(refspecs = ?push_refspecs, "pushing");
        origin
            .push(&push_refspecs, Some(&mut push_opts))
            .map_err(|err| suppress_cancelled(err, cancel))?;
    }

    update_sync_cache(repo, &synced_branches)?;
    restore_wip(repo)?;
    Ok(outcome)
}

/// Pull every fetched branch into its local counterpart, no questions
/// asked. Used after clone, where the remote is authoritative.
pub fn force_pull(repo: &Repository) -> Result<()> {
    let mut branch_targets = get_branch_targets(repo)?;
    let wip_commits = hash_wip_commits(repo, &mut branch_targets)?;

    let mut synced_branches = Vec::new();
    for (branch_name, targets) in &branch_targets {
        pull(repo, branch_name, targets, &wip_commits)?;
        synced_branches.push(branch_name.clone());
        synced_branches.push(to_wip(branch_name));
    }

    update_sync_cache(repo, &synced_branches)
}

/// Clone a remote repository into `path`.
///
/// Fails with [`MetroError::RepositoryExists`] if `<path>/.git` already
/// exists. After the clone, every remote branch is force-pulled into a
/// local branch and the current branch's WIP (if any) is restored.
pub fn clone(
    url: &str,
    path: &Path,
    credentials: &mut CredentialStore,
    cancel: &CancelToken,
) -> Result<Repository> {
    if path.join(".git").exists() {
        return Err(MetroError::RepositoryExists);
    }

    let repo = {
        credentials.reset_tried();
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(remote_callbacks(credentials, cancel));
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_opts);
        builder
            .clone(url, path)
            .map_err(|err| suppress_cancelled(err, cancel))?
    };

    force_pull(&repo)?;
    if !repo.head_detached()? {
        restore_wip(&repo)?;
    }
    Ok(repo)
}
