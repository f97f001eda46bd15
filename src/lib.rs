//! Metro — a workflow layer on top of the Git object model.
//!
//! Metro reshapes everyday branching, synchronisation and work-in-progress
//! handling into a simpler model. Its distinguishing idea is the first-class
//! **WIP branch**: every branch `B` may have a companion `B#wip` holding
//! uncommitted work and in-progress merges, transparently saved and restored
//! across branch switches, clones and network syncs.
//!
//! The crate is organised by concern:
//!
//! - [`branch`] — the `base[#version][#wip]` name algebra everything else
//!   builds on.
//! - [`url`] — fail-soft clone-URL decomposition.
//! - [`repo`] — high-level primitives over the git object database
//!   (stage-all commits, checkout, reset, branch lifecycle).
//! - [`head`] — interpretation of the HEAD pointer.
//! - [`merging`] — absorb/resolve and the persisted merge message.
//! - [`wip`] — the WIP engine: save and restore of working state,
//!   including conflicted merges.
//! - [`sync`] — the bidirectional sync engine and clone.
//! - [`sync_cache`] — the per-branch record of the last synced state.
//! - [`credentials`] — the credential contract the sync engine consumes.
//! - [`cancel`] — cooperative cancellation of network transfers.
//!
//! All operations use the `git2` crate as the underlying git library; Metro
//! repositories are ordinary git repositories.

pub mod branch;
pub mod cancel;
pub mod credentials;
pub mod error;
pub mod head;
pub mod merging;
pub mod repo;
pub mod sync;
pub mod sync_cache;
pub mod url;
pub mod wip;

pub use branch::{is_wip, to_wip, un_wip, BranchDescriptor, WIP_SUFFIX};
pub use cancel::CancelToken;
pub use credentials::{CredentialSource, CredentialStore, DefaultCredentialSource};
pub use error::{MetroError, Result};
pub use head::{get_head, Head};
pub use sync::{BranchAction, SyncDirection, SyncOutcome};
pub use url::UrlDescriptor;
