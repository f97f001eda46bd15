//! Error types for Metro operations.
//!
//! [`MetroError`] is the single error type returned by the library. It uses
//! rich enum variants so callers can match on specific failure modes (merge
//! state, missing branch, sync-cache I/O) without parsing error messages.
//! The CLI maps every surfaced error to exit code -1.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MetroError>;

/// Errors returned by Metro operations.
#[derive(Debug, Error)]
pub enum MetroError {
    /// The underlying git library reported a failure.
    #[error("{0}")]
    Git(#[from] git2::Error),

    /// A repository already exists at the target path.
    #[error("There is already a repository in this directory.")]
    RepositoryExists,

    /// The command requires a repository but none was found.
    #[error("There is no Git repository in this directory.\nYou can create one with metro create.")]
    RepositoryNotExists,

    /// A named branch does not exist.
    #[error("Branch \"{name}\" not found.")]
    BranchNotFound {
        /// The branch name that failed to resolve.
        name: String,
    },

    /// A merge is in progress and blocks the requested operation.
    #[error("Branch has conflicts, please finish resolving them.\nRun metro resolve when you are done.")]
    CurrentlyMerging,

    /// The operation requires an ongoing merge, but there is none.
    #[error("You can only resolve conflicts while absorbing.")]
    NotMerging,

    /// Merge analysis found nothing to merge.
    #[error("Nothing to absorb.")]
    UnnecessaryMerge,

    /// The operation is not allowed in the repository's current state.
    #[error("{message}")]
    UnsupportedOperation {
        /// What was attempted and why it is disallowed.
        message: String,
    },

    /// A `wip` subcommand that needs a detached WIP ran with none present.
    #[error("This can only be executed on a detached WIP.\nYou can detach the WIP using 'metro wip save'.")]
    AttachedWip,

    /// A `wip` subcommand that needs an attached WIP ran with a WIP branch present.
    #[error("This can only be executed on an attached WIP.\nYou can attach the WIP using 'metro wip restore'.")]
    DetachedWip,

    /// A filesystem operation on the sync cache failed.
    #[error("{message}: {source}")]
    SyncCache {
        /// What the sync cache operation was doing.
        message: String,
        /// The underlying filesystem error.
        source: std::io::Error,
    },

    /// The user cancelled an in-flight network transfer.
    ///
    /// Reported instead of the git error the aborted transfer produced, so
    /// the user sees a clean cancellation rather than a network failure.
    #[error("Sync cancelled.")]
    Cancelled,

    /// A branch name failed validation.
    #[error("Branch name '{name}' is invalid: {reason}")]
    InvalidBranchName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An I/O error outside the sync cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetroError {
    /// Shorthand for [`MetroError::UnsupportedOperation`].
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Shorthand for [`MetroError::BranchNotFound`].
    pub fn branch_not_found(name: impl Into<String>) -> Self {
        Self::BranchNotFound { name: name.into() }
    }

    /// True for the "thing was missing" errors that best-effort cleanup
    /// steps are allowed to swallow.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::BranchNotFound { .. } => true,
            Self::Git(err) => err.code() == git2::ErrorCode::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_not_found_names_the_branch() {
        let err = MetroError::branch_not_found("feature");
        assert_eq!(format!("{err}"), "Branch \"feature\" not found.");
        assert!(err.is_not_found());
    }

    #[test]
    fn merge_errors_are_not_swallowable() {
        assert!(!MetroError::CurrentlyMerging.is_not_found());
        assert!(!MetroError::UnnecessaryMerge.is_not_found());
    }

    #[test]
    fn git_not_found_is_swallowable() {
        let err = MetroError::Git(git2::Error::new(
            git2::ErrorCode::NotFound,
            git2::ErrorClass::Reference,
            "ref not found",
        ));
        assert!(err.is_not_found());
    }

    #[test]
    fn unsupported_carries_message() {
        let err = MetroError::unsupported("Can't switch to WIP branch.");
        assert_eq!(format!("{err}"), "Can't switch to WIP branch.");
    }
}
