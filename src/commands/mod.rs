//! Thin command shells: argument shaping, user-facing output, and calls
//! into the library. No workflow logic lives here.

pub mod absorb;
pub mod branch;
pub mod clone;
pub mod commit;
pub mod create;
pub mod delete;
pub mod info;
pub mod list;
pub mod patch;
pub mod rename;
pub mod resolve;
pub mod switch;
pub mod sync;
pub mod wip;

use std::path::Path;

use git2::Repository;
use metro::repo::{change_counts, ChangeCounts};

/// Open the repository in the current directory.
fn open_current() -> metro::Result<Repository> {
    metro::repo::open(Path::new("."))
}

/// Print per-kind change counts; `labels` supplies the wording per kind
/// (e.g. `"added"` for commit, `"to add"` for info).
fn print_change_counts(counts: &ChangeCounts, labels: [&str; 5]) {
    let kinds = [
        counts.added,
        counts.deleted,
        counts.modified,
        counts.renamed,
        counts.copied,
    ];
    for (count, label) in kinds.into_iter().zip(labels) {
        if count != 0 {
            let plural = if count > 1 { "s" } else { "" };
            println!("{count} file{plural} {label}");
        }
    }
}

/// Counts for the current uncommitted changes.
fn current_change_counts(repo: &Repository) -> metro::Result<ChangeCounts> {
    let diff = metro::repo::current_changes(repo)?;
    Ok(change_counts(&diff))
}
