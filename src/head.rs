//! Interpretation of the repository HEAD.
//!
//! The HEAD pointer file is read raw rather than through ref resolution so
//! that an unborn branch (HEAD pointing at a branch with no commits yet)
//! still reports its branch name.

use std::fs;

use git2::Repository;

use crate::error::Result;

/// The current head of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    /// Branch name when attached; raw commit id text when detached.
    pub name: String,
    /// Whether HEAD points directly at a commit.
    pub detached: bool,
}

/// Read and interpret the HEAD pointer file.
pub fn get_head(repo: &Repository) -> Result<Head> {
    let mut content = fs::read_to_string(repo.path().join("HEAD"))?;
    if content.ends_with('\n') {
        content.pop();
    }

    for prefix in ["ref: refs/heads/", "ref: refs/remotes/"] {
        if let Some(name) = content.strip_prefix(prefix) {
            return Ok(Head {
                name: name.to_owned(),
                detached: false,
            });
        }
    }

    Ok(Head {
        name: content,
        detached: true,
    })
}

/// True iff HEAD is attached and points at exactly this branch.
pub fn is_on_branch(repo: &Repository, branch: &str) -> Result<bool> {
    let head = get_head(repo)?;
    Ok(!head.detached && head.name == branch)
}
