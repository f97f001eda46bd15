//! The sync cache: one file per branch under `<gitdir>/synced/`.
//!
//! Each file's path relative to the cache root is the branch name (slashes
//! in names become subdirectories, like regular git references) and its
//! content is exactly one hex OID: the branch's commit id, or the WIP
//! commit hash for `#wip` branches. The cache records the last state both
//! sides agreed on and serves as the common ancestor for the sync engine's
//! three-way classification.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository};

use crate::error::{MetroError, Result};

/// Root directory of the sync cache.
fn cache_root(repo: &Repository) -> PathBuf {
    repo.path().join("synced")
}

fn cache_error(message: impl Into<String>, source: io::Error) -> MetroError {
    MetroError::SyncCache {
        message: message.into(),
        source,
    }
}

/// Read every cache entry into `(branch name, stored OID)` pairs.
///
/// A missing cache directory yields no entries.
pub fn read(repo: &Repository) -> Result<Vec<(String, Oid)>> {
    let root = cache_root(repo);
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    visit(&root, &root, &mut entries)?;
    Ok(entries)
}

fn visit(dir: &Path, root: &Path, out: &mut Vec<(String, Oid)>) -> Result<()> {
    let listing = fs::read_dir(dir)
        .map_err(|err| cache_error(format!("Error accessing {}", dir.display()), err))?;
    for entry in listing {
        let entry =
            entry.map_err(|err| cache_error(format!("Error reading {}", dir.display()), err))?;
        let path = entry.path();
        if path.is_dir() {
            visit(&path, root, out)?;
        } else if path.is_file() {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = fs::read_to_string(&path)
                .map_err(|err| cache_error(format!("Error reading {}", path.display()), err))?;
            let oid = Oid::from_str(content.trim())?;
            out.push((name, oid));
        }
    }
    Ok(())
}

/// Create or overwrite the cache entry for a branch.
pub fn write_entry(repo: &Repository, name: &str, value: Oid) -> Result<()> {
    let path = cache_root(repo).join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| cache_error(format!("Failed to create sync cache entry for {name}"), err))?;
    }
    fs::write(&path, value.to_string())
        .map_err(|err| cache_error(format!("Failed to create sync cache entry for {name}"), err))
}

/// Delete a branch's cache entry, if present, pruning parent directories
/// that become empty.
pub fn delete_entry(repo: &Repository, name: &str) -> Result<()> {
    let root = cache_root(repo);
    let path = root.join(name);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(cache_error(
                format!("Failed to delete sync cache entry for {name}"),
                err,
            ));
        }
    }

    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == root {
            break;
        }
        let empty = match fs::read_dir(current) {
            Ok(mut listing) => listing.next().is_none(),
            Err(_) => break,
        };
        if !empty {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
    Ok(())
}
