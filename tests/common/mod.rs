//! Shared test helpers for metro integration tests.
//!
//! All tests use temp directories — no side effects on the real repo. A
//! fake HOME with a `.gitconfig` is installed once per test process so the
//! default signature resolves without touching the developer's real config.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Once;

use git2::{Oid, Repository};
use tempfile::TempDir;

static TEST_ENV: Once = Once::new();

/// Point HOME at a throwaway directory carrying a test identity.
pub fn init_test_env() {
    TEST_ENV.call_once(|| {
        let home = std::env::temp_dir().join(format!("metro-test-home-{}", std::process::id()));
        fs::create_dir_all(&home).expect("failed to create test home");
        fs::write(
            home.join(".gitconfig"),
            "[user]\n\tname = Test User\n\temail = test@example.com\n",
        )
        .expect("failed to write test gitconfig");
        std::env::set_var("HOME", &home);
        std::env::set_var("USERPROFILE", &home);
        // Keep credential helpers and the SSH agent out of the tests.
        std::env::remove_var("SSH_AUTH_SOCK");
    });
}

/// Create a fresh metro repo in a temp directory.
pub fn setup_repo() -> (TempDir, Repository) {
    init_test_env();
    let dir = TempDir::new().expect("failed to create temp dir");
    let repo = metro::repo::create(dir.path()).expect("failed to create repo");
    (dir, repo)
}

/// Create a bare repository to act as `origin`.
pub fn setup_bare_remote() -> (TempDir, String) {
    init_test_env();
    let dir = TempDir::new().expect("failed to create remote temp dir");
    Repository::init_bare(dir.path()).expect("failed to init bare remote");
    let url = dir.path().to_string_lossy().into_owned();
    (dir, url)
}

/// Write (or overwrite) a file inside the repo's working directory.
pub fn write_file(repo: &Repository, name: &str, content: &str) {
    let path = workdir(repo).join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dirs");
    }
    fs::write(path, content).expect("failed to write file");
}

/// Read a file from the repo's working directory.
pub fn read_file(repo: &Repository, name: &str) -> String {
    fs::read_to_string(workdir(repo).join(name)).expect("failed to read file")
}

pub fn file_exists(repo: &Repository, name: &str) -> bool {
    workdir(repo).join(name).exists()
}

pub fn workdir(repo: &Repository) -> &Path {
    repo.workdir().expect("repo has no working directory")
}

/// Commit everything in the working directory.
pub fn commit_all(repo: &Repository, message: &str) -> Oid {
    let parents: &[&str] = if metro::repo::head_exists(repo) {
        &["HEAD"]
    } else {
        &[]
    };
    metro::repo::commit_revs(repo, "HEAD", message, parents).expect("failed to commit")
}

/// The commit a local branch points at.
pub fn branch_target(repo: &Repository, name: &str) -> Oid {
    repo.find_branch(name, git2::BranchType::Local)
        .unwrap_or_else(|_| panic!("branch {name} should exist"))
        .get()
        .target()
        .expect("branch should be a direct reference")
}

/// Names of all local branches, sorted.
pub fn local_branches(repo: &Repository) -> Vec<String> {
    let mut names: Vec<String> = repo
        .branches(Some(git2::BranchType::Local))
        .expect("failed to list branches")
        .map(|entry| {
            let (branch, _) = entry.expect("failed to read branch");
            branch
                .name()
                .expect("branch name should be readable")
                .expect("branch name should be UTF-8")
                .to_owned()
        })
        .collect();
    names.sort();
    names
}

/// Read a sync-cache entry as text, if present.
pub fn cache_entry(repo: &Repository, name: &str) -> Option<String> {
    fs::read_to_string(repo.path().join("synced").join(name)).ok()
}

/// A credential store for syncs over local path remotes (no credentials
/// are ever requested).
pub fn test_credentials() -> metro::CredentialStore {
    metro::CredentialStore::with_default_source()
}
