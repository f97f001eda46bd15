use std::path::Path;

use anyhow::Result;
use metro::{CancelToken, CredentialStore, MetroError, UrlDescriptor};

pub fn run(url: &str, cancel: &CancelToken) -> Result<()> {
    // Ignore slash direction.
    let url = url.replace('\\', "/");
    let name = UrlDescriptor::parse(&url).repository;
    if name.is_empty() {
        return Err(MetroError::unsupported("Couldn't find repository name in URL.").into());
    }

    println!("Cloning {url} into {name}");
    let mut credentials = CredentialStore::with_default_source();
    metro::sync::clone(&url, Path::new(&name), &mut credentials, cancel)?;
    println!("Cloning complete.");
    Ok(())
}
