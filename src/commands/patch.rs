use anyhow::Result;
use metro::MetroError;

use super::open_current;

pub fn run(message: Option<&str>, force: bool) -> Result<()> {
    let repo = open_current()?;
    if !metro::repo::head_exists(&repo) {
        return Err(MetroError::unsupported("No commit to patch.").into());
    }
    metro::merging::assert_not_merging(&repo)?;

    let commit = metro::repo::get_commit(&repo, "HEAD")?;
    // The existing message is the default.
    let message = match message {
        Some(message) => message.to_owned(),
        None => commit.message().unwrap_or("").to_owned(),
    };

    if !force {
        let author = commit.author();
        let current = repo.signature()?;
        let same_name = author.name() == current.name();
        let same_email = author.email() == current.email();
        if !same_name && !same_email {
            println!("Your credentials are different to the author of the commit you are trying to patch.");
            println!("Patching the commit will override their credentials with your own.");
            println!("If you would still like to patch, use metro patch --force.");
            return Ok(());
        }
    }

    metro::repo::patch(&repo, &message)?;
    println!("Patched commit.");
    Ok(())
}
