//! The credential contract consumed by the sync engine.
//!
//! The engine only needs one thing: given a URL and the credential types
//! the transport will accept, produce a credential token. A
//! [`CredentialStore`] sits between the transport callback and a
//! [`CredentialSource`], remembering what was handed out so a rejection can
//! be told apart from a first request: on rejection the stored secret is
//! wiped and the source is asked again.
//!
//! Secrets are overwritten in memory when no longer held.

use std::path::PathBuf;

use git2::{Config, Cred, CredentialHelper, CredentialType};
use zeroize::Zeroize;

/// One acquired credential, stored as its ingredients so a fresh
/// [`Cred`] token can be minted per transport callback.
#[derive(Debug)]
pub enum Secret {
    /// The transport's default mechanism (e.g. negotiated auth).
    Default,
    /// Plaintext username and password.
    UserPass { username: String, password: String },
    /// A key held by the running SSH agent.
    SshAgent { username: String },
    /// An on-disk SSH key pair.
    SshKey {
        username: String,
        public_key: PathBuf,
        private_key: PathBuf,
        passphrase: Option<String>,
    },
}

impl Secret {
    fn to_cred(&self) -> Result<Cred, git2::Error> {
        match self {
            Secret::Default => Cred::default(),
            Secret::UserPass { username, password } => {
                Cred::userpass_plaintext(username, password)
            }
            Secret::SshAgent { username } => Cred::ssh_key_from_agent(username),
            Secret::SshKey {
                username,
                public_key,
                private_key,
                passphrase,
            } => Cred::ssh_key(username, Some(public_key), private_key, passphrase.as_deref()),
        }
    }

    fn wipe(&mut self) {
        match self {
            Secret::Default | Secret::SshAgent { .. } => {}
            Secret::UserPass { username, password } => {
                username.zeroize();
                password.zeroize();
            }
            Secret::SshKey { passphrase, .. } => {
                if let Some(passphrase) = passphrase {
                    passphrase.zeroize();
                }
            }
        }
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// Where credentials come from when the store has none.
pub trait CredentialSource {
    /// Produce a credential for `url` acceptable to `allowed_types`.
    fn obtain(
        &self,
        url: &str,
        username_from_url: Option<&str>,
        allowed_types: CredentialType,
    ) -> Result<Secret, git2::Error>;
}

/// Default source: git's configured credential helpers for user/pass, the
/// SSH agent (falling back to `~/.ssh/id_rsa`) for SSH, and the transport
/// default otherwise.
#[derive(Debug, Default)]
pub struct DefaultCredentialSource;

impl CredentialSource for DefaultCredentialSource {
    fn obtain(
        &self,
        url: &str,
        username_from_url: Option<&str>,
        allowed_types: CredentialType,
    ) -> Result<Secret, git2::Error> {
        if allowed_types.is_ssh_key() {
            let username = username_from_url.unwrap_or("git").to_owned();
            if std::env::var_os("SSH_AUTH_SOCK").is_some() {
                return Ok(Secret::SshAgent { username });
            }
            if let Some(home) = dirs::home_dir() {
                let private_key = home.join(".ssh/id_rsa");
                if private_key.exists() {
                    return Ok(Secret::SshKey {
                        username,
                        public_key: home.join(".ssh/id_rsa.pub"),
                        private_key,
                        passphrase: None,
                    });
                }
            }
            return Err(git2::Error::from_str(
                "no SSH agent and no ~/.ssh/id_rsa key available",
            ));
        }

        if allowed_types.is_user_pass_plaintext() {
            let mut helper = CredentialHelper::new(url);
            if let Ok(config) = Config::open_default() {
                helper.config(&config);
            }
            helper.username(username_from_url);
            if let Some((username, password)) = helper.execute() {
                return Ok(Secret::UserPass { username, password });
            }
            return Err(git2::Error::from_str(&format!(
                "no credential helper produced credentials for {url}"
            )));
        }

        Ok(Secret::Default)
    }
}

/// Holds the current credential and the `tried` flag separating "never
/// asked" from "asked and rejected".
pub struct CredentialStore {
    secret: Option<Secret>,
    tried: bool,
    source: Box<dyn CredentialSource>,
}

impl CredentialStore {
    /// A store backed by the given source.
    pub fn new(source: Box<dyn CredentialSource>) -> Self {
        Self {
            secret: None,
            tried: false,
            source,
        }
    }

    /// A store backed by [`DefaultCredentialSource`].
    pub fn with_default_source() -> Self {
        Self::new(Box::new(DefaultCredentialSource))
    }

    /// Forget that the current secret was ever handed out. Called before
    /// each new network operation so a stored credential gets one more
    /// chance before being treated as rejected.
    pub fn reset_tried(&mut self) {
        self.tried = false;
    }

    /// Wipe and drop the stored secret.
    pub fn clear(&mut self) {
        // Secret::drop overwrites the memory.
        self.secret = None;
        self.tried = false;
    }

    /// The transport credential callback.
    ///
    /// A second call without an intervening [`reset_tried`](Self::reset_tried)
    /// means the previous answer was rejected: the secret is wiped and the
    /// source re-invoked.
    pub fn acquire(
        &mut self,
        url: &str,
        username_from_url: Option<&str>,
        allowed_types: CredentialType,
    ) -> Result<Cred, git2::Error> {
        if self.tried {
            tracing::debug!(url, "credentials rejected, asking the source again");
            self.clear();
        }

        if self.secret.is_none() {
            self.secret = Some(self.source.obtain(url, username_from_url, allowed_types)?);
        }
        self.tried = true;

        match &self.secret {
            Some(secret) => secret.to_cred(),
            None => Err(git2::Error::from_str("credential store is empty")),
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::with_default_source()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct CountingSource {
        calls: Rc<Cell<usize>>,
    }

    impl CredentialSource for CountingSource {
        fn obtain(
            &self,
            _url: &str,
            _username_from_url: Option<&str>,
            _allowed_types: CredentialType,
        ) -> Result<Secret, git2::Error> {
            self.calls.set(self.calls.get() + 1);
            Ok(Secret::UserPass {
                username: "user".to_owned(),
                password: "pass".to_owned(),
            })
        }
    }

    #[test]
    fn source_is_asked_once_until_rejected() {
        let calls = Rc::new(Cell::new(0));
        let mut store = CredentialStore::new(Box::new(CountingSource {
            calls: Rc::clone(&calls),
        }));

        store
            .acquire("https://host/repo", None, CredentialType::USER_PASS_PLAINTEXT)
            .unwrap();
        assert_eq!(calls.get(), 1);

        // A retry without reset means rejection: the source is re-invoked.
        store
            .acquire("https://host/repo", None, CredentialType::USER_PASS_PLAINTEXT)
            .unwrap();
        assert_eq!(calls.get(), 2);

        // After a reset the stored secret is reused instead.
        store.reset_tried();
        store
            .acquire("https://host/repo", None, CredentialType::USER_PASS_PLAINTEXT)
            .unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn wiped_secret_is_zeroed() {
        let mut secret = Secret::UserPass {
            username: "someone".to_owned(),
            password: "hunter2".to_owned(),
        };
        secret.wipe();
        match &secret {
            Secret::UserPass { username, password } => {
                assert!(username.is_empty());
                assert!(password.is_empty());
            }
            other => panic!("expected UserPass, got {other:?}"),
        }
    }
}
