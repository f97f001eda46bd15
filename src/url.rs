//! Clone-URL decomposition.
//!
//! [`UrlDescriptor`] splits a clone URL into protocol, host, path and the
//! repository name used as the default clone directory. Parsing is
//! fail-soft: components that can't be found are left empty and no error is
//! ever raised, since the underlying git transport is the real validator.

/// The separate parts of a clone URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlDescriptor {
    /// Scheme without the `://`, e.g. `https`. Empty if absent.
    pub protocol: String,
    /// Host portion up to the first `/`. Empty if absent.
    pub host: String,
    /// Everything after the host separator.
    pub path: String,
    /// The repository name: the last useful path component with a trailing
    /// `.git` or `.bundle` extension stripped. Empty if none was found.
    pub repository: String,
}

impl UrlDescriptor {
    /// Parse a clone URL.
    pub fn parse(url: &str) -> Self {
        // Treat all types of slashes the same.
        let mut rem = url.replace('\\', "/");
        let mut desc = UrlDescriptor::default();

        if let Some(scheme_end) = rem.find("://") {
            desc.protocol = rem[..scheme_end].to_owned();
            rem = rem[scheme_end + 3..].to_owned();
        }

        // Strip a user@ authority prefix, if any comes before the first slash.
        if let Some(at) = rem.find('@') {
            if !rem[..at].contains('/') {
                rem = rem[at + 1..].to_owned();
            }
        }

        // An scp-like `host:path` separator binds tighter than the first
        // slash; otherwise the host runs up to the first slash.
        let slash = rem.find('/');
        let colon = rem.find(':').filter(|&c| slash.map_or(true, |s| c < s));
        if let Some(host_end) = colon.or(slash) {
            desc.host = rem[..host_end].to_owned();
            desc.path = rem[host_end + 1..].to_owned();
        } else {
            desc.path = rem.clone();
        }

        desc.repository = repository_component(&rem);
        desc
    }
}

/// Find the last useful path component and strip its extension.
///
/// Empty and whitespace-only components are skipped, as is one trailing
/// `.git` component (a second literal `.git` is kept on its own). A
/// trailing `.git`/`.bundle` extension is removed only when it is not the
/// entire component.
fn repository_component(after_authority: &str) -> String {
    let mut rem = after_authority.to_owned();
    let mut skipped_git = false;

    while let Some(last_slash) = rem.rfind('/') {
        let component = rem[last_slash + 1..].to_owned();
        rem.truncate(last_slash);

        if !component.trim().is_empty() && (component != ".git" || skipped_git) {
            rem = component;
            break;
        }
        if component == ".git" {
            skipped_git = true;
        }
    }

    if rem.ends_with(".git") && rem != ".git" {
        rem.truncate(rem.len() - ".git".len());
    } else if rem.ends_with(".bundle") && rem != ".bundle" {
        rem.truncate(rem.len() - ".bundle".len());
    }

    if rem.trim().is_empty() {
        String::new()
    } else {
        rem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_url_with_user() {
        let d = UrlDescriptor::parse("https://user@host.example/org/Proj.git");
        assert_eq!(d.protocol, "https");
        assert_eq!(d.host, "host.example");
        assert_eq!(d.path, "org/Proj.git");
        assert_eq!(d.repository, "Proj");
    }

    #[test]
    fn scp_like_url() {
        let d = UrlDescriptor::parse("git@host:org/proj");
        assert_eq!(d.protocol, "");
        assert_eq!(d.host, "host");
        assert_eq!(d.path, "org/proj");
        assert_eq!(d.repository, "proj");
    }

    #[test]
    fn backslashes_are_normalised() {
        let d = UrlDescriptor::parse("host\\org\\repo");
        assert_eq!(d.host, "host");
        assert_eq!(d.path, "org/repo");
        assert_eq!(d.repository, "repo");
    }

    #[test]
    fn bundle_extension_is_stripped() {
        let d = UrlDescriptor::parse("https://host/backups/repo.bundle");
        assert_eq!(d.repository, "repo");
    }

    #[test]
    fn trailing_git_component_is_skipped() {
        let d = UrlDescriptor::parse("https://host/org/repo/.git");
        assert_eq!(d.repository, "repo");
    }

    #[test]
    fn double_git_component_is_kept() {
        let d = UrlDescriptor::parse("https://host/org/.git/.git");
        assert_eq!(d.repository, ".git");
    }

    #[test]
    fn whole_component_extension_is_kept() {
        let d = UrlDescriptor::parse("https://host/org/.bundle");
        assert_eq!(d.repository, ".bundle");
    }

    #[test]
    fn empty_components_are_skipped() {
        let d = UrlDescriptor::parse("https://host/org/repo//");
        assert_eq!(d.repository, "repo");
    }

    #[test]
    fn missing_everything_fails_soft() {
        let d = UrlDescriptor::parse("");
        assert_eq!(d, UrlDescriptor::default());
    }
}
