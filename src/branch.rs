//! The branch-name descriptor algebra.
//!
//! Metro branch names follow the grammar `base ("#" version)? ("#wip")?`.
//! A branch whose name ends in [`WIP_SUFFIX`] is a *WIP branch*; its partner
//! is the same name without the suffix. Versioned names (`base#2`) are
//! produced by the sync engine when local and remote histories diverge.
//!
//! [`BranchDescriptor`] round-trips: parsing a name produced by
//! [`BranchDescriptor::full_name`] yields the same descriptor. Version 0 is
//! never emitted, so `base` and `base#0` format identically.

use crate::error::{MetroError, Result};

/// Suffix marking a branch as a work-in-progress companion.
pub const WIP_SUFFIX: &str = "#wip";

/// The separate parts of a Metro branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDescriptor {
    /// The name with any version number and WIP suffix removed.
    pub base: String,
    /// Version number; 0 means unversioned.
    pub version: u32,
    /// Whether the name carries the WIP suffix.
    pub wip: bool,
}

impl BranchDescriptor {
    /// Decompose a branch name into its descriptor.
    ///
    /// The WIP suffix is stripped first, then a trailing `#<digits>` suffix
    /// is taken as the version. A `#` suffix that does not parse as a
    /// non-negative integer is kept as part of the base name.
    pub fn parse(name: &str) -> Self {
        let mut base = name.to_owned();
        let wip = is_wip(&base);
        if wip {
            base.truncate(base.len() - WIP_SUFFIX.len());
        }

        let mut version = 0;
        if let Some(pos) = base.rfind('#') {
            let suffix = &base[pos + 1..];
            if let Some(v) = parse_version(suffix) {
                version = v;
                base.truncate(pos);
            }
        }

        BranchDescriptor { base, version, wip }
    }

    /// Format the descriptor back into a branch name.
    pub fn full_name(&self) -> String {
        let mut name = self.base.clone();
        // Version 0 is the unversioned form.
        if self.version > 0 {
            name.push('#');
            name.push_str(&self.version.to_string());
        }
        if self.wip {
            name.push_str(WIP_SUFFIX);
        }
        name
    }
}

/// Parse a version suffix: plain decimal digits only, no sign.
fn parse_version(suffix: &str) -> Option<u32> {
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Append the WIP suffix to a branch name, if not already present.
pub fn to_wip(name: &str) -> String {
    if is_wip(name) {
        name.to_owned()
    } else {
        format!("{name}{WIP_SUFFIX}")
    }
}

/// Remove the WIP suffix from a branch name, if present.
pub fn un_wip(name: &str) -> String {
    if let Some(stripped) = name.strip_suffix(WIP_SUFFIX) {
        stripped.to_owned()
    } else {
        name.to_owned()
    }
}

/// Check whether a branch name has the WIP suffix.
pub fn is_wip(name: &str) -> bool {
    name.ends_with(WIP_SUFFIX)
}

/// Validate a user-supplied branch name.
///
/// The WIP suffix is reserved for Metro, and the rest of the name must
/// satisfy git's reference-name rules under `refs/heads/`.
pub fn validate_user_branch_name(name: &str) -> Result<()> {
    if is_wip(name) {
        return Err(MetroError::InvalidBranchName {
            name: name.to_owned(),
            reason: format!("branch names can't end in {WIP_SUFFIX}"),
        });
    }
    if !git2::Reference::is_valid_name(&format!("refs/heads/{name}")) {
        return Err(MetroError::InvalidBranchName {
            name: name.to_owned(),
            reason: "not a valid git reference name".to_owned(),
        });
    }
    Ok(())
}
