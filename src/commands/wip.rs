use anyhow::Result;
use clap::Subcommand;
use metro::{to_wip, MetroError};

use super::open_current;

#[derive(Subcommand)]
pub enum WipCommands {
    /// Save the working directory to a WIP commit in a #wip branch
    Save,
    /// Restore the WIP branch, replacing the working directory
    Restore,
    /// Squash the WIP branch into a single WIP commit
    Squash,
}

pub fn run(command: WipCommands) -> Result<()> {
    let repo = open_current()?;

    let head = metro::get_head(&repo)?;
    if head.detached {
        return Err(MetroError::unsupported("'metro wip' can only be used on a branch.").into());
    }

    let wip_exists = metro::repo::branch_exists(&repo, &to_wip(&head.name));
    match command {
        WipCommands::Save => {
            if wip_exists {
                return Err(MetroError::DetachedWip.into());
            }
            metro::wip::save_wip(&repo)?;
            println!("Saved WIP for branch {}.", head.name);
        }
        WipCommands::Restore => {
            if !wip_exists {
                return Err(MetroError::AttachedWip.into());
            }
            metro::wip::restore_wip(&repo)?;
            println!("Restored WIP for branch {}.", head.name);
        }
        WipCommands::Squash => {
            if !wip_exists {
                return Err(MetroError::AttachedWip.into());
            }
            metro::wip::squash_wip(&repo)?;
            println!("Squashed WIP for branch {}.", head.name);
        }
    }
    Ok(())
}
