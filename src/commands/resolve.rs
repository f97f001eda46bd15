use anyhow::Result;

use super::open_current;

pub fn run() -> Result<()> {
    let repo = open_current()?;
    metro::merging::resolve(&repo)?;

    let head = metro::get_head(&repo)?;
    println!("Successfully absorbed into {}.", head.name);
    Ok(())
}
