use std::path::Path;

use anyhow::Result;

pub fn run(directory: Option<&str>) -> Result<()> {
    let directory = directory.unwrap_or(".");
    metro::repo::create(Path::new(directory))?;
    println!("Created Metro repo.");
    Ok(())
}
