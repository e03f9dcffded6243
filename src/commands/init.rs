use anyhow::{bail, Result};
use std::env;
use tracing::info;

use crate::Config;

pub async fn run(force: bool) -> Result<()> {
    let root = env::current_dir()?;
    let config_path = Config::config_path(&root);

    if config_path.exists() && !force {
        bail!(
            "xrefs is already initialized at {:?} (use --force to overwrite)",
            config_path
        );
    }

    Config::default().save(&root)?;

    info!("Initialized xrefs configuration at {:?}", config_path);
    println!("✓ Created {} with default configuration", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit .xrefs/config.toml to tune page sizes and logging");
    println!("  2. Run 'xrefs resolve --fixture <FILE> ...' to resolve references");

    Ok(())
}
