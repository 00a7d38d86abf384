//! Init-config command - write a default config.toml

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Args;
use framecap_core::{Config, config};

/// Arguments for the init-config command
#[derive(Args)]
pub struct InitConfigArgs {
    /// Where to write the file (defaults to the platform config directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Execute the init-config command
pub fn execute(args: InitConfigArgs) -> Result<()> {
    let written = match args.path {
        Some(path) => {
            refuse_overwrite(&path, args.force)?;
            config::save_to(&Config::default(), &path)?;
            path
        }
        None => {
            if let Some(path) = config::config_path() {
                refuse_overwrite(&path, args.force)?;
            }
            config::save(&Config::default())?
        }
    };

    println!("Wrote {}", written.display());
    Ok(())
}

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}
