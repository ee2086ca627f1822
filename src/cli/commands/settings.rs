//! Effective configuration.

use std::path::Path;

use super::database_path;
use crate::config::{self, Config};

/// Print the configuration after defaults and flags are applied
pub fn cmd_config(config: &Config, db: Option<&Path>, save: bool) -> anyhow::Result<()> {
    let mut effective = config.clone();
    effective.library.root = Some(config.library_root()?);
    effective.database.path = Some(database_path(config, db)?);

    print!("{}", toml::to_string_pretty(&effective)?);

    if save {
        let path = config::save(&effective)?;
        println!("\nSaved to {}", path.display());
    }
    Ok(())
}
