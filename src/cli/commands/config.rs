//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Run the config command.
pub fn run_config(action: &ConfigAction, config_path: Option<PathBuf>, settings: Settings) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Init { force } => {
            if write_default_config(&config_path, *force)? {
                Output::success(&format!("Wrote default config to {}", config_path.display()));
            } else {
                Output::warning(&format!(
                    "{} already exists. Use --force to overwrite it.",
                    config_path.display()
                ));
            }
        }
    }

    Ok(())
}

/// Write the default settings. Returns false if the file exists and `force` is off.
fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    Settings::default().save_to(&path.to_path_buf())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&path, false).unwrap());
        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, Settings::default().server.port);
    }

    #[test]
    fn test_init_respects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        assert!(!write_default_config(&path, false).unwrap());
        assert_eq!(Settings::load_from(Some(&path)).unwrap().server.port, 9000);

        assert!(write_default_config(&path, true).unwrap());
        assert_eq!(Settings::load_from(Some(&path)).unwrap().server.port, 5000);
    }
}
