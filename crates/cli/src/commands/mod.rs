//! Command implementations.

mod info;
mod reset;
mod resolve;
mod validate;
mod wait;

pub use info::run_info;
pub use reset::run_reset;
pub use resolve::run_resolve;
pub use validate::run_validate;
pub use wait::run_wait;

use contracts::CoordinatorConfig;
use tracing::{debug, info};

use crate::cli::ConfigArg;
use crate::error::{CliError, Result};

/// Load the configuration named by `--config`, or defaults when absent
fn load_config(arg: &ConfigArg) -> Result<CoordinatorConfig> {
    let Some(path) = &arg.config else {
        debug!("No configuration file given, using defaults");
        return Ok(CoordinatorConfig::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }

    let config = config_loader::ConfigLoader::load_from_path(path)?;
    info!(config = %path.display(), "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(&ConfigArg { config: None }).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let arg = ConfigArg {
            config: Some(dir.path().join("absent.toml")),
        };
        assert!(matches!(
            load_config(&arg),
            Err(CliError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[outbox]\ntimeout_ms = 1234").unwrap();
        let arg = ConfigArg {
            config: Some(file.path().to_path_buf()),
        };
        assert_eq!(load_config(&arg).unwrap().outbox.timeout_ms, 1234);
    }
}
