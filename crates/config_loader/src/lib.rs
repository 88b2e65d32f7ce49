//! # Config Loader
//!
//! 协调器配置的加载与解析。
//!
//! 负责：
//! - 解析 TOML/JSON 配置文件
//! - 校验超时、事件集合与冲突规则
//! - 生成 `CoordinatorConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("coordinator.toml")).unwrap();
//! println!("reset mode: {:?}", config.reset.mode);
//! ```

mod parser;
mod validator;

pub use contracts::CoordinatorConfig;
pub use parser::ConfigFormat;
pub use validator::{validate, MAX_TIMEOUT_MS};

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Static entry points; every successful load has passed validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Format is chosen from the file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<CoordinatorConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CoordinatorConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Serialize CoordinatorConfig to TOML string
    pub fn to_toml(config: &CoordinatorConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize CoordinatorConfig to JSON string
    pub fn to_json(config: &CoordinatorConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Infer configuration format from file extension
    pub fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
