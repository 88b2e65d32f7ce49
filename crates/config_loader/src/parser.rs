//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式；所有段落均可省略并回落到默认值。

use contracts::{ContractError, CoordinatorConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn parse_error(
    kind: &str,
    e: impl std::error::Error + Send + Sync + 'static,
) -> ContractError {
    ContractError::ConfigParse {
        message: format!("{kind} parse error: {e}"),
        source: Some(Box::new(e)),
    }
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<CoordinatorConfig, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error("TOML", e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error("JSON", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ResetMode, StepPolicy};

    #[test]
    fn test_parse_empty_toml_is_default() {
        let config = parse("", ConfigFormat::Toml).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn test_parse_toml_sections() {
        let content = r#"
[initial_sync]
timeout_ms = 30000

[reset]
mode = "clear_and_restart"
wait_for_outbox_empty = false

[reset.start]
timeout_ms = 8000
proceed_on_timeout = true

[[conflict.families]]
family = "Task"
identifying_fields = ["title", "description"]

[conflict.families.update_merge]
prefer_local = ["status"]
"#;
        let config = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.initial_sync.timeout_ms, 30_000);
        assert_eq!(config.initial_sync.ready_events.len(), 2);
        assert_eq!(config.reset.mode, ResetMode::ClearAndRestart);
        assert!(!config.reset.wait_for_outbox_empty);
        assert_eq!(config.reset.start, StepPolicy::proceed(8_000));
        assert_eq!(config.reset.stop, StepPolicy::proceed(5_000));

        let task = config.conflict.rule_for("Task").unwrap();
        assert_eq!(task.update_merge.as_ref().unwrap().prefer_local, ["status"]);
        assert!(config.conflict.rule_for("DataPoint").is_none());
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{ "outbox": { "timeout_ms": 500 }, "conflict": { "backfill_keys": ["pk"] } }"#;
        let config = parse(content, ConfigFormat::Json).unwrap();
        assert_eq!(config.outbox.timeout_ms, 500);
        assert_eq!(config.conflict.backfill_keys, ["pk"]);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse("invalid toml [[[", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_reset_mode_is_rejected() {
        let err = parse("[reset]\nmode = \"nuke\"", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
