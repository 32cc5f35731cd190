use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    hub_options::HubOptions,
    observability::{LoggingConfig, MetricsConfig},
    outbox::OutboxConfig,
    resilience::{RetryConfig, TimeoutConfig},
};

/// 消息中介完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub hub: HubOptions,
    pub retry: RetryConfig,
    pub timeout: TimeoutConfig,
    pub outbox: OutboxConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

impl HubConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: MESSAGEHUB_, nested keys joined by `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/messagehub.toml", "messagehub.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("MESSAGEHUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: HubConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: HubConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.timeout.validate().context("超时配置验证失败")?;
        self.outbox.validate().context("Outbox配置验证失败")?;
        self.logging.validate().context("日志配置验证失败")?;
        self.metrics.validate().context("指标配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.outbox.polling_interval_seconds, 5);
        assert_eq!(config.outbox.batch_size, 100);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_from_toml_with_partial_sections() {
        let toml_str = r#"
            [hub]
            caching_enabled = true
            outbox_enabled = true
            publish_parallel_by_default = true

            [retry]
            max_retries = 2
            delay_ms = 50

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = HubConfig::from_toml(toml_str).unwrap();
        assert!(config.hub.caching_enabled);
        assert!(config.hub.outbox_enabled);
        assert!(config.hub.publish_parallel_by_default);
        assert!(!config.hub.retry_enabled);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.delay_ms, 50);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.timeout.default_timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_outbox_config_rejected() {
        let toml_str = r#"
            [outbox]
            polling_interval_seconds = 0
        "#;
        assert!(HubConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let toml_str = r#"
            [logging]
            level = "verbose"
        "#;
        assert!(HubConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[hub]\nretry_enabled = true\n\n[outbox]\nbatch_size = 10\n"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = HubConfig::load(Some(&path)).unwrap();
        assert!(config.hub.retry_enabled);
        assert_eq!(config.outbox.batch_size, 10);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(HubConfig::load(Some("/nonexistent/messagehub.toml")).is_err());
    }

    #[test]
    fn test_toml_roundtrip_preserves_options() {
        let mut config = HubConfig::default();
        config.hub = HubOptions::default().enable_outbox().enable_telemetry();
        let serialized = config.to_toml().unwrap();
        let parsed = HubConfig::from_toml(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
