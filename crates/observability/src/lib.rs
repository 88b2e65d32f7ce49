//! # Observability
//!
//! 可观测性模块：Tracing 初始化 + Prometheus 指标 + 生命周期统计。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式，支持 RUST_LOG)
//! - Prometheus 指标导出（可选）
//! - [`MetricsTelemetry`]: 以 `metrics` 实现协调器的遥测端口
//! - [`LifecycleStatsAggregator`]: 内存中的生命周期统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init_with_config, MetricsTelemetry, ObservabilityConfig};
//!
//! init_with_config(ObservabilityConfig::default())?;
//!
//! let telemetry = Arc::new(MetricsTelemetry::new());
//! let coordinator = LifecycleCoordinator::with_telemetry(bus, config, telemetry.clone());
//! // ...
//! println!("{}", telemetry.summary());
//! ```

pub mod metrics;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

// Re-exports
pub use crate::metrics::{
    LifecycleStatsAggregator, LifecycleSummary, MetricsTelemetry, RunningStats, StatsSummary,
};

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// 默认日志级别（RUST_LOG 未设置时生效）
    pub default_log_level: String,
    /// 为 true 时忽略 RUST_LOG，强制使用 `default_log_level`
    pub force_log_level: bool,
    /// Prometheus 监听地址 (None = 禁用)
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            default_log_level: "info".to_string(),
            force_log_level: false,
            metrics_addr: None,
        }
    }
}

impl ObservabilityConfig {
    /// Enable the Prometheus endpoint on `0.0.0.0:port`
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_addr = Some(SocketAddr::from(([0, 0, 0, 0], port)));
        self
    }

    fn env_filter(&self) -> EnvFilter {
        if self.force_log_level {
            return EnvFilter::new(&self.default_log_level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
    }
}

/// 初始化可观测性（默认配置：Pretty 日志，无指标导出）
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

/// 使用自定义配置初始化
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(config.env_filter())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(addr) = config.metrics_addr {
        init_metrics_only(addr)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_addr = ?config.metrics_addr,
        "Observability initialized"
    );
    Ok(())
}

/// 仅安装 Prometheus recorder（Tracing 已由其他模块初始化时使用）
pub fn init_metrics_only(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on {addr}"))?;

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}
