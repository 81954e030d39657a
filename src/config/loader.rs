//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BOOKFORGE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BOOKFORGE_SERVER__PORT=8080`
/// - `BOOKFORGE_LLM__BASE_URL=http://localhost:11434/v1`
/// - `BOOKFORGE_LLM__API_KEY=sk-...`
/// - `BOOKFORGE_QUOTA__DEFAULT_LIMIT=500000`
/// - `BOOKFORGE_DATABASE__PATH=/data/bookforge.db`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5080)?
        .set_default("server.max_body_bytes", 2 * 1024 * 1024)?
        .set_default("llm.base_url", "https://api.openai.com/v1")?
        .set_default("llm.model", "gpt-4o-mini")?
        .set_default("llm.timeout_secs", 300)?
        .set_default("llm.connect_timeout_secs", 10)?
        .set_default("llm.stream_idle_timeout_secs", 60)?
        .set_default("llm.max_tokens", 4096)?
        .set_default("llm.use_fake", false)?
        .set_default("quota.default_limit", 200_000)?
        .set_default("quota.period_days", 30)?
        .set_default("quota.prompt_overhead_tokens", 2048)?
        .set_default("quota.warning_ratio", 0.8)?
        .set_default("pipeline.max_iterations", 3)?
        .set_default("pipeline.pass_threshold", 7)?
        .set_default("database.path", "data/bookforge.db")?
        .set_default("database.max_connections", 5)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 例如: BOOKFORGE_LLM__MODEL=gpt-4o
    builder = builder.add_source(
        Environment::with_prefix("BOOKFORGE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.llm.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "LLM base URL cannot be empty".to_string(),
        ));
    }

    if config.llm.stream_idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "LLM stream idle timeout cannot be 0".to_string(),
        ));
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    if config.quota.period_days == 0 {
        return Err(ConfigError::ValidationError(
            "Quota period cannot be 0 days".to_string(),
        ));
    }

    if !(config.quota.warning_ratio > 0.0 && config.quota.warning_ratio <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "Quota warning ratio must be in (0, 1], got {}",
            config.quota.warning_ratio
        )));
    }

    if config.pipeline.max_iterations == 0 {
        return Err(ConfigError::ValidationError(
            "Pipeline max iterations cannot be 0".to_string(),
        ));
    }

    if !(1..=10).contains(&config.pipeline.pass_threshold) {
        return Err(ConfigError::ValidationError(format!(
            "Pipeline pass threshold must be in 1..=10, got {}",
            config.pipeline.pass_threshold
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志，不输出 API key）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Max Body Size: {} bytes", config.server.max_body_bytes);
    if config.llm.use_fake {
        tracing::info!("LLM: scripted demo client");
    } else {
        tracing::info!("LLM Base URL: {}", config.llm.base_url);
        tracing::info!("LLM Model: {}", config.llm.model);
        tracing::info!("LLM API Key: {}", if config.llm.api_key.is_some() { "set" } else { "not set" });
    }
    tracing::info!(
        "LLM Timeout: {}s (stream idle {}s)",
        config.llm.timeout_secs,
        config.llm.stream_idle_timeout_secs
    );
    tracing::info!("Quota Limit: {} tokens / {} days", config.quota.default_limit, config.quota.period_days);
    tracing::info!("Quota Warning Ratio: {}", config.quota.warning_ratio);
    tracing::info!(
        "Pipeline: max_iterations={}, pass_threshold={}",
        config.pipeline.max_iterations,
        config.pipeline.pass_threshold
    );
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Database Max Connections: {}", config.database.max_connections);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
