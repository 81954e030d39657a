//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 模型服务配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 配额配置
    #[serde(default)]
    pub quota: QuotaConfig,

    /// 生成流程配置
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体大小上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5080
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024 // 2 MiB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 模型服务配置（OpenAI 兼容接口）
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// 服务基础 URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// 一次性调用的超时时间（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_llm_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// 流式调用两个数据块之间的最长间隔（秒），整体时长不设上限
    #[serde(default = "default_llm_stream_idle_timeout")]
    pub stream_idle_timeout_secs: u64,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// 使用内置的演示回复，不调用模型服务
    #[serde(default)]
    pub use_fake: bool,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    300
}

fn default_llm_connect_timeout() -> u64 {
    10
}

fn default_llm_stream_idle_timeout() -> u64 {
    60
}

fn default_llm_max_tokens() -> u32 {
    4096
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            connect_timeout_secs: default_llm_connect_timeout(),
            stream_idle_timeout_secs: default_llm_stream_idle_timeout(),
            max_tokens: default_llm_max_tokens(),
            use_fake: false,
        }
    }
}

/// 配额配置
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// 每个周期的默认 token 上限
    #[serde(default = "default_quota_limit")]
    pub default_limit: u64,

    /// 周期长度（天）
    #[serde(default = "default_period_days")]
    pub period_days: u32,

    /// 预留量估算中提示词模板的固定开销（token），单次补全上限取 llm.max_tokens
    #[serde(default = "default_prompt_overhead")]
    pub prompt_overhead_tokens: u64,

    /// 用量占比越过该值时推送预警
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,
}

fn default_quota_limit() -> u64 {
    200_000
}

fn default_period_days() -> u32 {
    30
}

fn default_prompt_overhead() -> u64 {
    2048
}

fn default_warning_ratio() -> f64 {
    0.8
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_limit: default_quota_limit(),
            period_days: default_period_days(),
            prompt_overhead_tokens: default_prompt_overhead(),
            warning_ratio: default_warning_ratio(),
        }
    }
}

/// 生成流程配置（每个请求可覆盖）
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u8,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_pass_threshold() -> u8 {
    7
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            pass_threshold: default_pass_threshold(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/bookforge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
