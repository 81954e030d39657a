//! Bookforge - 多阶段 AI 书籍生成服务
//!
//! 启动顺序: 配置 -> 日志 -> 数据库 -> 模型客户端 -> 配额（从账本恢复）-> HTTP

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use bookforge::application::{
    ModelInvokerPort, QuotaManagerPort, SystemClock, UsageLedgerPort,
};
use bookforge::config::{load_config, print_config, AppConfig};
use bookforge::domain::quota::ReservationPolicy;
use bookforge::domain::review::LoopSettings;
use bookforge::infrastructure::adapters::{
    HttpModelClient, HttpModelClientConfig, ScriptedModelClient,
};
use bookforge::infrastructure::events::EventPublisher;
use bookforge::infrastructure::http::{AppState, HttpServer, PipelineSettings, ServerConfig};
use bookforge::infrastructure::memory::{InMemoryQuotaManager, QuotaManagerConfig};
use bookforge::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteProjectRepository, SqliteUsageLedger,
};

fn init_logging(config: &AppConfig) {
    let log_filter = format!(
        "{},bookforge={},tower_http=debug,sqlx=warn",
        config.log.level, config.log.level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_model_client(config: &AppConfig) -> anyhow::Result<Arc<dyn ModelInvokerPort>> {
    if config.llm.use_fake {
        tracing::warn!("Using scripted model client, no model service will be called");
        return Ok(Arc::new(ScriptedModelClient::demo()));
    }

    let llm = &config.llm;
    let mut client_config = HttpModelClientConfig::new(&llm.base_url).with_model(&llm.model);
    client_config.timeout_secs = llm.timeout_secs;
    client_config.connect_timeout_secs = llm.connect_timeout_secs;
    client_config.stream_idle_timeout_secs = llm.stream_idle_timeout_secs;
    client_config.max_tokens = llm.max_tokens;
    if let Some(api_key) = &llm.api_key {
        client_config = client_config.with_api_key(api_key);
    }

    Ok(Arc::new(HttpModelClient::new(client_config)?))
}

/// 从用量账本恢复当前周期的配额状态
async fn restore_quota(
    quota: &dyn QuotaManagerPort,
    ledger: &dyn UsageLedgerPort,
    period_days: u32,
) -> anyhow::Result<()> {
    let since = Utc::now() - Duration::days(i64::from(period_days));
    let totals = ledger.totals_since(since).await?;

    for total in &totals {
        quota.seed_usage(&total.user_id, total.first_at, total.total);
    }
    tracing::info!(users = totals.len(), "Quota state restored from usage ledger");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_logging(&config);

    tracing::info!("Bookforge - AI book generation service");
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig::new(&config.database.path, config.database.max_connections);
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let project_repo = Arc::new(SqliteProjectRepository::new(pool.clone()));
    let ledger = Arc::new(SqliteUsageLedger::new(pool));

    // 模型客户端
    let invoker = build_model_client(&config)?;
    if !invoker.health_check().await {
        tracing::warn!(base_url = %config.llm.base_url, "Model service health check failed");
    }

    // 配额管理器；每个请求的预留量按调用次数和单次 max_tokens 估算上界
    let reservation = ReservationPolicy::new(
        u64::from(config.llm.max_tokens),
        config.quota.prompt_overhead_tokens,
    );
    let quota = InMemoryQuotaManager::new(
        QuotaManagerConfig {
            default_limit: config.quota.default_limit,
            period_length: Duration::days(i64::from(config.quota.period_days)),
        },
        Arc::new(SystemClock),
    )
    .arc();
    restore_quota(quota.as_ref(), ledger.as_ref(), config.quota.period_days).await?;

    let loop_defaults =
        LoopSettings::new(config.pipeline.max_iterations, config.pipeline.pass_threshold)?;

    let event_publisher = EventPublisher::new().arc();

    let state = AppState::new(
        invoker,
        quota,
        project_repo,
        ledger,
        event_publisher,
        PipelineSettings {
            model_name: config.llm.model.clone(),
            loop_defaults,
            warning_ratio: config.quota.warning_ratio,
            reservation,
        },
    );

    let server = HttpServer::new(ServerConfig::from(&config.server), state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
