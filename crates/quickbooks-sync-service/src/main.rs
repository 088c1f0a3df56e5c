//! QuickBooks 订单同步服务
//!
//! 每个同步操作一条 POST 路由，交叉引用存于 PostgreSQL。

use std::sync::Arc;

use anyhow::Context;

use qbsync_shared::{config::AppConfig, database::Database, observability};
use quickbooks_sync::{
    AppState, client::QuickbooksHttpClient, router, xref::PgCrossReferenceStore,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

const SERVICE_NAME: &str = "quickbooks-sync-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 本地开发从 .env 注入 QBSYNC_* 变量，文件不存在时忽略
    let _ = dotenvy::dotenv();

    // 配置错误直接退出，避免以默认映射表运行
    let config = AppConfig::load(SERVICE_NAME).context("加载配置失败")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    if config.quickbooks.access_token.is_empty() {
        if config.is_production() {
            anyhow::bail!("生产环境必须配置 QBSYNC_QUICKBOOKS__ACCESS_TOKEN");
        }
        warn!("未配置 QuickBooks access token，仅适用于对接 mock 服务");
    }

    let db = Database::connect(&config.database).await?;
    let xrefs = PgCrossReferenceStore::new(db.pool().clone());
    xrefs.ensure_schema().await?;

    let client = QuickbooksHttpClient::new(&config.quickbooks)?;
    info!(
        base_url = %config.quickbooks.base_url,
        realm_id = %config.quickbooks.realm_id,
        "QuickBooks client initialized"
    );

    let state = AppState::new(Arc::new(client), Arc::new(xrefs), config.quickbooks.clone());
    let app = router(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后停止接收新连接，等待进行中的消息处理完毕。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("注册 Ctrl+C 处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("注册 SIGTERM 处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
