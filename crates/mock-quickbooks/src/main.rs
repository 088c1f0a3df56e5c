//! Mock QuickBooks CLI

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mock_quickbooks::{Ledger, app};
use tokio::net::TcpListener;
use tracing::info;

/// 模拟 QuickBooks Online 服务
#[derive(Debug, Parser)]
#[command(name = "mock-quickbooks", version, about)]
struct Cli {
    /// 监听端口
    #[arg(short, long, default_value_t = 4000)]
    port: u16,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 不预置账户与支付方式
    #[arg(long)]
    empty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 优先使用环境变量 RUST_LOG，否则使用命令行参数指定的级别
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .init();

    let ledger = if cli.empty {
        Ledger::new()
    } else {
        Ledger::with_defaults()
    }
    .context("查询解析器初始化失败")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr).await.context("绑定端口失败")?;
    info!("Mock QuickBooks 已启动: http://{}", addr);

    axum::serve(listener, app(Arc::new(ledger)))
        .await
        .context("服务运行失败")?;

    Ok(())
}
