//! Mock QuickBooks
//!
//! 模拟 QuickBooks Online 会计 REST 接口，用于开发环境和同步服务的集成测试。
//!
//! ## 功能
//!
//! - 实体的查询、创建、更新与作废，名称唯一性与 SyncToken 校验
//! - 收据同步状态查询，可经管理接口推进
//! - 消息日志
//!
//! ## 使用示例
//!
//! ```bash
//! mock-quickbooks --port 4000
//! ```

pub mod ledger;
pub mod query;
pub mod routes;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use ledger::{Fault, Ledger, LoggedMessage, SyncFlag};
pub use routes::app;

/// 正在运行的模拟服务
pub struct RunningMock {
    pub addr: SocketAddr,
    pub ledger: Arc<Ledger>,
    handle: JoinHandle<()>,
}

impl RunningMock {
    /// 服务根地址，如 `http://127.0.0.1:40123`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for RunningMock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 在给定监听器上后台运行模拟服务
pub async fn spawn(listener: TcpListener, ledger: Arc<Ledger>) -> std::io::Result<RunningMock> {
    let addr = listener.local_addr()?;
    let router = app(ledger.clone());
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "Mock QuickBooks 服务异常退出");
        }
    });
    info!(%addr, "Mock QuickBooks 已启动");

    Ok(RunningMock {
        addr,
        ledger,
        handle,
    })
}
