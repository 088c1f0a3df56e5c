//! 同步状态检查
//!
//! 单次轮询的状态机：`checking -> {completed, retry-pending, error}`。
//! 未同步完成时不在进程内等待，而是返回 delay 与 update_url，由外部调度器稍后重投。

use std::sync::Arc;
use std::time::Duration;

use qbsync_shared::observability::metrics;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::AccountingClient;
use crate::error::Result;
use crate::models::{ReceiptKind, RecordId, SyncState};

/// 未同步完成时请求的重投延迟
pub const RETRY_DELAY: u64 = 6000;

/// 没有其他延迟要求时的默认复查间隔
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// 诊断信息查询失败时的占位文本
pub const NO_ERROR_INFORMATION: &str = "No Error Information Found";

/// 记录不存在时的事件码
const RECORD_NOT_FOUND_CODE: u16 = 400;

/// 远端报告同步失败时的事件码
const SYNC_FAILED_CODE: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvents {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 状态检查结果
///
/// 序列化后分别为 `{message_id, delay, update_url}`、`{message_id, events}`、`{message_id}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCheckResult {
    RetryPending {
        message_id: String,
        delay: u64,
        update_url: String,
    },
    Failed {
        message_id: String,
        events: StatusEvents,
    },
    Completed {
        message_id: String,
    },
}

impl StatusCheckResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RetryPending { .. } => "retry_pending",
            Self::Failed { .. } => "error",
            Self::Completed { .. } => "completed",
        }
    }
}

pub struct StatusChecker {
    client: Arc<dyn AccountingClient>,
    status_base_url: String,
}

impl StatusChecker {
    pub fn new(client: Arc<dyn AccountingClient>, status_base_url: impl Into<String>) -> Self {
        Self {
            client,
            status_base_url: status_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 查询记录同步状态
    pub async fn check(&self, message_id: &str, record: &RecordId) -> Result<StatusCheckResult> {
        let message_id = message_id.to_string();

        let result = match self.client.fetch_status(record).await? {
            None => StatusCheckResult::Failed {
                message_id,
                events: StatusEvents {
                    code: RECORD_NOT_FOUND_CODE,
                    message: None,
                },
            },
            Some(report) => match report.state {
                SyncState::Synchronized => StatusCheckResult::Completed { message_id },
                SyncState::Pending => StatusCheckResult::RetryPending {
                    message_id,
                    delay: RETRY_DELAY,
                    update_url: self.update_url(record),
                },
                SyncState::Error => StatusCheckResult::Failed {
                    message_id,
                    events: StatusEvents {
                        code: SYNC_FAILED_CODE,
                        message: Some(self.describe_errors(record).await),
                    },
                },
            },
        };

        info!(record = %record, result = result.label(), "同步状态检查完成");
        metrics::record_status_check(result.label());
        Ok(result)
    }

    pub fn update_url(&self, record: &RecordId) -> String {
        format!(
            "{}/status/{}/{}",
            self.status_base_url, record.identifier_domain, record.id
        )
    }

    /// 从消息日志中取出该记录的错误描述，以 ", " 连接
    ///
    /// 销售收据与退款收据共用交易 ID 空间，两类条目都匹配。
    pub async fn error_details(&self, record: &RecordId) -> Result<String> {
        let messages = self.client.list_messages().await?;
        Ok(messages
            .into_iter()
            .filter(|m| {
                ReceiptKind::from_name(&m.object_type).is_some() && m.object_id == record.id
            })
            .map(|m| m.description)
            .collect::<Vec<_>>()
            .join(", "))
    }

    /// 诊断信息查询失败时记录日志并以占位文本代替，不掩盖原始错误
    pub async fn describe_errors(&self, record: &RecordId) -> String {
        match self.error_details(record).await {
            Ok(details) if !details.is_empty() => details,
            Ok(_) => NO_ERROR_INFORMATION.to_string(),
            Err(e) => {
                warn!(record = %record, error = %e, "查询 QuickBooks 消息日志失败");
                NO_ERROR_INFORMATION.to_string()
            }
        }
    }
}
