//! 业务服务
//!
//! - `order_reconciler`：订单 -> 销售收据的新建、部分更新、作废
//! - `return_reconciler`：退货 -> 退款收据
//! - `product_importer`：商品导入
//! - `inventory`：库存读取
//! - `status_checker`：同步状态轮询
//!
//! 订单与退货共用"先查交叉引用，再按单据号重查，最后才新建"的定位流程。

mod inventory;
mod order_reconciler;
mod product_importer;
mod receipt_builder;
mod return_reconciler;
mod status_checker;

use std::time::Instant;

use qbsync_shared::observability::metrics;
use tracing::{info, warn};

use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{Receipt, ReceiptKind, RecordId};
use crate::xref::{CrossReferenceStore, XrefKey};

pub use inventory::{InventoryReader, InventorySnapshot};
pub use order_reconciler::OrderReconciler;
pub use product_importer::{ImportOutcome, ProductImporter};
pub use receipt_builder::ReceiptBuilder;
pub use return_reconciler::ReturnReconciler;
pub use status_checker::{
    DEFAULT_RECHECK_INTERVAL, NO_ERROR_INFORMATION, RETRY_DELAY, StatusCheckResult, StatusChecker,
    StatusEvents,
};

/// 一次同步实际做了什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    Unchanged,
    Voided,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Voided => "voided",
        }
    }
}

/// 对账结果
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub xref: RecordId,
    pub action: SyncAction,
    pub receipt: Receipt,
}

impl ReconcileOutcome {
    pub(crate) fn new(receipt: Receipt, action: SyncAction) -> Result<Self> {
        let xref = receipt.id.clone().ok_or_else(|| SyncError::Api {
            status: 200,
            message: format!("收据 {} 缺少记录 ID", receipt.doc_number),
        })?;
        Ok(Self {
            xref,
            action,
            receipt,
        })
    }
}

/// 定位已存在的收据
///
/// 1. 交叉引用命中 -> 读取该收据（读不到视为数据不一致，报 NotFound）
/// 2. 消息携带的 parameters.xref -> 读取成功则回写交叉引用
/// 3. 按单据号重查 QuickBooks，弥补"已建收据但交叉引用未落库"的崩溃窗口
pub(crate) async fn locate_receipt(
    client: &dyn AccountingClient,
    xrefs: &dyn CrossReferenceStore,
    kind: ReceiptKind,
    key: &XrefKey,
    prior: Option<&RecordId>,
) -> Result<Option<Receipt>> {
    if let Some(xref) = xrefs.lookup(key).await? {
        return client
            .fetch_receipt(kind, &xref)
            .await?
            .map(Some)
            .ok_or_else(|| SyncError::not_found(kind.as_str(), &xref.id));
    }

    if let Some(prior) = prior.filter(|p| p.is_complete()) {
        match client.fetch_receipt(kind, prior).await? {
            Some(receipt) => {
                info!(key = %key, record = %prior, "采用消息携带的交叉引用");
                xrefs.upsert(key, prior).await?;
                return Ok(Some(receipt));
            }
            None => warn!(key = %key, record = %prior, "消息携带的交叉引用指向不存在的收据，忽略"),
        }
    }

    let found = client
        .find_receipt_by_doc_number(kind, &key.local_id)
        .await?;
    if let Some(receipt) = &found {
        if let Some(id) = &receipt.id {
            warn!(key = %key, record = %id, "交叉引用缺失但 QuickBooks 中已有同单据号收据，补写引用");
            xrefs.upsert(key, id).await?;
        }
    }
    Ok(found)
}

/// 记录对账指标
pub(crate) fn observe(doc_type: &str, start: Instant, result: &Result<ReconcileOutcome>) {
    let outcome = match result {
        Ok(outcome) => outcome.action.as_str(),
        Err(_) => "failed",
    };
    metrics::record_receipt_sync(doc_type, outcome, start.elapsed().as_secs_f64());
}
