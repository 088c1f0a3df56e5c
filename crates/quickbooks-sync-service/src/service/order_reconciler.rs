//! 订单对账器
//!
//! 决定订单对应的销售收据是新建、部分更新还是作废，并维护交叉引用：
//! - **命中已有收据**：只改写变更集中的字段（总额、订单行、支付方式）后写回；
//!   变更集为空时不发任何写请求，只重新确认交叉引用
//! - **未命中**：解析科目、支付方式、客户和商品后新建收据，写入交叉引用
//! - **已取消**：找到已有收据并作废，不删除

use std::sync::Arc;
use std::time::Instant;

use qbsync_shared::config::QuickbooksConfig;
use tracing::{info, instrument, warn};

use super::receipt_builder::ReceiptBuilder;
use super::{ReconcileOutcome, SyncAction, locate_receipt, observe};
use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{ChangeSet, Order, Receipt, ReceiptKind, RecordId};
use crate::resolver::Resolvers;
use crate::xref::{CrossReferenceStore, XrefKey};

const KIND: ReceiptKind = ReceiptKind::SalesReceipt;

pub struct OrderReconciler {
    client: Arc<dyn AccountingClient>,
    xrefs: Arc<dyn CrossReferenceStore>,
    builder: ReceiptBuilder,
}

impl OrderReconciler {
    pub fn new(
        client: Arc<dyn AccountingClient>,
        xrefs: Arc<dyn CrossReferenceStore>,
        resolvers: Resolvers,
        config: Arc<QuickbooksConfig>,
    ) -> Self {
        Self {
            client,
            xrefs,
            builder: ReceiptBuilder::new(resolvers, config),
        }
    }

    /// 对账一个订单
    ///
    /// `prior` 为消息 parameters 中携带的上次同步结果，交叉引用存储未命中时采用。
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn reconcile(
        &self,
        order: &Order,
        changes: &ChangeSet,
        prior: Option<&RecordId>,
    ) -> Result<ReconcileOutcome> {
        if order.is_cancelled() {
            return self.cancel(order, prior).await;
        }

        let start = Instant::now();
        let result = self.reconcile_inner(order, changes, prior).await;
        observe("order", start, &result);
        result
    }

    async fn reconcile_inner(
        &self,
        order: &Order,
        changes: &ChangeSet,
        prior: Option<&RecordId>,
    ) -> Result<ReconcileOutcome> {
        let key = XrefKey::order(&order.id);

        match locate_receipt(&*self.client, &*self.xrefs, KIND, &key, prior).await? {
            Some(existing) if changes.is_empty() || existing.voided => {
                if existing.voided {
                    warn!(xref = ?existing.id, "销售收据已作废，忽略订单更新");
                }
                self.confirm_unchanged(&key, existing).await
            }
            Some(existing) => {
                let mut patched = existing.clone();
                self.builder
                    .apply_changes(&mut patched, order, changes)
                    .await?;
                // 重放同一变更集时收据已是目标状态
                if patched == existing {
                    return self.confirm_unchanged(&key, existing).await;
                }
                let updated = self.client.update_receipt(KIND, &patched).await?;
                let outcome = ReconcileOutcome::new(updated, SyncAction::Updated)?;
                self.xrefs.upsert(&key, &outcome.xref).await?;
                info!(xref = %outcome.xref, ?changes, "销售收据已更新");
                Ok(outcome)
            }
            None => {
                let receipt = self.builder.sales_receipt(order).await?;
                let created = self.client.create_receipt(KIND, &receipt).await?;
                let outcome = ReconcileOutcome::new(created, SyncAction::Created)?;
                self.xrefs.upsert(&key, &outcome.xref).await?;
                info!(xref = %outcome.xref, lines = outcome.receipt.lines.len(), "销售收据已创建");
                Ok(outcome)
            }
        }
    }

    /// 不写收据，只重新确认交叉引用
    async fn confirm_unchanged(&self, key: &XrefKey, existing: Receipt) -> Result<ReconcileOutcome> {
        let outcome = ReconcileOutcome::new(existing, SyncAction::Unchanged)?;
        self.xrefs.upsert(key, &outcome.xref).await?;
        info!(xref = %outcome.xref, "订单无变更，跳过写入");
        Ok(outcome)
    }

    /// 作废订单对应的收据
    ///
    /// 必须已有交叉引用（或消息携带的引用），否则报 NotFound。已作废的收据不再重复写入。
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn cancel(&self, order: &Order, prior: Option<&RecordId>) -> Result<ReconcileOutcome> {
        let start = Instant::now();
        let result = self.cancel_inner(order, prior).await;
        observe("order", start, &result);
        result
    }

    async fn cancel_inner(&self, order: &Order, prior: Option<&RecordId>) -> Result<ReconcileOutcome> {
        let key = XrefKey::order(&order.id);

        let xref = match self.xrefs.lookup(&key).await? {
            Some(xref) => xref,
            None => match prior.filter(|p| p.is_complete()) {
                Some(prior) => {
                    self.xrefs.upsert(&key, prior).await?;
                    prior.clone()
                }
                None => return Err(SyncError::not_found(KIND.as_str(), &order.id)),
            },
        };

        let mut receipt = self
            .client
            .fetch_receipt(KIND, &xref)
            .await?
            .ok_or_else(|| SyncError::not_found(KIND.as_str(), &xref.id))?;

        if receipt.voided {
            return ReconcileOutcome::new(receipt, SyncAction::Unchanged);
        }

        receipt.void();
        let voided = self.client.update_receipt(KIND, &receipt).await?;
        info!(xref = %xref, "销售收据已作废");
        ReconcileOutcome::new(voided, SyncAction::Voided)
    }
}
