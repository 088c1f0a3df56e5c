//! 退货对账器
//!
//! 退货授权对应 QuickBooks 的退款收据，交叉引用使用独立的 `return` 命名空间，
//! 定位流程与订单一致。更新时重算退货行与退款金额，内容未变则不写入。

use std::sync::Arc;
use std::time::Instant;

use qbsync_shared::config::QuickbooksConfig;
use tracing::{info, instrument};

use super::receipt_builder::ReceiptBuilder;
use super::{ReconcileOutcome, SyncAction, locate_receipt, observe};
use crate::client::AccountingClient;
use crate::error::Result;
use crate::models::{Order, ReceiptKind, RecordId, ReturnAuthorization};
use crate::resolver::Resolvers;
use crate::xref::{CrossReferenceStore, XrefKey};

const KIND: ReceiptKind = ReceiptKind::RefundReceipt;

pub struct ReturnReconciler {
    client: Arc<dyn AccountingClient>,
    xrefs: Arc<dyn CrossReferenceStore>,
    builder: ReceiptBuilder,
}

impl ReturnReconciler {
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

    #[instrument(skip_all, fields(return_id = %ret.id))]
    pub async fn reconcile(
        &self,
        ret: &ReturnAuthorization,
        order: Option<&Order>,
        prior: Option<&RecordId>,
    ) -> Result<ReconcileOutcome> {
        let start = Instant::now();
        let result = self.reconcile_inner(ret, order, prior).await;
        observe("return", start, &result);
        result
    }

    async fn reconcile_inner(
        &self,
        ret: &ReturnAuthorization,
        order: Option<&Order>,
        prior: Option<&RecordId>,
    ) -> Result<ReconcileOutcome> {
        let key = XrefKey::ret(&ret.id);

        match locate_receipt(&*self.client, &*self.xrefs, KIND, &key, prior).await? {
            Some(mut existing) => {
                let lines = self.builder.return_lines(ret).await?;
                let total = ret.refund_total();

                if existing.lines == lines && existing.total_amount == total {
                    let outcome = ReconcileOutcome::new(existing, SyncAction::Unchanged)?;
                    self.xrefs.upsert(&key, &outcome.xref).await?;
                    return Ok(outcome);
                }

                existing.lines = lines;
                existing.total_amount = total;
                let updated = self.client.update_receipt(KIND, &existing).await?;
                let outcome = ReconcileOutcome::new(updated, SyncAction::Updated)?;
                self.xrefs.upsert(&key, &outcome.xref).await?;
                info!(xref = %outcome.xref, "退款收据已更新");
                Ok(outcome)
            }
            None => {
                let receipt = self.builder.refund_receipt(ret, order).await?;
                let created = self.client.create_receipt(KIND, &receipt).await?;
                let outcome = ReconcileOutcome::new(created, SyncAction::Created)?;
                self.xrefs.upsert(&key, &outcome.xref).await?;
                info!(xref = %outcome.xref, "退款收据已创建");
                Ok(outcome)
            }
        }
    }
}
