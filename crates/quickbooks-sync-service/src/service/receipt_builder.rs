//! 收据构造
//!
//! 新建时由订单完整构造收据；更新时只按变更集改写对应字段。

use std::sync::Arc;

use qbsync_shared::config::QuickbooksConfig;

use crate::error::Result;
use crate::models::{
    ChangeSet, NewItem, Order, Receipt, ReceiptLine, ReturnAuthorization, round_cents,
};
use crate::resolver::Resolvers;

#[derive(Clone)]
pub struct ReceiptBuilder {
    resolvers: Resolvers,
    config: Arc<QuickbooksConfig>,
}

impl ReceiptBuilder {
    pub fn new(resolvers: Resolvers, config: Arc<QuickbooksConfig>) -> Self {
        Self { resolvers, config }
    }

    /// 订单 -> 新销售收据
    pub async fn sales_receipt(&self, order: &Order) -> Result<Receipt> {
        let deposit = self
            .resolvers
            .account
            .resolve(&self.config.deposit_account)
            .await?;
        let payment = self.resolvers.payment_method.resolve_for_order(order).await?;
        let customer = self.resolvers.customer.resolve_for_order(order).await?;
        let lines = self.order_lines(order).await?;

        Ok(Receipt {
            id: None,
            sync_token: None,
            doc_number: order.id.clone(),
            txn_date: order.txn_date(),
            customer: customer.to_ref(),
            deposit_account: deposit.to_ref(),
            payment_method: payment.map(|p| p.to_ref()),
            lines,
            total_amount: round_cents(order.totals.order),
            voided: false,
            private_note: None,
        })
    }

    /// 退货 -> 新退款收据
    ///
    /// 客户与支付方式取自原订单；没有原订单时记到 web_orders_customer 名下。
    pub async fn refund_receipt(
        &self,
        ret: &ReturnAuthorization,
        order: Option<&Order>,
    ) -> Result<Receipt> {
        let deposit = self
            .resolvers
            .account
            .resolve(&self.config.deposit_account)
            .await?;

        let (customer, payment) = match order {
            Some(order) => (
                self.resolvers.customer.resolve_for_order(order).await?,
                self.resolvers.payment_method.resolve_for_order(order).await?,
            ),
            None => (self.resolvers.customer.resolve_default().await?, None),
        };

        Ok(Receipt {
            id: None,
            sync_token: None,
            doc_number: ret.id.clone(),
            txn_date: None,
            customer: customer.to_ref(),
            deposit_account: deposit.to_ref(),
            payment_method: payment.map(|p| p.to_ref()),
            lines: self.return_lines(ret).await?,
            total_amount: ret.refund_total(),
            voided: false,
            private_note: ret.reason.clone(),
        })
    }

    /// 按变更集改写已有收据，未出现在变更集中的字段保持不变
    pub async fn apply_changes(
        &self,
        receipt: &mut Receipt,
        order: &Order,
        changes: &ChangeSet,
    ) -> Result<()> {
        if changes.total_amount {
            receipt.total_amount = round_cents(order.totals.order);
        }
        if changes.line_items {
            receipt.lines = self.order_lines(order).await?;
        }
        if changes.payment {
            receipt.payment_method = self
                .resolvers
                .payment_method
                .resolve_for_order(order)
                .await?
                .map(|p| p.to_ref());
        }
        Ok(())
    }

    /// 订单行 + 运费/税费/折扣行
    pub async fn order_lines(&self, order: &Order) -> Result<Vec<ReceiptLine>> {
        let mut lines = Vec::with_capacity(order.line_items.len() + 3);

        for line_item in &order.line_items {
            let item = self
                .resolvers
                .item
                .resolve_or_create(&NewItem {
                    sku: line_item.product_id.clone(),
                    description: line_item.name.clone(),
                    unit_price: line_item.price,
                })
                .await?;

            lines.push(ReceiptLine {
                item: item.to_ref(),
                description: line_item.name.clone(),
                quantity: line_item.quantity,
                unit_price: line_item.price,
                amount: line_item.amount(),
            });
        }

        let adjustments = [
            (&self.config.shipping_item, order.totals.shipping),
            (&self.config.tax_item, order.totals.tax),
            (&self.config.discount_item, order.totals.adjustment),
        ];
        for (sku, amount) in adjustments {
            if amount != 0.0 {
                lines.push(self.service_line(sku, amount).await?);
            }
        }

        Ok(lines)
    }

    pub async fn return_lines(&self, ret: &ReturnAuthorization) -> Result<Vec<ReceiptLine>> {
        let mut lines = Vec::with_capacity(ret.line_items.len());
        for line_item in &ret.line_items {
            let item = self
                .resolvers
                .item
                .resolve_or_create(&NewItem {
                    sku: line_item.product_id.clone(),
                    description: line_item.name.clone(),
                    unit_price: line_item.price,
                })
                .await?;
            lines.push(ReceiptLine {
                item: item.to_ref(),
                description: line_item.name.clone(),
                quantity: line_item.quantity,
                unit_price: line_item.price,
                amount: line_item.amount(),
            });
        }
        Ok(lines)
    }

    /// 服务类商品行，商品不存在时以 0 价格创建
    async fn service_line(&self, sku: &str, amount: f64) -> Result<ReceiptLine> {
        let item = self
            .resolvers
            .item
            .resolve_or_create(&NewItem {
                sku: sku.to_string(),
                description: Some(sku.to_string()),
                unit_price: 0.0,
            })
            .await?;
        let amount = round_cents(amount);

        Ok(ReceiptLine {
            item: item.to_ref(),
            description: Some(sku.to_string()),
            quantity: 1.0,
            unit_price: amount,
            amount,
        })
    }
}
