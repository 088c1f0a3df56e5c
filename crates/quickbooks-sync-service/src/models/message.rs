//! 入站消息
//!
//! 每种操作一个消息结构，在端点边界一次性解析和校验，之后业务代码只接触强类型字段。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::accounting::RecordId;
use super::changes::ChangeSet;
use super::order::Order;
use super::product::{Product, ReturnAuthorization};

/// 上一次同步留下的元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageParameters {
    #[serde(default)]
    pub xref: Option<RecordId>,
    #[serde(default)]
    pub quickbooks_poll_stock_timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// add_order / update_order / cancel_order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderMessage {
    #[serde(default, alias = "message_id")]
    pub request_id: String,
    #[validate(nested)]
    pub order: Order,
    #[serde(default)]
    pub original: Option<Order>,
    #[serde(default)]
    pub changes: Option<Value>,
    #[serde(default)]
    pub parameters: MessageParameters,
}

impl OrderMessage {
    pub fn change_set(&self) -> ChangeSet {
        ChangeSet::from_message(&self.order, self.original.as_ref(), self.changes.as_ref())
    }

    /// 消息既没有 `changes` 也没有 `original` 时使用 `missing`
    pub fn change_set_or(&self, missing: ChangeSet) -> ChangeSet {
        let has_changes = self.changes.as_ref().is_some_and(|c| !c.is_null());
        if has_changes || self.original.is_some() {
            self.change_set()
        } else {
            missing
        }
    }
}

/// add_product / update_product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductMessage {
    #[serde(default, alias = "message_id")]
    pub request_id: String,
    #[validate(nested)]
    pub product: Product,
    #[serde(default)]
    pub parameters: MessageParameters,
}

/// add_return / update_return
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReturnMessage {
    #[serde(default, alias = "message_id")]
    pub request_id: String,
    #[serde(rename = "return")]
    #[validate(nested)]
    pub return_authorization: ReturnAuthorization,
    /// 用于确定退款客户和支付方式的原订单
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub parameters: MessageParameters,
}

/// get_inventory
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InventoryMessage {
    #[serde(default, alias = "message_id")]
    pub request_id: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub parameters: MessageParameters,
}

/// status_check
///
/// 记录标识可以直接给出，也可以放在 parameters.xref 里，或只给订单号由交叉引用反查。
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatusCheckMessage {
    #[serde(default, alias = "request_id")]
    pub message_id: String,
    #[serde(default)]
    pub xref: Option<RecordId>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub parameters: MessageParameters,
}

impl StatusCheckMessage {
    pub fn record(&self) -> Option<&RecordId> {
        self.xref.as_ref().or(self.parameters.xref.as_ref())
    }
}
