//! 商品与退货模型

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::order::{LineItem, round_cents};

/// 商品，导入后对应 QuickBooks 中以 SKU 命名的 Item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Product {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "商品缺少 SKU"))]
    pub sku: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "价格不能为负"))]
    pub price: f64,
}

impl Product {
    /// Item 描述：优先 description，其次商品名
    pub fn item_description(&self) -> Option<String> {
        self.description
            .as_deref()
            .or(self.name.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }
}

/// 退货授权
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReturnAuthorization {
    #[serde(default)]
    #[validate(length(min = 1, message = "退货单号不能为空"))]
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// 退款金额，为 0 时按退货行合计
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    #[validate(nested)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReturnAuthorization {
    pub fn refund_total(&self) -> f64 {
        if self.amount > 0.0 {
            round_cents(self.amount)
        } else {
            round_cents(self.line_items.iter().map(LineItem::amount).sum())
        }
    }
}
