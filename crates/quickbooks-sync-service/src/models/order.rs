//! 订单模型
//!
//! 上游订单平台推送的订单快照。订单号同时作为 QuickBooks 收据的单据号（DocNumber）。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 订单
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Order {
    #[serde(default)]
    #[validate(length(min = 1, message = "订单号不能为空"))]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub placed_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub totals: OrderTotals,
    #[serde(default)]
    #[validate(nested)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub credit_cards: Vec<CreditCard>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
}

impl Order {
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("canceled") || s.eq_ignore_ascii_case("cancelled"))
    }

    /// 收据交易日期取下单日期
    pub fn txn_date(&self) -> Option<NaiveDate> {
        self.placed_on.map(|t| t.date_naive())
    }

    /// 由账单地址拼出客户显示名 "名 姓"
    pub fn customer_name(&self) -> Option<String> {
        self.billing_address.as_ref().and_then(Address::full_name)
    }
}

/// 订单金额汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderTotals {
    pub item: f64,
    pub adjustment: f64,
    pub tax: f64,
    pub shipping: f64,
    pub payment: f64,
    pub order: f64,
}

/// 订单行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct LineItem {
    /// 商品 SKU，在 QuickBooks 中即 Item 的 Name
    #[serde(alias = "sku")]
    #[validate(length(min = 1, message = "订单行缺少 SKU"))]
    pub product_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "数量不能为负"))]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
}

impl LineItem {
    pub fn amount(&self) -> f64 {
        round_cents(self.quantity * self.price)
    }
}

/// 支付记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// 信用卡
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditCard {
    /// 卡组织，如 visa、master
    #[serde(default)]
    pub cc_type: Option<String>,
    #[serde(default)]
    pub last_digits: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// 地址
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub zipcode: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl Address {
    pub fn full_name(&self) -> Option<String> {
        let name = [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

/// 金额四舍五入到分
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_deserialize_minimal() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": "R181807170",
            "line_items": [{ "product_id": "SPREE-T-SHIRT", "quantity": 2, "price": 19.99 }]
        }))
        .unwrap();

        assert_eq!(order.id, "R181807170");
        assert_eq!(order.line_items[0].amount(), 39.98);
        assert!(order.validate().is_ok());
        assert!(!order.is_cancelled());
    }

    #[test]
    fn test_order_validation_rejects_empty_sku() {
        let order = Order {
            id: "R1".to_string(),
            line_items: vec![LineItem {
                product_id: String::new(),
                quantity: 1.0,
                price: 1.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(order.validate().is_err());

        let missing_id = Order::default();
        assert!(missing_id.validate().is_err());
    }

    #[test]
    fn test_customer_name_from_billing_address() {
        let order = Order {
            billing_address: Some(Address {
                firstname: Some("Brian".to_string()),
                lastname: Some(" Quinn ".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(order.customer_name().as_deref(), Some("Brian Quinn"));

        let anonymous = Order::default();
        assert_eq!(anonymous.customer_name(), None);
    }

    #[test]
    fn test_cancelled_status_spellings() {
        for status in ["canceled", "cancelled", "CANCELED"] {
            let order = Order {
                status: Some(status.to_string()),
                ..Default::default()
            };
            assert!(order.is_cancelled(), "{status}");
        }
    }
}
