//! 订单变更集
//!
//! 描述自上次同步以来订单中哪些字段发生了变化。更新已存在的收据时只改写变更集
//! 中出现的字段，其余字段保持原样。

use serde_json::Value;

use super::order::Order;

/// 变更集
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub total_amount: bool,
    pub line_items: bool,
    pub payment: bool,
}

impl ChangeSet {
    pub fn all() -> Self {
        Self {
            total_amount: true,
            line_items: true,
            payment: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.total_amount || self.line_items || self.payment)
    }

    /// 按消息内容推导变更集
    ///
    /// 优先使用显式的 `changes` 对象；没有时比较 `original` 与当前订单；两者都没有则为空。
    pub fn from_message(order: &Order, original: Option<&Order>, changes: Option<&Value>) -> Self {
        match (changes, original) {
            (Some(changes), _) if !changes.is_null() => Self::from_changes(changes),
            (_, Some(original)) => Self::diff(original, order),
            _ => Self::default(),
        }
    }

    /// 从显式变更对象解析
    ///
    /// 既支持 `{"totals": {...}, "line_items": [...]}` 这样的对象，也支持字段名数组。
    pub fn from_changes(changes: &Value) -> Self {
        let keys: Vec<&str> = match changes {
            Value::Object(map) => map.keys().map(String::as_str).collect(),
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        let mut set = Self::default();
        for key in keys {
            match key {
                "totals" | "total" | "total_amount" => set.total_amount = true,
                "line_items" => set.line_items = true,
                "payments" | "credit_cards" | "payment_method" => set.payment = true,
                _ => {}
            }
        }
        set
    }

    /// 比较两个订单快照
    pub fn diff(original: &Order, current: &Order) -> Self {
        Self {
            total_amount: original.totals != current.totals,
            line_items: original.line_items != current.line_items,
            payment: original.payments != current.payments
                || original.credit_cards != current.credit_cards,
        }
    }
}
