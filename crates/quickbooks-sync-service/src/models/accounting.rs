//! QuickBooks 侧的实体模型
//!
//! 与线上 JSON（PascalCase）无关的领域表示，线格式的转换放在 `client::wire` 中。

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// QuickBooks 记录标识
///
/// 同一个 Id 在不同标识域（identifier domain）中含义不同，所以总是成对出现。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub id: String,
    #[serde(alias = "id_domain", alias = "idDomain")]
    pub identifier_domain: String,
}

impl RecordId {
    pub fn new(id: impl Into<String>, identifier_domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identifier_domain: identifier_domain.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty() && !self.identifier_domain.trim().is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.identifier_domain, self.id)
    }
}

/// 按名称查找的实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    PaymentMethod,
    Customer,
    Item,
}

impl EntityKind {
    /// QuickBooks 查询语言中的实体名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::PaymentMethod => "PaymentMethod",
            Self::Customer => "Customer",
            Self::Item => "Item",
        }
    }

    /// 实体唯一名称所在的字段
    pub fn name_field(&self) -> &'static str {
        match self {
            Self::Customer => "DisplayName",
            _ => "Name",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已解析的具名实体（科目、支付方式、客户）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
}

impl NamedEntity {
    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id.clone(),
            name: Some(self.name.clone()),
        }
    }
}

/// 收据中对其他实体的引用
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub name: Option<String>,
}

/// 新客户
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCustomer {
    pub display_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_address: Option<PostalAddress>,
    pub shipping_address: Option<PostalAddress>,
}

/// QuickBooks 地址
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// 商品（SKU 即 Item 的 Name）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit_price: f64,
    /// 仅库存类商品有在手数量
    pub quantity_on_hand: Option<f64>,
    pub sync_token: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Item {
    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id.clone(),
            name: Some(self.sku.clone()),
        }
    }
}

/// 新商品
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub sku: String,
    pub description: Option<String>,
    pub unit_price: f64,
}

/// 收据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptKind {
    /// 订单对应的销售收据
    SalesReceipt,
    /// 退货对应的退款收据
    RefundReceipt,
}

impl ReceiptKind {
    pub const ALL: [ReceiptKind; 2] = [Self::SalesReceipt, Self::RefundReceipt];

    /// 按消息日志中的对象类型名匹配
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesReceipt => "SalesReceipt",
            Self::RefundReceipt => "RefundReceipt",
        }
    }

    /// REST 路径中的资源名
    pub fn resource(&self) -> &'static str {
        match self {
            Self::SalesReceipt => "salesreceipt",
            Self::RefundReceipt => "refundreceipt",
        }
    }
}

impl fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 收据
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    /// 新建前为空，提交后由 QuickBooks 分配
    pub id: Option<RecordId>,
    pub sync_token: Option<String>,
    pub doc_number: String,
    pub txn_date: Option<NaiveDate>,
    pub customer: EntityRef,
    pub deposit_account: EntityRef,
    pub payment_method: Option<EntityRef>,
    pub lines: Vec<ReceiptLine>,
    pub total_amount: f64,
    pub voided: bool,
    pub private_note: Option<String>,
}

impl Receipt {
    /// 作废：金额清零并在备注中标记
    pub fn void(&mut self) {
        self.voided = true;
        self.total_amount = 0.0;
        for line in &mut self.lines {
            line.amount = 0.0;
        }
        self.private_note = Some(match self.private_note.take() {
            Some(note) if !note.trim().is_empty() => format!("{} Voided", note.trim_end()),
            _ => "Voided".to_string(),
        });
    }
}

/// 收据行
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLine {
    pub item: EntityRef,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synchronized,
    Error,
}

/// 远端报告的记录同步状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatusReport {
    pub record: RecordId,
    pub state: SyncState,
}

/// 消息日志条目，用于错误诊断
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLogEntry {
    pub object_type: String,
    pub object_id: String,
    pub description: String,
}

/// 库存水平
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub sku: String,
    pub quantity: i64,
}
