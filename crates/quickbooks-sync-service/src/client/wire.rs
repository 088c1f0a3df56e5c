//! QuickBooks v3 线格式
//!
//! 字段名遵循 QuickBooks 的 PascalCase 约定，只声明本服务读写的字段，
//! 未知字段在反序列化时忽略。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    EntityKind, EntityRef, Item, MessageLogEntry, NamedEntity, NewCustomer, NewItem,
    PostalAddress, Receipt, ReceiptLine, RecordId, SyncState, SyncStatusReport,
};

/// 重名错误码
pub const DUPLICATE_NAME_CODE: &str = "6240";

/// 实体引用 `{ "value": "...", "name": "..." }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireRef {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&EntityRef> for WireRef {
    fn from(r: &EntityRef) -> Self {
        Self {
            value: r.id.clone(),
            name: r.name.clone(),
        }
    }
}

impl From<WireRef> for EntityRef {
    fn from(r: WireRef) -> Self {
        Self {
            id: r.value,
            name: r.name,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireMetaData {
    #[serde(default)]
    pub last_updated_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// 具名实体
// ---------------------------------------------------------------------------

/// Account / PaymentMethod / Customer 的公共字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireNamed {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl WireNamed {
    pub fn into_entity(self, kind: EntityKind) -> NamedEntity {
        let name = match kind {
            EntityKind::Customer => self.display_name.or(self.name),
            _ => self.name.or(self.display_name),
        };
        NamedEntity {
            kind,
            id: self.id,
            name: name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireNewPaymentMethod<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_sub_division_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl From<&PostalAddress> for WireAddress {
    fn from(a: &PostalAddress) -> Self {
        Self {
            line1: a.line1.clone(),
            line2: a.line2.clone(),
            city: a.city.clone(),
            country_sub_division_code: a.region.clone(),
            postal_code: a.postal_code.clone(),
            country: a.country.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WireEmail {
    #[serde(rename = "Address")]
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WirePhone {
    #[serde(rename = "FreeFormNumber")]
    pub free_form_number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireNewCustomer {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email_addr: Option<WireEmail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_phone: Option<WirePhone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_addr: Option<WireAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_addr: Option<WireAddress>,
}

impl From<&NewCustomer> for WireNewCustomer {
    fn from(c: &NewCustomer) -> Self {
        Self {
            display_name: c.display_name.clone(),
            given_name: c.given_name.clone(),
            family_name: c.family_name.clone(),
            primary_email_addr: c.email.clone().map(|address| WireEmail { address }),
            primary_phone: c.phone.clone().map(|free_form_number| WirePhone { free_form_number }),
            bill_addr: c.billing_address.as_ref().map(WireAddress::from),
            ship_addr: c.shipping_address.as_ref().map(WireAddress::from),
        }
    }
}

// ---------------------------------------------------------------------------
// 商品
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty_on_hand: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<WireMetaData>,
    /// 稀疏更新标记，QuickBooks 中为小写字段
    #[serde(rename = "sparse", default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<bool>,
}

impl From<&NewItem> for WireItem {
    fn from(item: &NewItem) -> Self {
        Self {
            name: item.sku.clone(),
            description: item.description.clone(),
            unit_price: Some(item.unit_price),
            r#type: Some("NonInventory".to_string()),
            ..Default::default()
        }
    }
}

impl From<&Item> for WireItem {
    fn from(item: &Item) -> Self {
        Self {
            id: Some(item.id.clone()),
            name: item.sku.clone(),
            description: item.description.clone(),
            unit_price: Some(item.unit_price),
            sync_token: item.sync_token.clone(),
            sparse: Some(true),
            ..Default::default()
        }
    }
}

impl From<WireItem> for Item {
    fn from(w: WireItem) -> Self {
        Self {
            id: w.id.unwrap_or_default(),
            sku: w.name,
            description: w.description,
            unit_price: w.unit_price.unwrap_or_default(),
            quantity_on_hand: w.qty_on_hand,
            sync_token: w.sync_token,
            last_updated: w.meta_data.and_then(|m| m.last_updated_time),
        }
    }
}

// ---------------------------------------------------------------------------
// 收据
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireSalesItemLineDetail {
    pub item_ref: WireRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireLine {
    #[serde(default)]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub detail_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_item_line_detail: Option<WireSalesItemLineDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    #[serde(default)]
    pub doc_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_date: Option<NaiveDate>,
    #[serde(default)]
    pub customer_ref: WireRef,
    #[serde(default)]
    pub deposit_to_account_ref: WireRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_ref: Option<WireRef>,
    #[serde(default)]
    pub line: Vec<WireLine>,
    #[serde(default)]
    pub total_amt: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_note: Option<String>,
    #[serde(default, skip_serializing)]
    pub voided: bool,
}

impl From<&Receipt> for WireReceipt {
    fn from(r: &Receipt) -> Self {
        Self {
            id: r.id.as_ref().map(|id| id.id.clone()),
            id_domain: r.id.as_ref().map(|id| id.identifier_domain.clone()),
            sync_token: r.sync_token.clone(),
            doc_number: r.doc_number.clone(),
            txn_date: r.txn_date,
            customer_ref: WireRef::from(&r.customer),
            deposit_to_account_ref: WireRef::from(&r.deposit_account),
            payment_method_ref: r.payment_method.as_ref().map(WireRef::from),
            line: r
                .lines
                .iter()
                .map(|line| WireLine {
                    amount: line.amount,
                    description: line.description.clone(),
                    detail_type: "SalesItemLineDetail".to_string(),
                    sales_item_line_detail: Some(WireSalesItemLineDetail {
                        item_ref: WireRef::from(&line.item),
                        qty: Some(line.quantity),
                        unit_price: Some(line.unit_price),
                    }),
                })
                .collect(),
            total_amt: r.total_amount,
            private_note: r.private_note.clone(),
            voided: r.voided,
        }
    }
}

impl WireReceipt {
    /// 转为领域收据；远端没有返回标识域时使用默认值
    pub fn into_receipt(self, default_domain: &str) -> Receipt {
        let voided = self.voided
            || self
                .private_note
                .as_deref()
                .is_some_and(|note| note.contains("Voided"));
        let id = self.id.map(|id| {
            RecordId::new(
                id,
                self.id_domain
                    .unwrap_or_else(|| default_domain.to_string()),
            )
        });

        Receipt {
            id,
            sync_token: self.sync_token,
            doc_number: self.doc_number,
            txn_date: self.txn_date,
            customer: self.customer_ref.into(),
            deposit_account: self.deposit_to_account_ref.into(),
            payment_method: self.payment_method_ref.map(EntityRef::from),
            lines: self
                .line
                .into_iter()
                // 小计等汇总行没有商品明细，不属于收据行
                .filter_map(|line| {
                    let detail = line.sales_item_line_detail?;
                    Some(ReceiptLine {
                        item: detail.item_ref.into(),
                        description: line.description,
                        quantity: detail.qty.unwrap_or_default(),
                        unit_price: detail.unit_price.unwrap_or_default(),
                        amount: line.amount,
                    })
                })
                .collect(),
            total_amount: self.total_amt,
            voided,
            private_note: self.private_note,
        }
    }
}

// ---------------------------------------------------------------------------
// 同步状态与消息日志
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireSyncStatus {
    pub id: String,
    #[serde(default)]
    pub id_domain: Option<String>,
    /// "true" / "false" / "error"
    pub synchronized: String,
}

impl WireSyncStatus {
    pub fn into_report(self, requested: &RecordId) -> SyncStatusReport {
        let state = match self.synchronized.trim().to_ascii_lowercase().as_str() {
            "true" => SyncState::Synchronized,
            "error" => SyncState::Error,
            _ => SyncState::Pending,
        };
        SyncStatusReport {
            record: RecordId::new(
                self.id,
                self.id_domain
                    .unwrap_or_else(|| requested.identifier_domain.clone()),
            ),
            state,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireNgIdSet {
    #[serde(rename = "NgObjectType", default)]
    pub ng_object_type: String,
    #[serde(rename = "NgId", default)]
    pub ng_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireMessage {
    #[serde(default)]
    pub ng_id_set: WireNgIdSet,
    #[serde(default)]
    pub message_desc: String,
}

impl From<WireMessage> for MessageLogEntry {
    fn from(m: WireMessage) -> Self {
        Self {
            object_type: m.ng_id_set.ng_object_type,
            object_id: m.ng_id_set.ng_id,
            description: m.message_desc,
        }
    }
}

/// 错误响应 `{ "Fault": { "Error": [{ "Message", "Detail", "code" }] } }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireFaultEnvelope {
    #[serde(rename = "Fault", default)]
    pub fault: WireFault,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireFault {
    #[serde(rename = "Error", default)]
    pub errors: Vec<WireFaultError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireFaultError {
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Detail", default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: String,
}

impl WireFault {
    pub fn is_duplicate_name(&self) -> bool {
        self.errors.iter().any(|e| e.code == DUPLICATE_NAME_CODE)
    }

    pub fn describe(&self) -> String {
        self.errors
            .iter()
            .map(|e| match &e.detail {
                Some(detail) if !detail.is_empty() => format!("{}: {}", e.message, detail),
                _ => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
