//! 模拟账簿
//!
//! 在内存中模拟一个 QuickBooks 公司账簿：
//! - 具名实体（Account、PaymentMethod、Customer、Item）名称唯一，重名返回错误码 6240
//! - 更新校验 SyncToken，`sparse: true` 时只合并请求中出现的字段
//! - 收据写入后同步状态置为 "false"，需由管理接口推进
//! - 作废保留收据，金额清零并在备注中标记

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::info;

use crate::query::{QueryError, QueryParser};
use crate::store::EntityStore;

/// 账簿默认标识域
pub const DEFAULT_DOMAIN: &str = "QBO";

pub const DUPLICATE_NAME_CODE: &str = "6240";
pub const OBJECT_NOT_FOUND_CODE: &str = "610";
pub const STALE_OBJECT_CODE: &str = "5010";
pub const VALIDATION_CODE: &str = "2020";
pub const QUERY_PARSER_CODE: &str = "4000";

/// 账簿错误，序列化为 QuickBooks Fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Detail")]
    pub detail: String,
    pub code: String,
}

impl Fault {
    fn new(code: &str, message: &str, detail: impl Into<String>) -> Self {
        Self {
            message: message.to_string(),
            detail: detail.into(),
            code: code.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == OBJECT_NOT_FOUND_CODE
    }

    pub fn envelope(&self) -> Value {
        json!({ "Fault": { "Error": [self], "type": "ValidationFault" } })
    }
}

impl From<QueryError> for Fault {
    fn from(err: QueryError) -> Self {
        Fault::new(QUERY_PARSER_CODE, "QueryParserError", err.to_string())
    }
}

/// 实体在 URL 中为小写，返回体中为 PascalCase
pub fn canonical_entity(path_segment: &str) -> Option<&'static str> {
    match path_segment.to_ascii_lowercase().as_str() {
        "account" => Some("Account"),
        "paymentmethod" => Some("PaymentMethod"),
        "customer" => Some("Customer"),
        "item" => Some("Item"),
        "salesreceipt" => Some("SalesReceipt"),
        "refundreceipt" => Some("RefundReceipt"),
        _ => None,
    }
}

fn is_receipt(entity: &str) -> bool {
    matches!(entity, "SalesReceipt" | "RefundReceipt")
}

/// 唯一名称字段
fn name_field(entity: &str) -> Option<&'static str> {
    match entity {
        "Customer" => Some("DisplayName"),
        "Account" | "PaymentMethod" | "Item" => Some("Name"),
        _ => None,
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn str_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlag {
    Pending,
    Synchronized,
    Error,
}

impl SyncFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "false",
            Self::Synchronized => "true",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "false" | "pending" => Some(Self::Pending),
            "true" | "synchronized" => Some(Self::Synchronized),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// 消息日志条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
    pub object_type: String,
    pub object_id: String,
    pub description: String,
}

impl LoggedMessage {
    fn to_wire(&self) -> Value {
        json!({
            "NgIdSet": { "NgObjectType": self.object_type, "NgId": self.object_id },
            "MessageDesc": self.description,
        })
    }
}

/// 模拟账簿
pub struct Ledger {
    store: EntityStore,
    next_id: AtomicU64,
    sync_flags: dashmap::DashMap<String, SyncFlag>,
    messages: RwLock<Vec<LoggedMessage>>,
    parser: QueryParser,
}

impl Ledger {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            store: EntityStore::new(),
            next_id: AtomicU64::new(0),
            sync_flags: dashmap::DashMap::new(),
            messages: RwLock::new(Vec::new()),
            parser: QueryParser::new()?,
        })
    }

    /// 预置常用账户与支付方式
    pub fn with_defaults() -> Result<Self, regex::Error> {
        let ledger = Self::new()?;
        for account in ["Undeposited Funds", "Sales of Product Income"] {
            ledger.seed("Account", json!({ "Name": account, "AccountType": "Other Current Asset" }));
        }
        for method in ["Visa", "Discover", "MasterCard", "American Express", "Cash"] {
            ledger.seed("PaymentMethod", json!({ "Name": method }));
        }
        Ok(ledger)
    }

    fn allocate_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// 直接写入一条记录，跳过唯一性检查
    pub fn seed(&self, entity: &str, mut record: Value) -> Value {
        let id = self.allocate_id();
        stamp_new(&mut record, &id, entity);
        self.store.table(entity).insert(&id, record.clone());
        record
    }

    pub fn get(&self, entity: &str, id: &str) -> Result<Value, Fault> {
        self.store.table(entity).get(id).ok_or_else(|| {
            Fault::new(
                OBJECT_NOT_FOUND_CODE,
                "Object Not Found",
                format!("{} {} 不存在", entity, id),
            )
        })
    }

    pub fn query(&self, statement: &str) -> Result<(String, Vec<Value>), Fault> {
        let query = self.parser.parse(statement)?;
        let entity = canonical_entity(&query.entity)
            .map(str::to_string)
            .unwrap_or(query.entity.clone());
        let rows = self.store.table(&entity).list_by(|row| query.matches(row));
        Ok((entity, rows))
    }

    fn find_by_name(&self, entity: &str, name: &str) -> Option<Value> {
        let field = name_field(entity)?;
        self.store
            .table(entity)
            .list_by(|row| str_field(row, field).is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .into_iter()
            .next()
    }

    pub fn create(&self, entity: &str, mut body: Value) -> Result<Value, Fault> {
        if !body.is_object() {
            return Err(Fault::new(VALIDATION_CODE, "Request has invalid or unsupported property", "请求体必须是对象"));
        }

        if let Some(field) = name_field(entity) {
            let name = str_field(&body, field).unwrap_or_default().to_string();
            if name.trim().is_empty() {
                return Err(Fault::new(
                    VALIDATION_CODE,
                    "Required param missing",
                    format!("缺少 {}", field),
                ));
            }
            if self.find_by_name(entity, &name).is_some() {
                return Err(Fault::new(
                    DUPLICATE_NAME_CODE,
                    "Duplicate Name Exists Error",
                    format!("The name supplied already exists. : {}", name),
                ));
            }
        }

        let id = self.allocate_id();
        stamp_new(&mut body, &id, entity);
        if is_receipt(entity) {
            self.sync_flags.insert(id.clone(), SyncFlag::Pending);
        }
        self.store.table(entity).insert(&id, body.clone());
        info!(entity, id = %id, "创建记录");
        Ok(body)
    }

    /// 更新记录；`void` 为真时额外作废
    pub fn update(&self, entity: &str, body: Value, void: bool) -> Result<Value, Fault> {
        let id = str_field(&body, "Id")
            .ok_or_else(|| Fault::new(VALIDATION_CODE, "Required param missing", "缺少 Id"))?
            .to_string();

        // 改名时同样要求名称唯一
        if let Some(field) = name_field(entity) {
            if let Some(name) = str_field(&body, field) {
                if let Some(other) = self.find_by_name(entity, name) {
                    if str_field(&other, "Id") != Some(id.as_str()) {
                        return Err(Fault::new(
                            DUPLICATE_NAME_CODE,
                            "Duplicate Name Exists Error",
                            format!("The name supplied already exists. : {}", name),
                        ));
                    }
                }
            }
        }

        let table = self.store.table(entity);
        let updated = table
            .modify(&id, |stored| apply_update(stored, body, void))
            .ok_or_else(|| {
                Fault::new(
                    OBJECT_NOT_FOUND_CODE,
                    "Object Not Found",
                    format!("{} {} 不存在", entity, id),
                )
            })??;

        if is_receipt(entity) {
            self.sync_flags.insert(id.clone(), SyncFlag::Pending);
        }
        info!(entity, id = %id, void, "更新记录");
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // 同步状态与消息日志
    // ------------------------------------------------------------------

    pub fn sync_status(&self, domain: &str, id: &str) -> Option<Value> {
        self.sync_flags.get(id).map(|flag| {
            json!({ "Id": id, "IdDomain": domain, "Synchronized": flag.as_str() })
        })
    }

    pub fn set_sync_flag(&self, id: &str, flag: SyncFlag) -> bool {
        match self.sync_flags.get_mut(id) {
            Some(mut entry) => {
                *entry = flag;
                true
            }
            None => false,
        }
    }

    pub async fn push_message(&self, message: LoggedMessage) {
        self.messages.write().await.push(message);
    }

    pub async fn messages(&self) -> Vec<Value> {
        self.messages
            .read()
            .await
            .iter()
            .map(LoggedMessage::to_wire)
            .collect()
    }
}

fn stamp_new(record: &mut Value, id: &str, entity: &str) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    let ts = now();
    obj.insert("Id".to_string(), json!(id));
    obj.insert("SyncToken".to_string(), json!("0"));
    obj.insert(
        "MetaData".to_string(),
        json!({ "CreateTime": ts, "LastUpdatedTime": ts }),
    );
    obj.remove("sparse");
    if is_receipt(entity) {
        obj.insert("IdDomain".to_string(), json!(DEFAULT_DOMAIN));
    }
    if entity == "Item" && !obj.contains_key("Type") {
        obj.insert("Type".to_string(), json!("NonInventory"));
    }
}

fn apply_update(stored: &mut Value, body: Value, void: bool) -> Result<(), Fault> {
    let current_token = str_field(stored, "SyncToken").unwrap_or("0").to_string();
    if let Some(token) = str_field(&body, "SyncToken") {
        if token != current_token {
            return Err(Fault::new(
                STALE_OBJECT_CODE,
                "Stale Object Error",
                format!("SyncToken {} 已过期，当前为 {}", token, current_token),
            ));
        }
    }

    let sparse = body.get("sparse").and_then(Value::as_bool).unwrap_or(false);
    let Value::Object(incoming) = body else {
        return Err(Fault::new(VALIDATION_CODE, "Request has invalid or unsupported property", "请求体必须是对象"));
    };

    let preserved = ["Id", "IdDomain", "MetaData", "QtyOnHand", "Type"];
    let mut merged: Map<String, Value> = if sparse {
        stored.as_object().cloned().unwrap_or_default()
    } else {
        let mut base = Map::new();
        if let Some(old) = stored.as_object() {
            for key in preserved {
                if let Some(value) = old.get(key) {
                    base.insert(key.to_string(), value.clone());
                }
            }
        }
        base
    };
    for (key, value) in incoming {
        if key != "sparse" && key != "Id" && key != "SyncToken" && key != "MetaData" {
            merged.insert(key, value);
        }
    }

    let next_token = current_token.parse::<u64>().unwrap_or_default() + 1;
    merged.insert("SyncToken".to_string(), json!(next_token.to_string()));
    let created = merged
        .get("MetaData")
        .and_then(|m| m.get("CreateTime"))
        .cloned()
        .unwrap_or_else(|| json!(now()));
    merged.insert(
        "MetaData".to_string(),
        json!({ "CreateTime": created, "LastUpdatedTime": now() }),
    );

    if void {
        void_record(&mut merged);
    }

    *stored = Value::Object(merged);
    Ok(())
}

/// 作废：金额清零，备注标记 Voided
fn void_record(record: &mut Map<String, Value>) {
    record.insert("TotalAmt".to_string(), json!(0.0));
    if let Some(Value::Array(lines)) = record.get_mut("Line") {
        for line in lines {
            if let Some(obj) = line.as_object_mut() {
                obj.insert("Amount".to_string(), json!(0.0));
            }
        }
    }
    let note = record
        .get("PrivateNote")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    if !note.contains("Voided") {
        let note = if note.is_empty() {
            "Voided".to_string()
        } else {
            format!("{} Voided", note)
        };
        record.insert("PrivateNote".to_string(), json!(note));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::with_defaults().unwrap()
    }

    #[test]
    fn test_duplicate_name_is_6240() {
        let ledger = ledger();
        ledger
            .create("Item", json!({ "Name": "test-abc", "UnitPrice": 14.99 }))
            .unwrap();
        let fault = ledger
            .create("Item", json!({ "Name": "TEST-ABC", "UnitPrice": 9.99 }))
            .unwrap_err();
        assert_eq!(fault.code, DUPLICATE_NAME_CODE);
    }

    #[test]
    fn test_query_by_name() {
        let ledger = ledger();
        let (entity, rows) = ledger
            .query("select * from PaymentMethod where Name = 'visa'")
            .unwrap();
        assert_eq!(entity, "PaymentMethod");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Name"], "Visa");
    }

    #[test]
    fn test_sparse_update_keeps_other_fields() {
        let ledger = ledger();
        let item = ledger
            .create("Item", json!({ "Name": "mug", "Description": "Mug", "UnitPrice": 5.0 }))
            .unwrap();

        let updated = ledger
            .update(
                "Item",
                json!({ "Id": item["Id"], "SyncToken": "0", "sparse": true, "UnitPrice": 6.0 }),
                false,
            )
            .unwrap();
        assert_eq!(updated["Description"], "Mug");
        assert_eq!(updated["UnitPrice"], 6.0);
        assert_eq!(updated["SyncToken"], "1");
    }

    #[test]
    fn test_stale_sync_token_rejected() {
        let ledger = ledger();
        let item = ledger.create("Item", json!({ "Name": "mug" })).unwrap();
        let fault = ledger
            .update("Item", json!({ "Id": item["Id"], "SyncToken": "7" }), false)
            .unwrap_err();
        assert_eq!(fault.code, STALE_OBJECT_CODE);
    }

    #[test]
    fn test_receipt_status_and_void() {
        let ledger = ledger();
        let receipt = ledger
            .create(
                "SalesReceipt",
                json!({
                    "DocNumber": "R1",
                    "TotalAmt": 10.0,
                    "Line": [ { "Amount": 10.0, "DetailType": "SalesItemLineDetail" } ]
                }),
            )
            .unwrap();
        let id = receipt["Id"].as_str().unwrap();
        assert_eq!(receipt["IdDomain"], DEFAULT_DOMAIN);
        assert_eq!(
            ledger.sync_status("QBO", id).unwrap()["Synchronized"],
            "false"
        );

        assert!(ledger.set_sync_flag(id, SyncFlag::Synchronized));
        let voided = ledger.update("SalesReceipt", receipt.clone(), true).unwrap();
        assert_eq!(voided["TotalAmt"], 0.0);
        assert_eq!(voided["Line"][0]["Amount"], 0.0);
        assert_eq!(voided["PrivateNote"], "Voided");
        assert_eq!(
            ledger.sync_status("QBO", id).unwrap()["Synchronized"],
            "false"
        );
    }

    #[test]
    fn test_update_missing_record_is_610() {
        let fault = ledger()
            .update("Item", json!({ "Id": "999", "Name": "x" }), false)
            .unwrap_err();
        assert!(fault.is_not_found());
    }
}
