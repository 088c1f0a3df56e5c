//! 测试工具模块
//!
//! 提供内存版的 QuickBooks 协作方，供集成测试驱动完整的对账流程。
//! 行为与真实服务保持一致：名称唯一、重名返回冲突、新收据初始状态为未同步。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;

use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{
    EntityKind, Item, MessageLogEntry, NamedEntity, NewCustomer, NewItem, Receipt, ReceiptKind,
    RecordId, SyncState, SyncStatusReport,
};

/// 内存记账服务默认标识域
pub const MEMORY_DOMAIN: &str = "QBO";

/// 内存版 QuickBooks
///
/// 具名实体按名称大小写不敏感匹配，与 QuickBooks 查询行为一致。
#[derive(Default)]
pub struct InMemoryAccounting {
    next_id: AtomicU64,
    named: DashMap<(EntityKind, String), NamedEntity>,
    items: DashMap<String, Item>,
    receipts: DashMap<(ReceiptKind, String), Receipt>,
    statuses: DashMap<String, SyncState>,
    messages: RwLock<Vec<MessageLogEntry>>,
    receipt_creates: AtomicUsize,
    receipt_updates: AtomicUsize,
    item_creates: AtomicUsize,
}

impl InMemoryAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置常用账户与支付方式
    pub fn with_standard_ledger() -> Self {
        let ledger = Self::new();
        ledger.seed_named(EntityKind::Account, "Undeposited Funds");
        for method in ["Visa", "Discover", "MasterCard", "Cash"] {
            ledger.seed_named(EntityKind::PaymentMethod, method);
        }
        ledger
    }

    fn allocate_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    // ------------------------------------------------------------------
    // 预置数据
    // ------------------------------------------------------------------

    pub fn seed_named(&self, kind: EntityKind, name: &str) -> NamedEntity {
        let entity = NamedEntity {
            kind,
            id: self.allocate_id(),
            name: name.to_string(),
        };
        self.named.insert((kind, name.to_lowercase()), entity.clone());
        entity
    }

    pub fn seed_item(&self, sku: &str, unit_price: f64, quantity_on_hand: Option<f64>) -> Item {
        let item = Item {
            id: self.allocate_id(),
            sku: sku.to_string(),
            description: None,
            unit_price,
            quantity_on_hand,
            sync_token: Some("0".to_string()),
            last_updated: Some(Utc::now()),
        };
        self.items.insert(sku.to_string(), item.clone());
        item
    }

    /// 直接写入一张收据，不计入创建次数
    pub fn seed_receipt(&self, kind: ReceiptKind, mut receipt: Receipt) -> Receipt {
        let id = self.allocate_id();
        receipt.id = Some(RecordId::new(id.clone(), MEMORY_DOMAIN));
        receipt.sync_token = Some("0".to_string());
        self.receipts.insert((kind, id.clone()), receipt.clone());
        self.statuses.insert(id, SyncState::Pending);
        receipt
    }

    pub fn set_status(&self, record: &RecordId, state: SyncState) {
        self.statuses.insert(record.id.clone(), state);
    }

    pub async fn push_message(&self, entry: MessageLogEntry) {
        self.messages.write().await.push(entry);
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    pub fn receipt(&self, kind: ReceiptKind, record: &RecordId) -> Option<Receipt> {
        self.receipts
            .get(&(kind, record.id.clone()))
            .map(|r| r.value().clone())
    }

    pub fn receipts(&self, kind: ReceiptKind) -> Vec<Receipt> {
        self.receipts
            .iter()
            .filter(|entry| entry.key().0 == kind)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn item(&self, sku: &str) -> Option<Item> {
        self.items.get(sku).map(|i| i.value().clone())
    }

    pub fn named(&self, kind: EntityKind, name: &str) -> Option<NamedEntity> {
        self.named
            .get(&(kind, name.to_lowercase()))
            .map(|e| e.value().clone())
    }

    pub fn receipt_creates(&self) -> usize {
        self.receipt_creates.load(Ordering::SeqCst)
    }

    pub fn receipt_updates(&self) -> usize {
        self.receipt_updates.load(Ordering::SeqCst)
    }

    pub fn item_creates(&self) -> usize {
        self.item_creates.load(Ordering::SeqCst)
    }

    fn create_named(&self, kind: EntityKind, name: &str) -> Result<NamedEntity> {
        let key = (kind, name.to_lowercase());
        if self.named.contains_key(&key) {
            return Err(SyncError::Conflict {
                entity: kind.as_str().to_string(),
                name: name.to_string(),
            });
        }
        let entity = NamedEntity {
            kind,
            id: self.allocate_id(),
            name: name.to_string(),
        };
        self.named.insert(key, entity.clone());
        Ok(entity)
    }
}

fn next_token(token: Option<&str>) -> String {
    token
        .and_then(|t| t.parse::<u64>().ok())
        .map(|t| t + 1)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl AccountingClient for InMemoryAccounting {
    async fn find_by_name(&self, kind: EntityKind, name: &str) -> Result<Option<NamedEntity>> {
        Ok(self.named(kind, name))
    }

    async fn create_payment_method(&self, name: &str) -> Result<NamedEntity> {
        self.create_named(EntityKind::PaymentMethod, name)
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<NamedEntity> {
        self.create_named(EntityKind::Customer, &customer.display_name)
    }

    async fn find_item_by_sku(&self, sku: &str) -> Result<Option<Item>> {
        Ok(self.item(sku))
    }

    async fn create_item(&self, item: &NewItem) -> Result<Item> {
        // entry 持有分片锁，并发创建同一 SKU 只有一个成功
        match self.items.entry(item.sku.clone()) {
            Entry::Occupied(_) => Err(SyncError::Conflict {
                entity: EntityKind::Item.as_str().to_string(),
                name: item.sku.clone(),
            }),
            Entry::Vacant(slot) => {
                let created = Item {
                    id: self.allocate_id(),
                    sku: item.sku.clone(),
                    description: item.description.clone(),
                    unit_price: item.unit_price,
                    quantity_on_hand: None,
                    sync_token: Some("0".to_string()),
                    last_updated: Some(Utc::now()),
                };
                slot.insert(created.clone());
                self.item_creates.fetch_add(1, Ordering::SeqCst);
                Ok(created)
            }
        }
    }

    async fn update_item(&self, item: &Item) -> Result<Item> {
        let mut stored = self
            .items
            .get_mut(&item.sku)
            .ok_or_else(|| SyncError::not_found(EntityKind::Item.as_str(), &item.sku))?;
        stored.description = item.description.clone();
        stored.unit_price = item.unit_price;
        stored.sync_token = Some(next_token(stored.sync_token.as_deref()));
        stored.last_updated = Some(Utc::now());
        Ok(stored.clone())
    }

    async fn list_items(&self, modified_since: Option<DateTime<Utc>>) -> Result<Vec<Item>> {
        Ok(self
            .items
            .iter()
            .filter(|entry| match (modified_since, entry.last_updated) {
                (Some(since), Some(updated)) => updated > since,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_receipt_by_doc_number(
        &self,
        kind: ReceiptKind,
        doc_number: &str,
    ) -> Result<Option<Receipt>> {
        Ok(self
            .receipts
            .iter()
            .find(|entry| entry.key().0 == kind && entry.doc_number == doc_number)
            .map(|entry| entry.value().clone()))
    }

    async fn fetch_receipt(&self, kind: ReceiptKind, id: &RecordId) -> Result<Option<Receipt>> {
        Ok(self.receipt(kind, id))
    }

    async fn create_receipt(&self, kind: ReceiptKind, receipt: &Receipt) -> Result<Receipt> {
        self.receipt_creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.seed_receipt(kind, receipt.clone()))
    }

    async fn update_receipt(&self, kind: ReceiptKind, receipt: &Receipt) -> Result<Receipt> {
        let id = receipt
            .id
            .as_ref()
            .ok_or_else(|| SyncError::Validation("更新收据缺少 ID".to_string()))?;
        let mut stored = self
            .receipts
            .get_mut(&(kind, id.id.clone()))
            .ok_or_else(|| SyncError::not_found(kind.as_str(), &id.id))?;

        let token = next_token(stored.sync_token.as_deref());
        *stored = receipt.clone();
        stored.sync_token = Some(token);
        self.receipt_updates.fetch_add(1, Ordering::SeqCst);
        self.statuses.insert(id.id.clone(), SyncState::Pending);
        Ok(stored.clone())
    }

    async fn fetch_status(&self, id: &RecordId) -> Result<Option<SyncStatusReport>> {
        Ok(self.statuses.get(&id.id).map(|state| SyncStatusReport {
            record: id.clone(),
            state: *state,
        }))
    }

    async fn list_messages(&self) -> Result<Vec<MessageLogEntry>> {
        Ok(self.messages.read().await.clone())
    }
}
