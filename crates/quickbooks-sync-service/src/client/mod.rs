//! QuickBooks 客户端
//!
//! 通过 AccountingClient trait 抽象对 QuickBooks 的查找、创建、更新和状态查询，
//! 对账器与解析器只依赖 trait，测试时注入 mock 或内存实现。

pub mod http;
pub mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    EntityKind, Item, MessageLogEntry, NamedEntity, NewCustomer, NewItem, Receipt, ReceiptKind,
    RecordId, SyncStatusReport,
};

pub use http::QuickbooksHttpClient;

/// QuickBooks 协作方接口
///
/// 查找类方法以 `Ok(None)` 表示不存在；以唯一名称创建实体时重名返回 `SyncError::Conflict`。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountingClient: Send + Sync {
    // 具名实体
    async fn find_by_name(&self, kind: EntityKind, name: &str) -> Result<Option<NamedEntity>>;
    async fn create_payment_method(&self, name: &str) -> Result<NamedEntity>;
    async fn create_customer(&self, customer: &NewCustomer) -> Result<NamedEntity>;

    // 商品
    async fn find_item_by_sku(&self, sku: &str) -> Result<Option<Item>>;
    async fn create_item(&self, item: &NewItem) -> Result<Item>;
    async fn update_item(&self, item: &Item) -> Result<Item>;
    /// 列出在指定时间之后修改过的商品，为空时列出全部
    async fn list_items(&self, modified_since: Option<DateTime<Utc>>) -> Result<Vec<Item>>;

    // 收据
    async fn find_receipt_by_doc_number(
        &self,
        kind: ReceiptKind,
        doc_number: &str,
    ) -> Result<Option<Receipt>>;
    async fn fetch_receipt(&self, kind: ReceiptKind, id: &RecordId) -> Result<Option<Receipt>>;
    async fn create_receipt(&self, kind: ReceiptKind, receipt: &Receipt) -> Result<Receipt>;
    /// 写回整张收据；`receipt.voided` 为真时走作废操作
    async fn update_receipt(&self, kind: ReceiptKind, receipt: &Receipt) -> Result<Receipt>;

    // 同步状态
    async fn fetch_status(&self, id: &RecordId) -> Result<Option<SyncStatusReport>>;
    async fn list_messages(&self) -> Result<Vec<MessageLogEntry>>;
}
