//! 领域模型
//!
//! - `order` / `product`：上游平台推送的订单、商品、退货
//! - `changes`：订单变更集
//! - `accounting`：QuickBooks 侧实体
//! - `message`：各操作的入站消息

pub mod accounting;
pub mod changes;
pub mod message;
pub mod order;
pub mod product;

pub use accounting::{
    EntityKind, EntityRef, InventoryLevel, Item, MessageLogEntry, NamedEntity, NewCustomer,
    NewItem, PostalAddress, Receipt, ReceiptKind, ReceiptLine, RecordId, SyncState,
    SyncStatusReport,
};
pub use changes::ChangeSet;
pub use message::{
    InventoryMessage, MessageParameters, OrderMessage, ProductMessage, ReturnMessage,
    StatusCheckMessage,
};
pub use order::{Address, CreditCard, LineItem, Order, OrderTotals, Payment, round_cents};
pub use product::{Product, ReturnAuthorization};
