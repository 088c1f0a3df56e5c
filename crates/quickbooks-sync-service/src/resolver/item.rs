//! 商品解析
//!
//! 按 SKU 查找，不存在则以描述和价格创建。两个请求同时创建同一 SKU 时，
//! 后到的一方拿到重名冲突后重查并返回先创建的商品，价格以先创建者为准。

use std::sync::Arc;

use qbsync_shared::observability::metrics;
use tracing::{debug, info};

use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{Item, NewItem};

#[derive(Clone)]
pub struct ItemResolver {
    client: Arc<dyn AccountingClient>,
}

impl ItemResolver {
    pub fn new(client: Arc<dyn AccountingClient>) -> Self {
        Self { client }
    }

    pub async fn find(&self, sku: &str) -> Result<Option<Item>> {
        self.client.find_item_by_sku(sku).await
    }

    pub async fn resolve(&self, sku: &str) -> Result<Item> {
        self.find(sku)
            .await?
            .ok_or_else(|| SyncError::not_found("Item", sku))
    }

    pub async fn resolve_or_create(&self, item: &NewItem) -> Result<Item> {
        if let Some(existing) = self.find(&item.sku).await? {
            metrics::record_entity_resolution("Item", "found");
            return Ok(existing);
        }

        match self.client.create_item(item).await {
            Ok(created) => {
                info!(sku = %created.sku, id = %created.id, "已在 QuickBooks 中创建商品");
                metrics::record_entity_resolution("Item", "created");
                Ok(created)
            }
            Err(SyncError::Conflict { .. }) => {
                debug!(sku = %item.sku, "商品创建撞名，改用已存在的商品");
                metrics::record_entity_resolution("Item", "conflict_refetched");
                self.resolve(&item.sku).await
            }
            Err(e) => Err(e),
        }
    }
}
