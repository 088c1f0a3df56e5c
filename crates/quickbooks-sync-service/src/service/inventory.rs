//! 库存读取
//!
//! 指定 SKU 时返回单个商品的在手数量；否则按上次轮询时间增量列出修改过的商品，
//! 并把其中最新的修改时间作为下一次轮询的起点返回给调用方。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::client::AccountingClient;
use crate::error::Result;
use crate::models::{InventoryLevel, Item};

/// 增量轮询结果
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySnapshot {
    pub levels: Vec<InventoryLevel>,
    /// 下一次轮询使用的时间戳；本次没有新修改时沿用传入值
    pub next_poll_timestamp: Option<DateTime<Utc>>,
}

pub struct InventoryReader {
    client: Arc<dyn AccountingClient>,
}

impl InventoryReader {
    pub fn new(client: Arc<dyn AccountingClient>) -> Self {
        Self { client }
    }

    /// 单个 SKU 的库存，商品不存在时返回空列表
    pub async fn for_sku(&self, sku: &str) -> Result<Vec<InventoryLevel>> {
        let item = self.client.find_item_by_sku(sku).await?;
        Ok(item
            .map(|item| InventoryLevel {
                quantity: item.quantity_on_hand.unwrap_or_default() as i64,
                sku: item.sku,
            })
            .into_iter()
            .collect())
    }

    /// 增量轮询，非库存类商品（没有在手数量）不计入
    pub async fn poll(&self, since: Option<DateTime<Utc>>) -> Result<InventorySnapshot> {
        let items = self.client.list_items(since).await?;
        debug!(count = items.len(), ?since, "拉取到修改过的商品");

        let next_poll_timestamp = items
            .iter()
            .filter_map(|i| i.last_updated)
            .max()
            .max(since);

        let levels = items.into_iter().filter_map(level).collect();

        Ok(InventorySnapshot {
            levels,
            next_poll_timestamp,
        })
    }
}

fn level(item: Item) -> Option<InventoryLevel> {
    item.quantity_on_hand.map(|qty| InventoryLevel {
        sku: item.sku,
        quantity: qty as i64,
    })
}
