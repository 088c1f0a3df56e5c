//! 商品导入
//!
//! add_product 与 update_product 共用同一流程：按 SKU 找到 Item 就稀疏更新名称、
//! 描述和单价，找不到就新建。新建撞名说明并发导入已先建好，重查后按更新处理。

use std::sync::Arc;

use tracing::info;

use super::SyncAction;
use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{Item, NewItem, Product, round_cents};

/// 导入结果
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub item: Item,
    pub action: SyncAction,
}

pub struct ProductImporter {
    client: Arc<dyn AccountingClient>,
}

impl ProductImporter {
    pub fn new(client: Arc<dyn AccountingClient>) -> Self {
        Self { client }
    }

    pub async fn import(&self, product: &Product) -> Result<ImportOutcome> {
        if let Some(existing) = self.client.find_item_by_sku(&product.sku).await? {
            return self.update_existing(existing, product).await;
        }

        let new_item = NewItem {
            sku: product.sku.clone(),
            description: product.item_description(),
            unit_price: round_cents(product.price),
        };

        match self.client.create_item(&new_item).await {
            Ok(item) => {
                info!(sku = %item.sku, id = %item.id, "商品已导入");
                Ok(ImportOutcome {
                    item,
                    action: SyncAction::Created,
                })
            }
            Err(SyncError::Conflict { .. }) => {
                let existing = self
                    .client
                    .find_item_by_sku(&product.sku)
                    .await?
                    .ok_or_else(|| SyncError::not_found("Item", &product.sku))?;
                self.update_existing(existing, product).await
            }
            Err(e) => Err(e),
        }
    }

    async fn update_existing(&self, existing: Item, product: &Product) -> Result<ImportOutcome> {
        let mut desired = existing.clone();
        desired.unit_price = round_cents(product.price);
        if let Some(description) = product.item_description() {
            desired.description = Some(description);
        }

        if desired == existing {
            return Ok(ImportOutcome {
                item: existing,
                action: SyncAction::Unchanged,
            });
        }

        let item = self.client.update_item(&desired).await?;
        info!(sku = %item.sku, id = %item.id, "商品已更新");
        Ok(ImportOutcome {
            item,
            action: SyncAction::Updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAccountingClient;
    use mockall::predicate::function;

    fn product(price: f64) -> Product {
        Product {
            sku: "test-abc".to_string(),
            name: Some("Test ABC".to_string()),
            price,
            ..Default::default()
        }
    }

    fn item(price: f64) -> Item {
        Item {
            id: "21".to_string(),
            sku: "test-abc".to_string(),
            description: Some("Test ABC".to_string()),
            unit_price: price,
            quantity_on_hand: None,
            sync_token: Some("0".to_string()),
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn test_import_creates_missing_item() {
        let mut client = MockAccountingClient::new();
        client.expect_find_item_by_sku().returning(|_| Ok(None));
        client
            .expect_create_item()
            .with(function(|n: &NewItem| n.unit_price == 14.99 && n.description.as_deref() == Some("Test ABC")))
            .times(1)
            .returning(|_| Ok(item(14.99)));

        let importer = ProductImporter::new(Arc::new(client));
        let outcome = importer.import(&product(14.99)).await.unwrap();
        assert_eq!(outcome.action, SyncAction::Created);
    }

    #[tokio::test]
    async fn test_import_updates_changed_price() {
        let mut client = MockAccountingClient::new();
        client
            .expect_find_item_by_sku()
            .returning(|_| Ok(Some(item(14.99))));
        client
            .expect_update_item()
            .with(function(|i: &Item| i.unit_price == 19.99 && i.id == "21"))
            .times(1)
            .returning(|i| Ok(i.clone()));
        client.expect_create_item().never();

        let importer = ProductImporter::new(Arc::new(client));
        let outcome = importer.import(&product(19.99)).await.unwrap();
        assert_eq!(outcome.action, SyncAction::Updated);
        assert_eq!(outcome.item.unit_price, 19.99);
    }

    #[tokio::test]
    async fn test_import_identical_product_is_unchanged() {
        let mut client = MockAccountingClient::new();
        client
            .expect_find_item_by_sku()
            .returning(|_| Ok(Some(item(14.99))));
        client.expect_update_item().never();

        let importer = ProductImporter::new(Arc::new(client));
        let outcome = importer.import(&product(14.99)).await.unwrap();
        assert_eq!(outcome.action, SyncAction::Unchanged);
    }
}
