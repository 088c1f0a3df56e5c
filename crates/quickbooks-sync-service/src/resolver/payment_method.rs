//! 支付方式解析
//!
//! 本地名称的选取顺序：第一张信用卡的卡组织，其次第一条支付记录的支付方式名。
//! 选出的名称先经过配置的映射表（大小写不敏感），再到 QuickBooks 中按名称查找。

use std::sync::Arc;

use qbsync_shared::config::PaymentMethodNames;
use qbsync_shared::observability::metrics;
use tracing::info;

use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{EntityKind, NamedEntity, Order};

#[derive(Clone)]
pub struct PaymentMethodResolver {
    client: Arc<dyn AccountingClient>,
    names: PaymentMethodNames,
    allow_create: bool,
}

impl PaymentMethodResolver {
    pub fn new(
        client: Arc<dyn AccountingClient>,
        names: PaymentMethodNames,
        allow_create: bool,
    ) -> Self {
        Self {
            client,
            names,
            allow_create,
        }
    }

    /// 订单的本地支付方式名
    pub fn local_name(order: &Order) -> Option<String> {
        let brand = order
            .credit_cards
            .iter()
            .filter_map(|cc| cc.cc_type.as_deref())
            .map(str::trim)
            .find(|s| !s.is_empty());

        let method = || {
            order
                .payments
                .iter()
                .filter_map(|p| p.payment_method.as_deref())
                .map(str::trim)
                .find(|s| !s.is_empty())
        };

        brand.or_else(method).map(String::from)
    }

    /// 应用映射表后的 QuickBooks 名称
    pub fn accounting_name(&self, local_name: &str) -> String {
        self.names
            .lookup(local_name)
            .map(String::from)
            .unwrap_or_else(|| local_name.to_string())
    }

    pub async fn resolve(&self, local_name: &str) -> Result<NamedEntity> {
        let name = self.accounting_name(local_name);

        if let Some(found) = self
            .client
            .find_by_name(EntityKind::PaymentMethod, &name)
            .await?
        {
            metrics::record_entity_resolution("PaymentMethod", "found");
            return Ok(found);
        }

        if !self.allow_create {
            metrics::record_entity_resolution("PaymentMethod", "missing");
            return Err(SyncError::Resolution {
                entity: EntityKind::PaymentMethod.as_str().to_string(),
                name,
            });
        }

        match self.client.create_payment_method(&name).await {
            Ok(created) => {
                info!(name = %name, id = %created.id, "已在 QuickBooks 中创建支付方式");
                metrics::record_entity_resolution("PaymentMethod", "created");
                Ok(created)
            }
            Err(SyncError::Conflict { .. }) => {
                metrics::record_entity_resolution("PaymentMethod", "conflict_refetched");
                self.client
                    .find_by_name(EntityKind::PaymentMethod, &name)
                    .await?
                    .ok_or_else(|| SyncError::Resolution {
                        entity: EntityKind::PaymentMethod.as_str().to_string(),
                        name,
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// 订单既没有信用卡也没有支付记录时返回 None
    pub async fn resolve_for_order(&self, order: &Order) -> Result<Option<NamedEntity>> {
        match Self::local_name(order) {
            Some(name) => self.resolve(&name).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAccountingClient;
    use crate::models::{CreditCard, Payment};
    use mockall::predicate::eq;

    fn order_with(brand: Option<&str>, method: Option<&str>) -> Order {
        Order {
            id: "R1".to_string(),
            credit_cards: brand
                .map(|b| {
                    vec![CreditCard {
                        cc_type: Some(b.to_string()),
                        ..Default::default()
                    }]
                })
                .unwrap_or_default(),
            payments: method
                .map(|m| {
                    vec![Payment {
                        payment_method: Some(m.to_string()),
                        amount: 10.0,
                        ..Default::default()
                    }]
                })
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    fn entity(name: &str) -> NamedEntity {
        NamedEntity {
            kind: EntityKind::PaymentMethod,
            id: "7".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_credit_card_brand_preferred() {
        let order = order_with(Some("visa"), Some("Credit Card"));
        assert_eq!(PaymentMethodResolver::local_name(&order).as_deref(), Some("visa"));

        let order = order_with(Some("  "), Some("Check"));
        assert_eq!(PaymentMethodResolver::local_name(&order).as_deref(), Some("Check"));

        assert_eq!(PaymentMethodResolver::local_name(&order_with(None, None)), None);
    }

    #[tokio::test]
    async fn test_remapped_name_is_looked_up() {
        let mut client = MockAccountingClient::new();
        client
            .expect_find_by_name()
            .with(eq(EntityKind::PaymentMethod), eq("Discover"))
            .times(1)
            .returning(|_, name| Ok(Some(entity(name))));

        let resolver = PaymentMethodResolver::new(
            Arc::new(client),
            PaymentMethodNames::from_pairs([("visa", "Discover")]),
            false,
        );

        let order = order_with(Some("Visa"), Some("Credit Card"));
        let method = resolver.resolve_for_order(&order).await.unwrap().unwrap();
        assert_eq!(method.name, "Discover");
    }

    #[tokio::test]
    async fn test_missing_method_without_create_fails() {
        let mut client = MockAccountingClient::new();
        client.expect_find_by_name().returning(|_, _| Ok(None));
        client.expect_create_payment_method().never();

        let resolver =
            PaymentMethodResolver::new(Arc::new(client), PaymentMethodNames::default(), false);
        let err = resolver.resolve("master").await.unwrap_err();

        assert!(matches!(err, SyncError::Resolution { ref name, .. } if name == "master"));
    }

    #[tokio::test]
    async fn test_missing_method_created_when_allowed() {
        let mut client = MockAccountingClient::new();
        client.expect_find_by_name().returning(|_, _| Ok(None));
        client
            .expect_create_payment_method()
            .with(eq("master"))
            .times(1)
            .returning(|name| Ok(entity(name)));

        let resolver =
            PaymentMethodResolver::new(Arc::new(client), PaymentMethodNames::default(), true);
        let method = resolver.resolve("master").await.unwrap();
        assert_eq!(method.name, "master");
    }

    #[tokio::test]
    async fn test_order_without_payment_has_no_method() {
        let client = MockAccountingClient::new();
        let resolver =
            PaymentMethodResolver::new(Arc::new(client), PaymentMethodNames::default(), false);
        assert!(resolver
            .resolve_for_order(&order_with(None, None))
            .await
            .unwrap()
            .is_none());
    }
}
