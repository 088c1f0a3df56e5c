//! 科目解析
//!
//! 科目必须在 QuickBooks 中预先存在，不自动创建。

use std::sync::Arc;

use qbsync_shared::observability::metrics;

use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{EntityKind, NamedEntity};

#[derive(Clone)]
pub struct AccountResolver {
    client: Arc<dyn AccountingClient>,
}

impl AccountResolver {
    pub fn new(client: Arc<dyn AccountingClient>) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, name: &str) -> Result<NamedEntity> {
        match self.client.find_by_name(EntityKind::Account, name).await? {
            Some(account) => {
                metrics::record_entity_resolution("Account", "found");
                Ok(account)
            }
            None => {
                metrics::record_entity_resolution("Account", "missing");
                Err(SyncError::not_found(EntityKind::Account.as_str(), name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAccountingClient;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_resolve_existing_account() {
        let mut client = MockAccountingClient::new();
        client
            .expect_find_by_name()
            .with(eq(EntityKind::Account), eq("Undeposited Funds"))
            .times(1)
            .returning(|kind, name| {
                Ok(Some(NamedEntity {
                    kind,
                    id: "4".to_string(),
                    name: name.to_string(),
                }))
            });

        let resolver = AccountResolver::new(Arc::new(client));
        let account = resolver.resolve("Undeposited Funds").await.unwrap();
        assert_eq!(account.id, "4");
    }

    #[tokio::test]
    async fn test_missing_account_names_the_account() {
        let mut client = MockAccountingClient::new();
        client
            .expect_find_by_name()
            .returning(|_, _| Ok(None));

        let resolver = AccountResolver::new(Arc::new(client));
        let err = resolver.resolve("Blaat").await.unwrap_err();

        assert!(matches!(err, SyncError::NotFound { ref name, .. } if name == "Blaat"));
        assert_eq!(err.to_string(), "No Account 'Blaat' defined in Quickbooks");
    }
}
