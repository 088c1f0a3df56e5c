//! 客户解析
//!
//! - 配置了 web_orders_customer 时，所有订单都记到这个预先存在的客户名下
//! - 否则按账单地址的 "名 姓" 查找，找不到则用账单/收货地址创建；创建时撞名则重查

use std::sync::Arc;

use qbsync_shared::observability::metrics;
use tracing::info;

use crate::client::AccountingClient;
use crate::error::{Result, SyncError};
use crate::models::{Address, EntityKind, NamedEntity, NewCustomer, Order, PostalAddress};

#[derive(Clone)]
pub struct CustomerResolver {
    client: Arc<dyn AccountingClient>,
    web_orders_customer: Option<String>,
}

impl CustomerResolver {
    pub fn new(client: Arc<dyn AccountingClient>, web_orders_customer: Option<String>) -> Self {
        Self {
            client,
            web_orders_customer: web_orders_customer.filter(|name| !name.trim().is_empty()),
        }
    }

    pub async fn resolve(&self, name: &str) -> Result<NamedEntity> {
        match self.client.find_by_name(EntityKind::Customer, name).await? {
            Some(customer) => {
                metrics::record_entity_resolution("Customer", "found");
                Ok(customer)
            }
            None => {
                metrics::record_entity_resolution("Customer", "missing");
                Err(SyncError::not_found(EntityKind::Customer.as_str(), name))
            }
        }
    }

    pub async fn resolve_or_create(&self, customer: &NewCustomer) -> Result<NamedEntity> {
        if let Some(found) = self
            .client
            .find_by_name(EntityKind::Customer, &customer.display_name)
            .await?
        {
            metrics::record_entity_resolution("Customer", "found");
            return Ok(found);
        }

        match self.client.create_customer(customer).await {
            Ok(created) => {
                info!(name = %created.name, id = %created.id, "已在 QuickBooks 中创建客户");
                metrics::record_entity_resolution("Customer", "created");
                Ok(created)
            }
            Err(SyncError::Conflict { .. }) => {
                metrics::record_entity_resolution("Customer", "conflict_refetched");
                self.resolve(&customer.display_name).await
            }
            Err(e) => Err(e),
        }
    }

    /// 订单对应的客户
    pub async fn resolve_for_order(&self, order: &Order) -> Result<NamedEntity> {
        if let Some(name) = &self.web_orders_customer {
            return self.resolve(name).await;
        }

        let customer = Self::new_customer(order).ok_or_else(|| {
            SyncError::Validation(format!("订单 {} 缺少账单姓名，无法确定客户", order.id))
        })?;
        self.resolve_or_create(&customer).await
    }

    /// 没有订单信息时使用的客户
    pub async fn resolve_default(&self) -> Result<NamedEntity> {
        match &self.web_orders_customer {
            Some(name) => self.resolve(name).await,
            None => Err(SyncError::Validation(
                "缺少原订单且未配置 web_orders_customer，无法确定客户".to_string(),
            )),
        }
    }

    /// 由订单地址构造新客户
    pub fn new_customer(order: &Order) -> Option<NewCustomer> {
        let billing = order.billing_address.as_ref()?;
        let display_name = billing.full_name()?;

        Some(NewCustomer {
            display_name,
            given_name: billing.firstname.clone(),
            family_name: billing.lastname.clone(),
            email: order.email.clone(),
            phone: billing.phone.clone(),
            billing_address: Some(postal_address(billing)),
            shipping_address: order.shipping_address.as_ref().map(postal_address),
        })
    }
}

fn postal_address(address: &Address) -> PostalAddress {
    PostalAddress {
        line1: address.address1.clone(),
        line2: address.address2.clone(),
        city: address.city.clone(),
        region: address.state.clone(),
        postal_code: address.zipcode.clone(),
        country: address.country.clone(),
    }
}
