//! 实体解析器
//!
//! 把本地名称/属性解析为 QuickBooks 中的科目、支付方式、客户和商品，
//! 必要时创建缺失的实体。配置在构造时注入，解析过程不读取任何全局状态。

mod account;
mod customer;
mod item;
mod payment_method;

use std::sync::Arc;

use qbsync_shared::config::QuickbooksConfig;

use crate::client::AccountingClient;

pub use account::AccountResolver;
pub use customer::CustomerResolver;
pub use item::ItemResolver;
pub use payment_method::PaymentMethodResolver;

/// 一组共享同一个客户端的解析器
#[derive(Clone)]
pub struct Resolvers {
    pub account: AccountResolver,
    pub payment_method: PaymentMethodResolver,
    pub customer: CustomerResolver,
    pub item: ItemResolver,
}

impl Resolvers {
    pub fn new(client: Arc<dyn AccountingClient>, config: &QuickbooksConfig) -> Self {
        Self {
            account: AccountResolver::new(client.clone()),
            payment_method: PaymentMethodResolver::new(
                client.clone(),
                config.payment_method_names.clone(),
                config.create_missing_payment_methods,
            ),
            customer: CustomerResolver::new(client.clone(), config.web_orders_customer.clone()),
            item: ItemResolver::new(client),
        }
    }
}
