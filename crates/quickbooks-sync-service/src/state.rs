//! 应用状态
//!
//! 进程启动时一次性组装对账器、解析器和状态检查器，通过 Arc 在 handler 间共享。
//! 各组件本身不持有跨消息的可变状态。

use std::sync::Arc;

use qbsync_shared::config::QuickbooksConfig;

use crate::client::AccountingClient;
use crate::resolver::Resolvers;
use crate::service::{
    InventoryReader, OrderReconciler, ProductImporter, ReturnReconciler, StatusChecker,
};
use crate::xref::CrossReferenceStore;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderReconciler>,
    pub returns: Arc<ReturnReconciler>,
    pub products: Arc<ProductImporter>,
    pub inventory: Arc<InventoryReader>,
    pub status: Arc<StatusChecker>,
    pub xrefs: Arc<dyn CrossReferenceStore>,
}

impl AppState {
    pub fn new(
        client: Arc<dyn AccountingClient>,
        xrefs: Arc<dyn CrossReferenceStore>,
        config: QuickbooksConfig,
    ) -> Self {
        let config = Arc::new(config);
        let resolvers = Resolvers::new(client.clone(), &config);

        Self {
            orders: Arc::new(OrderReconciler::new(
                client.clone(),
                xrefs.clone(),
                resolvers.clone(),
                config.clone(),
            )),
            returns: Arc::new(ReturnReconciler::new(
                client.clone(),
                xrefs.clone(),
                resolvers,
                config.clone(),
            )),
            products: Arc::new(ProductImporter::new(client.clone())),
            inventory: Arc::new(InventoryReader::new(client.clone())),
            status: Arc::new(StatusChecker::new(client, config.status_base_url.clone())),
            xrefs,
        }
    }
}
