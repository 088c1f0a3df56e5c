//! 端点层
//!
//! 每个操作一条 `POST /{operation}` 路由。操作集合由 [`Operation`] 枚举穷举，
//! 路由表从 `Operation::ALL` 生成，分发用穷举 match，新增操作漏接处理会编译失败。

mod response;
mod routes;

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::error::{Result, SyncError};
use crate::models::{
    ChangeSet, InventoryMessage, OrderMessage, ProductMessage, ReturnMessage, StatusCheckMessage,
};
use crate::service::{
    DEFAULT_RECHECK_INTERVAL, ReconcileOutcome, StatusCheckResult, StatusEvents, SyncAction,
};
use crate::state::AppState;
use crate::xref::XrefKey;

pub use response::{ErrorDetail, Failure, Reply, SyncResponse};
pub use routes::{router, sync_routes};

/// 返回给调用方的首次状态检查延迟参数
pub const STATUS_CHECK_DELAY_PARAM: &str = "quickbooks_status_check_delay";

/// 下一次库存轮询起点参数
pub const POLL_STOCK_TIMESTAMP_PARAM: &str = "quickbooks_poll_stock_timestamp";

/// 端点操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddOrder,
    UpdateOrder,
    CancelOrder,
    AddProduct,
    UpdateProduct,
    AddReturn,
    UpdateReturn,
    GetInventory,
    StatusCheck,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Self::AddOrder,
        Self::UpdateOrder,
        Self::CancelOrder,
        Self::AddProduct,
        Self::UpdateProduct,
        Self::AddReturn,
        Self::UpdateReturn,
        Self::GetInventory,
        Self::StatusCheck,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AddOrder => "add_order",
            Self::UpdateOrder => "update_order",
            Self::CancelOrder => "cancel_order",
            Self::AddProduct => "add_product",
            Self::UpdateProduct => "update_product",
            Self::AddReturn => "add_return",
            Self::UpdateReturn => "update_return",
            Self::GetInventory => "get_inventory",
            Self::StatusCheck => "status_check",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::AddOrder => "/add_order",
            Self::UpdateOrder => "/update_order",
            Self::CancelOrder => "/cancel_order",
            Self::AddProduct => "/add_product",
            Self::UpdateProduct => "/update_product",
            Self::AddReturn => "/add_return",
            Self::UpdateReturn => "/update_return",
            Self::GetInventory => "/get_inventory",
            Self::StatusCheck => "/status_check",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// 解析并校验消息
fn parse<T: DeserializeOwned + Validate>(body: Value) -> Result<T> {
    let message: T = serde_json::from_value(body)?;
    message.validate()?;
    Ok(message)
}

/// 分发一条消息
pub async fn dispatch(
    op: Operation,
    state: &AppState,
    request_id: &str,
    body: Value,
) -> Result<Reply> {
    match op {
        // 重放的 add_order 不带变更时保持幂等；update_order 不带变更时整单推送
        Operation::AddOrder => {
            reconcile_order(state, request_id, parse(body)?, ChangeSet::default()).await
        }
        Operation::UpdateOrder => {
            reconcile_order(state, request_id, parse(body)?, ChangeSet::all()).await
        }
        Operation::CancelOrder => cancel_order(state, request_id, parse(body)?).await,
        Operation::AddProduct | Operation::UpdateProduct => {
            import_product(state, request_id, parse(body)?).await
        }
        Operation::AddReturn | Operation::UpdateReturn => {
            reconcile_return(state, request_id, parse(body)?).await
        }
        Operation::GetInventory => get_inventory(state, request_id, parse(body)?).await,
        Operation::StatusCheck => status_check(state, request_id, parse(body)?).await,
    }
}

fn order_summary(order_id: &str, outcome: &ReconcileOutcome) -> String {
    let doc = outcome.receipt.doc_number.as_str();
    match outcome.action {
        SyncAction::Created => format!(
            "Created Quickbooks Sales Receipt {} for order {}",
            doc, order_id
        ),
        SyncAction::Updated => format!(
            "Updated Quickbooks Sales Receipt {} for order {}",
            doc, order_id
        ),
        SyncAction::Unchanged => format!(
            "Quickbooks Sales Receipt {} for order {} is already up to date",
            doc, order_id
        ),
        SyncAction::Voided => format!(
            "Voided Quickbooks Sales Receipt {} for order {}",
            doc, order_id
        ),
    }
}

/// 新建或更新后告诉调用方多久之后做首次状态检查
fn with_status_delay(response: SyncResponse, action: SyncAction) -> SyncResponse {
    match action {
        SyncAction::Created | SyncAction::Updated => {
            response.with_parameter(STATUS_CHECK_DELAY_PARAM, DEFAULT_RECHECK_INTERVAL.as_secs())
        }
        SyncAction::Unchanged | SyncAction::Voided => response,
    }
}

async fn reconcile_order(
    state: &AppState,
    request_id: &str,
    message: OrderMessage,
    missing_delta: ChangeSet,
) -> Result<Reply> {
    let changes = message.change_set_or(missing_delta);
    let outcome = state
        .orders
        .reconcile(&message.order, &changes, message.parameters.xref.as_ref())
        .await?;

    let response = SyncResponse::success(request_id, order_summary(&message.order.id, &outcome))
        .with_xref(outcome.xref.clone());
    Ok(Reply::Sync(with_status_delay(response, outcome.action)))
}

async fn cancel_order(state: &AppState, request_id: &str, message: OrderMessage) -> Result<Reply> {
    let outcome = state
        .orders
        .cancel(&message.order, message.parameters.xref.as_ref())
        .await?;

    Ok(Reply::Sync(
        SyncResponse::success(request_id, order_summary(&message.order.id, &outcome))
            .with_xref(outcome.xref),
    ))
}

async fn import_product(state: &AppState, request_id: &str, message: ProductMessage) -> Result<Reply> {
    let outcome = state.products.import(&message.product).await?;
    let verb = match outcome.action {
        SyncAction::Created => "Created",
        SyncAction::Unchanged => "Verified",
        SyncAction::Updated | SyncAction::Voided => "Updated",
    };

    Ok(Reply::Sync(SyncResponse::success(
        request_id,
        format!(
            "{} Quickbooks Item {} for product {}",
            verb, outcome.item.id, outcome.item.sku
        ),
    )))
}

async fn reconcile_return(state: &AppState, request_id: &str, message: ReturnMessage) -> Result<Reply> {
    let ret = &message.return_authorization;
    let outcome = state
        .returns
        .reconcile(ret, message.order.as_ref(), message.parameters.xref.as_ref())
        .await?;

    let verb = match outcome.action {
        SyncAction::Created => "Created",
        SyncAction::Unchanged => "Verified",
        SyncAction::Updated | SyncAction::Voided => "Updated",
    };
    let response = SyncResponse::success(
        request_id,
        format!(
            "{} Quickbooks Refund Receipt {} for return {}",
            verb, outcome.receipt.doc_number, ret.id
        ),
    )
    .with_xref(outcome.xref.clone());
    Ok(Reply::Sync(with_status_delay(response, outcome.action)))
}

async fn get_inventory(state: &AppState, request_id: &str, message: InventoryMessage) -> Result<Reply> {
    if let Some(sku) = message.sku.as_deref().filter(|s| !s.trim().is_empty()) {
        let levels = state.inventory.for_sku(sku).await?;
        let summary = format!("Retrieved inventory for {}", sku);
        return Ok(Reply::Sync(
            SyncResponse::success(request_id, summary).with_inventories(levels),
        ));
    }

    let snapshot = state
        .inventory
        .poll(message.parameters.quickbooks_poll_stock_timestamp)
        .await?;
    let mut response = SyncResponse::success(
        request_id,
        format!("Retrieved {} inventory levels", snapshot.levels.len()),
    )
    .with_inventories(snapshot.levels);
    if let Some(next) = snapshot.next_poll_timestamp {
        response = response.with_parameter(POLL_STOCK_TIMESTAMP_PARAM, next.to_rfc3339());
    }
    Ok(Reply::Sync(response))
}

async fn status_check(
    state: &AppState,
    request_id: &str,
    message: StatusCheckMessage,
) -> Result<Reply> {
    let message_id = if message.message_id.is_empty() {
        request_id
    } else {
        message.message_id.as_str()
    };

    let record = match (message.record(), message.order_id.as_deref()) {
        (Some(record), _) => record.clone(),
        (None, Some(order_id)) => match state.xrefs.lookup(&XrefKey::order(order_id)).await? {
            Some(record) => record,
            // 没有交叉引用等同于 QuickBooks 中找不到记录
            None => {
                return Ok(Reply::Status(StatusCheckResult::Failed {
                    message_id: message_id.to_string(),
                    events: StatusEvents {
                        code: 400,
                        message: None,
                    },
                }));
            }
        },
        (None, None) => {
            return Err(SyncError::Validation(
                "状态检查消息需要 xref 或 order_id".to_string(),
            ));
        }
    };

    Ok(Reply::Status(state.status.check(message_id, &record).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
            assert_eq!(op.path(), format!("/{}", op.name()));
        }
        assert_eq!(Operation::from_name("delete_order"), None);
    }

    #[test]
    fn test_status_delay_only_after_writes() {
        let created = with_status_delay(SyncResponse::success("r", "s"), SyncAction::Created);
        assert_eq!(created.parameters[STATUS_CHECK_DELAY_PARAM], 300);

        let unchanged = with_status_delay(SyncResponse::success("r", "s"), SyncAction::Unchanged);
        assert!(unchanged.parameters.is_empty());
    }
}
