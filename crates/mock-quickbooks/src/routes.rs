//! 模拟 QuickBooks REST 接口
//!
//! 路径与真实服务一致，均挂在 `/v3/company/{realm}` 下；
//! 另有 `/admin` 接口供测试推进同步状态、写入消息日志。

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::ledger::{Fault, Ledger, LoggedMessage, SyncFlag, canonical_entity};

/// 构建完整的模拟服务路由
pub fn app(ledger: Arc<Ledger>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(company_routes())
        .merge(admin_routes())
        .with_state(ledger)
}

/// QuickBooks 公司接口
///
/// 静态段 `query`、`messages` 优先于 `{entity}` 匹配
pub fn company_routes() -> Router<Arc<Ledger>> {
    Router::new()
        .route("/v3/company/{realm}/query", get(run_query))
        .route("/v3/company/{realm}/messages", get(list_messages))
        .route(
            "/v3/company/{realm}/syncstatus/{domain}/{id}",
            get(get_sync_status),
        )
        .route("/v3/company/{realm}/{entity}", post(write_entity))
        .route("/v3/company/{realm}/{entity}/{id}", get(read_entity))
}

/// 测试用管理接口
pub fn admin_routes() -> Router<Arc<Ledger>> {
    Router::new()
        .route("/admin/syncstatus/{id}", post(set_sync_status))
        .route("/admin/messages", post(push_message))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn fault_response(fault: Fault) -> Response {
    let status = if fault.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_REQUEST
    };
    warn!(code = %fault.code, detail = %fault.detail, "返回 Fault");
    (status, Json(fault.envelope())).into_response()
}

fn unknown_entity(entity: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "Fault": {
                "Error": [{
                    "Message": "Unsupported Operation",
                    "Detail": format!("不支持的实体: {}", entity),
                    "code": "500"
                }],
                "type": "ValidationFault"
            }
        })),
    )
        .into_response()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// 响应以实体名为键包裹记录
fn wrap(entity: &str, record: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(entity.to_string(), record);
    body.insert("time".to_string(), json!(timestamp()));
    Value::Object(body)
}

/// GET /v3/company/{realm}/query?query=...
async fn run_query(
    State(ledger): State<Arc<Ledger>>,
    Path(_realm): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let statement = params.get("query").map(String::as_str).unwrap_or_default();
    debug!(query = %statement, "执行查询");

    match ledger.query(statement) {
        Ok((entity, rows)) => {
            let mut result = serde_json::Map::new();
            if !rows.is_empty() {
                result.insert("startPosition".to_string(), json!(1));
                result.insert("maxResults".to_string(), json!(rows.len()));
                result.insert(entity, Value::Array(rows));
            }
            Json(json!({ "QueryResponse": result, "time": timestamp() })).into_response()
        }
        Err(fault) => fault_response(fault),
    }
}

#[derive(Debug, Deserialize)]
struct WriteParams {
    operation: Option<String>,
}

/// POST /v3/company/{realm}/{entity}
///
/// 请求体带 Id 时为更新，否则为创建；`?operation=void` 作废收据
async fn write_entity(
    State(ledger): State<Arc<Ledger>>,
    Path((_realm, entity)): Path<(String, String)>,
    Query(params): Query<WriteParams>,
    Json(body): Json<Value>,
) -> Response {
    let Some(entity) = canonical_entity(&entity) else {
        return unknown_entity(&entity);
    };

    let void = params
        .operation
        .as_deref()
        .is_some_and(|op| op.eq_ignore_ascii_case("void"));
    let has_id = body.get("Id").and_then(Value::as_str).is_some();

    let result = if has_id {
        ledger.update(entity, body, void)
    } else {
        ledger.create(entity, body)
    };

    match result {
        Ok(record) => Json(wrap(entity, record)).into_response(),
        Err(fault) => fault_response(fault),
    }
}

/// GET /v3/company/{realm}/{entity}/{id}
async fn read_entity(
    State(ledger): State<Arc<Ledger>>,
    Path((_realm, entity, id)): Path<(String, String, String)>,
) -> Response {
    let Some(entity) = canonical_entity(&entity) else {
        return unknown_entity(&entity);
    };

    match ledger.get(entity, &id) {
        Ok(record) => Json(wrap(entity, record)).into_response(),
        Err(fault) => fault_response(fault),
    }
}

/// GET /v3/company/{realm}/syncstatus/{domain}/{id}
async fn get_sync_status(
    State(ledger): State<Arc<Ledger>>,
    Path((_realm, domain, id)): Path<(String, String, String)>,
) -> Response {
    match ledger.sync_status(&domain, &id) {
        Some(status) => Json(json!({ "SyncStatus": status, "time": timestamp() })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /v3/company/{realm}/messages
async fn list_messages(
    State(ledger): State<Arc<Ledger>>,
    Path(_realm): Path<String>,
) -> Json<Value> {
    Json(json!({ "Messages": ledger.messages().await, "time": timestamp() }))
}

#[derive(Debug, Deserialize)]
struct SetSyncStatusRequest {
    synchronized: String,
}

/// POST /admin/syncstatus/{id}
async fn set_sync_status(
    State(ledger): State<Arc<Ledger>>,
    Path(id): Path<String>,
    Json(request): Json<SetSyncStatusRequest>,
) -> StatusCode {
    let Some(flag) = SyncFlag::parse(&request.synchronized) else {
        return StatusCode::BAD_REQUEST;
    };
    if ledger.set_sync_flag(&id, flag) {
        info!(id = %id, status = flag.as_str(), "同步状态已更新");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Deserialize)]
struct PushMessageRequest {
    #[serde(default = "default_object_type")]
    object_type: String,
    object_id: String,
    description: String,
}

fn default_object_type() -> String {
    "SalesReceipt".to_string()
}

/// POST /admin/messages
async fn push_message(
    State(ledger): State<Arc<Ledger>>,
    Json(request): Json<PushMessageRequest>,
) -> StatusCode {
    info!(object_id = %request.object_id, "写入消息日志");
    ledger
        .push_message(LoggedMessage {
            object_type: request.object_type,
            object_id: request.object_id,
            description: request.description,
        })
        .await;
    StatusCode::CREATED
}
