//! 路由配置模块
//!
//! 每个 [`Operation`] 对应一条 POST 路由，外加供外部调度器回调的状态查询路由。

use axum::{
    Json, Router,
    body::to_bytes,
    extract::{Path, Request, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use qbsync_shared::observability::middleware::{self as obs_middleware, RequestId};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{Failure, Operation, Reply, dispatch};
use crate::error::SyncError;
use crate::models::RecordId;
use crate::state::AppState;

/// 单条消息体上限
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// 构建同步操作路由
pub fn sync_routes() -> Router<AppState> {
    Operation::ALL
        .into_iter()
        .fold(Router::new(), |router, op| {
            router.route(
                op.path(),
                post(move |State(state): State<AppState>, request: Request| {
                    handle(op, state, request)
                }),
            )
        })
        .route("/status/{domain}/{id}", get(status_by_record))
}

/// 完整应用：路由 + 可观测性中间件
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(sync_routes())
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

/// 消息体里的 request_id / message_id，缺省时用请求头里的
fn request_id_of(body: &Value) -> Option<String> {
    ["request_id", "message_id"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|id| !id.is_empty())
        .map(String::from)
}

async fn handle(op: Operation, state: AppState, request: Request) -> Response {
    let header_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let body = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return Failure {
                request_id: header_id,
                error: SyncError::Validation(format!("读取请求体失败: {}", e)),
            }
            .into_response();
        }
    };
    let body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return Failure {
                request_id: header_id,
                error: e.into(),
            }
            .into_response();
        }
    };

    let request_id = request_id_of(&body).unwrap_or(header_id);
    info!(operation = op.name(), request_id = %request_id, "收到同步消息");

    match dispatch(op, &state, &request_id, body).await {
        Ok(reply) => reply.into_response(),
        Err(e) => {
            if e.status_code().is_server_error() {
                error!(operation = op.name(), request_id = %request_id, error = %e, "同步失败");
            } else {
                warn!(operation = op.name(), request_id = %request_id, error = %e, "同步被拒绝");
            }
            Failure {
                request_id,
                error: e,
            }
            .into_response()
        }
    }
}

/// 状态回调：`GET /status/{domain}/{id}`
async fn status_by_record(
    State(state): State<AppState>,
    Path((domain, id)): Path<(String, String)>,
) -> Response {
    let record = RecordId::new(id, domain);
    let message_id = uuid::Uuid::new_v4().to_string();

    match state.status.check(&message_id, &record).await {
        Ok(result) => Reply::Status(result).into_response(),
        Err(e) => Failure {
            request_id: message_id,
            error: e,
        }
        .into_response(),
    }
}

/// 存活探针
async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "quickbooks-sync-service"
    }))
}
