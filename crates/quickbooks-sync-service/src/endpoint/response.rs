//! 出站结果
//!
//! 成功：`{request_id, summary, xref?, inventories?, parameters?}`，HTTP 200
//! 失败：`{request_id, summary, errors: [{code, message}]}`，HTTP 4xx/5xx

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::models::{InventoryLevel, RecordId};
use crate::service::StatusCheckResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// 同步结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub request_id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xref: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventories: Option<Vec<InventoryLevel>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

impl SyncResponse {
    pub fn success(request_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn with_xref(mut self, xref: RecordId) -> Self {
        self.xref = Some(xref);
        self
    }

    pub fn with_inventories(mut self, inventories: Vec<InventoryLevel>) -> Self {
        self.inventories = Some(inventories);
        self
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// 端点返回值
#[derive(Debug)]
pub enum Reply {
    Sync(SyncResponse),
    Status(StatusCheckResult),
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Sync(body) => (StatusCode::OK, Json(body)).into_response(),
            Self::Status(body) => (StatusCode::OK, Json(body)).into_response(),
        }
    }
}

/// 带 request_id 的失败结果
#[derive(Debug)]
pub struct Failure {
    pub request_id: String,
    pub error: SyncError,
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let message = self.error.public_message();
        let body = SyncResponse {
            request_id: self.request_id,
            summary: message.clone(),
            errors: vec![ErrorDetail {
                code: self.error.code().to_string(),
                message,
            }],
            ..Default::default()
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_body_omits_empty_fields() {
        let body = SyncResponse::success("r1", "ok").with_xref(RecordId::new("45", "QBO"));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "request_id": "r1",
                "summary": "ok",
                "xref": { "id": "45", "identifier_domain": "QBO" }
            })
        );
    }

    #[test]
    fn test_inventory_body_keeps_empty_list() {
        let body = SyncResponse::success("r1", "ok").with_inventories(vec![]);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["inventories"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_failure_status_and_body() {
        let response = Failure {
            request_id: "r1".to_string(),
            error: SyncError::not_found("Account", "Blaat"),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: SyncResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.request_id, "r1");
        assert_eq!(body.errors[0].code, "NOT_FOUND");
    }
}
