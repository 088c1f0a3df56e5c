//! 同步服务错误类型
//!
//! 在共享库 QbError 基础上定义对账、实体解析和 QuickBooks 调用特有的错误变体。
//! 每个失败路径最终都会被端点层转换为带错误码的结构化结果，而不是让进程崩溃。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use qbsync_shared::error::QbError;
use serde_json::json;

/// 同步错误
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 按名称找不到 QuickBooks 实体，或本地单据没有交叉引用
    #[error("No {entity} '{name}' defined in Quickbooks")]
    NotFound { entity: String, name: String },

    /// 必需实体无法解析或创建（如支付方式映射缺失且不允许自动创建）
    #[error("无法解析 {entity}: {name}")]
    Resolution { entity: String, name: String },

    /// 以唯一名称创建实体时远端报重名
    #[error("实体已存在: {entity} '{name}'")]
    Conflict { entity: String, name: String },

    /// 网络层失败（连接拒绝、响应无法解析等）
    #[error("QuickBooks 通信失败: {0}")]
    Transport(String),

    /// QuickBooks 返回的业务错误
    #[error("QuickBooks 返回错误 (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// 入站消息格式错误或缺少必填字段
    #[error("消息校验失败: {0}")]
    Validation(String),

    #[error(transparent)]
    Shared(#[from] QbError),
}

/// 同步服务 Result 类型别名
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn not_found(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            name: name.into(),
        }
    }

    /// 错误码（用于出站结果的 errors[].code）
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Resolution { .. } => "RESOLUTION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Api { .. } => "QUICKBOOKS_API_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Shared(e) => e.code(),
        }
    }

    /// 是否值得由上游重投
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::Resolution { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Transport(_) | Self::Api { .. } => StatusCode::BAD_GATEWAY,
            Self::Shared(QbError::Validation(_) | QbError::InvalidArgument { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Shared(QbError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Shared(QbError::ExternalServiceTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Shared(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 对外展示的错误描述，系统级错误只返回通用提示
    pub fn public_message(&self) -> String {
        match self {
            Self::Shared(QbError::Database(e)) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Shared(QbError::Internal(e)) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.public_message();
        let body = json!({
            "summary": message,
            "errors": [{ "code": self.code(), "message": message }]
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for SyncError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON 解析失败: {}", err))
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::Shared(QbError::Database(err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Shared(QbError::ExternalServiceTimeout {
                service: "quickbooks".to_string(),
            })
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::not_found("Account", "Blaat");
        assert_eq!(err.to_string(), "No Account 'Blaat' defined in Quickbooks");

        let err = SyncError::Conflict {
            entity: "Item".to_string(),
            name: "test-abc".to_string(),
        };
        assert_eq!(err.to_string(), "实体已存在: Item 'test-abc'");

        let err = SyncError::Shared(QbError::Validation("缺少订单号".to_string()));
        assert_eq!(err.to_string(), "参数验证失败: 缺少订单号");
    }

    #[test]
    fn test_error_code_and_status() {
        let cases = vec![
            (SyncError::not_found("Customer", "x"), "NOT_FOUND", StatusCode::NOT_FOUND),
            (
                SyncError::Validation("bad".to_string()),
                "VALIDATION_ERROR",
                StatusCode::BAD_REQUEST,
            ),
            (
                SyncError::Transport("refused".to_string()),
                "TRANSPORT_ERROR",
                StatusCode::BAD_GATEWAY,
            ),
            (
                SyncError::Shared(QbError::Internal("boom".to_string())),
                "INTERNAL_ERROR",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(SyncError::Transport("reset".to_string()).is_retryable());
        assert!(
            SyncError::Api {
                status: 503,
                message: "maintenance".to_string()
            }
            .is_retryable()
        );
        assert!(
            !SyncError::Api {
                status: 400,
                message: "bad request".to_string()
            }
            .is_retryable()
        );
        assert!(!SyncError::not_found("Account", "Blaat").is_retryable());
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = SyncError::not_found("Account", "Blaat").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errors"][0]["code"], "NOT_FOUND");
        assert_eq!(
            body["summary"],
            "No Account 'Blaat' defined in Quickbooks"
        );
    }
}
