//! 交叉引用存储
//!
//! 本地单据号 -> QuickBooks 记录 {id, identifier_domain} 的持久映射，是"新建还是更新"
//! 判断的唯一依据。
//!
//! 并发约定：同一单据号的"查询后写入"必须由存储（或其前面的投递基础设施）串行化，
//! 本服务不做进程内加锁。同一订单的两条消息并发首次对账时，后提交的一方会在
//! 按单据号重查收据时看到先提交的记录。

mod memory;
mod postgres;

use std::fmt;

use async_trait::async_trait;
use qbsync_shared::error::QbError;

use crate::error::Result;
use crate::models::RecordId;

pub use memory::MemoryCrossReferenceStore;
pub use postgres::PgCrossReferenceStore;

/// 单据类型，作为键的命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Order,
    Return,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Return => "return",
        }
    }
}

/// 交叉引用键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XrefKey {
    pub doc_type: DocumentType,
    pub local_id: String,
}

impl XrefKey {
    pub fn order(local_id: impl Into<String>) -> Self {
        Self {
            doc_type: DocumentType::Order,
            local_id: local_id.into(),
        }
    }

    pub fn ret(local_id: impl Into<String>) -> Self {
        Self {
            doc_type: DocumentType::Return,
            local_id: local_id.into(),
        }
    }
}

impl fmt::Display for XrefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.doc_type.as_str(), self.local_id)
    }
}

/// 交叉引用存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CrossReferenceStore: Send + Sync {
    async fn lookup(&self, key: &XrefKey) -> Result<Option<RecordId>>;

    /// 写入或更新引用；空 id 或空标识域会被拒绝，已有引用不会被空值覆盖
    async fn upsert(&self, key: &XrefKey, record: &RecordId) -> Result<()>;
}

/// upsert 前的公共校验
pub(crate) fn ensure_complete(key: &XrefKey, record: &RecordId) -> Result<()> {
    if key.local_id.trim().is_empty() {
        return Err(QbError::InvalidArgument {
            field: "local_id".to_string(),
            message: "单据号不能为空".to_string(),
        }
        .into());
    }
    if !record.is_complete() {
        return Err(QbError::InvalidArgument {
            field: "xref".to_string(),
            message: format!("{} 的交叉引用缺少 id 或标识域", key),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespaces() {
        assert_ne!(XrefKey::order("R1"), XrefKey::ret("R1"));
        assert_eq!(XrefKey::order("R1").to_string(), "order:R1");
    }

    #[test]
    fn test_ensure_complete_rejects_empty() {
        let key = XrefKey::order("R1");
        assert!(ensure_complete(&key, &RecordId::new("45", "QBO")).is_ok());
        assert!(ensure_complete(&key, &RecordId::new("", "QBO")).is_err());
        assert!(ensure_complete(&key, &RecordId::new("45", "")).is_err());
        assert!(ensure_complete(&XrefKey::order(" "), &RecordId::new("45", "QBO")).is_err());
    }
}
