//! 基于 DashMap 的内存交叉引用存储
//!
//! 用于本地开发和测试。DashMap 的 entry 在分片锁内完成写入，单键天然串行。

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CrossReferenceStore, XrefKey, ensure_complete};
use crate::error::Result;
use crate::models::RecordId;

#[derive(Clone, Default)]
pub struct MemoryCrossReferenceStore {
    data: Arc<DashMap<XrefKey, RecordId>>,
}

impl MemoryCrossReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl CrossReferenceStore for MemoryCrossReferenceStore {
    async fn lookup(&self, key: &XrefKey) -> Result<Option<RecordId>> {
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    async fn upsert(&self, key: &XrefKey, record: &RecordId) -> Result<()> {
        ensure_complete(key, record)?;
        self.data.insert(key.clone(), record.clone());
        Ok(())
    }
}
