//! 实体存储
//!
//! 每种 QuickBooks 实体一张 DashMap 表，记录以 JSON 原样保存，和真实服务一样对未知字段宽容。

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// 单个实体类型的记录表，键为 Id
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    rows: Arc<DashMap<String, Value>>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, record: Value) {
        self.rows.insert(id.to_string(), record);
    }

    /// 返回记录的克隆，不持有锁
    pub fn get(&self, id: &str) -> Option<Value> {
        self.rows.get(id).map(|r| r.value().clone())
    }

    pub fn list_by<F>(&self, predicate: F) -> Vec<Value>
    where
        F: Fn(&Value) -> bool,
    {
        let mut rows: Vec<Value> = self
            .rows
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        // 按数字 Id 排序，查询结果稳定
        rows.sort_by_key(|row| {
            row.get("Id")
                .and_then(Value::as_str)
                .and_then(|id| id.parse::<u64>().ok())
                .unwrap_or_default()
        });
        rows
    }

    /// 在分片锁内修改记录，返回修改后的克隆
    pub fn modify<F, E>(&self, id: &str, f: F) -> Option<Result<Value, E>>
    where
        F: FnOnce(&mut Value) -> Result<(), E>,
    {
        self.rows.get_mut(id).map(|mut row| {
            f(row.value_mut())?;
            Ok(row.value().clone())
        })
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

/// 所有实体表
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    tables: Arc<DashMap<String, EntityTable>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取实体表，不存在时创建
    pub fn table(&self, entity: &str) -> EntityTable {
        self.tables
            .entry(entity.to_string())
            .or_default()
            .value()
            .clone()
    }
}
