//! PostgreSQL 交叉引用存储
//!
//! 主键 (doc_type, local_id) 保证每个单据至多一条引用，写入使用
//! `INSERT ... ON CONFLICT DO UPDATE`，单键的并发写由行锁串行化。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{CrossReferenceStore, XrefKey, ensure_complete};
use crate::error::Result;
use crate::models::RecordId;

#[derive(Debug, sqlx::FromRow)]
struct CrossReferenceRow {
    record_id: String,
    identifier_domain: String,
}

pub struct PgCrossReferenceStore {
    pool: PgPool,
}

impl PgCrossReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 建表（幂等），服务启动时调用
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cross_references (
                doc_type          VARCHAR(16)  NOT NULL,
                local_id          VARCHAR(128) NOT NULL,
                record_id         VARCHAR(64)  NOT NULL,
                identifier_domain VARCHAR(32)  NOT NULL,
                created_at        TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
                updated_at        TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
                PRIMARY KEY (doc_type, local_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CrossReferenceStore for PgCrossReferenceStore {
    async fn lookup(&self, key: &XrefKey) -> Result<Option<RecordId>> {
        let row = sqlx::query_as::<_, CrossReferenceRow>(
            r#"
            SELECT record_id, identifier_domain
            FROM cross_references
            WHERE doc_type = $1 AND local_id = $2
            "#,
        )
        .bind(key.doc_type.as_str())
        .bind(&key.local_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| RecordId::new(r.record_id, r.identifier_domain)))
    }

    async fn upsert(&self, key: &XrefKey, record: &RecordId) -> Result<()> {
        ensure_complete(key, record)?;

        sqlx::query(
            r#"
            INSERT INTO cross_references (doc_type, local_id, record_id, identifier_domain)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (doc_type, local_id) DO UPDATE
            SET record_id = EXCLUDED.record_id,
                identifier_domain = EXCLUDED.identifier_domain,
                updated_at = NOW()
            "#,
        )
        .bind(key.doc_type.as_str())
        .bind(&key.local_id)
        .bind(&record.id)
        .bind(&record.identifier_domain)
        .execute(&self.pool)
        .await?;

        debug!(key = %key, record = %record, "交叉引用已写入");
        Ok(())
    }
}
