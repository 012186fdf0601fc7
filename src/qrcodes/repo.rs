use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{NewQrRecord, QrRecord};
use crate::error::AppResult;

/// Persistence for QR records. Listings are newest first; records created
/// at the same instant come back in reverse insertion order.
#[async_trait]
pub trait QrRepo: Send + Sync {
    async fn insert(&self, record: NewQrRecord) -> AppResult<QrRecord>;
    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<QrRecord>>;
    async fn list_all(&self) -> AppResult<Vec<QrRecord>>;
    async fn find(&self, id: Uuid) -> AppResult<Option<QrRecord>>;
    /// Returns false when nothing was deleted.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgQrRepo {
    db: PgPool,
}

impl PgQrRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QrRepo for PgQrRepo {
    async fn insert(&self, record: NewQrRecord) -> AppResult<QrRecord> {
        let row = sqlx::query_as::<_, QrRecord>(
            r#"
            INSERT INTO qr_codes (owner_id, title, content, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, title, content, image, created_at
            "#,
        )
        .bind(record.owner_id)
        .bind(record.title)
        .bind(record.content)
        .bind(record.image)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<QrRecord>> {
        let rows = sqlx::query_as::<_, QrRecord>(
            r#"
            SELECT id, owner_id, title, content, image, created_at
            FROM qr_codes
            WHERE owner_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_all(&self) -> AppResult<Vec<QrRecord>> {
        let rows = sqlx::query_as::<_, QrRecord>(
            r#"
            SELECT id, owner_id, title, content, image, created_at
            FROM qr_codes
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<QrRecord>> {
        let row = sqlx::query_as::<_, QrRecord>(
            r#"
            SELECT id, owner_id, title, content, image, created_at
            FROM qr_codes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM qr_codes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// Process-local store; vector order is insertion order.
#[derive(Default)]
pub struct MemoryQrRepo {
    records: RwLock<Vec<QrRecord>>,
}

impl MemoryQrRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first<'a>(it: impl DoubleEndedIterator<Item = &'a QrRecord>) -> Vec<QrRecord> {
        // reversed insertion order + stable sort keeps later inserts first on ties
        let mut out: Vec<QrRecord> = it.rev().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[async_trait]
impl QrRepo for MemoryQrRepo {
    async fn insert(&self, record: NewQrRecord) -> AppResult<QrRecord> {
        let row = QrRecord {
            id: Uuid::new_v4(),
            owner_id: record.owner_id,
            title: record.title,
            content: record.content,
            image: record.image,
            created_at: OffsetDateTime::now_utc(),
        };
        self.records.write().await.push(row.clone());
        Ok(row)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<QrRecord>> {
        let records = self.records.read().await;
        Ok(Self::newest_first(
            records.iter().filter(|r| r.owner_id == owner_id),
        ))
    }

    async fn list_all(&self) -> AppResult<Vec<QrRecord>> {
        let records = self.records.read().await;
        Ok(Self::newest_first(records.iter()))
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<QrRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}
