use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A saved QR code. Ownership is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QrRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    /// Self-contained image, normally a `data:image/png;base64,...` URI.
    pub image: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Validated insert payload.
#[derive(Debug, Clone)]
pub struct NewQrRecord {
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub image: String,
}
