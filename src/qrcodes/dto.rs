use serde::{Deserialize, Serialize};

use super::repo_types::QrRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateQrRequest {
    pub title: Option<String>,
    pub content: String,
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedQrResponse {
    pub message: String,
    pub qr: QrRecord,
}
