use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateQrRequest, CreatedQrResponse},
    repo_types::QrRecord,
    services,
};
use crate::{
    auth::{
        dto::MessageResponse,
        extractors::{AdminUser, AuthUser},
    },
    error::{AppError, AppResult, JsonBody},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/qrcodes", get(list_own))
        .route("/qrcodes/all", get(list_all))
}

/// Image payloads are inline data URIs, so writes get their own body limit.
pub fn write_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/qrcodes", post(create_qr))
        .route("/qrcodes/:id", delete(delete_qr))
        .layer(DefaultBodyLimit::max(body_limit))
}

#[instrument(skip(state, body))]
pub async fn create_qr(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<CreateQrRequest>,
) -> AppResult<(StatusCode, Json<CreatedQrResponse>)> {
    let qr = services::create(state.qrcodes.as_ref(), identity, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedQrResponse {
            message: "QR Code saved successfully!".into(),
            qr,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_own(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<Vec<QrRecord>>> {
    Ok(Json(services::list_own(state.qrcodes.as_ref(), identity).await?))
}

#[instrument(skip(state))]
pub async fn list_all(
    State(state): State<AppState>,
    AdminUser(identity): AdminUser,
) -> AppResult<Json<Vec<QrRecord>>> {
    Ok(Json(services::list_all(state.qrcodes.as_ref(), identity.role).await?))
}

#[instrument(skip(state))]
pub async fn delete_qr(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    // an unparseable id cannot name an existing record
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound("QR Code not found.".into()))?;
    services::delete(state.qrcodes.as_ref(), identity, id).await?;
    Ok(Json(MessageResponse::new("QR Code deleted successfully.")))
}
