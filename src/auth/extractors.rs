use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::{
    claims::{Identity, Role},
    jwt::JwtKeys,
};
use crate::error::AppError;

/// Validates the bearer token in `headers` and, when `allowed` is given,
/// checks the verified role against it. Pure: never touches a store.
pub fn gate(headers: &HeaderMap, keys: &JwtKeys, allowed: Option<&[Role]>) -> Result<Identity, AppError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("Not authorized, no token".into()))?;

    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization header".into()))?;

    let identity = keys.verify(token).map_err(|e| {
        warn!("invalid or expired token");
        e
    })?;
    permit(identity, allowed)
}

fn permit(identity: Identity, allowed: Option<&[Role]>) -> Result<Identity, AppError> {
    match allowed {
        Some(roles) if !roles.contains(&identity.role) => {
            warn!(user_id = %identity.user_id, role = %identity.role, "role not permitted");
            let message = match roles {
                [Role::Admin] => "Access denied, admin only.".to_string(),
                _ => format!("Access denied, role '{}' is not permitted.", identity.role),
            };
            Err(AppError::Forbidden(message))
        }
        _ => Ok(identity),
    }
}

/// Verifies once per request; later extractors reuse the identity from the
/// request extensions but still apply their own role set.
fn gate_parts<S>(parts: &mut Parts, state: &S, allowed: Option<&[Role]>) -> Result<Identity, AppError>
where
    JwtKeys: FromRef<S>,
{
    let identity = match parts.extensions.get::<Identity>().copied() {
        Some(id) => permit(id, allowed)?,
        None => {
            let keys = JwtKeys::from_ref(state);
            let id = gate(&parts.headers, &keys, None)?;
            parts.extensions.insert(id);
            permit(id, allowed)?
        }
    };
    Ok(identity)
}

/// Any authenticated caller.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        gate_parts(parts, state, None).map(AuthUser)
    }
}

/// Authenticated caller holding the admin role.
pub struct AdminUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        gate_parts(parts, state, Some(&[Role::Admin])).map(AdminUser)
    }
}
