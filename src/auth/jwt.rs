use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, Identity};
use super::repo_types::User;
use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    /// Signs a token embedding the user's id and current role.
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        self.issue_at(user, OffsetDateTime::now_utc())
    }

    fn issue_at(&self, user: &User, now: OffsetDateTime) -> Result<String, AppError> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("jwt encode: {e}")))?;
        debug!(user_id = %user.id, role = %user.role, "jwt signed");
        Ok(token)
    }

    /// Validates signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AppError::Unauthenticated("Invalid or expired token".into())
        })?;
        debug!(user_id = %data.claims.sub, role = %data.claims.role, "jwt verified");
        Ok(Identity::from(&data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use uuid::Uuid;

    fn keys_for(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
        })
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "irrelevant".into(),
            role,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn issue_and_verify_carries_identity() {
        let keys = keys_for("qr-secret", "qrmate", "qrmate-users");
        let u = user(Role::Admin);
        let token = keys.issue(&u).expect("issue");
        let identity = keys.verify(&token).expect("verify");
        assert_eq!(identity.user_id, u.id);
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let issuer = keys_for("shared", "qrmate", "qrmate-users");
        let stranger = keys_for("shared", "other-app", "other-users");
        let token = issuer.issue(&user(Role::User)).expect("issue");
        let err = stranger.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn verify_rejects_foreign_signature() {
        let keys = keys_for("secret-a", "iss", "aud");
        let other = keys_for("secret-b", "iss", "aud");
        let token = other.issue(&user(Role::User)).expect("issue");
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = keys_for("qr-secret", "iss", "aud");
        let long_ago = OffsetDateTime::now_utc() - TimeDuration::days(2);
        let token = keys.issue_at(&user(Role::User), long_ago).expect("issue");
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = keys_for("qr-secret", "iss", "aud");
        assert!(keys.verify("not.a.jwt").is_err());
        assert!(keys.verify("").is_err());
    }
}
