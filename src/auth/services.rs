use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    claims::Role,
    dto::{AuthResponse, LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_password_blocking},
    repo::UserRepo,
    repo_types::{NewUser, PublicUser},
};
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates an account and returns a token for it. The plaintext password is
/// dropped with the request once hashed.
pub async fn register(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    payload: RegisterRequest,
) -> AppResult<AuthResponse> {
    let RegisterRequest {
        username,
        email,
        password,
        role,
    } = payload;
    let username = username.trim().to_string();
    let email = normalize_email(&email);

    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let role = match role.as_deref().map(str::trim) {
        None | Some("") => Role::default(),
        Some(r) => r.parse::<Role>().map_err(AppError::Validation)?,
    };

    // fast path; the repository's unique guard settles races
    if users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password_blocking(password).await?;

    let user = users
        .create(NewUser {
            username,
            email,
            password_hash,
            role,
        })
        .await?;

    let token = keys.issue(&user)?;
    info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(AuthResponse {
        token,
        user: PublicUser::from(&user),
    })
}

/// Unknown email and wrong password fail identically.
pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    payload: LoginRequest,
) -> AppResult<AuthResponse> {
    let email = normalize_email(&payload.email);

    let Some(user) = users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = keys.issue(&user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        token,
        user: PublicUser::from(&user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::MemoryUserRepo;
    use crate::config::JwtConfig;

    fn keys() -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        })
    }

    fn alice() -> RegisterRequest {
        RegisterRequest {
            username: "alice".into(),
            email: "a@x.com".into(),
            password: "secret1".into(),
            role: None,
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no at sign.com"));
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[tokio::test]
    async fn register_hashes_password_and_defaults_role() {
        let repo = MemoryUserRepo::new();
        let keys = keys();
        let resp = register(&repo, &keys, alice()).await.expect("register");
        assert_eq!(resp.user.role, Role::User);

        let stored = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
        assert_eq!(keys.verify(&resp.token).unwrap().user_id, stored.id);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_case_insensitively() {
        let repo = MemoryUserRepo::new();
        let keys = keys();
        register(&repo, &keys, alice()).await.unwrap();
        let mut again = alice();
        again.email = "A@X.COM".into();
        let err = register(&repo, &keys, again).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let repo = MemoryUserRepo::new();
        let keys = keys();

        let mut bad_role = alice();
        bad_role.role = Some("superuser".into());
        assert!(matches!(
            register(&repo, &keys, bad_role).await,
            Err(AppError::Validation(_))
        ));

        let mut short = alice();
        short.password = "abc".into();
        assert!(matches!(
            register(&repo, &keys, short).await,
            Err(AppError::Validation(_))
        ));

        let mut nameless = alice();
        nameless.username = "   ".into();
        assert!(matches!(
            register(&repo, &keys, nameless).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn login_embeds_stored_role() {
        let repo = MemoryUserRepo::new();
        let keys = keys();
        let mut admin = alice();
        admin.role = Some("admin".into());
        register(&repo, &keys, admin).await.unwrap();

        let resp = login(
            &repo,
            &keys,
            LoginRequest {
                email: "a@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .expect("login");
        assert_eq!(keys.verify(&resp.token).unwrap().role, Role::Admin);
        assert_eq!(resp.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let repo = MemoryUserRepo::new();
        let keys = keys();
        register(&repo, &keys, alice()).await.unwrap();

        let wrong_password = login(
            &repo,
            &keys,
            LoginRequest {
                email: "a@x.com".into(),
                password: "nope-nope".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown_email = login(
            &repo,
            &keys,
            LoginRequest {
                email: "z@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }
}
