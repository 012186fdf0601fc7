//! HTTP client for the QR API.
//!
//! Credentials are never ambient: every authenticated call takes the
//! [`Session`] returned by `register` or `login`. Dropping a call's future
//! aborts the request; [`until_cancelled`] wraps that for superseded fetches.

use std::future::Future;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::auth::{
    dto::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest},
    repo_types::PublicUser,
    Role,
};
use crate::qrcodes::{
    dto::{CreateQrRequest, CreatedQrResponse},
    repo_types::QrRecord,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// The UI should send the user back to the login flow.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::Unauthenticated(_))
    }
}

/// Credential context threaded through authenticated calls.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

impl From<AuthResponse> for Session {
    fn from(r: AuthResponse) -> Self {
        Self {
            token: r.token,
            user: r.user,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// `base` is the server root, e.g. `http://localhost:5001/`.
    pub fn new(base: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    fn request(&self, method: Method, path: &str, session: Option<&Session>) -> Result<RequestBuilder, ClientError> {
        let url = self.base.join(path)?;
        debug!(%method, %url, "api request");
        let builder = self.http.request(method, url);
        Ok(match session {
            Some(s) => builder.bearer_auth(&s.token),
            None => builder,
        })
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<Session, ClientError> {
        let body = RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: role.map(|r| r.as_str().to_string()),
        };
        let resp = self
            .request(Method::POST, "api/auth/register", None)?
            .json(&body)
            .send()
            .await?;
        read_json::<AuthResponse>(resp).await.map(Session::from)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let body = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        let resp = self
            .request(Method::POST, "api/auth/login", None)?
            .json(&body)
            .send()
            .await?;
        read_json::<AuthResponse>(resp).await.map(Session::from)
    }

    pub async fn me(&self, session: &Session) -> Result<PublicUser, ClientError> {
        let resp = self.request(Method::GET, "api/auth/me", Some(session))?.send().await?;
        read_json(resp).await
    }

    pub async fn create_qr(&self, session: &Session, req: &CreateQrRequest) -> Result<QrRecord, ClientError> {
        let resp = self
            .request(Method::POST, "api/qrcodes", Some(session))?
            .json(req)
            .send()
            .await?;
        read_json::<CreatedQrResponse>(resp).await.map(|r| r.qr)
    }

    pub async fn list_own(&self, session: &Session) -> Result<Vec<QrRecord>, ClientError> {
        let resp = self.request(Method::GET, "api/qrcodes", Some(session))?.send().await?;
        read_json(resp).await
    }

    pub async fn list_all(&self, session: &Session) -> Result<Vec<QrRecord>, ClientError> {
        let resp = self.request(Method::GET, "api/qrcodes/all", Some(session))?.send().await?;
        read_json(resp).await
    }

    pub async fn delete_qr(&self, session: &Session, id: Uuid) -> Result<String, ClientError> {
        let resp = self
            .request(Method::DELETE, &format!("api/qrcodes/{id}"), Some(session))?
            .send()
            .await?;
        read_json::<MessageResponse>(resp).await.map(|m| m.message)
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }
    let message = resp
        .json::<MessageResponse>()
        .await
        .map(|m| m.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthenticated(message),
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        other => ClientError::Rejected {
            status: other.as_u16(),
            message,
        },
    })
}

/// Runs `fut` unless `token` fires first. A cancelled call yields `None`
/// rather than an error.
pub async fn until_cancelled<F, T>(token: &CancellationToken, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        _ = token.cancelled() => {
            debug!("request superseded");
            None
        }
        out = fut => Some(out),
    }
}
