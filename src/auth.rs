//! Authentication boundary. The core only needs to know whether a principal
//! is present and who it is; the provider behind [`AuthProvider`] is opaque.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub principal: Principal,
}

/// Shared session slot. Readers resolve the principal on every call so a
/// sign-out is observed by the next request.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<RwLock<Option<Session>>>);

impl SessionHandle {
    pub fn current(&self) -> Option<Session> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.current().map(|session| session.principal)
    }

    pub fn set(&self, session: Session) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn clear(&self) -> Option<Session> {
        self.0.write().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("auth provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    /// `None` when the provider wants the address confirmed before issuing a
    /// session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError>;

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;

    /// Where to send the browser for an OAuth sign-in.
    fn oauth_url(&self, provider: &str) -> String;
}

/// Client for the hosted auth REST endpoints (`/auth/v1/...`).
#[derive(Debug, Clone)]
pub struct GoTrueAuth {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<UserPayload> for Principal {
    fn from(user: UserPayload) -> Self {
        let UserMetadata {
            full_name,
            name,
            avatar_url,
        } = user.user_metadata;
        Principal {
            id: user.id,
            email: user.email,
            display_name: full_name.or(name),
            avatar_url,
        }
    }
}

impl TokenResponse {
    fn into_session(self) -> Option<Session> {
        Some(Session {
            access_token: self.access_token?,
            principal: self.user?.into(),
        })
    }
}

impl GoTrueAuth {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(self.url(path))
            .header("apikey", &self.api_key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthError::InvalidCredentials)
            }
            _ => Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.post_credentials("/token?grant_type=password", email, password)
            .await?
            .into_session()
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        Ok(self
            .post_credentials("/signup", email, password)
            .await?
            .into_session())
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("/logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AuthError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }

    fn oauth_url(&self, provider: &str) -> String {
        self.url(&format!("/authorize?provider={provider}"))
    }
}
