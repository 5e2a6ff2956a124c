//! Session verification.
//!
//! Sessions are issued elsewhere; this service only verifies them. A session
//! is an HS256 JWT whose `role` claim decides what the caller may reach. It
//! is read from, in order: an `Authorization: Bearer` header, a `session`
//! cookie, or a `token` query parameter (EventSource cannot set headers).

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Role;
use crate::services::lifecycle::Actor;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: &str, role: &str, ttl: chrono::Duration) -> Self {
        Self {
            sub: sub.to_string(),
            role: role.to_string(),
            email: None,
            name: None,
            exp: (chrono::Utc::now() + ttl).timestamp(),
        }
    }
}

pub fn issue_token(secret: &str, claims: &Claims) -> anyhow::Result<String> {
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn decode_claims(secret: &str, token: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        AppError::Unauthorized
    })
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

pub fn session_token(parts: &Parts) -> Option<String> {
    bearer_token(&parts.headers)
        .or_else(|| cookie_value(&parts.headers, SESSION_COOKIE))
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.token)
                .filter(|t| !t.is_empty())
        })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

/// A verified caller.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Session {
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let role = Role::parse(&claims.role).ok_or(AppError::Unauthorized)?;
        Ok(Self {
            user_id: claims.sub,
            role,
            email: claims.email,
            name: claims.name,
        })
    }

    pub fn actor(&self) -> Actor<'_> {
        Actor {
            id: &self.user_id,
            role: self.role,
        }
    }

    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("{} access required", role.as_str())))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // The dashboard guard has already verified this request.
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let token = session_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = decode_claims(&state.config.session_secret, &token)?;
        let session = Session::from_claims(claims)?;
        touch_profile(state, &session)?;
        Ok(session)
    }
}

pub fn touch_profile(state: &AppState, session: &Session) -> Result<(), AppError> {
    let db = state.db()?;
    queries::ensure_profile(
        &db,
        &session.user_id,
        session.role,
        session.email.as_deref(),
        session.name.as_deref(),
    )?;
    Ok(())
}
