//! Bearer-token authentication for the HTTP API.
//!
//! Tokens are resolved against a static `user=token` table. The rest of the
//! crate only sees the resulting [`Identity`]; it never handles tokens.

use crate::error::DbError;
use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Who made a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(String),
    Anonymous,
}

impl Identity {
    pub fn user_id(&self) -> Option<String> {
        match self {
            Self::User(id) => Some(id.clone()),
            Self::Anonymous => None,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// (user id, token) pairs
    tokens: Vec<(String, String)>,
    require_auth: bool,
}

impl AuthConfig {
    /// Build from `user=token` pairs.
    pub fn from_pairs(pairs: &[String], require_auth: bool) -> Result<Self, String> {
        let mut tokens = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (user, token) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid auth token entry '{}': expected USER=TOKEN", mask_token(pair)))?;
            let (user, token) = (user.trim(), token.trim());
            if user.is_empty() || token.is_empty() {
                return Err("Empty user or token value in configuration".to_string());
            }
            if tokens.iter().any(|(_, t)| t == token) {
                return Err(format!("Token for '{user}' is already assigned to another user"));
            }
            tokens.push((user.to_string(), token.to_string()));
        }
        Ok(Self {
            tokens,
            require_auth,
        })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn requires_auth(&self) -> bool {
        self.require_auth
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Resolve a presented token to its user. Every configured token is
    /// compared so timing does not reveal which one matched.
    pub fn resolve(&self, provided: &str) -> Option<&str> {
        let mut found = None;
        for (user, expected) in &self.tokens {
            if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
                found = Some(user.as_str());
            }
        }
        found
    }
}

/// Resolve the caller's identity and attach it as a request extension.
///
/// No `Authorization` header means [`Identity::Anonymous`]. A malformed
/// header or an unknown token is rejected with 401.
pub async fn identify(
    State(auth_config): State<Arc<AuthConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = match extract_bearer_token(&request) {
        Ok(None) => Identity::Anonymous,
        Ok(Some(token)) => match auth_config.resolve(token) {
            Some(user) => Identity::User(user.to_string()),
            None => {
                warn!(token_prefix = %mask_token(token), "Authentication failed: invalid token");
                return DbError::unauthorized("Invalid Bearer token").into_response();
            }
        },
        Err(msg) => {
            warn!("Authentication failed: invalid header format");
            return DbError::unauthorized(msg).into_response();
        }
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Reject anonymous callers when the server requires authentication.
pub async fn require_user(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let anonymous = !matches!(
        request.extensions().get::<Identity>(),
        Some(Identity::User(_))
    );
    if auth_config.requires_auth() && anonymous {
        warn!(path = %request.uri().path(), "Authentication failed: missing Authorization header");
        return DbError::unauthorized("Missing Bearer token in Authorization header")
            .into_response();
    }
    next.run(request).await
}

fn extract_bearer_token(request: &Request<Body>) -> Result<Option<&str>, &'static str> {
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Authorization header contains invalid characters")?;

    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err("Invalid Authorization header format. Expected 'Bearer <token>'");
    };

    if token.is_empty() {
        return Err("Bearer token is empty");
    }

    Ok(Some(token))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn mask_token(token: &str) -> String {
    match token.char_indices().nth(3) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}
