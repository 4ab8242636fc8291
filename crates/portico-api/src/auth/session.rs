//! Session verification.
//!
//! The dashboard trusts an upstream auth provider that issues HS256 JWTs. The token is
//! read from the session cookie, or from `Authorization: Bearer` when the bearer value
//! is not an API key. Any failure means "no session".

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use portico_core::access::api_key::looks_like_api_key;
use portico_core::models::{GlobalRole, SessionUser, UserId};
use serde::{Deserialize, Serialize};

use crate::utils::cookies::cookie_value;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Identity of the caller, or `None` when there is no valid session.
    async fn get_session(&self, headers: &HeaderMap) -> Option<SessionUser>;
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_role: Option<GlobalRole>,
    pub exp: i64,
    pub iat: i64,
}

impl From<JwtClaims> for SessionUser {
    fn from(claims: JwtClaims) -> Self {
        SessionUser {
            id: UserId::from(claims.sub),
            email: claims.email,
            name: claims.name,
            global_role: claims.global_role,
        }
    }
}

pub struct JwtSessionProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    cookie_name: String,
}

impl JwtSessionProvider {
    pub fn new(secret: &str, cookie_name: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Sign a session token for `user`. Used by local tooling and tests; production
    /// tokens come from the auth provider.
    pub fn issue_token(
        &self,
        user: &SessionUser,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            global_role: user.global_role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(token) = cookie_value(headers, &self.cookie_name) {
            return Some(token);
        }
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty() && !looks_like_api_key(token))
            .map(String::from)
    }
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn get_session(&self, headers: &HeaderMap) -> Option<SessionUser> {
        let token = self.token_from_headers(headers)?;
        match decode::<JwtClaims>(&token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Session token rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use portico_core::test_helpers::session_user;

    const SECRET: &str = "test-secret-key-min-32-characters-long";

    fn provider() -> JwtSessionProvider {
        JwtSessionProvider::new(SECRET, "portico_session")
    }

    #[tokio::test]
    async fn test_session_from_cookie() {
        let provider = provider();
        let user = session_user("user_1", "dev@example.com");
        let token = provider.issue_token(&user, Duration::hours(1)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("portico_session={}", token)).unwrap(),
        );

        assert_eq!(provider.get_session(&headers).await, Some(user));
    }

    #[tokio::test]
    async fn test_session_from_bearer() {
        let provider = provider();
        let user = session_user("user_1", "dev@example.com");
        let token = provider.issue_token(&user, Duration::hours(1)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        assert_eq!(provider.get_session(&headers).await.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_api_key_bearer_is_not_a_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer pt_live_0123456789abcdef"),
        );
        assert_eq!(provider().get_session(&headers).await, None);
    }

    #[tokio::test]
    async fn test_invalid_tokens_mean_no_session() {
        let other =
            JwtSessionProvider::new("another-secret-key-with-32-characters!", "portico_session");
        let user = session_user("user_1", "dev@example.com");
        let forged = other.issue_token(&user, Duration::hours(1)).unwrap();
        let expired = provider().issue_token(&user, Duration::hours(-2)).unwrap();

        for token in [forged, expired, "garbage".to_string()] {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
            assert_eq!(provider().get_session(&headers).await, None);
        }
    }
}
