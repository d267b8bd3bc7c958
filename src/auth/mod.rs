pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::types::Role;

pub use password::{hash_password, verify_password};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub sub: String,
    pub iss: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
}

impl Claims {
    pub fn new(user_id: i64, email: impl Into<String>, role: Role, issuer: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email: email.into(),
            role,
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
        }
    }
}

/// Refresh token claims. Only the identity travels; role and email are
/// re-read from the user record on exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: i64,
    pub sub: String,
    pub iss: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Access/refresh pair handed out by login, register and refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Signs and validates HS256 tokens. Access and refresh tokens use
/// independent keys, issuers and lifetimes.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    issuer: String,
    refresh_issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &SecurityConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.is_empty() || config.jwt_refresh_secret.is_empty() {
            return Err(AuthError::Crypto("JWT secret not configured".to_string()));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            issuer: config.issuer.clone(),
            refresh_issuer: format!("{}-refresh", config.issuer),
            access_ttl: Duration::hours(config.jwt_expiry_hours as i64),
            refresh_ttl: Duration::days(config.refresh_expiry_days as i64),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issue_access_token(&self, user_id: i64, email: &str, role: Role) -> Result<(String, i64), AuthError> {
        let claims = Claims::new(user_id, email, role, &self.issuer, self.access_ttl);
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT generation error: {e}")))?;
        Ok((token, claims.exp))
    }

    pub fn issue_refresh_token(&self, user_id: i64) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            user_id,
            sub: user_id.to_string(),
            iss: self.refresh_issuer.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + self.refresh_ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT generation error: {e}")))
    }

    pub fn issue_pair(&self, user_id: i64, email: &str, role: Role) -> Result<TokenPair, AuthError> {
        let (token, expires_at) = self.issue_access_token(user_id, email, role)?;
        let refresh_token = self.issue_refresh_token(user_id)?;
        Ok(TokenPair { token, refresh_token, expires_at })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Self::validation(&self.issuer);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let validation = Self::validation(&self.refresh_issuer);
        decode::<RefreshClaims>(token, &self.refresh_decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    fn validation(issuer: &str) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn service() -> TokenService {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "unit-test-secret".to_string();
        let config = config.validate().unwrap();
        TokenService::new(&config.security).unwrap()
    }

    #[test]
    fn access_token_round_trip() {
        let tokens = service();
        let (token, _) = tokens.issue_access_token(7, "ann@example.com", Role::Admin).unwrap();
        let claims = tokens.validate_access_token(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "ann@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "mini-crm-api");
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let mut claims = Claims::new(1, "a@b.c", Role::User, "mini-crm-api", Duration::hours(1));
        claims.iat -= 10;
        claims.nbf -= 10;
        claims.exp = Utc::now().timestamp() - 1;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();
        assert!(matches!(tokens.validate_access_token(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let tokens = service();
        let claims = Claims::new(1, "a@b.c", Role::User, "mini-crm-api", Duration::hours(1));
        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(b"other")).unwrap();
        assert!(matches!(tokens.validate_access_token(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let tokens = service();
        let refresh = tokens.issue_refresh_token(3).unwrap();
        assert!(tokens.validate_access_token(&refresh).is_err());
        assert_eq!(tokens.validate_refresh_token(&refresh).unwrap().user_id, 3);
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(matches!(service().validate_access_token("not.a.jwt"), Err(AuthError::InvalidToken(_))));
    }
}
