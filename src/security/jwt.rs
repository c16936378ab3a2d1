use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::config::SecurityConfig;

/// Session token payload. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    ttl: Duration,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token error: {0}")]
    Token(String),
}

impl JwtManager {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            secret: config.session_secret.clone(),
            ttl: Duration::minutes(config.session_ttl_minutes),
        }
    }

    pub fn issue_session(&self, user_id: Uuid, name: &str) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id.to_string(),
            name: name.to_string(),
            exp: (now + self.ttl).unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JwtError::Token(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| JwtError::Token(e.to_string()))?;
        Ok(data.claims)
    }
}
