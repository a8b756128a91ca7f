//! JWT minting for the authenticated Engine port.
//!
//! Tokens carry only an `iat` claim, signed HS256 with the 32-byte secret
//! shared with the execution client. ELs reject tokens whose `iat` drifts
//! more than a few seconds from their clock, so a token is minted fresh for
//! every request rather than cached.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: u64,
}

/// Provides JWT tokens for authenticating with the Engine API.
pub struct JwtProvider {
    key: EncodingKey,
    jwt_id: Option<String>,
}

impl JwtProvider {
    pub fn new(secret: [u8; 32], jwt_id: Option<String>) -> Self {
        Self { key: EncodingKey::from_secret(&secret), jwt_id }
    }

    /// Mints a token with `iat` = now.
    pub fn token(&self) -> Result<String, EngineError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| EngineError::Jwt(e.to_string()))?
            .as_secs();

        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.jwt_id.clone();

        jsonwebtoken::encode(&header, &Claims { iat }, &self.key)
            .map_err(|e| EngineError::Jwt(e.to_string()))
    }
}
