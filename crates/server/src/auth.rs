//! Bearer-token verification.
//!
//! Tokens are checked first against the service's own secret and then, when
//! configured, as Supabase access tokens. A token that fails both yields an
//! anonymous caller; authentication never rejects a request.

use std::str::FromStr;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use pathfinder_agent::Caller;
use pathfinder_core::config::AuthConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const SUPABASE_AUDIENCE: &str = "authenticated";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

struct Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Verifier {
    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(decode::<Claims>(token, &self.key, &self.validation)?.claims)
    }
}

pub struct TokenVerifier {
    own: Verifier,
    supabase: Option<Verifier>,
}

impl TokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(&config.jwt_algorithm)
            .map_err(|_| AuthError::UnsupportedAlgorithm(config.jwt_algorithm.clone()))?;
        let own = Verifier {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::new(algorithm),
        };

        let supabase = config.supabase_jwt_secret.as_ref().map(|secret| {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.set_audience(&[SUPABASE_AUDIENCE]);
            Verifier {
                key: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            }
        });

        Ok(Self { own, supabase })
    }

    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        match self.own.decode(token) {
            Ok(claims) => return Some(claims),
            Err(e) => debug!(error = %e, "token rejected by service secret"),
        }
        let supabase = self.supabase.as_ref()?;
        match supabase.decode(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "token rejected by supabase secret");
                None
            }
        }
    }

    /// The caller a token stands for; missing or invalid tokens are anonymous.
    pub fn caller(&self, token: Option<&str>) -> Caller {
        match token.filter(|t| !t.is_empty()).and_then(|t| self.verify_token(t)) {
            Some(claims) => Caller::authenticated(claims.sub, claims.email),
            None => Caller::anonymous(),
        }
    }

    pub fn caller_from_headers(&self, headers: &HeaderMap) -> Caller {
        self.caller(bearer_token(headers))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
