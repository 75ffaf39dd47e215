//! Bearer-token identity extraction.
//!
//! Authentication itself lives with the identity provider; this service only
//! verifies the HS256 session token and reads the user id out of the `sub`
//! claim. WebSocket clients cannot set headers, so a `token` query parameter
//! is accepted as a fallback.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub uid: String,
}

/// Verify a session token and return the user id it names.
pub fn decode_uid(token: &str, secret: &str) -> AppResult<String> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated)?;
    Ok(data.claims.sub)
}

/// Mint a session token. Used by local tooling and the test suite; in
/// production tokens come from the identity provider.
pub fn issue_token(uid: &str, secret: &str, ttl_secs: u64) -> AppResult<String> {
    let exp = chrono::Utc::now().timestamp() as usize + ttl_secs as usize;
    let claims = Claims {
        sub: uid.to_owned(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Unauthenticated)
}

fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(header) = req.headers().get("Authorization") {
        if let Ok(value) = header.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_owned());
            }
        }
    }
    req.query_string()
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .map(str::to_owned)
}

fn authenticate(req: &HttpRequest) -> Result<AuthedUser, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or(AppError::Unauthenticated)?;
    let token = token_from_request(req).ok_or(AppError::Unauthenticated)?;
    let uid = decode_uid(&token, &state.settings.auth.jwt_secret)?;
    Ok(AuthedUser { uid })
}

impl FromRequest for AuthedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}
