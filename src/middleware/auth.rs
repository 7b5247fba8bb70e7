use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::error::FarmChainResult;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

pub fn get_jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using insecure default!");
            "insecure-development-secret-key-replace-me-immediately".to_string()
        })
        .into_bytes()
}

const TOKEN_TTL_SECS: i64 = 60 * 60 * 24;

pub fn generate_token(user: &User) -> FarmChainResult<String> {
    let exp = (chrono::Utc::now() + chrono::Duration::seconds(TOKEN_TTL_SECS)).timestamp() as usize;
    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        role: user.role.clone(),
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&get_jwt_secret()),
    )?;
    Ok(token)
}

/// Routes that must stay reachable without a token: account creation,
/// sign-in, and the public traceability reads (scan by id, lookup by
/// farmer or distributor code).
fn is_public(path: &str) -> bool {
    path == "/"
        || path == "/auth/signup"
        || path == "/auth/signin"
        || path.starts_with("/crops/scan/")
        || path.starts_with("/crops/farmer/")
        || path.starts_with("/crops/distributor/")
}

/// Rejects owner-scoped requests before any record lookup happens; a
/// missing or invalid bearer token never reaches a handler.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    if is_public(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if !auth_header.starts_with("Bearer ") {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = &auth_header["Bearer ".len()..];

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(&get_jwt_secret()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(token_data.claims);

    Ok(next.run(request).await)
}
