use axum::extract::{Json, State};
use bcrypt::{hash, verify, DEFAULT_COST};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::custody::Role;
use crate::db::{self, DbPool};
use crate::error::{FarmChainError, FarmChainResult};
use crate::middleware::auth::generate_token;
use crate::state::AppState;

/// Random sampling of the 3-digit code space is bounded; when the budget
/// runs out the partition is treated as exhausted instead of spinning.
const MAX_CODE_ATTEMPTS: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub location: Option<String>,
    pub role: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub id: i32,
    pub email: String,
    pub name: String,
    pub location: Option<String>,
    pub role: String,
    pub farmer_id: Option<String>,
    pub distributor_id: Option<String>,
}

/// Samples zero-padded 3-digit codes until `taken` clears one or the
/// attempt budget runs out.
pub(crate) fn allocate_code<F>(mut taken: F) -> FarmChainResult<String>
where
    F: FnMut(&str) -> bool,
{
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = format!("{:03}", rand::rng().random_range(0..1000));
        if !taken(&code) {
            return Ok(code);
        }
    }
    Err(FarmChainError::CodeSpaceExhausted)
}

async fn generate_unique_code(pool: &DbPool, role: Role) -> FarmChainResult<String> {
    let column = match role {
        Role::Farmer => "farmer_id",
        Role::Distributor => "distributor_id",
        _ => {
            return Err(FarmChainError::Internal(
                "Code generation requested for a codeless role".to_string(),
            ))
        }
    };

    let rows: Vec<(String,)> = sqlx::query_as(&format!(
        "SELECT {column} FROM users WHERE {column} IS NOT NULL"
    ))
    .fetch_all(pool)
    .await?;
    let taken: HashSet<String> = rows.into_iter().map(|(code,)| code).collect();

    allocate_code(|code| taken.contains(code))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> FarmChainResult<Json<Value>> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(FarmChainError::Validation(
            "Email and password are required".to_string(),
        ));
    }
    if payload.name.trim().is_empty() {
        return Err(FarmChainError::Validation("Name is required".to_string()));
    }

    let role: Role = payload
        .role
        .parse()
        .map_err(|_| FarmChainError::Validation(format!("Invalid role: {}", payload.role)))?;

    if db::email_exists(&state.pool, &payload.email).await? {
        return Err(FarmChainError::DuplicateEmail);
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)?;

    // FARMER and DISTRIBUTOR get a role-scoped traceability code; the two
    // partitions are independent, so numeric collisions across roles are fine.
    let mut farmer_code = None;
    let mut distributor_code = None;
    if role.carries_code() {
        let code = generate_unique_code(&state.pool, role).await?;
        match role {
            Role::Farmer => farmer_code = Some(code),
            _ => distributor_code = Some(code),
        }
    }

    let user = db::insert_user(
        &state.pool,
        payload.email.trim(),
        &password_hash,
        payload.name.trim(),
        payload.location.as_deref(),
        role,
        farmer_code.as_deref(),
        distributor_code.as_deref(),
    )
    .await?;

    tracing::info!("Registered {} as {}", user.email, user.role);

    Ok(Json(json!({
        "success": true,
        "message": "User registered successfully!",
    })))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> FarmChainResult<Json<AuthResponse>> {
    let user = db::find_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or(FarmChainError::InvalidCredentials)?;

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or(FarmChainError::InvalidCredentials)?;

    if !verify(&payload.password, password_hash)? {
        return Err(FarmChainError::InvalidCredentials);
    }

    let token = generate_token(&user)?;

    Ok(Json(AuthResponse {
        token,
        id: user.id,
        email: user.email,
        name: user.name,
        location: user.location,
        role: user.role,
        farmer_id: user.farmer_id,
        distributor_id: user.distributor_id,
    }))
}
