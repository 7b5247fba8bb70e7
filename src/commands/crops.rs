use axum::{
    extract::{Json, Path, State},
    Extension,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::custody::{self, CropInput};
use crate::db::{self, Crop, DbPool, User};
use crate::error::{FarmChainError, FarmChainResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

/// Resolves the authenticated caller's full profile; custody stamping needs
/// the current name, location and codes, not just the token claims.
async fn current_user(pool: &DbPool, claims: &Claims) -> FarmChainResult<User> {
    db::find_user_by_id(pool, claims.user_id)
        .await?
        .ok_or_else(|| FarmChainError::Forbidden("Unknown account".to_string()))
}

pub async fn get_user_crops(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FarmChainResult<Json<Vec<Crop>>> {
    let crops = db::find_crops_by_owner(&state.pool, claims.user_id).await?;
    Ok(Json(crops))
}

pub async fn create_crop(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CropInput>,
) -> FarmChainResult<Json<Crop>> {
    let user = current_user(&state.pool, &claims).await?;

    let crop = custody::apply_create(&user, &payload)?;
    let saved = db::insert_crop(&state.pool, &crop).await?;

    tracing::info!("Crop {} created by user {}", saved.id, user.id);
    Ok(Json(saved))
}

pub async fn update_crop(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(payload): Json<CropInput>,
) -> FarmChainResult<Json<Crop>> {
    let user = current_user(&state.pool, &claims).await?;

    let mut crop = db::find_crop_by_id(&state.pool, id)
        .await?
        .ok_or(FarmChainError::NotFound)?;

    custody::apply_update(&user, &mut crop, &payload)?;
    let saved = db::update_crop(&state.pool, &crop).await?;

    Ok(Json(saved))
}

pub async fn delete_crop(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> FarmChainResult<Json<Value>> {
    let crop = db::find_crop_by_id(&state.pool, id)
        .await?
        .ok_or(FarmChainError::NotFound)?;

    custody::authorize_delete(claims.user_id == crop.user_id)?;

    if !db::delete_crop_by_id(&state.pool, id).await? {
        return Err(FarmChainError::NotFound);
    }

    tracing::info!("Crop {} deleted by user {}", id, claims.user_id);
    Ok(Json(json!({ "success": true })))
}

// Public traceability reads below: no ownership check by design, so any
// party can inspect a record's custody history.

pub async fn get_crops_by_farmer(
    State(state): State<AppState>,
    Path(farmer_id): Path<String>,
) -> FarmChainResult<Json<Vec<Crop>>> {
    let crops = db::find_crops_by_farmer_code(&state.pool, &farmer_id).await?;
    Ok(Json(crops))
}

pub async fn get_crops_by_distributor(
    State(state): State<AppState>,
    Path(distributor_id): Path<String>,
) -> FarmChainResult<Json<Vec<Crop>>> {
    let crops = db::find_crops_by_distributor_code(&state.pool, &distributor_id).await?;
    Ok(Json(crops))
}

/// Traceability payload: the record plus its inferred chain position.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    #[serde(flatten)]
    pub crop: Crop,
    pub stage: &'static str,
}

pub async fn scan_crop(
    State(state): State<AppState>,
    Path(crop_id): Path<i32>,
) -> FarmChainResult<Json<ScanResponse>> {
    let crop = db::find_crop_by_id(&state.pool, crop_id)
        .await?
        .ok_or(FarmChainError::NotFound)?;
    let stage = custody::stage_of(&crop).as_str();
    Ok(Json(ScanResponse { crop, stage }))
}
