use axum::{
    extract::{Json, State},
    Extension,
};
use serde::Deserialize;

use crate::custody::parse_date_safe;
use crate::db::{self, ConsumerPurchase};
use crate::error::{FarmChainError, FarmChainResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

/// Receipt payload. The chain fields are free-form copies taken at purchase
/// time; they are not live references to a crop record.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PurchaseInput {
    pub crop_name: String,
    pub crop_type: Option<String>,
    pub purchase_date: Option<String>,
    pub purchased_from: Option<String>,
    pub retailer_location: Option<String>,
    pub farmer_id: Option<String>,
    pub farmer_name: Option<String>,
    pub distributor_id: Option<String>,
    pub distributor_name: Option<String>,
}

pub async fn get_user_purchases(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FarmChainResult<Json<Vec<ConsumerPurchase>>> {
    let purchases = db::find_purchases_by_user(&state.pool, claims.user_id).await?;
    Ok(Json(purchases))
}

pub async fn create_purchase(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PurchaseInput>,
) -> FarmChainResult<Json<ConsumerPurchase>> {
    if payload.crop_name.trim().is_empty() {
        return Err(FarmChainError::Validation(
            "Crop name is required".to_string(),
        ));
    }

    let purchase_date = match payload.purchase_date.as_deref() {
        None => None,
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(parse_date_safe(s).ok_or_else(|| {
            FarmChainError::Validation(format!("Invalid date for purchaseDate: {}", s))
        })?),
    };

    let purchase = ConsumerPurchase {
        id: 0,
        user_id: claims.user_id,
        crop_name: payload.crop_name,
        crop_type: payload.crop_type,
        purchase_date,
        purchased_from: payload.purchased_from,
        retailer_location: payload.retailer_location,
        farmer_id: payload.farmer_id,
        farmer_name: payload.farmer_name,
        distributor_id: payload.distributor_id,
        distributor_name: payload.distributor_name,
        created_at: None,
        updated_at: None,
    };

    let saved = db::insert_purchase(&state.pool, &purchase).await?;
    Ok(Json(saved))
}
