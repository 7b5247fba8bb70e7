use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/crops", get(commands::crops::get_user_crops))
        .route("/crops", post(commands::crops::create_crop))
        .route("/crops/:id", put(commands::crops::update_crop))
        .route("/crops/:id", delete(commands::crops::delete_crop))
        // Public traceability lookups
        .route(
            "/crops/farmer/:farmer_id",
            get(commands::crops::get_crops_by_farmer),
        )
        .route(
            "/crops/distributor/:distributor_id",
            get(commands::crops::get_crops_by_distributor),
        )
        .route("/crops/scan/:crop_id", get(commands::crops::scan_crop))
}
