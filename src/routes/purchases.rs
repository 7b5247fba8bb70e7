use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchases", get(commands::purchases::get_user_purchases))
        .route("/purchases", post(commands::purchases::create_purchase))
}
