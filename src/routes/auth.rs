use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(commands::auth::signup))
        .route("/auth/signin", post(commands::auth::signin))
}
