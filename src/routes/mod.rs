use crate::state::AppState;
use axum::Router;

pub mod auth;
pub mod crops;
pub mod purchases;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(crops::router())
        .merge(purchases::router())
}
