pub mod auth;
pub mod crops;
pub mod purchases;
