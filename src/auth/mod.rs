use crate::state::AppState;
use axum::Router;

pub mod claims;
mod cookie;
mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub(crate) mod middleware;
pub mod otp;
pub mod password;
pub mod services;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(handlers::protected_routes(state.clone()))
        .merge(handlers::admin_routes(state))
}
