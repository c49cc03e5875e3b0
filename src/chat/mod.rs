use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod gateway;

pub use gateway::ChatHub;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat/ws", get(gateway::ws_handler))
}
