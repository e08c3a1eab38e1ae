pub mod error;
pub mod health;
pub mod tools;
pub mod updates;

use axum::{
    Router,
    routing::{get, post},
};

pub use error::ApiError;

use crate::AppState;

/// Routes mounted under `/v1`.
pub fn get_api_routes() -> Router<AppState> {
    Router::new()
        .route("/tools", get(tools::list_tools))
        .route("/tools/{name}", post(tools::call_tool))
        .route("/classify", post(tools::classify))
        .route("/updates/status", get(updates::update_status))
        .route("/updates/trigger", post(updates::trigger_update))
}
