//! # API Handlers
//!
//! This module contains all the HTTP endpoint handlers for the token exchange API.

pub mod providers;
pub mod token;

use crate::models::ServiceInfo;
use axum::response::Json;

pub use providers::list_providers;
pub use token::exchange_token;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
