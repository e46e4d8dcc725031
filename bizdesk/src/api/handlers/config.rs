//! HTTP handlers for configuration retrieval endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{AppState, api::models::users::CurrentUser};

/// The subset of server configuration a frontend needs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigResponse {
    pub registration_enabled: bool,
    pub password_min_length: usize,
    pub password_max_length: usize,
    /// Whether template rendering rejects unknown variables by default
    pub strict_template_variables: bool,
    pub dashboard_url: String,
}

#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    summary = "Get config",
    description = "Get current app configuration",
    responses(
        (status = 200, description = "Got config", body = ConfigResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_config(State(state): State<AppState>, _user: CurrentUser) -> Json<ConfigResponse> {
    let native = &state.config.auth.native;
    Json(ConfigResponse {
        registration_enabled: native.allow_registration,
        password_min_length: native.password.min_length,
        password_max_length: native.password.max_length,
        strict_template_variables: state.config.templates.strict_variables,
        dashboard_url: state.config.dashboard_url.clone(),
    })
}
