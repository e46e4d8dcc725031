//! Request and response bodies for `/authentication/*`.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::users::UserResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Self-service sign-up: creates an organisation and its first admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub organisation_name: String,
    /// Derived from the organisation name when omitted
    pub organisation_slug: Option<String>,
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    /// The session JWT, for clients that send `Authorization: Bearer` instead of the cookie
    pub token: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationInfo {
    pub enabled: bool,
    pub message: String,
}

/// Response that sets the session cookie alongside a JSON body.
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

pub struct RegisterResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

fn with_cookie(status: StatusCode, cookie: String, body: impl IntoResponse) -> Response {
    let mut response = (status, body).into_response();
    match cookie.parse() {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Failed to encode session cookie header: {e}"),
    }
    response
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, self.cookie, Json(self.auth_response))
    }
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::CREATED, self.cookie, Json(self.auth_response))
    }
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, self.cookie, Json(self.auth_response))
    }
}
