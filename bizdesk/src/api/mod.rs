//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): login, logout, registration
//! - **Users** (`/admin/api/v1/users/*`): tenant user administration
//! - **Recruitment** (`/admin/api/v1/candidates/*`, `/positions/*`, `/pipeline/*`): the ATS
//! - **CRM** (`/admin/api/v1/opportunities/*`)
//! - **HR** (`/admin/api/v1/employees/*`, `/candidates/{id}/convert`)
//! - **Templates** (`/admin/api/v1/templates/*`): the block editor backend
//! - **Notes & notifications** (`/admin/api/v1/candidates/{id}/notes`, `/notifications/*`)
//!
//! All endpoints are documented with `utoipa`; docs are served at `/admin/docs`.

pub mod handlers;
pub mod models;
