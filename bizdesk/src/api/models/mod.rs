//! API request and response data models.
//!
//! These structs define the public JSON contract. They are kept separate from the database
//! models in [`crate::db::models`] and carry `utoipa` annotations for the OpenAPI document.

pub mod auth;
pub mod candidates;
pub mod employees;
pub mod notes;
pub mod notifications;
pub mod opportunities;
pub mod pagination;
pub mod pipeline;
pub mod positions;
pub mod templates;
pub mod users;
