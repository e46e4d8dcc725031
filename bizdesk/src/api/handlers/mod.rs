//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authorization through [`crate::auth::permissions::RequiresPermission`]
//! - Business rules, run inside a database transaction when more than one row changes
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Login, logout and tenant registration
//! - [`candidates`]: Candidate CRUD, search and soft deletion
//! - [`config`]: Frontend-facing configuration
//! - [`employees`]: Employee records and candidate conversion
//! - [`notes`]: Candidate notes with `@username` mentions
//! - [`notifications`]: The caller's in-app notifications
//! - [`opportunities`]: Sales opportunities
//! - [`pipeline`]: Candidate pipelines per position and the board view
//! - [`positions`]: Open positions and headcount
//! - [`templates`]: Email templates, the block compiler and sending
//! - [`users`]: User CRUD within a tenant
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to an HTTP status code
//! and a JSON error body.

pub mod auth;
pub mod candidates;
pub mod config;
pub mod employees;
pub mod notes;
pub mod notifications;
pub mod opportunities;
pub mod pipeline;
pub mod positions;
pub mod templates;
pub mod users;
