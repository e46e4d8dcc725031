//! Database record models matching table schemas.
//!
//! Each module holds the create/update request structs a repository accepts and the
//! `*DBResponse` row it returns. API models convert from these with `From` impls, so storage and
//! wire representations can change independently.

pub mod candidates;
pub mod employees;
pub mod notes;
pub mod notifications;
pub mod opportunities;
pub mod pipeline;
pub mod positions;
pub mod templates;
pub mod tenants;
pub mod users;
