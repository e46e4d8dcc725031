//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (a pooled connection or an open transaction)
//! and the caller's tenant id. Every query is scoped to that tenant; [`Tenants`] is the only
//! repository that is not.
//!
//! # Available Repositories
//!
//! - [`Tenants`]: organisations, looked up by id or slug
//! - [`Users`]: user accounts, roles and login lookups
//! - [`Candidates`]: recruitment candidates (soft deleted)
//! - [`Opportunities`]: CRM opportunities
//! - [`Positions`]: open positions, with their hired count
//! - [`Pipeline`]: candidate/position entries and the Kanban board
//! - [`Employees`]: HR employee records
//! - [`Templates`]: email templates
//! - [`Notes`] and [`Notifications`]: candidate notes and the mention inbox
//!
//! # Common Pattern
//!
//! ```ignore
//! use bizdesk::db::handlers::{Candidates, Repository};
//!
//! async fn example(pool: &sqlx::PgPool, tenant_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Candidates::new(&mut tx, tenant_id);
//!     let candidates = repo.list(&CandidateFilter::new(0, 10)).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod candidates;
pub mod employees;
pub mod notes;
pub mod notifications;
pub mod opportunities;
pub mod pipeline;
pub mod positions;
pub mod repository;
pub mod templates;
pub mod tenants;
pub mod users;

pub use candidates::Candidates;
pub use employees::Employees;
pub use notes::Notes;
pub use notifications::Notifications;
pub use opportunities::Opportunities;
pub use pipeline::Pipeline;
pub use positions::Positions;
pub use repository::Repository;
pub use templates::Templates;
pub use tenants::Tenants;
pub use users::Users;
