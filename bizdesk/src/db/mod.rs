//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - tenant-scoped queries)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Writes that touch more than one table open a transaction and build every repository they
//! need from it, one at a time:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let position = Positions::new(&mut tx, tenant_id).lock_for_update(id).await?;
//! let hired = Pipeline::new(&mut tx, tenant_id).hired_count(id).await?;
//! tx.commit().await?;
//! ```
//!
//! Migrations live in `migrations/` and are embedded by [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
