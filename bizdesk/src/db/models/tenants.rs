//! Database models for tenants.

use crate::types::TenantId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct TenantCreateDBRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TenantDBResponse {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
