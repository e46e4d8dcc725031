//! Database models for candidates.

use crate::api::models::candidates::CandidateStatus;
use crate::types::{CandidateId, TenantId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct CandidateCreateDBRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub created_by: Option<UserId>,
}

/// `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct CandidateUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<CandidateStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CandidateDBResponse {
    pub id: CandidateId,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub status: CandidateStatus,
    pub created_by: Option<UserId>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
