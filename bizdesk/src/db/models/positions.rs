//! Database models for open positions.

use crate::api::models::positions::PositionStatus;
use crate::types::{OpportunityId, PositionId, TenantId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct PositionCreateDBRequest {
    pub opportunity_id: Option<OpportunityId>,
    pub title: String,
    pub description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub headcount: i32,
    pub status: PositionStatus,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct PositionUpdateDBRequest {
    pub opportunity_id: Option<OpportunityId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub headcount: Option<i32>,
    pub status: Option<PositionStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PositionDBResponse {
    pub id: PositionId,
    pub tenant_id: TenantId,
    pub opportunity_id: Option<OpportunityId>,
    pub title: String,
    pub description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub headcount: i32,
    pub status: PositionStatus,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub hired_count: i64,
}
