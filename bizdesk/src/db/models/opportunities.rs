//! Database models for opportunities.

use crate::api::models::opportunities::OpportunityStage;
use crate::types::{OpportunityId, TenantId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct OpportunityCreateDBRequest {
    pub name: String,
    pub client_name: String,
    pub stage: OpportunityStage,
    pub estimated_value: Option<Decimal>,
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct OpportunityUpdateDBRequest {
    pub name: Option<String>,
    pub client_name: Option<String>,
    pub stage: Option<OpportunityStage>,
    pub estimated_value: Option<Decimal>,
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OpportunityDBResponse {
    pub id: OpportunityId,
    pub tenant_id: TenantId,
    pub name: String,
    pub client_name: String,
    pub stage: OpportunityStage,
    pub estimated_value: Option<Decimal>,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
