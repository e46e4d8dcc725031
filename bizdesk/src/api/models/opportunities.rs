//! API request/response models for CRM opportunities.

use super::pagination::Pagination;
use crate::db::models::opportunities::OpportunityDBResponse;
use crate::types::{OpportunityId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Sales stage of an opportunity. `won` and `lost` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "opportunity_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStage {
    Lead,
    Qualified,
    Proposal,
    Won,
    Lost,
}

impl OpportunityStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, OpportunityStage::Won | OpportunityStage::Lost)
    }

    /// Open stages move freely among themselves and to a terminal stage.
    pub fn can_transition_to(self, next: OpportunityStage) -> bool {
        !self.is_terminal() && self != next
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpportunityCreate {
    pub name: String,
    pub client_name: String,
    pub stage: Option<OpportunityStage>,
    #[schema(value_type = Option<String>, example = "25000.00")]
    pub estimated_value: Option<Decimal>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OpportunityUpdate {
    pub name: Option<String>,
    pub client_name: Option<String>,
    pub stage: Option<OpportunityStage>,
    #[schema(value_type = Option<String>, example = "25000.00")]
    pub estimated_value: Option<Decimal>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpportunityResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: OpportunityId,
    pub name: String,
    pub client_name: String,
    pub stage: OpportunityStage,
    #[schema(value_type = Option<String>)]
    pub estimated_value: Option<Decimal>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListOpportunitiesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on name or client name
    pub search: Option<String>,

    pub stage: Option<OpportunityStage>,
}

impl From<OpportunityDBResponse> for OpportunityResponse {
    fn from(db: OpportunityDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            client_name: db.client_name,
            stage: db.stage,
            estimated_value: db.estimated_value,
            owner_id: db.owner_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
