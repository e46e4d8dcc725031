//! API request/response models for open positions.

use super::pagination::Pagination;
use crate::db::models::positions::PositionDBResponse;
use crate::types::{OpportunityId, PositionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Hiring status of a position.
///
/// `open → on_hold | filled | cancelled`, `on_hold → open | cancelled`. `filled` and `cancelled`
/// are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "position_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    OnHold,
    Filled,
    Cancelled,
}

impl PositionStatus {
    pub fn can_transition_to(self, next: PositionStatus) -> bool {
        use PositionStatus::*;
        matches!(
            (self, next),
            (Open, OnHold) | (Open, Filled) | (Open, Cancelled) | (OnHold, Open) | (OnHold, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PositionStatus::Filled | PositionStatus::Cancelled)
    }
}

fn default_headcount() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PositionCreate {
    pub title: String,
    pub description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    #[serde(default = "default_headcount")]
    pub headcount: i32,
    /// Initial status, `open` (default) or `on_hold`
    pub status: Option<PositionStatus>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub opportunity_id: Option<OpportunityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PositionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub headcount: Option<i32>,
    pub status: Option<PositionStatus>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub opportunity_id: Option<OpportunityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PositionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PositionId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub opportunity_id: Option<OpportunityId>,
    pub title: String,
    pub description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub headcount: i32,
    /// Pipeline entries of this position in the `hired` stage
    pub hired_count: i64,
    pub status: PositionStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListPositionsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on title, department or location
    pub search: Option<String>,

    pub status: Option<PositionStatus>,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub opportunity_id: Option<OpportunityId>,
}

impl From<PositionDBResponse> for PositionResponse {
    fn from(db: PositionDBResponse) -> Self {
        Self {
            id: db.id,
            opportunity_id: db.opportunity_id,
            title: db.title,
            description: db.description,
            department: db.department,
            location: db.location,
            headcount: db.headcount,
            hired_count: db.hired_count,
            status: db.status,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
