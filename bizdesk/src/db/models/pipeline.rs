//! Database models for pipeline entries (`candidate_positions`).

use crate::api::models::candidates::CandidateStatus;
use crate::api::models::pipeline::PipelineStage;
use crate::api::models::positions::PositionStatus;
use crate::types::{CandidateId, PipelineEntryId, PositionId, TenantId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct PipelineEntryCreateDBRequest {
    pub candidate_id: CandidateId,
    pub position_id: PositionId,
}

/// Move to `stage`, optionally at `rank` within the target column.
#[derive(Debug, Clone)]
pub struct PipelineEntryMoveDBRequest {
    pub stage: PipelineStage,
    pub rank: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PipelineEntryDBResponse {
    pub id: PipelineEntryId,
    pub tenant_id: TenantId,
    pub candidate_id: CandidateId,
    pub position_id: PositionId,
    pub stage: PipelineStage,
    pub rank: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One card on a position board: the entry joined with its candidate.
#[derive(Debug, Clone, FromRow)]
pub struct BoardRow {
    pub entry_id: PipelineEntryId,
    pub stage: PipelineStage,
    pub rank: i32,
    pub candidate_id: CandidateId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: CandidateStatus,
    pub tags: Vec<String>,
}

/// A candidate's entry joined with its position.
#[derive(Debug, Clone, FromRow)]
pub struct CandidatePipelineRow {
    pub entry_id: PipelineEntryId,
    pub position_id: PositionId,
    pub position_title: String,
    pub position_status: PositionStatus,
    pub stage: PipelineStage,
    pub updated_at: DateTime<Utc>,
}
