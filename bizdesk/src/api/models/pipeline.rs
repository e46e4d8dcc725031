//! API models for the candidate/position pipeline (Kanban board).

use super::candidates::{CandidateStatus, CandidateSummary};
use super::positions::PositionStatus;
use crate::db::models::pipeline::PipelineEntryDBResponse;
use crate::types::{CandidateId, PipelineEntryId, PositionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stage of a candidate within one position's pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "pipeline_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Applied,
    Screening,
    Interview,
    Offer,
    Hired,
    Rejected,
    Withdrawn,
}

impl PipelineStage {
    /// Board column order.
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::Applied,
        PipelineStage::Screening,
        PipelineStage::Interview,
        PipelineStage::Offer,
        PipelineStage::Hired,
        PipelineStage::Rejected,
        PipelineStage::Withdrawn,
    ];

    pub fn is_active(self) -> bool {
        matches!(
            self,
            PipelineStage::Applied | PipelineStage::Screening | PipelineStage::Interview | PipelineStage::Offer
        )
    }

    /// Whether an entry may move from `self` to a different stage `next`.
    pub fn can_transition_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        if self == next {
            return false;
        }
        match self {
            Hired => false,
            Rejected | Withdrawn => next == Applied,
            Offer if next == Hired => true,
            _ if next == Hired => false,
            _ => next.is_active() || matches!(next, Rejected | Withdrawn),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineAdd {
    #[schema(value_type = String, format = "uuid")]
    pub candidate_id: CandidateId,
}

/// Move an entry to a stage. Moving within the same stage only reorders it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineMove {
    pub stage: PipelineStage,
    /// Zero-based position within the target column; appended at the end when omitted
    pub rank: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineEntryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PipelineEntryId,
    #[schema(value_type = String, format = "uuid")]
    pub candidate_id: CandidateId,
    #[schema(value_type = String, format = "uuid")]
    pub position_id: PositionId,
    pub stage: PipelineStage,
    pub rank: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardCard {
    #[schema(value_type = String, format = "uuid")]
    pub entry_id: PipelineEntryId,
    pub rank: i32,
    pub candidate: CandidateSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardColumn {
    pub stage: PipelineStage,
    pub entries: Vec<BoardCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardResponse {
    #[schema(value_type = String, format = "uuid")]
    pub position_id: PositionId,
    pub title: String,
    pub status: PositionStatus,
    pub columns: Vec<BoardColumn>,
}

/// A pipeline entry seen from the candidate's side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandidatePipelineEntry {
    #[schema(value_type = String, format = "uuid")]
    pub entry_id: PipelineEntryId,
    #[schema(value_type = String, format = "uuid")]
    pub position_id: PositionId,
    pub position_title: String,
    pub position_status: PositionStatus,
    pub stage: PipelineStage,
    pub updated_at: DateTime<Utc>,
}

impl From<PipelineEntryDBResponse> for PipelineEntryResponse {
    fn from(db: PipelineEntryDBResponse) -> Self {
        Self {
            id: db.id,
            candidate_id: db.candidate_id,
            position_id: db.position_id,
            stage: db.stage,
            rank: db.rank,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Group board rows (already ordered by rank) into one column per stage, in pipeline order.
pub fn build_columns(cards: Vec<(PipelineStage, BoardCard)>) -> Vec<BoardColumn> {
    let mut columns: Vec<BoardColumn> = PipelineStage::ALL
        .iter()
        .map(|&stage| BoardColumn {
            stage,
            entries: Vec::new(),
        })
        .collect();
    for (stage, card) in cards {
        if let Some(column) = columns.iter_mut().find(|c| c.stage == stage) {
            column.entries.push(card);
        }
    }
    columns
}

/// Candidate statuses from which a candidate may still enter a pipeline.
pub fn candidate_can_apply(status: CandidateStatus) -> bool {
    status != CandidateStatus::Hired
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineStage::*;

    #[test]
    fn active_stages_move_freely() {
        for from in [Applied, Screening, Interview, Offer] {
            for to in [Applied, Screening, Interview, Offer, Rejected, Withdrawn] {
                assert_eq!(from.can_transition_to(to), from != to, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn hired_only_from_offer_and_terminal() {
        assert!(Offer.can_transition_to(Hired));
        for from in [Applied, Screening, Interview, Rejected, Withdrawn] {
            assert!(!from.can_transition_to(Hired), "{from:?} -> hired");
        }
        for to in PipelineStage::ALL {
            assert!(!Hired.can_transition_to(to));
        }
    }

    #[test]
    fn closed_stages_only_reopen_to_applied() {
        for from in [Rejected, Withdrawn] {
            for to in PipelineStage::ALL {
                assert_eq!(from.can_transition_to(to), to == Applied, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn columns_follow_pipeline_order() {
        let card = |rank| BoardCard {
            entry_id: uuid::Uuid::new_v4(),
            rank,
            candidate: CandidateSummary {
                id: uuid::Uuid::new_v4(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: "a@b.c".to_string(),
                status: CandidateStatus::Active,
                tags: vec![],
            },
        };
        let columns = build_columns(vec![(Offer, card(0)), (Applied, card(0)), (Applied, card(1))]);
        assert_eq!(columns.len(), 7);
        assert_eq!(columns.iter().map(|c| c.stage).collect::<Vec<_>>(), PipelineStage::ALL.to_vec());
        assert_eq!(columns[0].entries.len(), 2);
        assert_eq!(columns[0].entries[1].rank, 1);
        assert_eq!(columns[3].entries.len(), 1);
        assert!(columns[4].entries.is_empty());
    }

    #[test]
    fn hired_candidates_cannot_apply() {
        assert!(!candidate_can_apply(CandidateStatus::Hired));
        assert!(candidate_can_apply(CandidateStatus::Archived));
    }
}
