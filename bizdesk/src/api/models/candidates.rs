//! API request/response models for candidates.

use super::pagination::Pagination;
use crate::db::models::candidates::CandidateDBResponse;
use crate::types::{CandidateId, PositionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Recruitment status of a candidate.
///
/// `new → active | archived`, `active → hired | archived`, `archived → active`. `hired` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "candidate_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    New,
    Active,
    Hired,
    Archived,
}

impl CandidateStatus {
    pub fn can_transition_to(self, next: CandidateStatus) -> bool {
        use CandidateStatus::*;
        matches!(
            (self, next),
            (New, Active) | (New, Archived) | (Active, Hired) | (Active, Archived) | (Archived, Active)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == CandidateStatus::Hired
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandidateCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Where the candidate came from (referral, job board, ...)
    pub source: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CandidateUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<CandidateStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandidateResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CandidateId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub status: CandidateStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact candidate view embedded in pipeline boards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandidateSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: CandidateId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: CandidateStatus,
    pub tags: Vec<String>,
}

/// Query parameters for listing candidates
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListCandidatesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on first name, last name, full name or email
    pub search: Option<String>,

    pub status: Option<CandidateStatus>,

    /// Only candidates carrying this tag
    pub tag: Option<String>,

    /// Only candidates in this position's pipeline
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub position_id: Option<PositionId>,
}

impl From<CandidateDBResponse> for CandidateResponse {
    fn from(db: CandidateDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email,
            phone: db.phone,
            source: db.source,
            summary: db.summary,
            tags: db.tags,
            status: db.status,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Trim, drop empties and de-duplicate tags case-insensitively, keeping first spelling.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use CandidateStatus::*;

    #[test]
    fn status_transitions() {
        assert!(New.can_transition_to(Active));
        assert!(New.can_transition_to(Archived));
        assert!(Active.can_transition_to(Hired));
        assert!(Active.can_transition_to(Archived));
        assert!(Archived.can_transition_to(Active));

        assert!(!New.can_transition_to(Hired));
        assert!(!Archived.can_transition_to(Hired));
        assert!(!Active.can_transition_to(New));
        for next in [New, Active, Archived, Hired] {
            assert!(!Hired.can_transition_to(next), "hired must be terminal, moved to {next:?}");
        }
    }

    #[test]
    fn tags_are_normalized() {
        let tags = normalize_tags(vec![
            " rust ".to_string(),
            "Rust".to_string(),
            "".to_string(),
            "remote".to_string(),
        ]);
        assert_eq!(tags, vec!["rust".to_string(), "remote".to_string()]);
    }
}
