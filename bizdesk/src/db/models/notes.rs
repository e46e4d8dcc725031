//! Database models for notes.

use crate::types::{CandidateId, NoteId, TenantId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct NoteCreateDBRequest {
    pub candidate_id: CandidateId,
    pub author_id: UserId,
    pub body: String,
    pub mentioned_user_ids: Vec<UserId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct NoteDBResponse {
    pub id: NoteId,
    pub tenant_id: TenantId,
    pub candidate_id: CandidateId,
    pub author_id: Option<UserId>,
    pub author_username: Option<String>,
    pub body: String,
    pub mentioned_user_ids: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}
