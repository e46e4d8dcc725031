//! Database models for notifications.

use crate::types::{CandidateId, NoteId, NotificationId, TenantId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub user_id: UserId,
    pub kind: String,
    pub message: String,
    pub candidate_id: Option<CandidateId>,
    pub note_id: Option<NoteId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub kind: String,
    pub message: String,
    pub candidate_id: Option<CandidateId>,
    pub note_id: Option<NoteId>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
