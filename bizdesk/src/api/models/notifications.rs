//! API models for in-app notifications.

use super::pagination::Pagination;
use crate::db::models::notifications::NotificationDBResponse;
use crate::types::{CandidateId, NoteId, NotificationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const KIND_MENTION: &str = "mention";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
    /// What triggered the notification, e.g. `mention`
    pub kind: String,
    pub message: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub candidate_id: Option<CandidateId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub note_id: Option<NoteId>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[serde_as]
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListNotificationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only notifications that have not been read
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub unread_only: Option<bool>,
}

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(db: NotificationDBResponse) -> Self {
        Self {
            id: db.id,
            kind: db.kind,
            message: db.message,
            candidate_id: db.candidate_id,
            note_id: db.note_id,
            read_at: db.read_at,
            created_at: db.created_at,
        }
    }
}
