//! Database repository for candidate notes.
//!
//! Notes are append-only: they can be created, listed and deleted, never edited, so this
//! repository exposes inherent methods instead of implementing [`Repository`](super::Repository).

use crate::db::{
    errors::Result,
    models::notes::{NoteCreateDBRequest, NoteDBResponse},
};
use crate::types::{CandidateId, NoteId, TenantId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Notes<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

impl<'c> Notes<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, request), fields(candidate_id = %abbrev_uuid(&request.candidate_id), mentions = request.mentioned_user_ids.len()), err)]
    pub async fn create(&mut self, request: &NoteCreateDBRequest) -> Result<NoteDBResponse> {
        let note = sqlx::query_as::<_, NoteDBResponse>(
            r#"
            WITH n AS (
                INSERT INTO notes (tenant_id, candidate_id, author_id, body, mentioned_user_ids)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT n.id, n.tenant_id, n.candidate_id, n.author_id, u.username AS author_username,
                   n.body, n.mentioned_user_ids, n.created_at
            FROM n LEFT JOIN users u ON u.id = n.author_id
            "#,
        )
        .bind(self.tenant_id)
        .bind(request.candidate_id)
        .bind(request.author_id)
        .bind(&request.body)
        .bind(&request.mentioned_user_ids)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(note)
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: NoteId) -> Result<Option<NoteDBResponse>> {
        let note = sqlx::query_as::<_, NoteDBResponse>(
            r#"
            SELECT n.id, n.tenant_id, n.candidate_id, n.author_id, u.username AS author_username,
                   n.body, n.mentioned_user_ids, n.created_at
            FROM notes n LEFT JOIN users u ON u.id = n.author_id
            WHERE n.id = $1 AND n.tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(note)
    }

    /// Newest first.
    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&candidate_id)), err)]
    pub async fn list_for_candidate(&mut self, candidate_id: CandidateId, skip: i64, limit: i64) -> Result<Vec<NoteDBResponse>> {
        let notes = sqlx::query_as::<_, NoteDBResponse>(
            r#"
            SELECT n.id, n.tenant_id, n.candidate_id, n.author_id, u.username AS author_username,
                   n.body, n.mentioned_user_ids, n.created_at
            FROM notes n LEFT JOIN users u ON u.id = n.author_id
            WHERE n.candidate_id = $1 AND n.tenant_id = $2
            ORDER BY n.created_at DESC, n.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(candidate_id)
        .bind(self.tenant_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(notes)
    }

    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&candidate_id)), err)]
    pub async fn count_for_candidate(&mut self, candidate_id: CandidateId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE candidate_id = $1 AND tenant_id = $2")
            .bind(candidate_id)
            .bind(self.tenant_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: NoteId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
