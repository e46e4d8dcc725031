//! Database repository for pipeline entries.
//!
//! Ranks are zero-based and kept contiguous within each (position, stage) column: inserting at a
//! rank shifts the entries at or after it down by one, and removing an entry closes the gap.

use crate::db::{
    errors::{DbError, Result},
    models::pipeline::{
        BoardRow, CandidatePipelineRow, PipelineEntryCreateDBRequest, PipelineEntryDBResponse, PipelineEntryMoveDBRequest,
    },
};
use crate::types::{CandidateId, PipelineEntryId, PositionId, TenantId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct Pipeline<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

async fn close_gap(db: &mut PgConnection, entry: &PipelineEntryDBResponse) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE candidate_positions SET rank = rank - 1
        WHERE position_id = $1 AND stage = $2 AND rank > $3 AND id <> $4
        "#,
    )
    .bind(entry.position_id)
    .bind(entry.stage)
    .bind(entry.rank)
    .bind(entry.id)
    .execute(db)
    .await?;
    Ok(())
}

impl<'c> Pipeline<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    /// Add a candidate to the end of the position's `applied` column.
    #[instrument(skip(self, request), fields(candidate_id = %abbrev_uuid(&request.candidate_id), position_id = %abbrev_uuid(&request.position_id)), err)]
    pub async fn create(&mut self, request: &PipelineEntryCreateDBRequest) -> Result<PipelineEntryDBResponse> {
        let entry = sqlx::query_as::<_, PipelineEntryDBResponse>(
            r#"
            INSERT INTO candidate_positions (tenant_id, candidate_id, position_id, stage, rank)
            VALUES (
                $1, $2, $3, 'applied',
                (SELECT COALESCE(MAX(rank) + 1, 0) FROM candidate_positions WHERE position_id = $3 AND stage = 'applied')
            )
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(request.candidate_id)
        .bind(request.position_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(entry)
    }

    #[instrument(skip(self), fields(entry_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: PipelineEntryId) -> Result<Option<PipelineEntryDBResponse>> {
        let entry =
            sqlx::query_as::<_, PipelineEntryDBResponse>("SELECT * FROM candidate_positions WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(self.tenant_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(entry)
    }

    #[instrument(skip(self), fields(entry_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: PipelineEntryId) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let entry = sqlx::query_as::<_, PipelineEntryDBResponse>(
            "DELETE FROM candidate_positions WHERE id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(entry) = entry else {
            return Ok(false);
        };
        close_gap(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Move an entry to a stage and rank. Stage rules are enforced by the caller.
    #[instrument(skip(self, request), fields(entry_id = %abbrev_uuid(&id), stage = ?request.stage), err)]
    pub async fn update(&mut self, id: PipelineEntryId, request: &PipelineEntryMoveDBRequest) -> Result<PipelineEntryDBResponse> {
        let mut tx = self.db.begin().await?;

        let entry = sqlx::query_as::<_, PipelineEntryDBResponse>(
            "SELECT * FROM candidate_positions WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        close_gap(&mut tx, &entry).await?;

        let column_size: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM candidate_positions WHERE position_id = $1 AND stage = $2 AND id <> $3",
        )
        .bind(entry.position_id)
        .bind(request.stage)
        .bind(entry.id)
        .fetch_one(&mut *tx)
        .await?;
        let column_size = i32::try_from(column_size).unwrap_or(i32::MAX);
        let rank = request.rank.map_or(column_size, |r| r.clamp(0, column_size));

        sqlx::query(
            r#"
            UPDATE candidate_positions SET rank = rank + 1
            WHERE position_id = $1 AND stage = $2 AND rank >= $3 AND id <> $4
            "#,
        )
        .bind(entry.position_id)
        .bind(request.stage)
        .bind(rank)
        .bind(entry.id)
        .execute(&mut *tx)
        .await?;

        let moved = sqlx::query_as::<_, PipelineEntryDBResponse>(
            "UPDATE candidate_positions SET stage = $2, rank = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(entry.id)
        .bind(request.stage)
        .bind(rank)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(moved)
    }

    /// All cards of a position, ordered by rank within each stage.
    #[instrument(skip(self), fields(position_id = %abbrev_uuid(&position_id)), err)]
    pub async fn board(&mut self, position_id: PositionId) -> Result<Vec<BoardRow>> {
        let rows = sqlx::query_as::<_, BoardRow>(
            r#"
            SELECT cp.id AS entry_id, cp.stage, cp.rank,
                   c.id AS candidate_id, c.first_name, c.last_name, c.email, c.status, c.tags
            FROM candidate_positions cp
            JOIN candidates c ON c.id = cp.candidate_id
            WHERE cp.position_id = $1 AND cp.tenant_id = $2 AND NOT c.deleted
            ORDER BY cp.stage, cp.rank, cp.created_at
            "#,
        )
        .bind(position_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&candidate_id)), err)]
    pub async fn for_candidate(&mut self, candidate_id: CandidateId) -> Result<Vec<CandidatePipelineRow>> {
        let rows = sqlx::query_as::<_, CandidatePipelineRow>(
            r#"
            SELECT cp.id AS entry_id, p.id AS position_id, p.title AS position_title, p.status AS position_status,
                   cp.stage, cp.updated_at
            FROM candidate_positions cp
            JOIN open_positions p ON p.id = cp.position_id
            WHERE cp.candidate_id = $1 AND cp.tenant_id = $2
            ORDER BY cp.updated_at DESC
            "#,
        )
        .bind(candidate_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(position_id = %abbrev_uuid(&position_id)), err)]
    pub async fn hired_count(&mut self, position_id: PositionId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM candidate_positions WHERE position_id = $1 AND tenant_id = $2 AND stage = 'hired'",
        )
        .bind(position_id)
        .bind(self.tenant_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&candidate_id)), err)]
    pub async fn exists(&mut self, candidate_id: CandidateId, position_id: PositionId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM candidate_positions WHERE candidate_id = $1 AND position_id = $2 AND tenant_id = $3)",
        )
        .bind(candidate_id)
        .bind(position_id)
        .bind(self.tenant_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(exists)
    }
}
