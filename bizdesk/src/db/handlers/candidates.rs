//! Database repository for candidates.
//!
//! Candidates are soft-deleted: every read filters on `NOT deleted`, and `delete` only flips the
//! flag so notes and history stay attached.

use crate::api::models::candidates::CandidateStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::candidates::{CandidateCreateDBRequest, CandidateDBResponse, CandidateUpdateDBRequest},
};
use crate::types::{CandidateId, PositionId, TenantId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub status: Option<CandidateStatus>,
    pub tag: Option<String>,
    pub position_id: Option<PositionId>,
}

impl CandidateFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct Candidates<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

fn push_candidate_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &CandidateFilter) {
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query.push(" AND (LOWER(first_name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(last_name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(first_name || ' ' || last_name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(email) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        query.push(" AND EXISTS (SELECT 1 FROM UNNEST(tags) t WHERE LOWER(t) = LOWER(");
        query.push_bind(tag.to_string());
        query.push("))");
    }
    if let Some(position_id) = filter.position_id {
        query.push(" AND id IN (SELECT candidate_id FROM candidate_positions WHERE position_id = ");
        query.push_bind(position_id);
        query.push(")");
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Candidates<'c> {
    type CreateRequest = CandidateCreateDBRequest;
    type UpdateRequest = CandidateUpdateDBRequest;
    type Response = CandidateDBResponse;
    type Id = CandidateId;
    type Filter = CandidateFilter;

    #[instrument(skip(self, request), fields(tenant_id = %abbrev_uuid(&self.tenant_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let candidate = sqlx::query_as::<_, CandidateDBResponse>(
            r#"
            INSERT INTO candidates (tenant_id, first_name, last_name, email, phone, source, summary, tags, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(request.email.trim())
        .bind(&request.phone)
        .bind(&request.source)
        .bind(&request.summary)
        .bind(&request.tags)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(candidate)
    }

    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let candidate =
            sqlx::query_as::<_, CandidateDBResponse>("SELECT * FROM candidates WHERE id = $1 AND tenant_id = $2 AND NOT deleted")
                .bind(id)
                .bind(self.tenant_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(candidate)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM candidates WHERE NOT deleted AND tenant_id = ");
        query.push_bind(self.tenant_id);
        push_candidate_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let candidates = query.build_query_as::<CandidateDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(candidates)
    }

    /// Soft delete. Returns false when the candidate does not exist or is already deleted.
    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result =
            sqlx::query("UPDATE candidates SET deleted = true, updated_at = NOW() WHERE id = $1 AND tenant_id = $2 AND NOT deleted")
                .bind(id)
                .bind(self.tenant_id)
                .execute(&mut *self.db)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(candidate_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let candidate = sqlx::query_as::<_, CandidateDBResponse>(
            r#"
            UPDATE candidates SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                source = COALESCE($7, source),
                summary = COALESCE($8, summary),
                tags = COALESCE($9, tags),
                status = COALESCE($10, status),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND NOT deleted
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(self.tenant_id)
        .bind(request.first_name.as_deref().map(str::trim))
        .bind(request.last_name.as_deref().map(str::trim))
        .bind(request.email.as_deref().map(str::trim))
        .bind(&request.phone)
        .bind(&request.source)
        .bind(&request.summary)
        .bind(&request.tags)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(candidate)
    }
}

impl<'c> Candidates<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &CandidateFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM candidates WHERE NOT deleted AND tenant_id = ");
        query.push_bind(self.tenant_id);
        push_candidate_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Case-insensitive check against live candidates of the tenant, optionally ignoring one id.
    #[instrument(skip(self, email), err)]
    pub async fn email_exists(&mut self, email: &str, exclude: Option<CandidateId>) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM candidates
                WHERE tenant_id = $1 AND NOT deleted AND LOWER(email) = LOWER($2)
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(self.tenant_id)
        .bind(email.trim())
        .bind(exclude)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(exists)
    }

    /// Fetch and row-lock a live candidate for the rest of the transaction.
    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: CandidateId) -> Result<Option<CandidateDBResponse>> {
        let candidate = sqlx::query_as::<_, CandidateDBResponse>(
            "SELECT * FROM candidates WHERE id = $1 AND tenant_id = $2 AND NOT deleted FOR UPDATE",
        )
        .bind(id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(candidate)
    }

    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&id)), err)]
    pub async fn set_status(&mut self, id: CandidateId, status: CandidateStatus) -> Result<CandidateDBResponse> {
        let candidate = sqlx::query_as::<_, CandidateDBResponse>(
            "UPDATE candidates SET status = $3, updated_at = NOW() WHERE id = $1 AND tenant_id = $2 AND NOT deleted RETURNING *",
        )
        .bind(id)
        .bind(self.tenant_id)
        .bind(status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(candidate)
    }
}
