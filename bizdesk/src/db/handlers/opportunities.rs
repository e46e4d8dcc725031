//! Database repository for CRM opportunities.

use crate::api::models::opportunities::OpportunityStage;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::opportunities::{OpportunityCreateDBRequest, OpportunityDBResponse, OpportunityUpdateDBRequest},
};
use crate::types::{OpportunityId, TenantId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct OpportunityFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub stage: Option<OpportunityStage>,
}

impl OpportunityFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct Opportunities<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

fn push_opportunity_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OpportunityFilter) {
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query.push(" AND (LOWER(name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(client_name) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(stage) = filter.stage {
        query.push(" AND stage = ");
        query.push_bind(stage);
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Opportunities<'c> {
    type CreateRequest = OpportunityCreateDBRequest;
    type UpdateRequest = OpportunityUpdateDBRequest;
    type Response = OpportunityDBResponse;
    type Id = OpportunityId;
    type Filter = OpportunityFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let opportunity = sqlx::query_as::<_, OpportunityDBResponse>(
            r#"
            INSERT INTO opportunities (tenant_id, name, client_name, stage, estimated_value, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(request.name.trim())
        .bind(request.client_name.trim())
        .bind(request.stage)
        .bind(request.estimated_value)
        .bind(request.owner_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(opportunity)
    }

    #[instrument(skip(self), fields(opportunity_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let opportunity = sqlx::query_as::<_, OpportunityDBResponse>("SELECT * FROM opportunities WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(opportunity)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM opportunities WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_opportunity_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rows = query.build_query_as::<OpportunityDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(opportunity_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM opportunities WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(opportunity_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let opportunity = sqlx::query_as::<_, OpportunityDBResponse>(
            r#"
            UPDATE opportunities SET
                name = COALESCE($3, name),
                client_name = COALESCE($4, client_name),
                stage = COALESCE($5, stage),
                estimated_value = COALESCE($6, estimated_value),
                owner_id = COALESCE($7, owner_id),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(self.tenant_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.client_name.as_deref().map(str::trim))
        .bind(request.stage)
        .bind(request.estimated_value)
        .bind(request.owner_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(opportunity)
    }
}

impl<'c> Opportunities<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &OpportunityFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM opportunities WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_opportunity_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Row-lock the opportunity so concurrent position writes against it serialize.
    #[instrument(skip(self), fields(opportunity_id = %abbrev_uuid(&id)), err)]
    pub async fn lock_for_update(&mut self, id: OpportunityId) -> Result<Option<OpportunityDBResponse>> {
        let opportunity =
            sqlx::query_as::<_, OpportunityDBResponse>("SELECT * FROM opportunities WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(self.tenant_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(opportunity)
    }

    #[instrument(skip(self), fields(opportunity_id = %abbrev_uuid(&id)), err)]
    pub async fn has_open_position(&mut self, id: OpportunityId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM open_positions WHERE opportunity_id = $1 AND tenant_id = $2 AND status = 'open')",
        )
        .bind(id)
        .bind(self.tenant_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(exists)
    }
}
