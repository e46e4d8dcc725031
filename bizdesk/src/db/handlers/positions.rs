//! Database repository for open positions.
//!
//! Every read carries `hired_count`, the number of pipeline entries in the `hired` stage.

use crate::api::models::positions::PositionStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::positions::{PositionCreateDBRequest, PositionDBResponse, PositionUpdateDBRequest},
};
use crate::types::{OpportunityId, PositionId, TenantId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

const HIRED_COUNT: &str = "(SELECT COUNT(*) FROM candidate_positions cp WHERE cp.position_id = p.id AND cp.stage = 'hired') AS hired_count";

#[derive(Debug, Clone, Default)]
pub struct PositionFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub status: Option<PositionStatus>,
    pub opportunity_id: Option<OpportunityId>,
}

impl PositionFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct Positions<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

fn push_position_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &PositionFilter) {
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query.push(" AND (LOWER(p.title) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(p.department, '')) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(p.location, '')) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(status) = filter.status {
        query.push(" AND p.status = ");
        query.push_bind(status);
    }
    if let Some(opportunity_id) = filter.opportunity_id {
        query.push(" AND p.opportunity_id = ");
        query.push_bind(opportunity_id);
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Positions<'c> {
    type CreateRequest = PositionCreateDBRequest;
    type UpdateRequest = PositionUpdateDBRequest;
    type Response = PositionDBResponse;
    type Id = PositionId;
    type Filter = PositionFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let position = sqlx::query_as::<_, PositionDBResponse>(
            r#"
            INSERT INTO open_positions (tenant_id, opportunity_id, title, description, department, location, headcount, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *, 0::BIGINT AS hired_count
            "#,
        )
        .bind(self.tenant_id)
        .bind(request.opportunity_id)
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(&request.department)
        .bind(&request.location)
        .bind(request.headcount)
        .bind(request.status)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(position)
    }

    #[instrument(skip(self), fields(position_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let position = sqlx::query_as::<_, PositionDBResponse>(&format!(
            "SELECT p.*, {HIRED_COUNT} FROM open_positions p WHERE p.id = $1 AND p.tenant_id = $2"
        ))
        .bind(id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(position)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT p.*, {HIRED_COUNT} FROM open_positions p WHERE p.tenant_id = "));
        query.push_bind(self.tenant_id);
        push_position_filters(&mut query, filter);
        query.push(" ORDER BY p.created_at DESC, p.id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rows = query.build_query_as::<PositionDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(position_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM open_positions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(position_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let position = sqlx::query_as::<_, PositionDBResponse>(&format!(
            r#"
            WITH p AS (
                UPDATE open_positions SET
                    opportunity_id = COALESCE($3, opportunity_id),
                    title = COALESCE($4, title),
                    description = COALESCE($5, description),
                    department = COALESCE($6, department),
                    location = COALESCE($7, location),
                    headcount = COALESCE($8, headcount),
                    status = COALESCE($9, status),
                    updated_at = NOW()
                WHERE id = $1 AND tenant_id = $2
                RETURNING *
            )
            SELECT p.*, {HIRED_COUNT} FROM p
            "#
        ))
        .bind(id)
        .bind(self.tenant_id)
        .bind(request.opportunity_id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(&request.department)
        .bind(&request.location)
        .bind(request.headcount)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(position)
    }
}

impl<'c> Positions<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &PositionFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM open_positions p WHERE p.tenant_id = ");
        query.push_bind(self.tenant_id);
        push_position_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Fetch and row-lock a position for the rest of the transaction.
    #[instrument(skip(self), fields(position_id = %abbrev_uuid(&id)), err)]
    pub async fn lock_for_update(&mut self, id: PositionId) -> Result<Option<PositionDBResponse>> {
        let position = sqlx::query_as::<_, PositionDBResponse>(&format!(
            "SELECT p.*, {HIRED_COUNT} FROM open_positions p WHERE p.id = $1 AND p.tenant_id = $2 FOR UPDATE OF p"
        ))
        .bind(id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(position)
    }

    /// The id of the open position attached to an opportunity, ignoring `exclude`.
    #[instrument(skip(self), fields(opportunity_id = %abbrev_uuid(&opportunity_id)), err)]
    pub async fn open_position_for_opportunity(
        &mut self,
        opportunity_id: OpportunityId,
        exclude: Option<PositionId>,
    ) -> Result<Option<PositionId>> {
        let id = sqlx::query_scalar::<_, PositionId>(
            r#"
            SELECT id FROM open_positions
            WHERE tenant_id = $1 AND opportunity_id = $2 AND status = 'open'
              AND ($3::uuid IS NULL OR id <> $3)
            LIMIT 1
            "#,
        )
        .bind(self.tenant_id)
        .bind(opportunity_id)
        .bind(exclude)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(id)
    }

    #[instrument(skip(self), fields(position_id = %abbrev_uuid(&id)), err)]
    pub async fn set_status(&mut self, id: PositionId, status: PositionStatus) -> Result<PositionDBResponse> {
        self.update(
            id,
            &PositionUpdateDBRequest {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::opportunities::OpportunityStage;
    use crate::db::handlers::opportunities::Opportunities;
    use crate::db::models::opportunities::OpportunityCreateDBRequest;
    use crate::test_utils::create_test_tenant;
    use sqlx::PgPool;

    fn request(title: &str, opportunity_id: Option<OpportunityId>, status: PositionStatus) -> PositionCreateDBRequest {
        PositionCreateDBRequest {
            opportunity_id,
            title: title.to_string(),
            description: None,
            department: Some("Engineering".to_string()),
            location: Some("Remote".to_string()),
            headcount: 2,
            status,
            created_by: None,
        }
    }

    async fn opportunity(conn: &mut PgConnection, tenant: TenantId) -> OpportunityId {
        Opportunities::new(conn, tenant)
            .create(&OpportunityCreateDBRequest {
                name: "Deal".to_string(),
                client_name: "Initech".to_string(),
                stage: OpportunityStage::Qualified,
                estimated_value: None,
                owner_id: None,
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_update_list(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Positions::new(&mut conn, tenant);

        let created = repo.create(&request("Backend engineer", None, PositionStatus::Open)).await.unwrap();
        assert_eq!(created.hired_count, 0);
        assert_eq!(created.headcount, 2);

        let held = repo.set_status(created.id, PositionStatus::OnHold).await.unwrap();
        assert_eq!(held.status, PositionStatus::OnHold);
        assert_eq!(held.title, "Backend engineer");

        repo.create(&request("Designer", None, PositionStatus::Open)).await.unwrap();

        let mut filter = PositionFilter::new(0, 10);
        filter.search = Some("backend".to_string());
        assert_eq!(repo.count(&filter).await.unwrap(), 1);

        let mut filter = PositionFilter::new(0, 10);
        filter.status = Some(PositionStatus::Open);
        let open = repo.list(&filter).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "Designer");
    }

    #[sqlx::test]
    async fn test_one_open_position_per_opportunity_index(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let mut conn = pool.acquire().await.unwrap();
        let opp = opportunity(&mut conn, tenant).await;

        let mut repo = Positions::new(&mut conn, tenant);
        let first = repo.create(&request("First", Some(opp), PositionStatus::Open)).await.unwrap();
        assert_eq!(repo.open_position_for_opportunity(opp, None).await.unwrap(), Some(first.id));
        assert_eq!(repo.open_position_for_opportunity(opp, Some(first.id)).await.unwrap(), None);

        // A held position can coexist with the open one
        let held = repo.create(&request("Second", Some(opp), PositionStatus::OnHold)).await.unwrap();

        // The partial unique index rejects a second open one even without the application check
        let err = repo.set_status(held.id, PositionStatus::Open).await.unwrap_err();
        assert!(err.is_unique_violation());

        let mut filter = PositionFilter::new(0, 10);
        filter.opportunity_id = Some(opp);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);
    }
}
