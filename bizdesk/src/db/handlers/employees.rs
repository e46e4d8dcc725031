//! Database repository for employees.

use crate::api::models::employees::EmployeeStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::employees::{EmployeeCreateDBRequest, EmployeeDBResponse, EmployeeUpdateDBRequest},
};
use crate::types::{CandidateId, EmployeeId, TenantId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub status: Option<EmployeeStatus>,
    pub department: Option<String>,
}

impl EmployeeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct Employees<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

fn push_employee_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &EmployeeFilter) {
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query.push(" AND (LOWER(first_name || ' ' || last_name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(email) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(job_title) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(department) = filter.department.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        query.push(" AND LOWER(department) = LOWER(");
        query.push_bind(department.to_string());
        query.push(")");
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Employees<'c> {
    type CreateRequest = EmployeeCreateDBRequest;
    type UpdateRequest = EmployeeUpdateDBRequest;
    type Response = EmployeeDBResponse;
    type Id = EmployeeId;
    type Filter = EmployeeFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let employee = sqlx::query_as::<_, EmployeeDBResponse>(
            r#"
            INSERT INTO employees (tenant_id, user_id, candidate_id, first_name, last_name, email, job_title,
                                   department, employment_type, start_date, manager_id)
            VALUES ($1, $2, $3, $4, $5, LOWER($6), $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(request.user_id)
        .bind(request.candidate_id)
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(request.email.trim())
        .bind(request.job_title.trim())
        .bind(&request.department)
        .bind(request.employment_type)
        .bind(request.start_date)
        .bind(request.manager_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(employee)
    }

    #[instrument(skip(self), fields(employee_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let employee = sqlx::query_as::<_, EmployeeDBResponse>("SELECT * FROM employees WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(employee)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM employees WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_employee_filters(&mut query, filter);
        query.push(" ORDER BY last_name, first_name, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rows = query.build_query_as::<EmployeeDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(employee_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(employee_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let employee = sqlx::query_as::<_, EmployeeDBResponse>(
            r#"
            UPDATE employees SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                job_title = COALESCE($5, job_title),
                department = COALESCE($6, department),
                employment_type = COALESCE($7, employment_type),
                start_date = COALESCE($8, start_date),
                status = COALESCE($9, status),
                manager_id = COALESCE($10, manager_id),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(self.tenant_id)
        .bind(request.first_name.as_deref().map(str::trim))
        .bind(request.last_name.as_deref().map(str::trim))
        .bind(request.job_title.as_deref().map(str::trim))
        .bind(&request.department)
        .bind(request.employment_type)
        .bind(request.start_date)
        .bind(request.status)
        .bind(request.manager_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(employee)
    }
}

impl<'c> Employees<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &EmployeeFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM employees WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_employee_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_by_user(&mut self, user_id: UserId) -> Result<Option<EmployeeDBResponse>> {
        let employee = sqlx::query_as::<_, EmployeeDBResponse>("SELECT * FROM employees WHERE user_id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(self.tenant_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(employee)
    }

    #[instrument(skip(self), fields(candidate_id = %abbrev_uuid(&candidate_id)), err)]
    pub async fn get_by_candidate(&mut self, candidate_id: CandidateId) -> Result<Option<EmployeeDBResponse>> {
        let employee =
            sqlx::query_as::<_, EmployeeDBResponse>("SELECT * FROM employees WHERE candidate_id = $1 AND tenant_id = $2")
                .bind(candidate_id)
                .bind(self.tenant_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(employee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::employees::EmploymentType;
    use crate::api::models::users::Role;
    use crate::test_utils::{create_test_tenant, create_test_user};
    use chrono::NaiveDate;
    use sqlx::PgPool;

    fn request(user_id: UserId, first: &str, department: &str) -> EmployeeCreateDBRequest {
        EmployeeCreateDBRequest {
            user_id,
            candidate_id: None,
            first_name: first.to_string(),
            last_name: "Hopper".to_string(),
            email: format!("{first}@Example.com"),
            job_title: "Engineer".to_string(),
            department: Some(department.to_string()),
            employment_type: EmploymentType::FullTime,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            manager_id: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_update_and_filters(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let grace = create_test_user(&pool, tenant, Role::Employee).await;
        let alan = create_test_user(&pool, tenant, Role::Employee).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Employees::new(&mut conn, tenant);

        let boss = repo.create(&request(grace.id, "grace", "Engineering")).await.unwrap();
        assert_eq!(boss.email, "grace@example.com");
        assert_eq!(boss.status, EmployeeStatus::Active);

        let report = repo.create(&request(alan.id, "alan", "Research")).await.unwrap();
        let updated = repo
            .update(
                report.id,
                &EmployeeUpdateDBRequest {
                    manager_id: Some(boss.id),
                    status: Some(EmployeeStatus::OnLeave),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.manager_id, Some(boss.id));
        assert_eq!(updated.status, EmployeeStatus::OnLeave);

        let mut filter = EmployeeFilter::new(0, 10);
        filter.department = Some("engineering".to_string());
        assert_eq!(repo.count(&filter).await.unwrap(), 1);

        let mut filter = EmployeeFilter::new(0, 10);
        filter.status = Some(EmployeeStatus::OnLeave);
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, report.id);

        assert_eq!(repo.get_by_user(grace.id).await.unwrap().map(|e| e.id), Some(boss.id));
    }

    #[sqlx::test]
    async fn test_user_can_only_be_one_employee(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let user = create_test_user(&pool, tenant, Role::Employee).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Employees::new(&mut conn, tenant);

        repo.create(&request(user.id, "grace", "Engineering")).await.unwrap();
        let err = repo.create(&request(user.id, "grace2", "Engineering")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }
}
