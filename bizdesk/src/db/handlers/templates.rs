//! Database repository for email templates.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::templates::{TemplateCreateDBRequest, TemplateDBResponse, TemplateUpdateDBRequest},
};
use crate::types::{TemplateId, TenantId, abbrev_uuid};
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub category: Option<String>,
}

impl TemplateFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

pub struct Templates<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

fn push_template_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TemplateFilter) {
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query.push(" AND (LOWER(name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(subject) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(category) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        query.push(" AND LOWER(category) = LOWER(");
        query.push_bind(category.to_string());
        query.push(")");
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Templates<'c> {
    type CreateRequest = TemplateCreateDBRequest;
    type UpdateRequest = TemplateUpdateDBRequest;
    type Response = TemplateDBResponse;
    type Id = TemplateId;
    type Filter = TemplateFilter;

    #[instrument(skip(self, request), fields(name = %request.name, blocks = request.blocks.len()), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let template = sqlx::query_as::<_, TemplateDBResponse>(
            r#"
            INSERT INTO templates (tenant_id, name, subject, category, blocks, html, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(request.name.trim())
        .bind(&request.subject)
        .bind(&request.category)
        .bind(Json(&request.blocks))
        .bind(&request.html)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(template)
    }

    #[instrument(skip(self), fields(template_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let template = sqlx::query_as::<_, TemplateDBResponse>("SELECT * FROM templates WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(template)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM templates WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_template_filters(&mut query, filter);
        query.push(" ORDER BY name, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rows = query.build_query_as::<TemplateDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(template_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(template_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let (blocks, html) = match &request.content {
            Some((blocks, html)) => (Some(Json(blocks)), Some(html.as_str())),
            None => (None, None),
        };
        let template = sqlx::query_as::<_, TemplateDBResponse>(
            r#"
            UPDATE templates SET
                name = COALESCE($3, name),
                subject = COALESCE($4, subject),
                category = COALESCE($5, category),
                blocks = COALESCE($6, blocks),
                html = COALESCE($7, html),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(self.tenant_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.subject)
        .bind(&request.category)
        .bind(blocks)
        .bind(html)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(template)
    }
}

impl<'c> Templates<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &TemplateFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM templates WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_template_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn name_taken(&mut self, name: &str, exclude: Option<TemplateId>) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM templates
                WHERE tenant_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(self.tenant_id)
        .bind(name.trim())
        .bind(exclude)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{Align, Block, compile};
    use crate::test_utils::create_test_tenant;
    use sqlx::PgPool;

    fn request(name: &str, category: Option<&str>) -> TemplateCreateDBRequest {
        let blocks = vec![Block::Heading {
            text: format!("{name} heading"),
            level: 1,
            align: Align::Left,
            color: None,
        }];
        TemplateCreateDBRequest {
            name: name.to_string(),
            subject: format!("{name} subject"),
            category: category.map(str::to_string),
            html: compile(&blocks),
            blocks,
            created_by: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_blocks_round_trip_through_jsonb(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Templates::new(&mut conn, tenant);

        let created = repo.create(&request("Welcome", Some("onboarding"))).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.blocks.0, created.blocks.0);
        assert!(fetched.html.contains("data-block=\"heading\""));

        let new_blocks = vec![Block::Spacer { height: 10 }];
        let updated = repo
            .update(
                created.id,
                &TemplateUpdateDBRequest {
                    subject: Some("Hello again".to_string()),
                    content: Some((new_blocks.clone(), compile(&new_blocks))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.blocks.0, new_blocks);
        assert_eq!(updated.subject, "Hello again");
        assert_eq!(updated.name, "Welcome");
        assert!(updated.html.contains("data-block=\"spacer\""));
    }

    #[sqlx::test]
    async fn test_names_unique_per_tenant(pool: PgPool) {
        let acme = create_test_tenant(&pool, "acme").await;
        let globex = create_test_tenant(&pool, "globex").await;
        let mut conn = pool.acquire().await.unwrap();

        let mut repo = Templates::new(&mut conn, acme);
        let first = repo.create(&request("Offer", None)).await.unwrap();
        assert!(repo.name_taken("Offer", None).await.unwrap());
        assert!(!repo.name_taken("Offer", Some(first.id)).await.unwrap());
        let err = repo.create(&request("Offer", None)).await.unwrap_err();
        assert!(err.is_unique_violation());

        let mut other = Templates::new(&mut conn, globex);
        assert!(!other.name_taken("Offer", None).await.unwrap());
        other.create(&request("Offer", None)).await.unwrap();
    }

    #[sqlx::test]
    async fn test_list_filters(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Templates::new(&mut conn, tenant);

        repo.create(&request("Interview invite", Some("Recruiting"))).await.unwrap();
        repo.create(&request("Offer letter", Some("recruiting"))).await.unwrap();
        repo.create(&request("Monthly digest", Some("marketing"))).await.unwrap();

        let mut filter = TemplateFilter::new(0, 10);
        filter.category = Some("RECRUITING".to_string());
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let mut filter = TemplateFilter::new(0, 10);
        filter.search = Some("letter".to_string());
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Offer letter");
    }
}
