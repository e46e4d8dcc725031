//! Database repository for tenants.
//!
//! Tenants are not scoped by anything, so this repository does not implement
//! [`Repository`](super::Repository); it only covers what bootstrap and registration need.

use crate::db::{
    errors::Result,
    models::tenants::{TenantCreateDBRequest, TenantDBResponse},
};
use crate::types::{TenantId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Tenants<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tenants<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(slug = %request.slug), err)]
    pub async fn create(&mut self, request: &TenantCreateDBRequest) -> Result<TenantDBResponse> {
        let tenant = sqlx::query_as::<_, TenantDBResponse>("INSERT INTO tenants (name, slug) VALUES ($1, $2) RETURNING *")
            .bind(request.name.trim())
            .bind(request.slug.trim().to_lowercase())
            .fetch_one(&mut *self.db)
            .await?;
        Ok(tenant)
    }

    #[instrument(skip(self), fields(tenant_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: TenantId) -> Result<Option<TenantDBResponse>> {
        let tenant = sqlx::query_as::<_, TenantDBResponse>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(tenant)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_slug(&mut self, slug: &str) -> Result<Option<TenantDBResponse>> {
        let tenant = sqlx::query_as::<_, TenantDBResponse>("SELECT * FROM tenants WHERE slug = LOWER($1)")
            .bind(slug.trim())
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(tenant)
    }
}

/// Derive a URL-safe slug from an organisation name: lowercase ASCII alphanumerics separated by
/// single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Corp."), "acme-corp");
        assert_eq!(slugify("  Globex -- International  "), "globex-international");
        assert_eq!(slugify("Ünïcode Ltd"), "n-code-ltd");
        assert_eq!(slugify("!!!"), "");
    }

    #[sqlx::test]
    async fn test_create_and_lookup(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tenants::new(&mut conn);

        let tenant = repo
            .create(&TenantCreateDBRequest {
                name: "Acme".to_string(),
                slug: "ACME".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(tenant.slug, "acme");

        let by_slug = repo.get_by_slug("Acme").await.unwrap().unwrap();
        assert_eq!(by_slug.id, tenant.id);
        assert!(repo.get_by_id(tenant.id).await.unwrap().is_some());

        let dup = repo
            .create(&TenantCreateDBRequest {
                name: "Other".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap_err();
        assert!(dup.is_unique_violation());
    }
}
