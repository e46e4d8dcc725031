//! Database repository for users.

use crate::types::{Operation, TenantId, UserId, abbrev_uuid};
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub role: Option<Role>,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            search: None,
            role: None,
        }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_role(mut self, role: Option<Role>) -> Self {
        self.role = role;
        self
    }
}

#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub auth_source: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(Vec<Role>, User)> for UserDBResponse {
    fn from((roles, user): (Vec<Role>, User)) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            auth_source: user.auth_source,
            roles,
            password_hash: user.password_hash,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

async fn roles_for(db: &mut PgConnection, user_id: UserId) -> Result<Vec<Role>> {
    let roles = sqlx::query_scalar::<_, Role>("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(roles)
}

async fn attach_roles(db: &mut PgConnection, users: Vec<User>) -> Result<Vec<UserDBResponse>> {
    if users.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
    let rows = sqlx::query_as::<_, (UserId, Role)>("SELECT user_id, role FROM user_roles WHERE user_id = ANY($1) ORDER BY role")
        .bind(&ids)
        .fetch_all(db)
        .await?;

    let mut by_user: HashMap<UserId, Vec<Role>> = HashMap::new();
    for (user_id, role) in rows {
        by_user.entry(user_id).or_default().push(role);
    }

    Ok(users
        .into_iter()
        .map(|user| {
            let roles = by_user.remove(&user.id).unwrap_or_default();
            UserDBResponse::from((roles, user))
        })
        .collect())
}

async fn insert_roles(db: &mut PgConnection, user_id: UserId, roles: &[Role]) -> Result<()> {
    for role in roles {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(role)
            .execute(&mut *db)
            .await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username, tenant_id = %abbrev_uuid(&self.tenant_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (tenant_id, username, email, display_name, auth_source, password_hash)
            VALUES ($1, $2, LOWER($3), $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(&request.username)
        .bind(request.email.trim())
        .bind(&request.display_name)
        .bind(&request.auth_source)
        .bind(&request.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        insert_roles(&mut tx, user.id, &request.roles).await?;
        let roles = roles_for(&mut tx, user.id).await?;

        tx.commit().await?;

        Ok(UserDBResponse::from((roles, user)))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let roles = roles_for(&mut *self.db, user.id).await?;
                Ok(Some(UserDBResponse::from((roles, user))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM users WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_user_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let users = query.build_query_as::<User>().fetch_all(&mut *self.db).await?;
        attach_roles(&mut *self.db, users).await
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let roles = roles_for(&mut tx, id).await?;
        if roles.contains(&Role::Admin) {
            let admins: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM user_roles ur
                JOIN users u ON u.id = ur.user_id
                WHERE u.tenant_id = $1 AND ur.role = 'admin'
                "#,
            )
            .bind(self.tenant_id)
            .fetch_one(&mut *tx)
            .await?;

            if admins <= 1 {
                return Err(DbError::ProtectedEntity {
                    operation: Operation::DeleteAll,
                    reason: "the last admin of an organisation cannot be removed".to_string(),
                    entity_type: "user".to_string(),
                    entity_id: Some(id.to_string()),
                });
            }
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(self.tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                display_name = COALESCE($3, display_name),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(self.tenant_id)
        .bind(&request.display_name)
        .bind(&request.password_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(roles) = &request.roles {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_roles(&mut tx, id, roles).await?;
        }

        let roles = roles_for(&mut tx, id).await?;
        tx.commit().await?;

        Ok(UserDBResponse::from((roles, user)))
    }
}

fn push_user_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.to_lowercase());
        query.push(" AND (LOWER(username) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(email) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(display_name, '')) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(role) = filter.role {
        query.push(" AND id IN (SELECT user_id FROM user_roles WHERE role = ");
        query.push_bind(role);
        query.push(")");
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &UserFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_user_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND tenant_id = $2")
            .bind(email.trim())
            .bind(self.tenant_id)
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let roles = roles_for(&mut *self.db, user.id).await?;
                Ok(Some(UserDBResponse::from((roles, user))))
            }
            None => Ok(None),
        }
    }

    /// Resolve usernames within the tenant, case-insensitively.
    #[instrument(skip(self, usernames), fields(count = usernames.len()), err)]
    pub async fn get_by_usernames(&mut self, usernames: &[String]) -> Result<Vec<UserDBResponse>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE tenant_id = $1 AND LOWER(username) = ANY($2)")
            .bind(self.tenant_id)
            .bind(&lowered)
            .fetch_all(&mut *self.db)
            .await?;
        attach_roles(&mut *self.db, users).await
    }

    /// Emails are unique across all tenants.
    #[instrument(skip(self, email), err)]
    pub async fn email_taken(&mut self, email: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
            .bind(email.trim())
            .fetch_one(&mut *self.db)
            .await?;
        Ok(exists)
    }

    #[instrument(skip(self), err)]
    pub async fn username_taken(&mut self, username: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE tenant_id = $1 AND username = $2)")
            .bind(self.tenant_id)
            .bind(username)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(exists)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Look a user up by email across all tenants. Used by login, which happens before the
    /// tenant is known.
    #[instrument(skip(db, email), err)]
    pub async fn find_for_login(db: &mut PgConnection, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&mut *db)
            .await?;

        match user {
            Some(user) => {
                let roles = roles_for(db, user.id).await?;
                Ok(Some(UserDBResponse::from((roles, user))))
            }
            None => Ok(None),
        }
    }
}
