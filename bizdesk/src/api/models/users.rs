//! API request/response models for users.

use super::pagination::Pagination;
use crate::db::models::users::UserDBResponse;
use crate::types::{TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Job function of a user within their tenant. A user may hold several.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    HrManager,
    Recruiter,
    SalesManager,
    Employee,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Optional initial password; users without one cannot log in until it is set
    pub password: Option<String>,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub roles: Option<Vec<Role>>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub tenant_id: TenantId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub roles: Vec<Role>,
    pub auth_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on display_name, username or email
    pub search: Option<String>,

    /// Only users holding this role
    pub role: Option<Role>,
}

/// The authenticated caller, as carried in the session token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub tenant_id: TenantId,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub display_name: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            username: db.username,
            email: db.email,
            display_name: db.display_name,
            roles: db.roles,
            auth_source: db.auth_source,
            created_at: db.created_at,
            updated_at: db.updated_at,
            last_login: db.last_login,
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            username: db.username,
            email: db.email,
            roles: db.roles,
            display_name: db.display_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&Role::HrManager).unwrap(), "\"hr_manager\"");
        let role: Role = serde_json::from_str("\"sales_manager\"").unwrap();
        assert_eq!(role, Role::SalesManager);
    }

    #[test]
    fn admin_is_derived_from_roles() {
        let user = CurrentUser {
            id: uuid::Uuid::new_v4(),
            tenant_id: uuid::Uuid::new_v4(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            roles: vec![Role::Recruiter, Role::Admin],
            display_name: None,
        };
        assert!(user.is_admin());
        assert!(user.has_role(Role::Recruiter));
        assert!(!user.has_role(Role::Employee));
    }
}
