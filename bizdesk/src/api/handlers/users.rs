use crate::{
    AppState,
    api::models::{
        notes::USERNAME,
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, Role, UserCreate, UserResponse, UserUpdate},
    },
    auth::{
        password::{self, Argon2Params},
        permissions::{RequiresPermission, can_read_all_resources, can_read_own_resource, operation, resource},
    },
    db::{
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::Error,
    types::{Operation, Permission, Resource, UserId, UserIdOrCurrent},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

fn validate_roles(roles: &[Role]) -> Result<(), Error> {
    if roles.is_empty() {
        return Err(Error::bad_request("A user needs at least one role"));
    }
    Ok(())
}

// GET /users - List users in the caller's organisation
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    description = "List the users of the caller's organisation (admin only)",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin access required"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    current_user: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<UserResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let filter = UserFilter::new(skip, limit).with_search(query.search).with_role(query.role);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn, current_user.tenant_id);
    let users = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

// GET /users/{user_id} - Get specific user or current user
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Get user",
    description = "Get a specific user by ID or the caller via 'current'",
    params(
        ("user_id" = String, Path, description = "User ID (UUID) or 'current' for current user"),
    ),
    responses(
        (status = 200, description = "User information", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - can only view own user data unless admin"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserIdOrCurrent>,
    // Can't use RequiresPermission here because we need conditional logic for own vs other users
    current_user: CurrentUser,
) -> Result<Json<UserResponse>, Error> {
    let target_user_id = match user_id {
        UserIdOrCurrent::Current(_) => {
            if !can_read_own_resource(&current_user, Resource::Users, current_user.id) {
                return Err(Error::InsufficientPermissions {
                    required: Permission::Allow(Resource::Users, Operation::ReadOwn),
                    action: Operation::ReadOwn,
                    resource: "current user data".to_string(),
                });
            }
            current_user.id
        }
        UserIdOrCurrent::Id(uuid) => {
            let can_read_all_users = can_read_all_resources(&current_user, Resource::Users);
            let can_read_own_user = can_read_own_resource(&current_user, Resource::Users, uuid);

            if !can_read_all_users && !can_read_own_user {
                return Err(Error::InsufficientPermissions {
                    required: Permission::Any(vec![
                        Permission::Allow(Resource::Users, Operation::ReadAll),
                        Permission::Allow(Resource::Users, Operation::ReadOwn),
                    ]),
                    action: Operation::ReadAll,
                    resource: format!("user data for user {uuid}"),
                });
            }
            uuid
        }
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn, current_user.tenant_id);

    let user = repo
        .get_by_id(target_user_id)
        .await?
        .ok_or_else(|| Error::not_found("User", target_user_id))?;

    Ok(Json(UserResponse::from(user)))
}

// POST /users - Create user (admin only)
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    description = "Create a user in the caller's organisation (admin only)",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Bad request - invalid user data"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin access required"),
        (status = 409, description = "Email or username already taken"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Users, operation::CreateAll>,
    Json(user_data): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), Error> {
    if !USERNAME.is_match(&user_data.username) {
        return Err(Error::bad_request(
            "Username must start with a letter or digit and contain only letters, digits, '.', '_' or '-'",
        ));
    }
    let email = user_data.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::bad_request("A valid email address is required"));
    }
    validate_roles(&user_data.roles)?;

    let password_hash = match user_data.password {
        Some(password) => {
            password::validate_password(&password, &state.config.auth.native.password)?;
            Some(password::hash_password(password, Argon2Params::from(&state.config.auth.native.password)).await?)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn, current_user.tenant_id);

    if repo.email_taken(&email).await? {
        return Err(Error::conflict("user", "An account with this email address already exists"));
    }
    if repo.username_taken(&user_data.username).await? {
        return Err(Error::conflict("user", "This username is already taken"));
    }

    let user = repo
        .create(&UserCreateDBRequest {
            username: user_data.username,
            email,
            display_name: user_data.display_name,
            roles: user_data.roles,
            auth_source: "native".to_string(),
            password_hash,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

// PATCH /users/{user_id} - Update user (admin only)
#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update user",
    description = "Update display name, roles or password (admin only)",
    request_body = UserUpdate,
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID to update"),
    ),
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Bad request - invalid user data"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin access required"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::UpdateAll>,
    Json(user_data): Json<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    if let Some(roles) = &user_data.roles {
        validate_roles(roles)?;
        if user_id == current_user.id && current_user.is_admin() && !roles.contains(&Role::Admin) {
            return Err(Error::bad_request("You cannot remove your own admin role"));
        }
    }

    let password_hash = match user_data.password {
        Some(password) => {
            password::validate_password(&password, &state.config.auth.native.password)?;
            Some(password::hash_password(password, Argon2Params::from(&state.config.auth.native.password)).await?)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn, current_user.tenant_id);

    let db_request = UserUpdateDBRequest {
        display_name: user_data.display_name,
        roles: user_data.roles,
        password_hash,
    };

    let user = repo.update(user_id, &db_request).await.map_err(|e| match e {
        crate::db::errors::DbError::NotFound => Error::not_found("User", user_id),
        other => Error::Database(other),
    })?;
    Ok(Json(UserResponse::from(user)))
}

// DELETE /users/{user_id} - Delete user (admin only)
#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Delete user",
    description = "Delete a user (admin only)",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID to delete"),
    ),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 400, description = "Bad request - cannot delete yourself"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin access required, or last admin"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::DeleteAll>,
) -> Result<StatusCode, Error> {
    // Prevent self-deletion
    if user_id == current_user.id {
        return Err(Error::bad_request("You cannot delete your own account"));
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn, current_user.tenant_id);

    match repo.delete(user_id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::not_found("User", user_id)),
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::users::{Role, UserResponse};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_current_user_info(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let user = create_test_user(&pool, tenant, Role::Employee).await;

        let response = app
            .get("/admin/api/v1/users/current")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await;

        response.assert_status_ok();
        let current_user: UserResponse = response.json();
        assert_eq!(current_user.id, user.id);
        assert_eq!(current_user.email, user.email);
        assert_eq!(current_user.roles, user.roles);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unauthenticated_is_401(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        app.get("/admin/api/v1/users/current").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_users_is_tenant_scoped_and_paginated(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let acme = create_test_tenant(&pool, "acme").await;
        let globex = create_test_tenant(&pool, "globex").await;
        let admin = create_test_user(&pool, acme, Role::Admin).await;
        for _ in 0..3 {
            create_test_user(&pool, acme, Role::Recruiter).await;
        }
        create_test_user(&pool, globex, Role::Recruiter).await;

        let response = app
            .get("/admin/api/v1/users?limit=2")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await;

        response.assert_status_ok();
        let page: PaginatedResponse<UserResponse> = response.json();
        assert_eq!(page.total_count, 4);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.limit, 2);
        assert!(page.data.iter().all(|u| u.tenant_id == acme));

        let response = app
            .get("/admin/api/v1/users?role=recruiter&limit=1000")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await;
        let page: PaginatedResponse<UserResponse> = response.json();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.limit, 100);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_non_admin_cannot_list_or_read_others(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        let other = create_test_user(&pool, tenant, Role::Employee).await;

        app.get("/admin/api/v1/users")
            .add_header(add_auth_headers(&recruiter).0, add_auth_headers(&recruiter).1)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.get(&format!("/admin/api/v1/users/{}", other.id))
            .add_header(add_auth_headers(&recruiter).0, add_auth_headers(&recruiter).1)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.get(&format!("/admin/api/v1/users/{}", recruiter.id))
            .add_header(add_auth_headers(&recruiter).0, add_auth_headers(&recruiter).1)
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_cannot_read_users_of_other_tenants(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let acme = create_test_tenant(&pool, "acme").await;
        let globex = create_test_tenant(&pool, "globex").await;
        let admin = create_test_user(&pool, acme, Role::Admin).await;
        let outsider = create_test_user(&pool, globex, Role::Admin).await;

        app.get(&format!("/admin/api/v1/users/{}", outsider.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_checks_uniqueness(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;

        let response = app
            .post("/admin/api/v1/users")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({
                "username": "grace",
                "email": "Grace@Example.com",
                "display_name": "Grace Hopper",
                "password": "password123",
                "roles": ["recruiter", "hr_manager"]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: UserResponse = response.json();
        assert_eq!(created.email, "grace@example.com");
        assert_eq!(created.tenant_id, tenant);
        assert!(created.roles.contains(&Role::HrManager));

        let response = app
            .post("/admin/api/v1/users")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"username": "grace2", "email": "grace@example.com", "roles": ["recruiter"]}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["resource"], "user");

        app.post("/admin/api/v1/users")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"username": "grace", "email": "other@example.com", "roles": ["recruiter"]}))
            .await
            .assert_status(StatusCode::CONFLICT);

        app.post("/admin/api/v1/users")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"username": "@bad name", "email": "bad@example.com", "roles": ["recruiter"]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/admin/api/v1/users")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"username": "noroles", "email": "noroles@example.com", "roles": []}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_user_roles(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let user = create_test_user(&pool, tenant, Role::Employee).await;

        let response = app
            .patch(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"display_name": "Promoted", "roles": ["sales_manager"]}))
            .await;
        response.assert_status_ok();
        let updated: UserResponse = response.json();
        assert_eq!(updated.display_name.as_deref(), Some("Promoted"));
        assert_eq!(updated.roles, vec![Role::SalesManager]);

        app.patch(&format!("/admin/api/v1/users/{}", admin.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"roles": ["recruiter"]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.patch(&format!("/admin/api/v1/users/{}", uuid::Uuid::new_v4()))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"display_name": "Ghost"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_user(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let user = create_test_user(&pool, tenant, Role::Employee).await;

        app.delete(&format!("/admin/api/v1/users/{}", admin.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.delete(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        app.delete(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
