use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse, RegistrationInfo},
        notes::USERNAME,
        users::{CurrentUser, Role, UserResponse},
    },
    auth::{
        password::{self, Argon2Params},
        session,
    },
    config::Config,
    db::{
        handlers::{Repository, Tenants, Users, tenants::slugify},
        models::{tenants::TenantCreateDBRequest, users::UserCreateDBRequest},
    },
    errors::Error,
};

/// Get registration information
#[utoipa::path(
    get,
    path = "/authentication/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Result<Json<RegistrationInfo>, Error> {
    let enabled = state.config.auth.native.allow_registration;
    Ok(Json(RegistrationInfo {
        enabled,
        message: if enabled {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    }))
}

/// Register a new organisation and its first admin
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "Organisation and admin created", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "Organisation slug or email already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    if !state.config.auth.native.allow_registration {
        return Err(Error::bad_request("User registration is disabled"));
    }

    let organisation_name = request.organisation_name.trim();
    if organisation_name.is_empty() {
        return Err(Error::bad_request("Organisation name is required"));
    }
    let slug = slugify(request.organisation_slug.as_deref().unwrap_or(organisation_name));
    if slug.is_empty() {
        return Err(Error::bad_request("Organisation slug must contain letters or digits"));
    }
    if !USERNAME.is_match(&request.username) {
        return Err(Error::bad_request(
            "Username must start with a letter or digit and contain only letters, digits, '.', '_' or '-'",
        ));
    }
    let email = request.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::bad_request("A valid email address is required"));
    }
    password::validate_password(&request.password, &state.config.auth.native.password)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let tenant = {
        let mut tenants = Tenants::new(&mut tx);
        if tenants.get_by_slug(&slug).await?.is_some() {
            return Err(Error::conflict("tenant", "An organisation with this slug already exists"));
        }
        tenants
            .create(&TenantCreateDBRequest {
                name: organisation_name.to_string(),
                slug,
            })
            .await?
    };

    let mut user_repo = Users::new(&mut tx, tenant.id);
    if user_repo.email_taken(&email).await? {
        return Err(Error::conflict("user", "An account with this email address already exists"));
    }

    // Hash the password on a blocking thread to avoid blocking async runtime
    let password_hash = password::hash_password(request.password, Argon2Params::from(&state.config.auth.native.password)).await?;
    let created_user = user_repo
        .create(&UserCreateDBRequest {
            username: request.username,
            email,
            display_name: request.display_name,
            roles: vec![Role::Admin],
            auth_source: "native".to_string(),
            password_hash: Some(password_hash),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!(tenant_id = %tenant.id, "Registered organisation {}", tenant.slug);

    let current_user = CurrentUser::from(created_user.clone());
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    let auth_response = AuthResponse {
        user: UserResponse::from(created_user),
        token,
        message: "Registration successful".to_string(),
    };

    Ok(RegisterResponse { auth_response, cookie })
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let invalid = || Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Emails are globally unique, so the address alone identifies the tenant
    let user = Users::find_for_login(&mut pool_conn, &request.email).await?.ok_or_else(invalid)?;
    let hash = user.password_hash.clone().ok_or_else(invalid)?;

    if !password::verify_password(request.password, hash).await? {
        return Err(invalid());
    }

    Users::new(&mut pool_conn, user.tenant_id).record_login(user.id).await?;

    let current_user = CurrentUser::from(user.clone());
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    let auth_response = AuthResponse {
        user: UserResponse::from(user),
        token,
        message: "Login successful".to_string(),
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    // Create expired cookie to clear session
    let cookie = format!(
        "{}=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0",
        state.config.auth.native.session.cookie_name
    );

    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };

    Ok(LogoutResponse { auth_response, cookie })
}

/// Helper function to create a session cookie
fn create_session_cookie(token: &str, config: &Config) -> String {
    let session_config = &config.auth.native.session;
    let max_age = session_config.timeout.as_secs();
    let secure = if session_config.cookie_secure { "; Secure" } else { "" };

    format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        session_config.cookie_name, token, secure, session_config.cookie_same_site, max_age
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_config, create_test_tenant, create_test_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use sqlx::PgPool;

    fn server(pool: PgPool, config: Config) -> TestServer {
        let state = AppState::builder().db(pool).config(config).build();
        let app = axum::Router::new()
            .route("/auth/register", axum::routing::get(get_registration_info).post(register))
            .route("/auth/login", axum::routing::post(login))
            .route("/auth/logout", axum::routing::post(logout))
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    fn registration(slug: Option<&str>, email: &str) -> RegisterRequest {
        RegisterRequest {
            organisation_name: "Acme Corp".to_string(),
            organisation_slug: slug.map(str::to_string),
            username: "ada".to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            display_name: Some("Ada".to_string()),
        }
    }

    async fn set_password(pool: &PgPool, user_id: uuid::Uuid, password: &str) {
        let config = create_test_config();
        let hash = password::hash_password(password.to_string(), Argon2Params::from(&config.auth.native.password))
            .await
            .unwrap();
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(user_id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[sqlx::test]
    async fn test_register_creates_tenant_and_admin(pool: PgPool) {
        let server = server(pool.clone(), create_test_config());

        let response = server.post("/auth/register").json(&registration(None, "Ada@Example.com")).await;

        response.assert_status(StatusCode::CREATED);
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("bizdesk_session="));
        assert!(cookie.contains("HttpOnly"));

        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "ada@example.com");
        assert_eq!(body.user.roles, vec![Role::Admin]);
        assert_eq!(body.message, "Registration successful");

        let verified = session::verify_session_token(&body.token, &create_test_config()).unwrap();
        assert_eq!(verified.tenant_id, body.user.tenant_id);

        let mut conn = pool.acquire().await.unwrap();
        let tenant = Tenants::new(&mut conn).get_by_slug("acme-corp").await.unwrap().unwrap();
        assert_eq!(tenant.id, body.user.tenant_id);
        assert_eq!(tenant.name, "Acme Corp");
    }

    #[sqlx::test]
    async fn test_register_disabled(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.native.allow_registration = false;
        let server = server(pool, config);

        let info: RegistrationInfo = server.get("/auth/register").await.json();
        assert!(!info.enabled);

        let response = server.post("/auth/register").json(&registration(None, "ada@example.com")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_register_conflicts_roll_back(pool: PgPool) {
        let server = server(pool.clone(), create_test_config());
        server
            .post("/auth/register")
            .json(&registration(Some("acme"), "ada@example.com"))
            .await
            .assert_status(StatusCode::CREATED);

        // Same slug
        server
            .post("/auth/register")
            .json(&registration(Some("acme"), "grace@example.com"))
            .await
            .assert_status(StatusCode::CONFLICT);

        // Same email, new slug: the tenant insert must not survive the failed registration
        server
            .post("/auth/register")
            .json(&registration(Some("globex"), "ADA@example.com"))
            .await
            .assert_status(StatusCode::CONFLICT);

        let mut conn = pool.acquire().await.unwrap();
        assert!(Tenants::new(&mut conn).get_by_slug("globex").await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn test_register_rejects_short_password(pool: PgPool) {
        let server = server(pool, create_test_config());
        let mut request = registration(None, "ada@example.com");
        request.password = "short".to_string();

        server.post("/auth/register").json(&request).await.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_login_success_and_failure(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let user = create_test_user(&pool, tenant, Role::Recruiter).await;
        set_password(&pool, user.id, "correct-horse").await;
        let server = server(pool.clone(), create_test_config());

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: user.email.to_uppercase(),
                password: "correct-horse".to_string(),
            })
            .await;
        response.assert_status_ok();
        assert!(response.headers().get("set-cookie").is_some());
        let body: AuthResponse = response.json();
        assert_eq!(body.user.id, user.id);
        assert!(body.user.last_login.is_none());

        let mut conn = pool.acquire().await.unwrap();
        let stored = Users::new(&mut conn, tenant).get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: user.email.clone(),
                password: "wrong".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "correct-horse".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_login_without_password_is_rejected(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let user = create_test_user(&pool, tenant, Role::Employee).await;
        let server = server(pool, create_test_config());

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: user.email,
                password: "anything".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_logout_clears_cookie(pool: PgPool) {
        let server = server(pool, create_test_config());

        let response = server.post("/auth/logout").await;

        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.starts_with("bizdesk_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_session_cookie_respects_secure_flag() {
        let mut config = create_test_config();
        config.auth.native.session.cookie_secure = true;
        let cookie = create_session_cookie("tok", &config);
        assert!(cookie.contains("; Secure;"));
        assert!(cookie.contains("Max-Age=86400"));

        config.auth.native.session.cookie_secure = false;
        assert!(!create_session_cookie("tok", &config).contains("Secure"));
    }
}
