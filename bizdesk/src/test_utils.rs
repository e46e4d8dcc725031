//! Test utilities for integration testing (available with `test-utils` feature).

use crate::auth::session;
use crate::config::{Config, EmailConfig, EmailTransportConfig, NativeAuthConfig, PasswordConfig, SessionConfig};
use crate::db::handlers::{Candidates, Repository, Tenants, Users};
use crate::db::models::{
    candidates::{CandidateCreateDBRequest, CandidateDBResponse},
    tenants::TenantCreateDBRequest,
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::TenantId;
use crate::{AppState, api::models::users::CurrentUser, api::models::users::Role};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("bizdesk-test-emails-{}", std::process::id()));

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: crate::config::AuthConfig {
            native: NativeAuthConfig {
                allow_registration: true,
                password: PasswordConfig {
                    // Cheap hashing keeps the suite fast
                    argon2_memory_kib: 1024,
                    argon2_iterations: 1,
                    argon2_parallelism: 1,
                    ..Default::default()
                },
                session: SessionConfig {
                    cookie_secure: false,
                    ..Default::default()
                },
            },
            ..Default::default()
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: temp_dir.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn create_test_state(pool: PgPool) -> AppState {
    AppState::builder().db(pool).config(create_test_config()).build()
}

pub async fn create_test_tenant(pool: &PgPool, slug: &str) -> TenantId {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut tenants = Tenants::new(&mut conn);
    let tenant = tenants
        .create(&TenantCreateDBRequest {
            name: format!("Tenant {slug}"),
            slug: slug.to_string(),
        })
        .await
        .expect("Failed to create test tenant");
    tenant.id
}

pub async fn create_test_user(pool: &PgPool, tenant_id: TenantId, role: Role) -> UserDBResponse {
    create_test_user_with_roles(pool, tenant_id, vec![role]).await
}

pub async fn create_test_user_with_roles(pool: &PgPool, tenant_id: TenantId, roles: Vec<Role>) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn, tenant_id);
    let username = format!("testuser_{}", Uuid::new_v4().simple());
    let email = format!("{username}@example.com");

    let user_create = UserCreateDBRequest {
        username,
        email,
        display_name: Some("Test User".to_string()),
        roles,
        auth_source: "test".to_string(),
        password_hash: None,
    };

    users_repo.create(&user_create).await.expect("Failed to create test user")
}

pub async fn create_test_candidate(pool: &PgPool, tenant_id: TenantId) -> CandidateDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut candidates = Candidates::new(&mut conn, tenant_id);
    let suffix = Uuid::new_v4().simple().to_string();

    candidates
        .create(&CandidateCreateDBRequest {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: format!("grace_{suffix}@example.com"),
            phone: None,
            source: Some("referral".to_string()),
            summary: None,
            tags: vec!["rust".to_string()],
            created_by: None,
        })
        .await
        .expect("Failed to create test candidate")
}

/// `Authorization: Bearer <jwt>` for a test user, signed with the test config's key.
pub fn add_auth_headers(user: &UserDBResponse) -> (String, String) {
    let config = create_test_config();
    let current = CurrentUser::from(user.clone());
    let token = session::create_session_token(&current, &config).expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}
