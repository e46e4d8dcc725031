//! # bizdesk: multi-tenant CRM, recruitment and HR backend
//!
//! `bizdesk` is the API server behind a small-business back office. One deployment serves many
//! organisations (tenants); every row belongs to exactly one tenant and every query is scoped to
//! the caller's tenant.
//!
//! ## What It Does
//!
//! - **CRM**: sales opportunities moving through `lead -> qualified -> proposal` and closing as
//!   won or lost.
//! - **Recruitment**: positions opened against opportunities, candidates, and a per-position
//!   pipeline (`applied -> screening -> interview -> offer -> hired`) shown as a Kanban board.
//!   Hiring up to a position's headcount fills it.
//! - **HR**: employee records, reporting lines, and converting a hired candidate into an
//!   employee (with a login) in one transaction.
//! - **Email templates**: a block editor backend. Blocks compile to email-safe HTML, HTML parses
//!   back to blocks, and templates render with candidate merge fields before sending.
//! - **Collaboration**: notes on candidates with `@username` mentions that raise in-app
//!   notifications and emails.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. There is no in-process shared state beyond the pool and
//! configuration; correctness relies on database transactions and row locks.
//!
//! ### Request Flow
//!
//! Requests to the management API (`/admin/api/v1/*`) carry a JWT session, either as the
//! session cookie set at login or as an `Authorization: Bearer` header. The
//! [`auth::permissions::RequiresPermission`] extractor resolves the caller and checks their roles
//! before the handler runs. Handlers talk to the database through tenant-scoped repositories in
//! [`db::handlers`], opening a transaction whenever more than one row changes.
//!
//! ### Core Components
//!
//! - [`api`]: route handlers and request/response models
//! - [`auth`]: sessions, password hashing and role-based permissions
//! - [`db`]: repositories, row models and error classification
//! - [`templates`]: the block model, compiler, HTML parser and renderer
//! - [`email`]: outgoing mail over SMTP or to files
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use bizdesk::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = bizdesk::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     bizdesk::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations are embedded and run on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! bizdesk::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
mod email;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod templates;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::{
        password::{self, Argon2Params},
        utils::username_from_email,
    },
    config::CorsOrigin,
    db::{
        handlers::{Repository, Tenants, Users},
        models::{
            tenants::TenantCreateDBRequest,
            users::{UserCreateDBRequest, UserUpdateDBRequest},
        },
    },
    openapi::ApiDoc,
};
use axum::{
    Json, Router,
    http::{self, HeaderName, HeaderValue},
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{CandidateId, EmployeeId, OpportunityId, PositionId, TenantId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the bizdesk database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Make sure the default tenant and its admin user exist.
///
/// Idempotent: the tenant is looked up by slug and the admin by email within it. When the admin
/// already exists and a password is configured, the password is reset to it.
///
/// Returns the admin's user id.
#[instrument(skip_all)]
pub async fn bootstrap(config: &Config, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match config.admin_password.as_deref() {
        Some(pwd) => Some(password::hash_password(pwd.to_string(), Argon2Params::from(&config.auth.native.password)).await?),
        None => None,
    };
    let email = config.admin_email.trim().to_lowercase();

    let mut tx = db.begin().await?;

    let tenant = {
        let mut tenants = Tenants::new(&mut tx);
        match tenants.get_by_slug(&config.default_tenant.slug).await? {
            Some(tenant) => tenant,
            None => {
                info!(slug = %config.default_tenant.slug, "Creating default tenant");
                tenants
                    .create(&TenantCreateDBRequest {
                        name: config.default_tenant.name.clone(),
                        slug: config.default_tenant.slug.clone(),
                    })
                    .await?
            }
        }
    };

    let mut users = Users::new(&mut tx, tenant.id);
    let admin_id = match users.get_user_by_email(&email).await? {
        Some(existing) => {
            if password_hash.is_some() {
                users
                    .update(
                        existing.id,
                        &UserUpdateDBRequest {
                            password_hash,
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            existing.id
        }
        None => {
            let created = users
                .create(&UserCreateDBRequest {
                    username: username_from_email(&email),
                    email,
                    display_name: None,
                    roles: vec![Role::Admin],
                    auth_source: "system".to_string(),
                    password_hash,
                })
                .await?;
            info!(user_id = %created.id, "Created initial admin user");
            created.id
        }
    };

    tx.commit().await?;
    Ok(admin_id)
}

/// Connect to the configured database
async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .database_url()
        .ok_or_else(|| anyhow::anyhow!("No database URL configured"))?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;

    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Url::as_str keeps a trailing slash that browsers never send in Origin
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut exposed = vec![http::header::LOCATION];
    for name in &cors_config.exposed_headers {
        let header = name.parse::<HeaderName>()?;
        if !exposed.contains(&header) {
            exposed.push(header);
        }
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(exposed);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Authentication routes under `/authentication`
/// - The management API under `/admin/api/v1`
/// - OpenAPI JSON and Scalar docs
/// - `/healthz`, and `/internal/metrics` when metrics are enabled
/// - CORS and request tracing
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{
        auth, candidates, config, employees, notes, notifications, opportunities, pipeline, positions, templates, users,
    };

    let auth_routes = Router::new()
        .route("/authentication/register", get(auth::get_registration_info).post(auth::register))
        .route("/authentication/login", post(auth::login))
        .route("/authentication/logout", post(auth::logout))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/config", get(config::get_config))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{user_id}",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        // Candidates
        .route("/candidates", get(candidates::list_candidates).post(candidates::create_candidate))
        .route(
            "/candidates/{id}",
            get(candidates::get_candidate)
                .patch(candidates::update_candidate)
                .delete(candidates::delete_candidate),
        )
        .route("/candidates/{id}/positions", get(pipeline::list_candidate_positions))
        .route("/candidates/{id}/convert", post(employees::convert_candidate))
        .route("/candidates/{id}/notes", get(notes::list_notes).post(notes::create_note))
        // Opportunities
        .route(
            "/opportunities",
            get(opportunities::list_opportunities).post(opportunities::create_opportunity),
        )
        .route(
            "/opportunities/{id}",
            get(opportunities::get_opportunity)
                .patch(opportunities::update_opportunity)
                .delete(opportunities::delete_opportunity),
        )
        // Positions and pipeline
        .route("/positions", get(positions::list_positions).post(positions::create_position))
        .route(
            "/positions/{id}",
            get(positions::get_position)
                .patch(positions::update_position)
                .delete(positions::delete_position),
        )
        .route("/positions/{id}/pipeline", post(pipeline::add_to_pipeline))
        .route("/positions/{id}/board", get(pipeline::get_board))
        .route("/pipeline/{id}", patch(pipeline::move_entry).delete(pipeline::remove_entry))
        // Employees
        .route("/employees", get(employees::list_employees).post(employees::create_employee))
        .route("/employees/me", get(employees::get_own_employee))
        .route(
            "/employees/{id}",
            get(employees::get_employee)
                .patch(employees::update_employee)
                .delete(employees::delete_employee),
        )
        // Templates
        .route("/templates", get(templates::list_templates).post(templates::create_template))
        .route("/templates/compile", post(templates::compile_blocks))
        .route("/templates/parse", post(templates::parse_html))
        .route(
            "/templates/{id}",
            get(templates::get_template)
                .patch(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/templates/{id}/render", post(templates::render_template))
        .route("/templates/{id}/send", post(templates::send_template))
        // Notes and notifications
        .route("/notes/{id}", delete(notes::delete_note))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_notifications_read))
        .route("/notifications/{id}/read", patch(notifications::mark_notification_read))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/admin/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(auth_routes)
        .nest("/admin/api/v1", api_routes)
        .merge(Scalar::with_url("/admin/docs", ApiDoc::openapi()));

    let mut router = router;
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(cors_layer),
    );

    Ok(router)
}

/// Main application struct that owns the router, configuration and pool.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects, runs migrations and bootstraps the default
///    tenant and admin user
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves, then closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance, connecting to the configured database
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create a new application instance, reusing `pool` when given
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting bizdesk with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => connect(&config).await?,
        };
        migrator().run(&pool).await?;
        bootstrap(&config, &pool).await?;

        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("bizdesk listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
