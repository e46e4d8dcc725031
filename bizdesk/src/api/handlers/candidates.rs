use crate::{
    AppState,
    api::models::{
        candidates::{CandidateCreate, CandidateResponse, CandidateUpdate, ListCandidatesQuery, normalize_tags},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Candidates, Repository, candidates::CandidateFilter},
        models::candidates::{CandidateCreateDBRequest, CandidateUpdateDBRequest},
    },
    errors::{Error, Result},
    types::CandidateId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::bad_request(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace) => Ok(()),
        _ => Err(Error::bad_request(format!("'{email}' is not a valid email address"))),
    }
}

fn email_conflict() -> Error {
    Error::conflict("candidate", "A candidate with this email address already exists")
}

#[utoipa::path(
    get,
    path = "/candidates",
    tag = "candidates",
    summary = "List candidates",
    params(ListCandidatesQuery),
    responses(
        (status = 200, description = "Page of candidates", body = PaginatedResponse<CandidateResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_candidates(
    State(state): State<AppState>,
    Query(query): Query<ListCandidatesQuery>,
    current_user: RequiresPermission<resource::Candidates, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<CandidateResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = CandidateFilter {
        search: query.search,
        status: query.status,
        tag: query.tag,
        position_id: query.position_id,
        ..CandidateFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Candidates::new(&mut conn, current_user.tenant_id);
    let candidates = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = candidates.into_iter().map(CandidateResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

#[utoipa::path(
    post,
    path = "/candidates",
    tag = "candidates",
    summary = "Create candidate",
    request_body = CandidateCreate,
    responses(
        (status = 201, description = "Candidate created", body = CandidateResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A candidate with this email already exists"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_candidate(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Candidates, operation::CreateAll>,
    Json(create): Json<CandidateCreate>,
) -> Result<(StatusCode, Json<CandidateResponse>)> {
    require_text("first_name", &create.first_name)?;
    require_text("last_name", &create.last_name)?;
    require_email(&create.email)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Candidates::new(&mut conn, current_user.tenant_id);

    if repo.email_exists(&create.email, None).await? {
        return Err(email_conflict());
    }

    let candidate = repo
        .create(&CandidateCreateDBRequest {
            first_name: create.first_name,
            last_name: create.last_name,
            email: create.email,
            phone: create.phone,
            source: create.source,
            summary: create.summary,
            tags: normalize_tags(create.tags),
            created_by: Some(current_user.id),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CandidateResponse::from(candidate))))
}

#[utoipa::path(
    get,
    path = "/candidates/{id}",
    tag = "candidates",
    summary = "Get candidate",
    params(
        ("id" = uuid::Uuid, Path, description = "Candidate ID"),
    ),
    responses(
        (status = 200, description = "Candidate", body = CandidateResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Candidate not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_candidate(
    State(state): State<AppState>,
    Path(id): Path<CandidateId>,
    current_user: RequiresPermission<resource::Candidates, operation::ReadAll>,
) -> Result<Json<CandidateResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Candidates::new(&mut conn, current_user.tenant_id);

    match repo.get_by_id(id).await? {
        Some(candidate) => Ok(Json(CandidateResponse::from(candidate))),
        None => Err(Error::not_found("Candidate", id)),
    }
}

#[utoipa::path(
    patch,
    path = "/candidates/{id}",
    tag = "candidates",
    summary = "Update candidate",
    description = "Partial update. Status changes must follow new → active → hired | archived, with archived → active allowed.",
    request_body = CandidateUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Candidate ID"),
    ),
    responses(
        (status = 200, description = "Candidate updated", body = CandidateResponse),
        (status = 400, description = "Invalid request or status transition"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Candidate not found"),
        (status = 409, description = "A candidate with this email already exists"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_candidate(
    State(state): State<AppState>,
    Path(id): Path<CandidateId>,
    current_user: RequiresPermission<resource::Candidates, operation::UpdateAll>,
    Json(update): Json<CandidateUpdate>,
) -> Result<Json<CandidateResponse>> {
    if let Some(first_name) = &update.first_name {
        require_text("first_name", first_name)?;
    }
    if let Some(last_name) = &update.last_name {
        require_text("last_name", last_name)?;
    }
    if let Some(email) = &update.email {
        require_email(email)?;
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Candidates::new(&mut tx, current_user.tenant_id);

    let existing = repo.get_for_update(id).await?.ok_or_else(|| Error::not_found("Candidate", id))?;

    if let Some(email) = &update.email
        && !email.trim().eq_ignore_ascii_case(&existing.email)
        && repo.email_exists(email, Some(id)).await?
    {
        return Err(email_conflict());
    }

    // Re-sending the current status is a no-op rather than an invalid transition
    let status = update.status.filter(|s| *s != existing.status);
    if let Some(next) = status
        && !existing.status.can_transition_to(next)
    {
        return Err(Error::bad_request(format!(
            "Cannot move candidate from {:?} to {:?}",
            existing.status, next
        )));
    }

    let candidate = repo
        .update(
            id,
            &CandidateUpdateDBRequest {
                first_name: update.first_name,
                last_name: update.last_name,
                email: update.email,
                phone: update.phone,
                source: update.source,
                summary: update.summary,
                tags: update.tags.map(normalize_tags),
                status,
            },
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(CandidateResponse::from(candidate)))
}

#[utoipa::path(
    delete,
    path = "/candidates/{id}",
    tag = "candidates",
    summary = "Delete candidate",
    description = "Soft delete: the candidate disappears from lists and lookups but the row is kept.",
    params(
        ("id" = uuid::Uuid, Path, description = "Candidate ID"),
    ),
    responses(
        (status = 204, description = "Candidate deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Candidate not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_candidate(
    State(state): State<AppState>,
    Path(id): Path<CandidateId>,
    current_user: RequiresPermission<resource::Candidates, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Candidates::new(&mut conn, current_user.tenant_id);

    match repo.delete(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::not_found("Candidate", id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::candidates::CandidateStatus;
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn test_email_validation() {
        assert!(require_email("ada@example.com").is_ok());
        assert!(require_email(" ada@example.com ").is_ok());
        assert!(require_email("ada").is_err());
        assert!(require_email("@example.com").is_err());
        assert!(require_email("ada @example.com").is_err());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_candidate_and_duplicate_email(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;

        let response = app
            .post("/admin/api/v1/candidates")
            .add_header(add_auth_headers(&recruiter).0, add_auth_headers(&recruiter).1)
            .json(&json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "tags": ["Rust", " rust ", "", "math"]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: CandidateResponse = response.json();
        assert_eq!(created.status, CandidateStatus::New);
        assert_eq!(created.tags, vec!["Rust".to_string(), "math".to_string()]);
        assert_eq!(created.created_by, Some(recruiter.id));

        let response = app
            .post("/admin/api/v1/candidates")
            .add_header(add_auth_headers(&recruiter).0, add_auth_headers(&recruiter).1)
            .json(&json!({"first_name": "A", "last_name": "L", "email": "ADA@example.com"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["resource"], "candidate");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sales_manager_can_read_but_not_create(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let sales = create_test_user(&pool, tenant, Role::SalesManager).await;
        let candidate = create_test_candidate(&pool, tenant).await;

        app.get(&format!("/admin/api/v1/candidates/{}", candidate.id))
            .add_header(add_auth_headers(&sales).0, add_auth_headers(&sales).1)
            .await
            .assert_status_ok();

        app.post("/admin/api/v1/candidates")
            .add_header(add_auth_headers(&sales).0, add_auth_headers(&sales).1)
            .json(&json!({"first_name": "A", "last_name": "L", "email": "a@example.com"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let employee = create_test_user(&pool, tenant, Role::Employee).await;
        app.get("/admin/api/v1/candidates")
            .add_header(add_auth_headers(&employee).0, add_auth_headers(&employee).1)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_candidates_filters(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        let headers = add_auth_headers(&recruiter);

        for (first, email, tags) in [
            ("Ada", "ada@example.com", vec!["rust"]),
            ("Alan", "alan@example.com", vec!["go"]),
            ("Grace", "grace@example.com", vec!["Rust", "cobol"]),
        ] {
            app.post("/admin/api/v1/candidates")
                .add_header(headers.0.clone(), headers.1.clone())
                .json(&json!({"first_name": first, "last_name": "X", "email": email, "tags": tags}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let page: PaginatedResponse<CandidateResponse> = app
            .get("/admin/api/v1/candidates?tag=rust")
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(page.total_count, 2);

        let page: PaginatedResponse<CandidateResponse> = app
            .get("/admin/api/v1/candidates?search=AL")
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].first_name, "Alan");

        let page: PaginatedResponse<CandidateResponse> = app
            .get("/admin/api/v1/candidates?limit=1&skip=1&status=new")
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.skip, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_candidate_status_transitions(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        let candidate = create_test_candidate(&pool, tenant).await;
        let headers = add_auth_headers(&recruiter);
        let url = format!("/admin/api/v1/candidates/{}", candidate.id);

        // new -> hired skips active
        app.patch(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "hired"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        for status in ["active", "archived", "active", "hired"] {
            let response = app
                .patch(&url)
                .add_header(headers.0.clone(), headers.1.clone())
                .json(&json!({"status": status}))
                .await;
            response.assert_status_ok();
        }

        // hired is terminal, but re-sending it is harmless
        app.patch(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "active"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        let response = app
            .patch(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "hired", "summary": "Great hire"}))
            .await;
        response.assert_status_ok();
        let updated: CandidateResponse = response.json();
        assert_eq!(updated.status, CandidateStatus::Hired);
        assert_eq!(updated.summary.as_deref(), Some("Great hire"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_candidate_email_recheck(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        let first = create_test_candidate(&pool, tenant).await;
        let second = create_test_candidate(&pool, tenant).await;
        let headers = add_auth_headers(&recruiter);

        app.patch(&format!("/admin/api/v1/candidates/{}", second.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"email": first.email.to_uppercase()}))
            .await
            .assert_status(StatusCode::CONFLICT);

        // Changing only the case of one's own email is fine
        app.patch(&format!("/admin/api/v1/candidates/{}", first.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"email": first.email.to_uppercase()}))
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_soft_delete_frees_email(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        let candidate = create_test_candidate(&pool, tenant).await;
        let headers = add_auth_headers(&recruiter);
        let url = format!("/admin/api/v1/candidates/{}", candidate.id);

        app.delete(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.get(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.delete(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.post("/admin/api/v1/candidates")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"first_name": "G", "last_name": "H", "email": candidate.email}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_candidates_are_tenant_scoped(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let acme = create_test_tenant(&pool, "acme").await;
        let globex = create_test_tenant(&pool, "globex").await;
        let admin = create_test_user(&pool, acme, Role::Admin).await;
        let foreign = create_test_candidate(&pool, globex).await;

        app.get(&format!("/admin/api/v1/candidates/{}", foreign.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
