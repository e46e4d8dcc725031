use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        positions::{ListPositionsQuery, PositionCreate, PositionResponse, PositionStatus, PositionUpdate},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Opportunities, Positions, Repository, positions::PositionFilter},
        models::positions::{PositionCreateDBRequest, PositionUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{OpportunityId, PositionId, TenantId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use tracing::info;

/// Lock the opportunity a position refers to and, when the position is going to be open,
/// check that the opportunity is still live and has no other open position.
///
/// Runs inside the caller's transaction; the row lock serializes concurrent writers for
/// the same opportunity.
async fn check_opportunity(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    opportunity_id: OpportunityId,
    opening: bool,
    exclude: Option<PositionId>,
) -> Result<()> {
    let opportunity = Opportunities::new(&mut *conn, tenant_id)
        .lock_for_update(opportunity_id)
        .await?
        .ok_or_else(|| Error::bad_request(format!("Opportunity {opportunity_id} does not exist")))?;

    if !opening {
        return Ok(());
    }
    if opportunity.stage.is_terminal() {
        return Err(Error::bad_request(format!(
            "Cannot open a position for an opportunity that is {:?}",
            opportunity.stage
        )));
    }
    if let Some(existing) = Positions::new(&mut *conn, tenant_id)
        .open_position_for_opportunity(opportunity_id, exclude)
        .await?
    {
        return Err(Error::conflict(
            "position",
            format!("Opportunity already has an open position ({existing})"),
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/positions",
    tag = "positions",
    summary = "List positions",
    params(ListPositionsQuery),
    responses(
        (status = 200, description = "Page of positions", body = PaginatedResponse<PositionResponse>),
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
pub async fn list_positions(
    State(state): State<AppState>,
    Query(query): Query<ListPositionsQuery>,
    current_user: RequiresPermission<resource::Positions, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<PositionResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = PositionFilter {
        search: query.search,
        status: query.status,
        opportunity_id: query.opportunity_id,
        ..PositionFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Positions::new(&mut conn, current_user.tenant_id);
    let positions = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = positions.into_iter().map(PositionResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

#[utoipa::path(
    post,
    path = "/positions",
    tag = "positions",
    summary = "Create position",
    description = "Positions start `open` unless `on_hold` is requested. An opportunity can have at most one open position.",
    request_body = PositionCreate,
    responses(
        (status = 201, description = "Position created", body = PositionResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "The opportunity already has an open position"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_position(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Positions, operation::CreateAll>,
    Json(create): Json<PositionCreate>,
) -> Result<(StatusCode, Json<PositionResponse>)> {
    if create.title.trim().is_empty() {
        return Err(Error::bad_request("title cannot be empty"));
    }
    if create.headcount < 1 {
        return Err(Error::bad_request("headcount must be at least 1"));
    }
    let status = create.status.unwrap_or(PositionStatus::Open);
    if status.is_terminal() {
        return Err(Error::bad_request("New positions must be open or on_hold"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(opportunity_id) = create.opportunity_id {
        check_opportunity(&mut tx, current_user.tenant_id, opportunity_id, status == PositionStatus::Open, None).await?;
    }

    let position = Positions::new(&mut tx, current_user.tenant_id)
        .create(&PositionCreateDBRequest {
            opportunity_id: create.opportunity_id,
            title: create.title,
            description: create.description,
            department: create.department,
            location: create.location,
            headcount: create.headcount,
            status,
            created_by: Some(current_user.id),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(PositionResponse::from(position))))
}

#[utoipa::path(
    get,
    path = "/positions/{id}",
    tag = "positions",
    summary = "Get position",
    params(
        ("id" = uuid::Uuid, Path, description = "Position ID"),
    ),
    responses(
        (status = 200, description = "Position", body = PositionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Position not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_position(
    State(state): State<AppState>,
    Path(id): Path<PositionId>,
    current_user: RequiresPermission<resource::Positions, operation::ReadAll>,
) -> Result<Json<PositionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Positions::new(&mut conn, current_user.tenant_id);

    match repo.get_by_id(id).await? {
        Some(position) => Ok(Json(PositionResponse::from(position))),
        None => Err(Error::not_found("Position", id)),
    }
}

#[utoipa::path(
    patch,
    path = "/positions/{id}",
    tag = "positions",
    summary = "Update position",
    description = "Status moves `open → on_hold | filled | cancelled` and `on_hold → open | cancelled`. \
                   Headcount cannot drop below the number of hires already made.",
    request_body = PositionUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Position ID"),
    ),
    responses(
        (status = 200, description = "Position updated", body = PositionResponse),
        (status = 400, description = "Invalid request or status transition"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Position not found"),
        (status = 409, description = "The opportunity already has an open position"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_position(
    State(state): State<AppState>,
    Path(id): Path<PositionId>,
    current_user: RequiresPermission<resource::Positions, operation::UpdateAll>,
    Json(update): Json<PositionUpdate>,
) -> Result<Json<PositionResponse>> {
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::bad_request("title cannot be empty"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let existing = Positions::new(&mut tx, current_user.tenant_id)
        .lock_for_update(id)
        .await?
        .ok_or_else(|| Error::not_found("Position", id))?;

    let status = update.status.filter(|s| *s != existing.status);
    if let Some(next) = status
        && !existing.status.can_transition_to(next)
    {
        return Err(Error::bad_request(format!(
            "Cannot move position from {:?} to {:?}",
            existing.status, next
        )));
    }

    if let Some(headcount) = update.headcount {
        let floor = existing.hired_count.max(1);
        if i64::from(headcount) < floor {
            return Err(Error::bad_request(format!(
                "headcount must be at least {floor} (hires already made: {})",
                existing.hired_count
            )));
        }
    }

    let opportunity_changed = update.opportunity_id.is_some_and(|o| Some(o) != existing.opportunity_id);
    let will_be_open = status.unwrap_or(existing.status) == PositionStatus::Open;
    let reopening = status == Some(PositionStatus::Open);
    if let Some(opportunity_id) = update.opportunity_id.or(existing.opportunity_id)
        && (opportunity_changed || reopening)
    {
        check_opportunity(&mut tx, current_user.tenant_id, opportunity_id, will_be_open, Some(id)).await?;
    }

    let mut positions = Positions::new(&mut tx, current_user.tenant_id);
    let mut position = positions
        .update(
            id,
            &PositionUpdateDBRequest {
                opportunity_id: update.opportunity_id,
                title: update.title,
                description: update.description,
                department: update.department,
                location: update.location,
                headcount: update.headcount,
                status,
            },
        )
        .await?;

    // An open position whose hires already meet the headcount is full
    if position.status == PositionStatus::Open && position.hired_count >= i64::from(position.headcount) {
        position = positions.set_status(id, PositionStatus::Filled).await?;
        info!(position_id = %abbrev_uuid(&id), hired = position.hired_count, "Position filled");
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(PositionResponse::from(position)))
}

#[utoipa::path(
    delete,
    path = "/positions/{id}",
    tag = "positions",
    summary = "Delete position",
    description = "Removes the position together with its pipeline entries.",
    params(
        ("id" = uuid::Uuid, Path, description = "Position ID"),
    ),
    responses(
        (status = 204, description = "Position deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Position not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_position(
    State(state): State<AppState>,
    Path(id): Path<PositionId>,
    current_user: RequiresPermission<resource::Positions, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Positions::new(&mut conn, current_user.tenant_id);

    match repo.delete(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::not_found("Position", id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::opportunities::OpportunityResponse;
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    async fn create_opportunity(app: &TestServer, headers: &(String, String), stage: &str) -> OpportunityResponse {
        let response = app
            .post("/admin/api/v1/opportunities")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"name": "Platform", "client_name": "Initech", "stage": stage}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_list_positions(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let sales = create_test_user(&pool, tenant, Role::SalesManager).await;
        let headers = add_auth_headers(&sales);

        let response = app
            .post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Rust engineer", "department": "Engineering"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: PositionResponse = response.json();
        assert_eq!(created.status, PositionStatus::Open);
        assert_eq!(created.headcount, 1);
        assert_eq!(created.hired_count, 0);

        app.post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Designer", "status": "on_hold"}))
            .await
            .assert_status(StatusCode::CREATED);

        let page: PaginatedResponse<PositionResponse> = app
            .get("/admin/api/v1/positions?status=open")
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, created.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);

        for body in [
            json!({"title": "  "}),
            json!({"title": "X", "headcount": 0}),
            json!({"title": "X", "status": "filled"}),
            json!({"title": "X", "opportunity_id": uuid::Uuid::new_v4()}),
        ] {
            app.post("/admin/api/v1/positions")
                .add_header(headers.0.clone(), headers.1.clone())
                .json(&body)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }

        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        app.post("/admin/api/v1/positions")
            .add_header(add_auth_headers(&recruiter).0, add_auth_headers(&recruiter).1)
            .json(&json!({"title": "Rust engineer"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_one_open_position_per_opportunity(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let sales = create_test_user(&pool, tenant, Role::SalesManager).await;
        let headers = add_auth_headers(&sales);
        let opportunity = create_opportunity(&app, &headers, "qualified").await;

        let first: PositionResponse = app
            .post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "First", "opportunity_id": opportunity.id}))
            .await
            .json();

        app.post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Second", "opportunity_id": opportunity.id}))
            .await
            .assert_status(StatusCode::CONFLICT);

        // A held position can coexist, but cannot be reopened while the first is open
        let held: PositionResponse = app
            .post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Held", "status": "on_hold", "opportunity_id": opportunity.id}))
            .await
            .json();
        let held_url = format!("/admin/api/v1/positions/{}", held.id);
        app.patch(&held_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "open"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        app.patch(&format!("/admin/api/v1/positions/{}", first.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "on_hold"}))
            .await
            .assert_status_ok();
        app.patch(&held_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "open"}))
            .await
            .assert_status_ok();

        // Reassigning an open position onto the opportunity is checked too
        let other: PositionResponse = app
            .post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Unlinked"}))
            .await
            .json();
        app.patch(&format!("/admin/api/v1/positions/{}", other.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"opportunity_id": opportunity.id}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_closed_opportunity_cannot_open_positions(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let sales = create_test_user(&pool, tenant, Role::SalesManager).await;
        let headers = add_auth_headers(&sales);
        let lost = create_opportunity(&app, &headers, "lost").await;

        app.post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Too late", "opportunity_id": lost.id}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let held: PositionResponse = app
            .post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Parked", "status": "on_hold", "opportunity_id": lost.id}))
            .await
            .json();
        app.patch(&format!("/admin/api/v1/positions/{}", held.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "open"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_status_transitions_and_headcount(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;

        let position: PositionResponse = app
            .post("/admin/api/v1/positions")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"title": "SRE", "headcount": 2}))
            .await
            .json();
        let url = format!("/admin/api/v1/positions/{}", position.id);
        let headers = add_auth_headers(&recruiter);

        app.patch(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"headcount": 0}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .patch(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"headcount": 3, "status": "cancelled"}))
            .await;
        response.assert_status_ok();
        let updated: PositionResponse = response.json();
        assert_eq!(updated.headcount, 3);
        assert_eq!(updated.status, PositionStatus::Cancelled);

        app.patch(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "open"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.delete(&url)
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.delete(&url)
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
