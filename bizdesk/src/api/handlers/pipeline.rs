//! Candidate ↔ position pipeline: adding candidates, Kanban moves and the board view.

use crate::{
    AppState,
    api::models::{
        candidates::{CandidateStatus, CandidateSummary},
        pipeline::{
            BoardCard, BoardResponse, CandidatePipelineEntry, PipelineAdd, PipelineEntryResponse, PipelineMove, PipelineStage,
            build_columns, candidate_can_apply,
        },
        positions::PositionStatus,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Candidates, Pipeline, Positions, Repository},
        models::pipeline::{PipelineEntryCreateDBRequest, PipelineEntryDBResponse, PipelineEntryMoveDBRequest},
    },
    errors::{Error, Result},
    types::{CandidateId, PipelineEntryId, PositionId, TenantId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use tracing::info;

/// Side effects of an entry reaching `hired`: the candidate becomes `hired` (only an active
/// candidate may), and the position is `filled` once its hires reach the headcount.
///
/// Must run in the same transaction as the stage change.
pub(crate) async fn apply_hire(conn: &mut PgConnection, tenant_id: TenantId, entry: &PipelineEntryDBResponse) -> Result<()> {
    let mut candidates = Candidates::new(&mut *conn, tenant_id);
    let candidate = candidates
        .get_for_update(entry.candidate_id)
        .await?
        .ok_or_else(|| Error::not_found("Candidate", entry.candidate_id))?;
    if candidate.status != CandidateStatus::Hired {
        if !candidate.status.can_transition_to(CandidateStatus::Hired) {
            return Err(Error::bad_request(format!(
                "Candidate is {:?}; only active candidates can be hired",
                candidate.status
            )));
        }
        candidates.set_status(candidate.id, CandidateStatus::Hired).await?;
    }

    let mut positions = Positions::new(&mut *conn, tenant_id);
    let position = positions
        .lock_for_update(entry.position_id)
        .await?
        .ok_or_else(|| Error::not_found("Position", entry.position_id))?;

    if position.status == PositionStatus::Open && position.hired_count >= i64::from(position.headcount) {
        positions.set_status(position.id, PositionStatus::Filled).await?;
        info!(
            position_id = %abbrev_uuid(&position.id),
            hired = position.hired_count,
            "Position filled"
        );
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/positions/{id}/pipeline",
    tag = "pipeline",
    summary = "Add candidate to position",
    description = "Adds the candidate at the end of the `applied` column. The position must be open.",
    request_body = PipelineAdd,
    params(
        ("id" = uuid::Uuid, Path, description = "Position ID"),
    ),
    responses(
        (status = 201, description = "Candidate added", body = PipelineEntryResponse),
        (status = 400, description = "Position is not open or candidate is already hired"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Position or candidate not found"),
        (status = 409, description = "Candidate is already in this pipeline"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn add_to_pipeline(
    State(state): State<AppState>,
    Path(position_id): Path<PositionId>,
    current_user: RequiresPermission<resource::Pipeline, operation::CreateAll>,
    Json(add): Json<PipelineAdd>,
) -> Result<(StatusCode, Json<PipelineEntryResponse>)> {
    let tenant_id = current_user.tenant_id;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let position = Positions::new(&mut tx, tenant_id)
        .lock_for_update(position_id)
        .await?
        .ok_or_else(|| Error::not_found("Position", position_id))?;
    if position.status != PositionStatus::Open {
        return Err(Error::bad_request(format!(
            "Position is {:?}; candidates can only be added to open positions",
            position.status
        )));
    }
    if position.hired_count >= i64::from(position.headcount) {
        return Err(Error::bad_request("Position has already reached its headcount"));
    }

    let mut candidates = Candidates::new(&mut tx, tenant_id);
    let candidate = candidates
        .get_for_update(add.candidate_id)
        .await?
        .ok_or_else(|| Error::not_found("Candidate", add.candidate_id))?;
    if !candidate_can_apply(candidate.status) {
        return Err(Error::bad_request("Candidate has already been hired"));
    }
    // Entering a pipeline is what makes a new or archived candidate active
    if matches!(candidate.status, CandidateStatus::New | CandidateStatus::Archived) {
        candidates.set_status(candidate.id, CandidateStatus::Active).await?;
    }

    let mut pipeline = Pipeline::new(&mut tx, tenant_id);
    if pipeline.exists(candidate.id, position_id).await? {
        return Err(Error::conflict("pipeline", "Candidate is already in this position's pipeline"));
    }
    let entry = pipeline
        .create(&PipelineEntryCreateDBRequest {
            candidate_id: candidate.id,
            position_id,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(PipelineEntryResponse::from(entry))))
}

#[utoipa::path(
    patch,
    path = "/pipeline/{id}",
    tag = "pipeline",
    summary = "Move pipeline entry",
    description = "Move an entry to a stage, optionally at a zero-based rank. Moving to `hired` (only from `offer`) \
                   hires the candidate and fills the position once headcount is reached.",
    request_body = PipelineMove,
    params(
        ("id" = uuid::Uuid, Path, description = "Pipeline entry ID"),
    ),
    responses(
        (status = 200, description = "Entry moved", body = PipelineEntryResponse),
        (status = 400, description = "Invalid stage transition"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Entry not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn move_entry(
    State(state): State<AppState>,
    Path(id): Path<PipelineEntryId>,
    current_user: RequiresPermission<resource::Pipeline, operation::UpdateAll>,
    Json(request): Json<PipelineMove>,
) -> Result<Json<PipelineEntryResponse>> {
    let tenant_id = current_user.tenant_id;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let position_id = Pipeline::new(&mut tx, tenant_id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Pipeline entry", id))?
        .position_id;

    // Moves within one position serialize on the position row
    let position = Positions::new(&mut tx, tenant_id)
        .lock_for_update(position_id)
        .await?
        .ok_or_else(|| Error::not_found("Position", position_id))?;

    let mut pipeline = Pipeline::new(&mut tx, tenant_id);
    let entry = pipeline.get_by_id(id).await?.ok_or_else(|| Error::not_found("Pipeline entry", id))?;

    if request.stage != entry.stage && !entry.stage.can_transition_to(request.stage) {
        return Err(Error::bad_request(format!(
            "Cannot move entry from {:?} to {:?}",
            entry.stage, request.stage
        )));
    }
    let hiring = request.stage == PipelineStage::Hired && entry.stage != PipelineStage::Hired;
    if hiring && position.status != PositionStatus::Open {
        return Err(Error::bad_request(format!("Cannot hire into a position that is {:?}", position.status)));
    }
    if hiring && position.hired_count >= i64::from(position.headcount) {
        return Err(Error::bad_request("Position has already reached its headcount"));
    }

    let moved = pipeline
        .update(
            id,
            &PipelineEntryMoveDBRequest {
                stage: request.stage,
                rank: request.rank,
            },
        )
        .await?;

    if hiring {
        apply_hire(&mut tx, tenant_id, &moved).await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(PipelineEntryResponse::from(moved)))
}

#[utoipa::path(
    delete,
    path = "/pipeline/{id}",
    tag = "pipeline",
    summary = "Remove pipeline entry",
    params(
        ("id" = uuid::Uuid, Path, description = "Pipeline entry ID"),
    ),
    responses(
        (status = 204, description = "Entry removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Entry not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn remove_entry(
    State(state): State<AppState>,
    Path(id): Path<PipelineEntryId>,
    current_user: RequiresPermission<resource::Pipeline, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Pipeline::new(&mut conn, current_user.tenant_id).delete(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::not_found("Pipeline entry", id)),
    }
}

#[utoipa::path(
    get,
    path = "/positions/{id}/board",
    tag = "pipeline",
    summary = "Position board",
    description = "One column per stage in pipeline order, entries ordered by rank.",
    params(
        ("id" = uuid::Uuid, Path, description = "Position ID"),
    ),
    responses(
        (status = 200, description = "Kanban board", body = BoardResponse),
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
pub async fn get_board(
    State(state): State<AppState>,
    Path(position_id): Path<PositionId>,
    current_user: RequiresPermission<resource::Positions, operation::ReadAll>,
) -> Result<Json<BoardResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let position = Positions::new(&mut conn, current_user.tenant_id)
        .get_by_id(position_id)
        .await?
        .ok_or_else(|| Error::not_found("Position", position_id))?;
    let rows = Pipeline::new(&mut conn, current_user.tenant_id).board(position_id).await?;

    let cards = rows
        .into_iter()
        .map(|row| {
            (
                row.stage,
                BoardCard {
                    entry_id: row.entry_id,
                    rank: row.rank,
                    candidate: CandidateSummary {
                        id: row.candidate_id,
                        first_name: row.first_name,
                        last_name: row.last_name,
                        email: row.email,
                        status: row.status,
                        tags: row.tags,
                    },
                },
            )
        })
        .collect();

    Ok(Json(BoardResponse {
        position_id,
        title: position.title,
        status: position.status,
        columns: build_columns(cards),
    }))
}

#[utoipa::path(
    get,
    path = "/candidates/{id}/positions",
    tag = "pipeline",
    summary = "Candidate's pipelines",
    description = "Every position the candidate is in, most recently moved first.",
    params(
        ("id" = uuid::Uuid, Path, description = "Candidate ID"),
    ),
    responses(
        (status = 200, description = "Pipeline entries", body = Vec<CandidatePipelineEntry>),
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
pub async fn list_candidate_positions(
    State(state): State<AppState>,
    Path(candidate_id): Path<CandidateId>,
    current_user: RequiresPermission<resource::Candidates, operation::ReadAll>,
) -> Result<Json<Vec<CandidatePipelineEntry>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Candidates::new(&mut conn, current_user.tenant_id)
        .get_by_id(candidate_id)
        .await?
        .is_none()
    {
        return Err(Error::not_found("Candidate", candidate_id));
    }
    let rows = Pipeline::new(&mut conn, current_user.tenant_id)
        .for_candidate(candidate_id)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| CandidatePipelineEntry {
                entry_id: row.entry_id,
                position_id: row.position_id,
                position_title: row.position_title,
                position_status: row.position_status,
                stage: row.stage,
                updated_at: row.updated_at,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{candidates::CandidateResponse, positions::PositionResponse, users::Role};
    use crate::test_utils::*;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    async fn create_position(app: &TestServer, headers: &(String, String), headcount: i32) -> PositionResponse {
        let response = app
            .post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Rust engineer", "headcount": headcount}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    async fn add(app: &TestServer, headers: &(String, String), position: PositionId, candidate: CandidateId) -> PipelineEntryResponse {
        let response = app
            .post(&format!("/admin/api/v1/positions/{position}/pipeline"))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"candidate_id": candidate}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    async fn move_to(app: &TestServer, headers: &(String, String), entry: PipelineEntryId, body: serde_json::Value) -> StatusCode {
        app.patch(&format!("/admin/api/v1/pipeline/{entry}"))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&body)
            .await
            .status_code()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_add_candidate_appends_and_activates(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let position = create_position(&app, &headers, 1).await;
        let ada = create_test_candidate(&pool, tenant).await;
        let alan = create_test_candidate(&pool, tenant).await;

        let first = add(&app, &headers, position.id, ada.id).await;
        let second = add(&app, &headers, position.id, alan.id).await;
        assert_eq!(first.stage, PipelineStage::Applied);
        assert_eq!((first.rank, second.rank), (0, 1));

        let candidate: CandidateResponse = app
            .get(&format!("/admin/api/v1/candidates/{}", ada.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(candidate.status, CandidateStatus::Active);

        let response = app
            .post(&format!("/admin/api/v1/positions/{}/pipeline", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"candidate_id": ada.id}))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        app.post(&format!("/admin/api/v1/positions/{}/pipeline", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"candidate_id": uuid::Uuid::new_v4()}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_add_to_closed_position(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let position = create_position(&app, &headers, 1).await;
        let candidate = create_test_candidate(&pool, tenant).await;

        app.patch(&format!("/admin/api/v1/positions/{}", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "on_hold"}))
            .await
            .assert_status_ok();

        app.post(&format!("/admin/api/v1/positions/{}/pipeline", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"candidate_id": candidate.id}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_stage_rules(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let position = create_position(&app, &add_auth_headers(&admin), 2).await;
        let candidate = create_test_candidate(&pool, tenant).await;
        let headers = add_auth_headers(&recruiter);
        let entry = add(&app, &headers, position.id, candidate.id).await;

        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "hired"})).await, StatusCode::BAD_REQUEST);
        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "interview"})).await, StatusCode::OK);
        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "rejected"})).await, StatusCode::OK);
        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "offer"})).await, StatusCode::BAD_REQUEST);
        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "applied"})).await, StatusCode::OK);
        // Same stage only reorders
        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "applied", "rank": 0})).await, StatusCode::OK);

        assert_eq!(
            move_to(&app, &headers, uuid::Uuid::new_v4(), json!({"stage": "screening"})).await,
            StatusCode::NOT_FOUND
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_hire_fills_position_at_headcount(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let position = create_position(&app, &headers, 2).await;
        let ada = create_test_candidate(&pool, tenant).await;
        let alan = create_test_candidate(&pool, tenant).await;
        let ada_entry = add(&app, &headers, position.id, ada.id).await;
        let alan_entry = add(&app, &headers, position.id, alan.id).await;

        for entry in [ada_entry.id, alan_entry.id] {
            assert_eq!(move_to(&app, &headers, entry, json!({"stage": "offer"})).await, StatusCode::OK);
        }

        assert_eq!(move_to(&app, &headers, ada_entry.id, json!({"stage": "hired"})).await, StatusCode::OK);
        let after_one: PositionResponse = app
            .get(&format!("/admin/api/v1/positions/{}", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(after_one.status, PositionStatus::Open);
        assert_eq!(after_one.hired_count, 1);

        let hired: CandidateResponse = app
            .get(&format!("/admin/api/v1/candidates/{}", ada.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(hired.status, CandidateStatus::Hired);

        assert_eq!(move_to(&app, &headers, alan_entry.id, json!({"stage": "hired"})).await, StatusCode::OK);
        let filled: PositionResponse = app
            .get(&format!("/admin/api/v1/positions/{}", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(filled.status, PositionStatus::Filled);
        assert_eq!(filled.hired_count, 2);

        // Hired is terminal
        assert_eq!(move_to(&app, &headers, ada_entry.id, json!({"stage": "offer"})).await, StatusCode::BAD_REQUEST);

        // A hired candidate cannot join another pipeline
        let other = create_position(&app, &headers, 1).await;
        app.post(&format!("/admin/api/v1/positions/{}/pipeline", other.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"candidate_id": ada.id}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lowering_headcount_to_hires_fills_position(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let position = create_position(&app, &headers, 3).await;
        let ada = create_test_candidate(&pool, tenant).await;
        let alan = create_test_candidate(&pool, tenant).await;
        let ada_entry = add(&app, &headers, position.id, ada.id).await;
        let alan_entry = add(&app, &headers, position.id, alan.id).await;
        for entry in [ada_entry.id, alan_entry.id] {
            assert_eq!(move_to(&app, &headers, entry, json!({"stage": "offer"})).await, StatusCode::OK);
        }
        assert_eq!(move_to(&app, &headers, ada_entry.id, json!({"stage": "hired"})).await, StatusCode::OK);

        let response = app
            .patch(&format!("/admin/api/v1/positions/{}", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"headcount": 1}))
            .await;
        response.assert_status_ok();
        let updated: PositionResponse = response.json();
        assert_eq!(updated.status, PositionStatus::Filled);
        assert_eq!((updated.hired_count, updated.headcount), (1, 1));

        assert_eq!(move_to(&app, &headers, alan_entry.id, json!({"stage": "hired"})).await, StatusCode::BAD_REQUEST);
        let newcomer = create_test_candidate(&pool, tenant).await;
        app.post(&format!("/admin/api/v1/positions/{}/pipeline", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"candidate_id": newcomer.id}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let after: PositionResponse = app
            .get(&format!("/admin/api/v1/positions/{}", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert!(after.hired_count <= i64::from(after.headcount));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_archived_candidates_go_through_active(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let position = create_position(&app, &headers, 2).await;
        let ada = create_test_candidate(&pool, tenant).await;
        let alan = create_test_candidate(&pool, tenant).await;

        let set_status = |id: CandidateId, status: &'static str| {
            app.patch(&format!("/admin/api/v1/candidates/{id}"))
                .add_header(headers.0.clone(), headers.1.clone())
                .json(&json!({"status": status}))
        };

        // Archived before applying: joining a pipeline reactivates
        set_status(ada.id, "archived").await.assert_status_ok();
        add(&app, &headers, position.id, ada.id).await;
        let candidate: CandidateResponse = app
            .get(&format!("/admin/api/v1/candidates/{}", ada.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(candidate.status, CandidateStatus::Active);

        // Archived while in the pipeline: cannot be hired
        let entry = add(&app, &headers, position.id, alan.id).await;
        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "offer"})).await, StatusCode::OK);
        set_status(alan.id, "archived").await.assert_status_ok();
        assert_eq!(move_to(&app, &headers, entry.id, json!({"stage": "hired"})).await, StatusCode::BAD_REQUEST);

        let position: PositionResponse = app
            .get(&format!("/admin/api/v1/positions/{}", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(position.hired_count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_board_orders_columns_and_ranks(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let hr = create_test_user(&pool, tenant, Role::HrManager).await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let position = create_position(&app, &headers, 1).await;

        let mut entries = Vec::new();
        for _ in 0..3 {
            let candidate = create_test_candidate(&pool, tenant).await;
            entries.push(add(&app, &headers, position.id, candidate.id).await);
        }
        // Drag the last card to the top of the column, and the first to screening
        assert_eq!(move_to(&app, &headers, entries[2].id, json!({"stage": "applied", "rank": 0})).await, StatusCode::OK);
        assert_eq!(move_to(&app, &headers, entries[0].id, json!({"stage": "screening"})).await, StatusCode::OK);

        let response = app
            .get(&format!("/admin/api/v1/positions/{}/board", position.id))
            .add_header(add_auth_headers(&hr).0, add_auth_headers(&hr).1)
            .await;
        response.assert_status_ok();
        let board: BoardResponse = response.json();
        assert_eq!(board.columns.len(), PipelineStage::ALL.len());
        assert_eq!(board.columns[0].stage, PipelineStage::Applied);

        let applied: Vec<_> = board.columns[0].entries.iter().map(|c| (c.entry_id, c.rank)).collect();
        assert_eq!(applied, vec![(entries[2].id, 0), (entries[1].id, 1)]);
        assert_eq!(board.columns[1].entries.len(), 1);
        assert_eq!(board.columns[1].entries[0].entry_id, entries[0].id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_remove_entry_and_candidate_view(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let position = create_position(&app, &headers, 1).await;
        let candidate = create_test_candidate(&pool, tenant).await;
        let entry = add(&app, &headers, position.id, candidate.id).await;

        let listed: Vec<CandidatePipelineEntry> = app
            .get(&format!("/admin/api/v1/candidates/{}/positions", candidate.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].position_title, "Rust engineer");

        app.delete(&format!("/admin/api/v1/pipeline/{}", entry.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/admin/api/v1/pipeline/{}", entry.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let listed: Vec<CandidatePipelineEntry> = app
            .get(&format!("/admin/api/v1/candidates/{}/positions", candidate.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert!(listed.is_empty());
    }
}
