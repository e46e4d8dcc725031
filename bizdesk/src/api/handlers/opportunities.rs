use crate::{
    AppState,
    api::models::{
        opportunities::{ListOpportunitiesQuery, OpportunityCreate, OpportunityResponse, OpportunityStage, OpportunityUpdate},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Opportunities, Repository, Users, opportunities::OpportunityFilter},
        models::opportunities::{OpportunityCreateDBRequest, OpportunityUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{OpportunityId, TenantId, UserId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use sqlx::PgConnection;

async fn check_owner(conn: &mut PgConnection, tenant_id: TenantId, owner_id: Option<UserId>) -> Result<()> {
    let Some(owner_id) = owner_id else {
        return Ok(());
    };
    let mut users = Users::new(conn, tenant_id);
    if users.get_by_id(owner_id).await?.is_none() {
        return Err(Error::bad_request(format!("Owner {owner_id} is not a user of this organisation")));
    }
    Ok(())
}

fn check_value(value: Option<Decimal>) -> Result<()> {
    if value.is_some_and(|v| v.is_sign_negative()) {
        return Err(Error::bad_request("estimated_value cannot be negative"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/opportunities",
    tag = "opportunities",
    summary = "List opportunities",
    params(ListOpportunitiesQuery),
    responses(
        (status = 200, description = "Page of opportunities", body = PaginatedResponse<OpportunityResponse>),
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
pub async fn list_opportunities(
    State(state): State<AppState>,
    Query(query): Query<ListOpportunitiesQuery>,
    current_user: RequiresPermission<resource::Opportunities, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<OpportunityResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = OpportunityFilter {
        search: query.search,
        stage: query.stage,
        ..OpportunityFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Opportunities::new(&mut conn, current_user.tenant_id);
    let opportunities = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = opportunities.into_iter().map(OpportunityResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

#[utoipa::path(
    post,
    path = "/opportunities",
    tag = "opportunities",
    summary = "Create opportunity",
    request_body = OpportunityCreate,
    responses(
        (status = 201, description = "Opportunity created", body = OpportunityResponse),
        (status = 400, description = "Invalid request"),
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
pub async fn create_opportunity(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Opportunities, operation::CreateAll>,
    Json(create): Json<OpportunityCreate>,
) -> Result<(StatusCode, Json<OpportunityResponse>)> {
    if create.name.trim().is_empty() || create.client_name.trim().is_empty() {
        return Err(Error::bad_request("name and client_name are required"));
    }
    check_value(create.estimated_value)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_owner(&mut conn, current_user.tenant_id, create.owner_id).await?;

    let mut repo = Opportunities::new(&mut conn, current_user.tenant_id);
    let opportunity = repo
        .create(&OpportunityCreateDBRequest {
            name: create.name,
            client_name: create.client_name,
            stage: create.stage.unwrap_or(OpportunityStage::Lead),
            estimated_value: create.estimated_value,
            // Default owner is whoever opened it
            owner_id: create.owner_id.or(Some(current_user.id)),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(OpportunityResponse::from(opportunity))))
}

#[utoipa::path(
    get,
    path = "/opportunities/{id}",
    tag = "opportunities",
    summary = "Get opportunity",
    params(
        ("id" = uuid::Uuid, Path, description = "Opportunity ID"),
    ),
    responses(
        (status = 200, description = "Opportunity", body = OpportunityResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Opportunity not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(id): Path<OpportunityId>,
    current_user: RequiresPermission<resource::Opportunities, operation::ReadAll>,
) -> Result<Json<OpportunityResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Opportunities::new(&mut conn, current_user.tenant_id);

    match repo.get_by_id(id).await? {
        Some(opportunity) => Ok(Json(OpportunityResponse::from(opportunity))),
        None => Err(Error::not_found("Opportunity", id)),
    }
}

#[utoipa::path(
    patch,
    path = "/opportunities/{id}",
    tag = "opportunities",
    summary = "Update opportunity",
    description = "Partial update. Once an opportunity is won or lost its stage can no longer change.",
    request_body = OpportunityUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Opportunity ID"),
    ),
    responses(
        (status = 200, description = "Opportunity updated", body = OpportunityResponse),
        (status = 400, description = "Invalid request or stage transition"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Opportunity not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_opportunity(
    State(state): State<AppState>,
    Path(id): Path<OpportunityId>,
    current_user: RequiresPermission<resource::Opportunities, operation::UpdateAll>,
    Json(update): Json<OpportunityUpdate>,
) -> Result<Json<OpportunityResponse>> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty())
        || update.client_name.as_deref().is_some_and(|n| n.trim().is_empty())
    {
        return Err(Error::bad_request("name and client_name cannot be empty"));
    }
    check_value(update.estimated_value)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    check_owner(&mut tx, current_user.tenant_id, update.owner_id).await?;

    let mut repo = Opportunities::new(&mut tx, current_user.tenant_id);
    let existing = repo
        .lock_for_update(id)
        .await?
        .ok_or_else(|| Error::not_found("Opportunity", id))?;

    let stage = update.stage.filter(|s| *s != existing.stage);
    if let Some(next) = stage
        && !existing.stage.can_transition_to(next)
    {
        return Err(Error::bad_request(format!(
            "Cannot move opportunity from {:?} to {:?}",
            existing.stage, next
        )));
    }

    let opportunity = repo
        .update(
            id,
            &OpportunityUpdateDBRequest {
                name: update.name,
                client_name: update.client_name,
                stage,
                estimated_value: update.estimated_value,
                owner_id: update.owner_id,
            },
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(OpportunityResponse::from(opportunity)))
}

#[utoipa::path(
    delete,
    path = "/opportunities/{id}",
    tag = "opportunities",
    summary = "Delete opportunity",
    description = "Refused while a position linked to the opportunity is open.",
    params(
        ("id" = uuid::Uuid, Path, description = "Opportunity ID"),
    ),
    responses(
        (status = 204, description = "Opportunity deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Opportunity not found"),
        (status = 409, description = "Opportunity still has an open position"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_opportunity(
    State(state): State<AppState>,
    Path(id): Path<OpportunityId>,
    current_user: RequiresPermission<resource::Opportunities, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Opportunities::new(&mut tx, current_user.tenant_id);

    if repo.lock_for_update(id).await?.is_none() {
        return Err(Error::not_found("Opportunity", id));
    }
    if repo.has_open_position(id).await? {
        return Err(Error::conflict(
            "opportunity",
            "Close or cancel the opportunity's open position before deleting it",
        ));
    }
    repo.delete(id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}
