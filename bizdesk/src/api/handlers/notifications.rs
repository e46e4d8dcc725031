use crate::{
    AppState,
    api::models::{
        notifications::{ListNotificationsQuery, NotificationResponse},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::handlers::Notifications,
    errors::{Error, Result},
    types::NotificationId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Number of notifications that changed from unread to read
    pub updated: u64,
}

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    summary = "List my notifications",
    description = "Notifications addressed to the current user, newest first.",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Page of notifications", body = PaginatedResponse<NotificationResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    current_user: RequiresPermission<resource::Notifications, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<NotificationResponse>>> {
    let (skip, limit) = query.pagination.params();
    let unread_only = query.unread_only.unwrap_or(false);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut conn, current_user.tenant_id);
    let page = repo.list_for_user(current_user.id, unread_only, skip, limit).await?;
    let total_count = repo.count_for_user(current_user.id, unread_only).await?;

    let data = page.into_iter().map(NotificationResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

#[utoipa::path(
    patch,
    path = "/notifications/{id}/read",
    tag = "notifications",
    summary = "Mark notification read",
    params(
        ("id" = uuid::Uuid, Path, description = "Notification ID"),
    ),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
    current_user: RequiresPermission<resource::Notifications, operation::UpdateOwn>,
) -> Result<Json<NotificationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    // Someone else's notification is indistinguishable from a missing one.
    let notification = Notifications::new(&mut conn, current_user.tenant_id)
        .mark_read(id, current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("Notification", id))?;

    Ok(Json(NotificationResponse::from(notification)))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    summary = "Mark all notifications read",
    responses(
        (status = 200, description = "Notifications marked read", body = MarkAllReadResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Notifications, operation::UpdateOwn>,
) -> Result<Json<MarkAllReadResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Notifications::new(&mut conn, current_user.tenant_id)
        .mark_all_read(current_user.id)
        .await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
