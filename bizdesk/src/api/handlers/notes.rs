//! Candidate notes. `@username` mentions fan out to notifications and emails after the note
//! is committed; that fan-out is best-effort.

use crate::{
    AppState,
    api::models::{
        notes::{ListNotesQuery, NoteCreate, NoteResponse, extract_mentions},
        notifications::KIND_MENTION,
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, insufficient, operation, resource},
    db::{
        handlers::{Candidates, Notes, Notifications, Repository, Users},
        models::{
            candidates::CandidateDBResponse,
            notes::{NoteCreateDBRequest, NoteDBResponse},
            notifications::NotificationCreateDBRequest,
            users::UserDBResponse,
        },
    },
    email::{EmailService, MentionEmail},
    errors::{Error, Result},
    types::{CandidateId, NoteId, Operation, Resource, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{debug, warn};

const MAX_NOTE_LENGTH: usize = 10_000;

/// Notification rows and emails for everyone mentioned in a freshly committed note.
/// Failures are logged and swallowed.
async fn notify_mentions(
    state: &AppState,
    note: &NoteDBResponse,
    candidate: &CandidateDBResponse,
    author: &str,
    mentioned: &[UserDBResponse],
) {
    if mentioned.is_empty() {
        return;
    }
    let candidate_name = format!("{} {}", candidate.first_name, candidate.last_name);

    let requests: Vec<_> = mentioned
        .iter()
        .map(|user| NotificationCreateDBRequest {
            user_id: user.id,
            kind: KIND_MENTION.to_string(),
            message: format!("{author} mentioned you on {candidate_name}"),
            candidate_id: Some(candidate.id),
            note_id: Some(note.id),
        })
        .collect();

    match state.db.acquire().await {
        Ok(mut conn) => {
            if let Err(e) = Notifications::new(&mut conn, note.tenant_id).create_many(&requests).await {
                warn!(note_id = %abbrev_uuid(&note.id), error = %e, "Failed to store mention notifications");
            }
        }
        Err(e) => warn!(note_id = %abbrev_uuid(&note.id), error = %e, "Failed to store mention notifications"),
    }

    let email_service = match EmailService::new(&state.config) {
        Ok(service) => service,
        Err(e) => {
            warn!(error = %e, "Email service unavailable; skipping mention emails");
            return;
        }
    };
    for user in mentioned {
        let email = MentionEmail {
            to_email: &user.email,
            to_name: user.display_name.as_deref(),
            author,
            candidate_name: &candidate_name,
            candidate_id: candidate.id,
            note_body: &note.body,
        };
        if let Err(e) = email_service.send_mention_email(&email).await {
            warn!(user_id = %abbrev_uuid(&user.id), error = %e, "Failed to send mention email");
        }
    }
}

#[utoipa::path(
    post,
    path = "/candidates/{id}/notes",
    tag = "notes",
    summary = "Add note",
    description = "`@username` mentions of users in the same organisation are recorded on the note and \
                   notified by in-app notification and email.",
    request_body = NoteCreate,
    params(
        ("id" = uuid::Uuid, Path, description = "Candidate ID"),
    ),
    responses(
        (status = 201, description = "Note created", body = NoteResponse),
        (status = 400, description = "Invalid note"),
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
pub async fn create_note(
    State(state): State<AppState>,
    Path(candidate_id): Path<CandidateId>,
    current_user: RequiresPermission<resource::Notes, operation::CreateAll>,
    Json(create): Json<NoteCreate>,
) -> Result<(StatusCode, Json<NoteResponse>)> {
    let body = create.body.trim();
    if body.is_empty() {
        return Err(Error::bad_request("Note body cannot be empty"));
    }
    if body.len() > MAX_NOTE_LENGTH {
        return Err(Error::bad_request(format!("Note body cannot exceed {MAX_NOTE_LENGTH} bytes")));
    }

    let tenant_id = current_user.tenant_id;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let candidate = Candidates::new(&mut tx, tenant_id)
        .get_by_id(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found("Candidate", candidate_id))?;

    let usernames = extract_mentions(body);
    let mentioned: Vec<UserDBResponse> = Users::new(&mut tx, tenant_id)
        .get_by_usernames(&usernames)
        .await?
        .into_iter()
        .filter(|u| u.id != current_user.id)
        .collect();
    debug!(requested = usernames.len(), resolved = mentioned.len(), "Resolved mentions");

    let note = Notes::new(&mut tx, tenant_id)
        .create(&NoteCreateDBRequest {
            candidate_id,
            author_id: current_user.id,
            body: body.to_string(),
            mentioned_user_ids: mentioned.iter().map(|u| u.id).collect(),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let author = current_user
        .display_name
        .clone()
        .unwrap_or_else(|| current_user.username.clone());
    notify_mentions(&state, &note, &candidate, &author, &mentioned).await;

    Ok((StatusCode::CREATED, Json(NoteResponse::from(note))))
}

#[utoipa::path(
    get,
    path = "/candidates/{id}/notes",
    tag = "notes",
    summary = "List notes",
    description = "Newest first.",
    params(
        ("id" = uuid::Uuid, Path, description = "Candidate ID"),
        ListNotesQuery,
    ),
    responses(
        (status = 200, description = "Page of notes", body = PaginatedResponse<NoteResponse>),
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
pub async fn list_notes(
    State(state): State<AppState>,
    Path(candidate_id): Path<CandidateId>,
    Query(query): Query<ListNotesQuery>,
    current_user: RequiresPermission<resource::Notes, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<NoteResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Candidates::new(&mut conn, current_user.tenant_id)
        .get_by_id(candidate_id)
        .await?
        .is_none()
    {
        return Err(Error::not_found("Candidate", candidate_id));
    }

    let mut notes = Notes::new(&mut conn, current_user.tenant_id);
    let page = notes.list_for_candidate(candidate_id, skip, limit).await?;
    let total_count = notes.count_for_candidate(candidate_id).await?;

    let data = page.into_iter().map(NoteResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

#[utoipa::path(
    delete,
    path = "/notes/{id}",
    tag = "notes",
    summary = "Delete note",
    description = "Only the author or an admin can delete a note.",
    params(
        ("id" = uuid::Uuid, Path, description = "Note ID"),
    ),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Note not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<NoteId>,
    current_user: RequiresPermission<resource::Notes, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut notes = Notes::new(&mut conn, current_user.tenant_id);

    let note = notes.get_by_id(id).await?.ok_or_else(|| Error::not_found("Note", id))?;
    if note.author_id != Some(current_user.id) && !current_user.is_admin() {
        return Err(insufficient(Resource::Notes, Operation::DeleteAll));
    }

    match notes.delete(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::not_found("Note", id)),
    }
}
