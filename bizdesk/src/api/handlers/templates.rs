//! Email template CRUD plus the compile/parse/render/send utilities.

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        templates::{
            CompileRequest, CompileResponse, ListTemplatesQuery, ParseRequest, ParseResponse, RenderRequest, RenderResponse,
            SendTemplateRequest, SendTemplateResponse, TemplateCreate, TemplateResponse, TemplateUpdate,
        },
    },
    auth::permissions::{RequiresPermission, has_permission, insufficient, operation, resource},
    db::{
        handlers::{Candidates, Repository, Templates, templates::TemplateFilter},
        models::{
            candidates::CandidateDBResponse,
            templates::{TemplateCreateDBRequest, TemplateDBResponse, TemplateUpdateDBRequest},
        },
    },
    email::EmailService,
    errors::{Error, Result},
    templates::{self, Block},
    types::{Operation, Resource, TemplateId, TenantId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use sqlx::PgConnection;
use tracing::info;

/// Blocks win over HTML. HTML alone is parsed into blocks, and stored HTML is always the
/// compiled form of the stored blocks.
fn resolve_content(blocks: Option<Vec<Block>>, html: Option<String>) -> Result<Option<(Vec<Block>, String)>> {
    let blocks = match (blocks, html) {
        (Some(blocks), _) => {
            templates::validate(&blocks).map_err(Error::bad_request)?;
            blocks
        }
        (None, Some(html)) => templates::parse(&html),
        (None, None) => return Ok(None),
    };
    let html = templates::compile(&blocks);
    Ok(Some((blocks, html)))
}

async fn load_template(conn: &mut PgConnection, tenant_id: TenantId, id: TemplateId) -> Result<TemplateDBResponse> {
    Templates::new(conn, tenant_id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Template", id))
}

/// Merge-field context for a send: candidate fields under `candidate`, with a few flattened
/// at the top level, then the caller's variables on top.
fn candidate_context(candidate: &CandidateDBResponse, variables: Value) -> Value {
    let full_name = format!("{} {}", candidate.first_name, candidate.last_name);
    let mut context = json!({
        "candidate": {
            "id": candidate.id,
            "first_name": candidate.first_name,
            "last_name": candidate.last_name,
            "full_name": full_name,
            "email": candidate.email,
            "phone": candidate.phone,
        },
        "first_name": candidate.first_name,
        "last_name": candidate.last_name,
        "full_name": full_name,
        "email": candidate.email,
    });
    if let (Some(base), Value::Object(extra)) = (context.as_object_mut(), variables) {
        base.extend(extra);
    }
    context
}

fn require_object(variables: &Value) -> Result<()> {
    if variables.is_object() {
        Ok(())
    } else {
        Err(Error::bad_request("variables must be a JSON object"))
    }
}

#[utoipa::path(
    get,
    path = "/templates",
    tag = "templates",
    summary = "List templates",
    params(ListTemplatesQuery),
    responses(
        (status = 200, description = "Page of templates", body = PaginatedResponse<TemplateResponse>),
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
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<ListTemplatesQuery>,
    current_user: RequiresPermission<resource::Templates, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<TemplateResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = TemplateFilter {
        search: query.search,
        category: query.category,
        ..TemplateFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Templates::new(&mut conn, current_user.tenant_id);
    let templates = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = templates.into_iter().map(TemplateResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

#[utoipa::path(
    post,
    path = "/templates",
    tag = "templates",
    summary = "Create template",
    description = "Send `blocks` (HTML is compiled server-side) or `html` (blocks are parsed from it).",
    request_body = TemplateCreate,
    responses(
        (status = 201, description = "Template created", body = TemplateResponse),
        (status = 400, description = "Invalid request or blocks"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A template with this name already exists"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_template(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Templates, operation::CreateAll>,
    Json(create): Json<TemplateCreate>,
) -> Result<(StatusCode, Json<TemplateResponse>)> {
    let name = create.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::bad_request("name cannot be empty"));
    }
    let (blocks, html) = resolve_content(create.blocks, create.html)?.unwrap_or_else(|| (Vec::new(), templates::compile(&[])));

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Templates::new(&mut conn, current_user.tenant_id);
    if repo.name_taken(&name, None).await? {
        return Err(Error::conflict("template", "A template with this name already exists"));
    }

    let template = repo
        .create(&TemplateCreateDBRequest {
            name,
            subject: create.subject,
            category: create.category,
            blocks,
            html,
            created_by: Some(current_user.id),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TemplateResponse::from(template))))
}

#[utoipa::path(
    get,
    path = "/templates/{id}",
    tag = "templates",
    summary = "Get template",
    params(
        ("id" = uuid::Uuid, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Template", body = TemplateResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Template not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    current_user: RequiresPermission<resource::Templates, operation::ReadAll>,
) -> Result<Json<TemplateResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let template = load_template(&mut conn, current_user.tenant_id, id).await?;
    Ok(Json(TemplateResponse::from(template)))
}

#[utoipa::path(
    patch,
    path = "/templates/{id}",
    tag = "templates",
    summary = "Update template",
    request_body = TemplateUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Template updated", body = TemplateResponse),
        (status = 400, description = "Invalid request or blocks"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Template not found"),
        (status = 409, description = "A template with this name already exists"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    current_user: RequiresPermission<resource::Templates, operation::UpdateAll>,
    Json(update): Json<TemplateUpdate>,
) -> Result<Json<TemplateResponse>> {
    let name = update.name.map(|n| n.trim().to_string());
    if name.as_deref().is_some_and(str::is_empty) {
        return Err(Error::bad_request("name cannot be empty"));
    }
    let content = resolve_content(update.blocks, update.html)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Templates::new(&mut conn, current_user.tenant_id);
    if let Some(name) = &name
        && repo.name_taken(name, Some(id)).await?
    {
        return Err(Error::conflict("template", "A template with this name already exists"));
    }

    let template = repo
        .update(
            id,
            &TemplateUpdateDBRequest {
                name,
                subject: update.subject,
                category: update.category,
                content,
            },
        )
        .await?;

    Ok(Json(TemplateResponse::from(template)))
}

#[utoipa::path(
    delete,
    path = "/templates/{id}",
    tag = "templates",
    summary = "Delete template",
    params(
        ("id" = uuid::Uuid, Path, description = "Template ID"),
    ),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Template not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    current_user: RequiresPermission<resource::Templates, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Templates::new(&mut conn, current_user.tenant_id).delete(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::not_found("Template", id)),
    }
}

#[utoipa::path(
    post,
    path = "/templates/compile",
    tag = "templates",
    summary = "Compile blocks to HTML",
    request_body = CompileRequest,
    responses(
        (status = 200, description = "Compiled email HTML", body = CompileResponse),
        (status = 400, description = "Invalid blocks"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn compile_blocks(
    _: RequiresPermission<resource::Templates, operation::ReadAll>,
    Json(request): Json<CompileRequest>,
) -> Result<Json<CompileResponse>> {
    templates::validate(&request.blocks).map_err(Error::bad_request)?;
    Ok(Json(CompileResponse {
        html: templates::compile(&request.blocks),
    }))
}

#[utoipa::path(
    post,
    path = "/templates/parse",
    tag = "templates",
    summary = "Parse HTML into blocks",
    description = "Best-effort import of arbitrary email HTML. Anything without a block equivalent becomes an `html` block.",
    request_body = ParseRequest,
    responses(
        (status = 200, description = "Parsed blocks", body = ParseResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn parse_html(
    _: RequiresPermission<resource::Templates, operation::ReadAll>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>> {
    Ok(Json(ParseResponse {
        blocks: templates::parse(&request.html),
    }))
}

#[utoipa::path(
    post,
    path = "/templates/{id}/render",
    tag = "templates",
    summary = "Render template",
    description = "Fill `{{ ... }}` merge fields in subject and body. `strict` defaults to the server setting; \
                   in strict mode undefined variables are an error.",
    request_body = RenderRequest,
    params(
        ("id" = uuid::Uuid, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Rendered subject and HTML", body = RenderResponse),
        (status = 400, description = "Template failed to render"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Template not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn render_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    current_user: RequiresPermission<resource::Templates, operation::ReadAll>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>> {
    require_object(&request.variables)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let template = load_template(&mut conn, current_user.tenant_id, id).await?;

    let strict = request.strict.unwrap_or(state.config.templates.strict_variables);
    let rendered = templates::render(&template.subject, &template.html, &request.variables, strict)
        .map_err(|e| Error::bad_request(e.to_string()))?;

    Ok(Json(RenderResponse {
        subject: rendered.subject,
        html: rendered.html,
    }))
}

#[utoipa::path(
    post,
    path = "/templates/{id}/send",
    tag = "templates",
    summary = "Send template to a candidate",
    description = "Renders the template with the candidate's fields (`candidate.first_name`, `first_name`, ...) \
                   overlaid by `variables`, and emails it to the candidate or to `to`.",
    request_body = SendTemplateRequest,
    params(
        ("id" = uuid::Uuid, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Email sent", body = SendTemplateResponse),
        (status = 400, description = "Template failed to render or invalid recipient"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Template or candidate not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn send_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    current_user: RequiresPermission<resource::Templates, operation::ReadAll>,
    Json(request): Json<SendTemplateRequest>,
) -> Result<Json<SendTemplateResponse>> {
    if !has_permission(&current_user, Resource::Candidates, Operation::ReadAll) {
        return Err(insufficient(Resource::Candidates, Operation::ReadAll));
    }
    require_object(&request.variables)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let template = load_template(&mut conn, current_user.tenant_id, id).await?;
    let candidate = Candidates::new(&mut conn, current_user.tenant_id)
        .get_by_id(request.candidate_id)
        .await?
        .ok_or_else(|| Error::not_found("Candidate", request.candidate_id))?;
    drop(conn);

    let context = candidate_context(&candidate, request.variables);
    let rendered = templates::render(&template.subject, &template.html, &context, state.config.templates.strict_variables)
        .map_err(|e| Error::bad_request(e.to_string()))?;

    let to = request.to.unwrap_or_else(|| candidate.email.clone());
    let to_name = format!("{} {}", candidate.first_name, candidate.last_name);
    EmailService::new(&state.config)?
        .send_html(&to, Some(&to_name), &rendered.subject, &rendered.html)
        .await?;

    info!(
        template_id = %abbrev_uuid(&template.id),
        candidate_id = %abbrev_uuid(&candidate.id),
        "Sent template email"
    );
    Ok(Json(SendTemplateResponse {
        to,
        subject: rendered.subject,
    }))
}
