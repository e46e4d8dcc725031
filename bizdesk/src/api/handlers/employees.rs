use crate::{
    AppState,
    api::{
        handlers::pipeline::apply_hire,
        models::{
            candidates::CandidateStatus,
            employees::{
                ConvertCandidateRequest, ConvertCandidateResponse, EmployeeCreate, EmployeeResponse, EmployeeUpdate,
                ListEmployeesQuery,
            },
            pagination::PaginatedResponse,
            pipeline::PipelineStage,
            users::{Role, UserResponse},
        },
    },
    auth::{
        permissions::{RequiresPermission, can_read_all_resources, can_read_own_resource, operation, resource},
        utils::{username_from_email, username_with_suffix},
    },
    db::{
        handlers::{Candidates, Employees, Pipeline, Positions, Repository, Users, employees::EmployeeFilter},
        models::{
            employees::{EmployeeCreateDBRequest, EmployeeUpdateDBRequest},
            pipeline::PipelineEntryMoveDBRequest,
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    errors::{Error, Result},
    types::{CandidateId, EmployeeId, Resource, TenantId, UserId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sqlx::PgConnection;
use tracing::info;

const USERNAME_ATTEMPTS: usize = 5;

/// Resolve the user an employee record hangs off.
///
/// With `user_id`, the user must belong to the tenant and must not already be an employee.
/// Without it, a login-less `employee` user is created from the email. Returns the user and
/// whether it was created.
async fn ensure_employee_user(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    user_id: Option<UserId>,
    email: &str,
    display_name: String,
) -> Result<(UserDBResponse, bool)> {
    if let Some(user_id) = user_id {
        let user = Users::new(&mut *conn, tenant_id)
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| Error::bad_request(format!("User {user_id} does not exist")))?;
        if Employees::new(&mut *conn, tenant_id).get_by_user(user_id).await?.is_some() {
            return Err(Error::conflict("employee", "This user already has an employee record"));
        }
        return Ok((user, false));
    }

    let mut users = Users::new(&mut *conn, tenant_id);
    let email = email.trim().to_lowercase();
    if users.email_taken(&email).await? {
        return Err(Error::conflict(
            "user",
            "An account with this email address already exists; link it with user_id instead",
        ));
    }

    let base = username_from_email(&email);
    let mut username = base.clone();
    let mut attempts = 0;
    while users.username_taken(&username).await? {
        attempts += 1;
        if attempts > USERNAME_ATTEMPTS {
            return Err(Error::conflict("user", "Could not find a free username for this employee"));
        }
        username = username_with_suffix(&base);
    }

    let user = users
        .create(&UserCreateDBRequest {
            username,
            email,
            display_name: Some(display_name),
            roles: vec![Role::Employee],
            auth_source: "native".to_string(),
            password_hash: None,
        })
        .await?;
    info!(user_id = %abbrev_uuid(&user.id), "Created employee user");
    Ok((user, true))
}

/// A manager must be another employee of the same tenant.
async fn check_manager(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    manager_id: Option<EmployeeId>,
    employee_id: Option<EmployeeId>,
) -> Result<()> {
    let Some(manager_id) = manager_id else {
        return Ok(());
    };
    if Some(manager_id) == employee_id {
        return Err(Error::bad_request("An employee cannot manage themselves"));
    }
    if Employees::new(conn, tenant_id).get_by_id(manager_id).await?.is_none() {
        return Err(Error::bad_request(format!("Manager {manager_id} does not exist")));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/employees",
    tag = "employees",
    summary = "List employees",
    params(ListEmployeesQuery),
    responses(
        (status = 200, description = "Page of employees", body = PaginatedResponse<EmployeeResponse>),
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
pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<ListEmployeesQuery>,
    current_user: RequiresPermission<resource::Employees, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<EmployeeResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = EmployeeFilter {
        search: query.search,
        status: query.status,
        department: query.department,
        ..EmployeeFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Employees::new(&mut conn, current_user.tenant_id);
    let employees = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = employees.into_iter().map(EmployeeResponse::from).collect();
    Ok(Json(PaginatedResponse::from_page(data, total_count, &query.pagination)))
}

#[utoipa::path(
    post,
    path = "/employees",
    tag = "employees",
    summary = "Create employee",
    description = "Without `user_id`, a user with the `employee` role is created from the email address.",
    request_body = EmployeeCreate,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "User already an employee, or email taken"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_employee(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Employees, operation::CreateAll>,
    Json(create): Json<EmployeeCreate>,
) -> Result<(StatusCode, Json<EmployeeResponse>)> {
    if create.first_name.trim().is_empty() || create.last_name.trim().is_empty() || create.job_title.trim().is_empty() {
        return Err(Error::bad_request("first_name, last_name and job_title are required"));
    }
    if !create.email.contains('@') {
        return Err(Error::bad_request("Invalid email address"));
    }

    let tenant_id = current_user.tenant_id;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    check_manager(&mut tx, tenant_id, create.manager_id, None).await?;
    let display_name = format!("{} {}", create.first_name.trim(), create.last_name.trim());
    let (user, _) = ensure_employee_user(&mut tx, tenant_id, create.user_id, &create.email, display_name).await?;

    let employee = Employees::new(&mut tx, tenant_id)
        .create(&EmployeeCreateDBRequest {
            user_id: user.id,
            candidate_id: None,
            first_name: create.first_name,
            last_name: create.last_name,
            email: create.email.trim().to_string(),
            job_title: create.job_title,
            department: create.department,
            employment_type: create.employment_type,
            start_date: create.start_date.unwrap_or_else(|| Utc::now().date_naive()),
            manager_id: create.manager_id,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(EmployeeResponse::from(employee))))
}

#[utoipa::path(
    get,
    path = "/employees/me",
    tag = "employees",
    summary = "Get own employee record",
    responses(
        (status = 200, description = "The caller's employee record", body = EmployeeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "The caller has no employee record"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_own_employee(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Employees, operation::ReadOwn>,
) -> Result<Json<EmployeeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Employees::new(&mut conn, current_user.tenant_id).get_by_user(current_user.id).await? {
        Some(employee) => Ok(Json(EmployeeResponse::from(employee))),
        None => Err(Error::not_found("Employee", "me")),
    }
}

#[utoipa::path(
    get,
    path = "/employees/{id}",
    tag = "employees",
    summary = "Get employee",
    description = "HR and admins can read any record; other users only their own.",
    params(
        ("id" = uuid::Uuid, Path, description = "Employee ID"),
    ),
    responses(
        (status = 200, description = "Employee", body = EmployeeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<EmployeeId>,
    current_user: RequiresPermission<resource::Employees, operation::ReadOwn>,
) -> Result<Json<EmployeeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let employee = Employees::new(&mut conn, current_user.tenant_id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Employee", id))?;

    // Someone else's record is reported as missing rather than forbidden
    if !can_read_all_resources(&current_user, Resource::Employees)
        && !can_read_own_resource(&current_user, Resource::Employees, employee.user_id)
    {
        return Err(Error::not_found("Employee", id));
    }

    Ok(Json(EmployeeResponse::from(employee)))
}

#[utoipa::path(
    patch,
    path = "/employees/{id}",
    tag = "employees",
    summary = "Update employee",
    description = "Status moves between `active` and `on_leave`; `terminated` is final.",
    request_body = EmployeeUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Employee ID"),
    ),
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Invalid request or status transition"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<EmployeeId>,
    current_user: RequiresPermission<resource::Employees, operation::UpdateAll>,
    Json(update): Json<EmployeeUpdate>,
) -> Result<Json<EmployeeResponse>> {
    let tenant_id = current_user.tenant_id;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let existing = Employees::new(&mut tx, tenant_id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Employee", id))?;

    let status = update.status.filter(|s| *s != existing.status);
    if let Some(next) = status
        && !existing.status.can_transition_to(next)
    {
        return Err(Error::bad_request(format!(
            "Cannot move employee from {:?} to {:?}",
            existing.status, next
        )));
    }
    check_manager(&mut tx, tenant_id, update.manager_id, Some(id)).await?;

    let employee = Employees::new(&mut tx, tenant_id)
        .update(
            id,
            &EmployeeUpdateDBRequest {
                first_name: update.first_name,
                last_name: update.last_name,
                job_title: update.job_title,
                department: update.department,
                employment_type: update.employment_type,
                start_date: update.start_date,
                status,
                manager_id: update.manager_id,
            },
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(EmployeeResponse::from(employee)))
}

#[utoipa::path(
    delete,
    path = "/employees/{id}",
    tag = "employees",
    summary = "Delete employee",
    description = "Removes the employee record. The linked user account is kept.",
    params(
        ("id" = uuid::Uuid, Path, description = "Employee ID"),
    ),
    responses(
        (status = 204, description = "Employee deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<EmployeeId>,
    current_user: RequiresPermission<resource::Employees, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Employees::new(&mut conn, current_user.tenant_id).delete(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::not_found("Employee", id)),
    }
}

#[utoipa::path(
    post,
    path = "/candidates/{id}/convert",
    tag = "employees",
    summary = "Convert candidate to employee",
    description = "Atomically creates (or links) the user, inserts the employee record and marks the candidate hired. \
                   With `candidate_position_id`, that pipeline entry is hired too and its position filled at headcount.",
    request_body = ConvertCandidateRequest,
    params(
        ("id" = uuid::Uuid, Path, description = "Candidate ID"),
    ),
    responses(
        (status = 201, description = "Candidate converted", body = ConvertCandidateResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Candidate or pipeline entry not found"),
        (status = 409, description = "Candidate or user is already an employee, or email taken"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn convert_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<CandidateId>,
    current_user: RequiresPermission<resource::Employees, operation::CreateAll>,
    Json(request): Json<ConvertCandidateRequest>,
) -> Result<(StatusCode, Json<ConvertCandidateResponse>)> {
    if request.job_title.trim().is_empty() {
        return Err(Error::bad_request("job_title is required"));
    }

    let tenant_id = current_user.tenant_id;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let candidate = Candidates::new(&mut tx, tenant_id)
        .get_for_update(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found("Candidate", candidate_id))?;
    if Employees::new(&mut tx, tenant_id).get_by_candidate(candidate_id).await?.is_some() {
        return Err(Error::conflict("employee", "This candidate has already been converted"));
    }
    check_manager(&mut tx, tenant_id, request.manager_id, None).await?;

    let display_name = format!("{} {}", candidate.first_name, candidate.last_name);
    let (user, user_created) =
        ensure_employee_user(&mut tx, tenant_id, request.user_id, &candidate.email, display_name).await?;

    let employee = Employees::new(&mut tx, tenant_id)
        .create(&EmployeeCreateDBRequest {
            user_id: user.id,
            candidate_id: Some(candidate.id),
            first_name: candidate.first_name.clone(),
            last_name: candidate.last_name.clone(),
            email: candidate.email.clone(),
            job_title: request.job_title,
            department: request.department,
            employment_type: request.employment_type,
            start_date: request.start_date.unwrap_or_else(|| Utc::now().date_naive()),
            manager_id: request.manager_id,
        })
        .await?;

    if candidate.status != CandidateStatus::Hired {
        Candidates::new(&mut tx, tenant_id)
            .set_status(candidate.id, CandidateStatus::Hired)
            .await?;
    }

    if let Some(entry_id) = request.candidate_position_id {
        let entry = Pipeline::new(&mut tx, tenant_id)
            .get_by_id(entry_id)
            .await?
            .filter(|e| e.candidate_id == candidate.id)
            .ok_or_else(|| Error::not_found("Pipeline entry", entry_id))?;

        if entry.stage != PipelineStage::Hired {
            let position = Positions::new(&mut tx, tenant_id)
                .lock_for_update(entry.position_id)
                .await?
                .ok_or_else(|| Error::not_found("Position", entry.position_id))?;
            if position.hired_count >= i64::from(position.headcount) {
                return Err(Error::bad_request("Position has already reached its headcount"));
            }
            let hired = Pipeline::new(&mut tx, tenant_id)
                .update(
                    entry.id,
                    &PipelineEntryMoveDBRequest {
                        stage: PipelineStage::Hired,
                        rank: None,
                    },
                )
                .await?;
            apply_hire(&mut tx, tenant_id, &hired).await?;
        }
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(
        employee_id = %abbrev_uuid(&employee.id),
        user_created,
        "Converted candidate to employee"
    );

    Ok((
        StatusCode::CREATED,
        Json(ConvertCandidateResponse {
            employee: EmployeeResponse::from(employee),
            user: UserResponse::from(user),
            user_created,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{
        candidates::CandidateResponse,
        employees::{EmployeeStatus, EmploymentType},
        pipeline::PipelineEntryResponse,
        positions::{PositionResponse, PositionStatus},
    };
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_employee_creates_user(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let hr = create_test_user(&pool, tenant, Role::HrManager).await;
        let headers = add_auth_headers(&hr);

        let response = app
            .post("/admin/api/v1/employees")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({
                "first_name": "Margaret",
                "last_name": "Hamilton",
                "email": "Margaret@Example.com",
                "job_title": "Flight software lead",
                "department": "Engineering",
                "start_date": "2025-01-06"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let employee: EmployeeResponse = response.json();
        assert_eq!(employee.status, EmployeeStatus::Active);
        assert_eq!(employee.employment_type, EmploymentType::FullTime);

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn, tenant).get_by_id(employee.user_id).await.unwrap().unwrap();
        assert_eq!(user.email, "margaret@example.com");
        assert_eq!(user.username, "margaret");
        assert_eq!(user.roles, vec![Role::Employee]);
        assert!(user.password_hash.is_none());

        // Same email again collides with the user just created
        app.post("/admin/api/v1/employees")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({
                "first_name": "M", "last_name": "H", "email": "margaret@example.com", "job_title": "X"
            }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_link_existing_user_once(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let hr = create_test_user(&pool, tenant, Role::HrManager).await;
        let staff = create_test_user(&pool, tenant, Role::Recruiter).await;
        let headers = add_auth_headers(&hr);
        let body = json!({
            "user_id": staff.id, "first_name": "R", "last_name": "C", "email": staff.email, "job_title": "Recruiter"
        });

        let employee: EmployeeResponse = app
            .post("/admin/api/v1/employees")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&body)
            .await
            .json();
        assert_eq!(employee.user_id, staff.id);

        let response = app
            .post("/admin/api/v1/employees")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&body)
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let error: serde_json::Value = response.json();
        assert_eq!(error["resource"], "employee");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_employee_reads_only_own_record(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let hr = create_test_user(&pool, tenant, Role::HrManager).await;
        let alice = create_test_user(&pool, tenant, Role::Employee).await;
        let bob = create_test_user(&pool, tenant, Role::Employee).await;
        let hr_headers = add_auth_headers(&hr);

        let mut records = Vec::new();
        for user in [&alice, &bob] {
            let employee: EmployeeResponse = app
                .post("/admin/api/v1/employees")
                .add_header(hr_headers.0.clone(), hr_headers.1.clone())
                .json(&json!({
                    "user_id": user.id, "first_name": "E", "last_name": "E", "email": user.email, "job_title": "Engineer"
                }))
                .await
                .json();
            records.push(employee);
        }

        let alice_headers = add_auth_headers(&alice);
        app.get(&format!("/admin/api/v1/employees/{}", records[0].id))
            .add_header(alice_headers.0.clone(), alice_headers.1.clone())
            .await
            .assert_status_ok();
        app.get(&format!("/admin/api/v1/employees/{}", records[1].id))
            .add_header(alice_headers.0.clone(), alice_headers.1.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let me: EmployeeResponse = app
            .get("/admin/api/v1/employees/me")
            .add_header(alice_headers.0.clone(), alice_headers.1.clone())
            .await
            .json();
        assert_eq!(me.id, records[0].id);

        app.get("/admin/api/v1/employees")
            .add_header(alice_headers.0.clone(), alice_headers.1.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.patch(&format!("/admin/api/v1/employees/{}", records[0].id))
            .add_header(alice_headers.0.clone(), alice_headers.1.clone())
            .json(&json!({"job_title": "CTO"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let page: PaginatedResponse<EmployeeResponse> = app
            .get("/admin/api/v1/employees?department=&search=engineer")
            .add_header(hr_headers.0.clone(), hr_headers.1.clone())
            .await
            .json();
        assert_eq!(page.total_count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_employee_status_and_manager(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let hr = create_test_user(&pool, tenant, Role::HrManager).await;
        let headers = add_auth_headers(&hr);

        let mut ids = Vec::new();
        for email in ["lead@example.com", "dev@example.com"] {
            let employee: EmployeeResponse = app
                .post("/admin/api/v1/employees")
                .add_header(headers.0.clone(), headers.1.clone())
                .json(&json!({"first_name": "A", "last_name": "B", "email": email, "job_title": "Engineer"}))
                .await
                .json();
            ids.push(employee.id);
        }
        let dev_url = format!("/admin/api/v1/employees/{}", ids[1]);

        let updated: EmployeeResponse = app
            .patch(&dev_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"manager_id": ids[0], "status": "on_leave"}))
            .await
            .json();
        assert_eq!(updated.manager_id, Some(ids[0]));
        assert_eq!(updated.status, EmployeeStatus::OnLeave);

        app.patch(&dev_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"manager_id": ids[1]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.patch(&dev_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "terminated"}))
            .await
            .assert_status_ok();
        app.patch(&dev_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"status": "active"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.delete(&dev_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.get(&dev_url)
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_convert_candidate_hires_and_fills(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let candidate = create_test_candidate(&pool, tenant).await;

        let position: PositionResponse = app
            .post("/admin/api/v1/positions")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"title": "Compiler engineer"}))
            .await
            .json();
        let entry: PipelineEntryResponse = app
            .post(&format!("/admin/api/v1/positions/{}/pipeline", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"candidate_id": candidate.id}))
            .await
            .json();

        let response = app
            .post(&format!("/admin/api/v1/candidates/{}/convert", candidate.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"job_title": "Compiler engineer", "candidate_position_id": entry.id}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let converted: ConvertCandidateResponse = response.json();
        assert!(converted.user_created);
        assert_eq!(converted.user.roles, vec![Role::Employee]);
        assert_eq!(converted.employee.candidate_id, Some(candidate.id));
        assert_eq!(converted.employee.email, candidate.email);

        let hired: CandidateResponse = app
            .get(&format!("/admin/api/v1/candidates/{}", candidate.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(hired.status, CandidateStatus::Hired);

        let filled: PositionResponse = app
            .get(&format!("/admin/api/v1/positions/{}", position.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .await
            .json();
        assert_eq!(filled.status, PositionStatus::Filled);

        app.post(&format!("/admin/api/v1/candidates/{}/convert", candidate.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"job_title": "Again"}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_convert_rolls_back_on_conflict(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "acme").await;
        let admin = create_test_user(&pool, tenant, Role::Admin).await;
        let headers = add_auth_headers(&admin);
        let candidate = create_test_candidate(&pool, tenant).await;

        // The linked user is already an employee, so nothing may be written
        let staff = create_test_user(&pool, tenant, Role::Recruiter).await;
        app.post("/admin/api/v1/employees")
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"user_id": staff.id, "first_name": "S", "last_name": "T", "email": staff.email, "job_title": "X"}))
            .await
            .assert_status(StatusCode::CREATED);

        app.post(&format!("/admin/api/v1/candidates/{}/convert", candidate.id))
            .add_header(headers.0.clone(), headers.1.clone())
            .json(&json!({"job_title": "Engineer", "user_id": staff.id}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let mut conn = pool.acquire().await.unwrap();
        let unchanged = Candidates::new(&mut conn, tenant).get_by_id(candidate.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, CandidateStatus::New);
        assert!(Employees::new(&mut conn, tenant).get_by_candidate(candidate.id).await.unwrap().is_none());

        let recruiter = create_test_user(&pool, tenant, Role::Recruiter).await;
        app.post(&format!("/admin/api/v1/candidates/{}/convert", candidate.id))
            .add_header(add_auth_headers(&recruiter).0, add_auth_headers(&recruiter).1)
            .json(&json!({"job_title": "Engineer"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
