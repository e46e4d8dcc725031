//! API request/response models for HR employee records.

use super::pagination::Pagination;
use super::users::UserResponse;
use crate::db::models::employees::EmployeeDBResponse;
use crate::types::{CandidateId, EmployeeId, PipelineEntryId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// `active ↔ on_leave`, either of them `→ terminated`. `terminated` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "employee_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Terminated,
}

impl EmployeeStatus {
    pub fn can_transition_to(self, next: EmployeeStatus) -> bool {
        use EmployeeStatus::*;
        matches!(
            (self, next),
            (Active, OnLeave) | (OnLeave, Active) | (Active, Terminated) | (OnLeave, Terminated)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "employment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    #[default]
    FullTime,
    PartTime,
    Contractor,
    Intern,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeCreate {
    /// Link an existing user. When omitted a user with the `employee` role is created from `email`.
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    pub department: Option<String>,
    #[serde(default)]
    pub employment_type: EmploymentType,
    /// Defaults to today
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<EmployeeId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EmployeeUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub start_date: Option<NaiveDate>,
    pub status: Option<EmployeeStatus>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<EmployeeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EmployeeId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub candidate_id: Option<CandidateId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    pub department: Option<String>,
    pub employment_type: EmploymentType,
    pub start_date: NaiveDate,
    pub status: EmployeeStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<EmployeeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListEmployeesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on name, email or job title
    pub search: Option<String>,

    pub status: Option<EmployeeStatus>,

    /// Exact department, case-insensitive
    pub department: Option<String>,
}

/// Turn a candidate into an employee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertCandidateRequest {
    /// Link an existing user instead of creating one from the candidate's email
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub job_title: String,
    pub department: Option<String>,
    #[serde(default)]
    pub employment_type: EmploymentType,
    /// Defaults to today
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<EmployeeId>,
    /// Pipeline entry to mark `hired` alongside the conversion
    #[schema(value_type = Option<String>, format = "uuid")]
    pub candidate_position_id: Option<PipelineEntryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertCandidateResponse {
    pub employee: EmployeeResponse,
    pub user: UserResponse,
    /// Whether a new user account was created for the employee
    pub user_created: bool,
}

impl From<EmployeeDBResponse> for EmployeeResponse {
    fn from(db: EmployeeDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            candidate_id: db.candidate_id,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email,
            job_title: db.job_title,
            department: db.department,
            employment_type: db.employment_type,
            start_date: db.start_date,
            status: db.status,
            manager_id: db.manager_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
