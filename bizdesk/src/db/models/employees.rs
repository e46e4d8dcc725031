//! Database models for employees.

use crate::api::models::employees::{EmployeeStatus, EmploymentType};
use crate::types::{CandidateId, EmployeeId, TenantId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct EmployeeCreateDBRequest {
    pub user_id: UserId,
    pub candidate_id: Option<CandidateId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    pub department: Option<String>,
    pub employment_type: EmploymentType,
    pub start_date: NaiveDate,
    pub manager_id: Option<EmployeeId>,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub start_date: Option<NaiveDate>,
    pub status: Option<EmployeeStatus>,
    pub manager_id: Option<EmployeeId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EmployeeDBResponse {
    pub id: EmployeeId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub candidate_id: Option<CandidateId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    pub department: Option<String>,
    pub employment_type: EmploymentType,
    pub start_date: NaiveDate,
    pub status: EmployeeStatus,
    pub manager_id: Option<EmployeeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
