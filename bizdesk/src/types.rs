//! Common type definitions and permission system types.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs behind type aliases:
//!
//! - [`TenantId`]: the organisation every record belongs to
//! - [`UserId`]: user account identifier
//! - [`CandidateId`], [`OpportunityId`], [`PositionId`], [`PipelineEntryId`]
//! - [`EmployeeId`], [`TemplateId`], [`NoteId`], [`NotificationId`]
//!
//! # Permission System
//!
//! - [`Resource`]: what entity type is being accessed
//! - [`Operation`]: what action is being performed
//! - [`Permission`]: authorization requirement combining the two
//!
//! Operations come in two flavors: **All** grants access to every entity in
//! the caller's tenant, **Own** restricts it to the caller's own records.

use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

pub type TenantId = Uuid;
pub type UserId = Uuid;
pub type CandidateId = Uuid;
pub type OpportunityId = Uuid;
pub type PositionId = Uuid;
pub type PipelineEntryId = Uuid;
pub type EmployeeId = Uuid;
pub type TemplateId = Uuid;
pub type NoteId = Uuid;
pub type NotificationId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub enum CurrentKeyword {
    #[serde(rename = "current")]
    Current,
}

/// Allows routes like /users/current and /users/{user_id} to hit the same handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdOrCurrent {
    Current(CurrentKeyword),
    Id(UserId),
}

// *-All means every record in the tenant, *-Own means the caller's own records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Candidates,
    Opportunities,
    Positions,
    Pipeline,
    Employees,
    Templates,
    Notes,
    Notifications,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Logical combinator
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::Candidates => "candidates",
            Resource::Opportunities => "opportunities",
            Resource::Positions => "positions",
            Resource::Pipeline => "pipeline entries",
            Resource::Employees => "employees",
            Resource::Templates => "templates",
            Resource::Notes => "notes",
            Resource::Notifications => "notifications",
        };
        f.write_str(name)
    }
}
