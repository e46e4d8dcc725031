//! Role-based permission checks and the [`RequiresPermission`] extractor.
//!
//! Each [`Role`] grants a fixed set of `(Resource, Operation)` pairs. A user holding several
//! roles gets the union. An `*All` grant implies the matching `*Own` grant.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::Error,
    types::{Operation, Permission, Resource, UserId},
};

/// Type-level resource markers for [`RequiresPermission`].
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync + 'static {
        const RESOURCE: Resource;
    }

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(Users, Candidates, Opportunities, Positions, Pipeline, Employees, Templates, Notes, Notifications);
}

/// Type-level operation markers for [`RequiresPermission`].
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync + 'static {
        const OPERATION: Operation;
    }

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

const ALL_OPERATIONS: &[Operation] = &[
    Operation::CreateAll,
    Operation::ReadAll,
    Operation::UpdateAll,
    Operation::DeleteAll,
];
const READ_UPDATE: &[Operation] = &[Operation::ReadAll, Operation::UpdateAll];
const READ: &[Operation] = &[Operation::ReadAll];

/// The `*All` operation that subsumes an `*Own` one.
fn widen(operation: Operation) -> Option<Operation> {
    match operation {
        Operation::CreateOwn => Some(Operation::CreateAll),
        Operation::ReadOwn => Some(Operation::ReadAll),
        Operation::UpdateOwn => Some(Operation::UpdateAll),
        Operation::DeleteOwn => Some(Operation::DeleteAll),
        _ => None,
    }
}

/// Operations a role is granted directly on a resource.
fn grants(role: Role, resource: Resource) -> &'static [Operation] {
    use Resource::*;
    match (role, resource) {
        (Role::Admin, _) => ALL_OPERATIONS,

        (Role::Recruiter, Candidates | Pipeline | Notes) => ALL_OPERATIONS,
        (Role::Recruiter, Positions) => READ_UPDATE,
        (Role::Recruiter, Templates) => READ,

        (Role::HrManager, Employees | Templates | Notes) => ALL_OPERATIONS,
        (Role::HrManager, Candidates | Pipeline) => READ_UPDATE,
        (Role::HrManager, Positions) => READ,

        (Role::SalesManager, Opportunities | Positions | Notes) => ALL_OPERATIONS,
        (Role::SalesManager, Candidates) => READ,

        _ => &[],
    }
}

/// Grants every authenticated user has regardless of role.
fn baseline(resource: Resource, operation: Operation) -> bool {
    matches!(
        (resource, operation),
        (Resource::Users, Operation::ReadOwn)
            | (Resource::Employees, Operation::ReadOwn)
            | (Resource::Notifications, Operation::ReadOwn)
            | (Resource::Notifications, Operation::UpdateOwn)
    )
}

pub fn role_has_permission(role: Role, resource: Resource, operation: Operation) -> bool {
    let granted = grants(role, resource);
    granted.contains(&operation) || widen(operation).is_some_and(|all| granted.contains(&all))
}

pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    baseline(resource, operation) || user.roles.iter().any(|role| role_has_permission(*role, resource, operation))
}

pub fn can_read_all_resources(user: &CurrentUser, resource: Resource) -> bool {
    has_permission(user, resource, Operation::ReadAll)
}

/// Whether the user may read a record owned by `owner_id`.
pub fn can_read_own_resource(user: &CurrentUser, resource: Resource, owner_id: UserId) -> bool {
    user.id == owner_id && has_permission(user, resource, Operation::ReadOwn)
}

pub fn insufficient(resource: Resource, operation: Operation) -> Error {
    Error::InsufficientPermissions {
        required: Permission::Allow(resource, operation),
        action: operation,
        resource: resource.to_string(),
    }
}

/// Extractor that authenticates the caller and rejects them with 403 unless one of their
/// roles grants `O` on `R`. Derefs to the [`CurrentUser`].
pub struct RequiresPermission<R, O> {
    user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R, O> RequiresPermission<R, O> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !has_permission(&user, R::RESOURCE, O::OPERATION) {
            tracing::debug!(user_id = %user.id, resource = %R::RESOURCE, action = ?O::OPERATION, "permission denied");
            return Err(insufficient(R::RESOURCE, O::OPERATION));
        }
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "u".to_string(),
            email: "u@example.com".to_string(),
            roles,
            display_name: None,
        }
    }

    #[test]
    fn admin_can_do_everything() {
        for resource in [Resource::Users, Resource::Opportunities, Resource::Employees, Resource::Templates] {
            for op in ALL_OPERATIONS {
                assert!(role_has_permission(Role::Admin, resource, *op));
            }
        }
    }

    #[test]
    fn recruiter_grants() {
        assert!(role_has_permission(Role::Recruiter, Resource::Candidates, Operation::DeleteAll));
        assert!(role_has_permission(Role::Recruiter, Resource::Pipeline, Operation::UpdateAll));
        assert!(role_has_permission(Role::Recruiter, Resource::Positions, Operation::UpdateAll));
        assert!(!role_has_permission(Role::Recruiter, Resource::Positions, Operation::CreateAll));
        assert!(role_has_permission(Role::Recruiter, Resource::Templates, Operation::ReadAll));
        assert!(!role_has_permission(Role::Recruiter, Resource::Templates, Operation::CreateAll));
        assert!(!role_has_permission(Role::Recruiter, Resource::Employees, Operation::ReadAll));
        assert!(!role_has_permission(Role::Recruiter, Resource::Opportunities, Operation::ReadAll));
    }

    #[test]
    fn hr_and_sales_grants() {
        assert!(role_has_permission(Role::HrManager, Resource::Employees, Operation::CreateAll));
        assert!(role_has_permission(Role::HrManager, Resource::Candidates, Operation::UpdateAll));
        assert!(!role_has_permission(Role::HrManager, Resource::Candidates, Operation::DeleteAll));
        assert!(!role_has_permission(Role::HrManager, Resource::Positions, Operation::UpdateAll));

        assert!(role_has_permission(Role::SalesManager, Resource::Opportunities, Operation::DeleteAll));
        assert!(role_has_permission(Role::SalesManager, Resource::Positions, Operation::CreateAll));
        assert!(role_has_permission(Role::SalesManager, Resource::Candidates, Operation::ReadAll));
        assert!(!role_has_permission(Role::SalesManager, Resource::Pipeline, Operation::ReadAll));
    }

    #[test]
    fn all_implies_own() {
        assert!(role_has_permission(Role::Recruiter, Resource::Candidates, Operation::ReadOwn));
        assert!(role_has_permission(Role::HrManager, Resource::Employees, Operation::UpdateOwn));
        assert!(!role_has_permission(Role::Employee, Resource::Employees, Operation::ReadAll));
    }

    #[test]
    fn employees_only_see_themselves() {
        let employee = user(vec![Role::Employee]);
        assert!(!has_permission(&employee, Resource::Employees, Operation::ReadAll));
        assert!(has_permission(&employee, Resource::Employees, Operation::ReadOwn));
        assert!(can_read_own_resource(&employee, Resource::Users, employee.id));
        assert!(!can_read_own_resource(&employee, Resource::Users, Uuid::new_v4()));
        assert!(!has_permission(&employee, Resource::Candidates, Operation::ReadAll));
    }

    #[test]
    fn roles_combine() {
        let both = user(vec![Role::Recruiter, Role::SalesManager]);
        assert!(has_permission(&both, Resource::Opportunities, Operation::CreateAll));
        assert!(has_permission(&both, Resource::Pipeline, Operation::DeleteAll));
        assert!(!has_permission(&both, Resource::Employees, Operation::ReadAll));
    }

    #[test]
    fn everyone_reads_their_notifications() {
        let nobody = user(vec![]);
        assert!(has_permission(&nobody, Resource::Notifications, Operation::ReadOwn));
        assert!(has_permission(&nobody, Resource::Notifications, Operation::UpdateOwn));
        assert!(!has_permission(&nobody, Resource::Notifications, Operation::ReadAll));
    }

    #[test]
    fn denial_is_forbidden() {
        let err = insufficient(Resource::Templates, Operation::CreateAll);
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
