//! The CRUD surface shared by the tenant-scoped repositories.

use crate::db::errors::Result;

/// Create, fetch, list, update and delete for one table.
///
/// Implementors borrow a connection (or a transaction) together with the caller's tenant, and
/// every operation is confined to that tenant's rows. Table-specific queries such as row locks
/// or status changes live as inherent methods next to the implementation.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;

    type UpdateRequest;

    /// Row type returned by every operation
    type Response;

    type Id: Send + Sync;

    /// Filter and pagination for [`Repository::list`]
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// `None` when the row does not exist or belongs to another tenant
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Returns whether a row was removed
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Partial update; `None` fields keep their current value
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
