//! Authentication and authorization.
//!
//! Users log in via `/authentication/login` with email and password and receive a signed
//! JWT, both as an HTTP-only session cookie and in the response body. Subsequent requests
//! present it as that cookie or as an `Authorization: Bearer <jwt>` header. The token
//! carries the user's tenant and roles, so requests need no session lookup.
//!
//! Authorization is role based: see [`permissions`] for the role → permission map and the
//! [`RequiresPermission`](permissions::RequiresPermission) extractor.
//!
//! ```ignore
//! use bizdesk::auth::permissions::{RequiresPermission, operation, resource};
//!
//! async fn list_candidates(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::Candidates, operation::ReadAll>,
//! ) -> Result<Json<...>> {
//!     let tenant = current_user.tenant_id;
//!     // ...
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
pub mod utils;
