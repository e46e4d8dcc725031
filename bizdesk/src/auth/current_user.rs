use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Extract user from the JWT session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(user)): Valid JWT found and verified
/// - Some(Err(error)): Cookie header present but unreadable, or the token failed verification
#[instrument(skip(parts, config))]
fn try_cookie_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.native.session.cookie_name;

    let token = cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)?;

    Some(session::verify_session_token(token, config))
}

/// Extract user from an `Authorization: Bearer <jwt>` header
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Valid JWT found and verified
/// - Some(Err(error)): Bearer token present but invalid
#[instrument(skip(parts, config))]
fn try_bearer_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?.trim();
    Some(session::verify_session_token(token, config))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Try each credential source and return the first that verifies. A stale cookie
        // alongside a valid bearer token still authenticates.
        let mut auth_errors = Vec::new();

        for (source, attempt) in [
            ("Bearer token", try_bearer_auth(parts, &state.config)),
            ("Session cookie", try_cookie_auth(parts, &state.config)),
        ] {
            match attempt {
                Some(Ok(user)) => {
                    debug!(user_id = %user.id, tenant_id = %user.tenant_id, "authenticated via {source}");
                    return Ok(user);
                }
                Some(Err(e)) => {
                    trace!("{source} authentication failed: {e:?}");
                    auth_errors.push((source, e));
                }
                None => trace!("No {source} present"),
            }
        }

        if let Some(internal) = auth_errors.into_iter().find_map(|(_, e)| match e {
            Error::Internal { .. } => Some(e),
            _ => None,
        }) {
            return Err(internal);
        }
        Err(Error::Unauthenticated { message: None })
    }
}
