//! OpenAPI documentation for the management API at `/admin/api/v1/*` and the
//! authentication routes.
//!
//! Served as JSON at `/admin/api-docs/openapi.json` and rendered by Scalar at `/admin/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Session cookie and bearer token schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "BearerAuth".to_string(),
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(
                        "Session token returned by `/authentication/login`. Include it in the `Authorization` header:\n\n\
                        ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                    ))
                    .build(),
            ),
        );
        components.security_schemes.insert(
            "CookieAuth".to_string(),
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "bizdesk_session",
                "Session cookie set by `/authentication/login` and `/authentication/register`.",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "bizdesk",
        description = "Multi-tenant CRM, recruitment, HR and email template API."
    ),
    paths(
        api::handlers::auth::get_registration_info,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::config::get_config,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::candidates::list_candidates,
        api::handlers::candidates::create_candidate,
        api::handlers::candidates::get_candidate,
        api::handlers::candidates::update_candidate,
        api::handlers::candidates::delete_candidate,
        api::handlers::opportunities::list_opportunities,
        api::handlers::opportunities::create_opportunity,
        api::handlers::opportunities::get_opportunity,
        api::handlers::opportunities::update_opportunity,
        api::handlers::opportunities::delete_opportunity,
        api::handlers::positions::list_positions,
        api::handlers::positions::create_position,
        api::handlers::positions::get_position,
        api::handlers::positions::update_position,
        api::handlers::positions::delete_position,
        api::handlers::pipeline::add_to_pipeline,
        api::handlers::pipeline::move_entry,
        api::handlers::pipeline::remove_entry,
        api::handlers::pipeline::get_board,
        api::handlers::pipeline::list_candidate_positions,
        api::handlers::employees::list_employees,
        api::handlers::employees::create_employee,
        api::handlers::employees::get_own_employee,
        api::handlers::employees::get_employee,
        api::handlers::employees::update_employee,
        api::handlers::employees::delete_employee,
        api::handlers::employees::convert_candidate,
        api::handlers::templates::list_templates,
        api::handlers::templates::create_template,
        api::handlers::templates::get_template,
        api::handlers::templates::update_template,
        api::handlers::templates::delete_template,
        api::handlers::templates::compile_blocks,
        api::handlers::templates::parse_html,
        api::handlers::templates::render_template,
        api::handlers::templates::send_template,
        api::handlers::notes::create_note,
        api::handlers::notes::list_notes,
        api::handlers::notes::delete_note,
        api::handlers::notifications::list_notifications,
        api::handlers::notifications::mark_notification_read,
        api::handlers::notifications::mark_all_notifications_read,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Login, logout and organisation registration"),
        (name = "config", description = "Frontend configuration"),
        (name = "users", description = "User accounts within an organisation"),
        (name = "candidates", description = "Recruitment candidates"),
        (name = "opportunities", description = "Sales opportunities"),
        (name = "positions", description = "Open positions linked to opportunities"),
        (name = "pipeline", description = "Candidates moving through a position's stages"),
        (name = "employees", description = "HR records and candidate conversion"),
        (name = "templates", description = "Email templates and the block compiler"),
        (name = "notes", description = "Candidate notes with @mentions"),
        (name = "notifications", description = "The caller's in-app notifications"),
    )
)]
pub struct ApiDoc;
