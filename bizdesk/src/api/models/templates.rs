//! API request/response models for email templates.

use super::pagination::Pagination;
use crate::db::models::templates::TemplateDBResponse;
use crate::templates::Block;
use crate::types::{CandidateId, TemplateId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Create a template from a block tree or from raw HTML. Exactly one of the two is required;
/// when both are given the blocks win.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateCreate {
    pub name: String,
    #[serde(default)]
    pub subject: String,
    pub category: Option<String>,
    pub blocks: Option<Vec<Block>>,
    pub html: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub blocks: Option<Vec<Block>>,
    pub html: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TemplateId,
    pub name: String,
    pub subject: String,
    pub category: Option<String>,
    pub blocks: Vec<Block>,
    pub html: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListTemplatesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on name or subject
    pub search: Option<String>,

    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompileRequest {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompileResponse {
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParseRequest {
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParseResponse {
    pub blocks: Vec<Block>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderRequest {
    /// Values for `{{ ... }}` merge fields
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub variables: serde_json::Value,
    /// Fail on undefined variables instead of rendering them empty. Defaults to the server setting.
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderResponse {
    pub subject: String,
    pub html: String,
}

/// Render a template for a candidate and email it.
///
/// Merge fields see `candidate` (the candidate's fields), `sender` (the caller) and any extra
/// `variables`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendTemplateRequest {
    #[schema(value_type = String, format = "uuid")]
    pub candidate_id: CandidateId,
    /// Override the recipient; defaults to the candidate's email
    pub to: Option<String>,
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub variables: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendTemplateResponse {
    pub to: String,
    pub subject: String,
}

impl From<TemplateDBResponse> for TemplateResponse {
    fn from(db: TemplateDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            subject: db.subject,
            category: db.category,
            blocks: db.blocks.0,
            html: db.html,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
