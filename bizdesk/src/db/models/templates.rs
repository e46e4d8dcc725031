//! Database models for email templates.

use crate::templates::Block;
use crate::types::{TemplateId, TenantId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;

/// Blocks and the HTML compiled from them are always written together.
#[derive(Debug, Clone)]
pub struct TemplateCreateDBRequest {
    pub name: String,
    pub subject: String,
    pub category: Option<String>,
    pub blocks: Vec<Block>,
    pub html: String,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateUpdateDBRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub category: Option<String>,
    /// Replaces both `blocks` and `html`
    pub content: Option<(Vec<Block>, String)>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TemplateDBResponse {
    pub id: TemplateId,
    pub tenant_id: TenantId,
    pub name: String,
    pub subject: String,
    pub category: Option<String>,
    pub blocks: Json<Vec<Block>>,
    pub html: String,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
