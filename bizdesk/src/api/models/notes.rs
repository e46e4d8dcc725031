//! API models for candidate notes and the `@username` mentions inside them.

use super::pagination::Pagination;
use crate::db::models::notes::NoteDBResponse;
use crate::types::{CandidateId, NoteId, UserId};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::{IntoParams, ToSchema};

/// `@name` not preceded by a word character, so email addresses do not count as mentions.
static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w@])@([A-Za-z0-9][A-Za-z0-9._-]{0,63})").expect("valid mention regex"));

/// Usernames are restricted to the characters a mention can carry, and cannot end in `.` or `-`.
pub static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]{0,62}[A-Za-z0-9_])?$").expect("valid username regex"));

/// Usernames mentioned in a note body, in order of first appearance, de-duplicated
/// case-insensitively. Trailing `.` and `-` are treated as punctuation.
pub fn extract_mentions(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-']).to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteCreate {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NoteId,
    #[schema(value_type = String, format = "uuid")]
    pub candidate_id: CandidateId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub author_id: Option<UserId>,
    pub author_username: Option<String>,
    pub body: String,
    #[schema(value_type = Vec<String>)]
    pub mentioned_user_ids: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListNotesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

impl From<NoteDBResponse> for NoteResponse {
    fn from(db: NoteDBResponse) -> Self {
        Self {
            id: db.id,
            candidate_id: db.candidate_id,
            author_id: db.author_id,
            author_username: db.author_username,
            body: db.body,
            mentioned_user_ids: db.mentioned_user_ids,
            created_at: db.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_mentions() {
        assert_eq!(
            extract_mentions("@ada can you and @grace.hopper take a look?"),
            vec!["ada".to_string(), "grace.hopper".to_string()]
        );
    }

    #[test]
    fn ignores_emails_and_trailing_punctuation() {
        assert_eq!(
            extract_mentions("Mail bob@example.com, then ping @alan. Thanks @sam-"),
            vec!["alan".to_string(), "sam".to_string()]
        );
    }

    #[test]
    fn dedupes_case_insensitively() {
        assert_eq!(extract_mentions("@Ada @ada (@ADA)"), vec!["Ada".to_string()]);
        assert!(extract_mentions("no mentions @ here").is_empty());
    }

    #[test]
    fn usernames_match_mention_syntax() {
        assert!(USERNAME.is_match("grace.hopper"));
        assert!(USERNAME.is_match("j_doe-2"));
        assert!(!USERNAME.is_match("-leading"));
        assert!(!USERNAME.is_match("trailing."));
        assert!(!USERNAME.is_match("trailing-"));
        assert!(USERNAME.is_match("a"));
        assert!(!USERNAME.is_match("with space"));
    }
}
