//! Authentication utility functions.

use rand::prelude::RngExt;
use rand::rng;

/// Derive a username from the local part of an email address.
///
/// Characters a mention cannot carry are dropped. The result always starts with an
/// alphanumeric character and never ends in `.` or `-`. Falls back to `user`.
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let cleaned: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .skip_while(|c| !c.is_ascii_alphanumeric())
        .take(48)
        .collect::<String>()
        .to_lowercase();
    // A trailing `.` or `-` reads as punctuation after a mention
    let cleaned = cleaned.trim_end_matches(['.', '-']);
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Append a random 4-digit suffix, used when the derived username is already taken.
/// Example: "ada" -> "ada-4729"
pub fn username_with_suffix(base: &str) -> String {
    let number = rng().random_range(1000..10000);
    format!("{base}-{number}")
}
