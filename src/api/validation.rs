//! Helpers for `#[derive(Validate)]` request bodies: rules the `validator`
//! crate has no attribute for, and serde adapters that normalise input before
//! it is validated.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer};
use validator::ValidationError;

pub const TAG_MAX: usize = 50;
pub const TAGS_MAX: usize = 20;

fn error(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

/// Rejects empty and whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "must not be blank".to_string()));
    }
    Ok(())
}

/// At most [`TAGS_MAX`] tags, each 1 to [`TAG_MAX`] printable characters.
pub fn tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > TAGS_MAX {
        return Err(error(
            "too_many_tags",
            format!("must contain at most {TAGS_MAX} tags"),
        ));
    }
    let bad_tag = tags.iter().any(|tag| {
        tag.trim().is_empty() || tag.chars().count() > TAG_MAX || tag.chars().any(char::is_control)
    });
    if bad_tag {
        return Err(error(
            "tag",
            format!("each tag must be 1 to {TAG_MAX} printable characters"),
        ));
    }
    Ok(())
}

/// Deserialize a string with surrounding whitespace removed.
pub fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

/// Like [`trimmed`] for optional fields. Pair with `#[serde(default)]`.
pub fn trimmed_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|value| value.trim().to_string()))
}

/// Treat `""` as absent. Pair with `#[serde(default)]`.
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.is_empty()))
}
