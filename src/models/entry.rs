use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

/// Identifier of a rated entry, assigned by the store
pub type EntryId = i64;

/// Longest accepted user name
pub const MAX_OWNER_LEN: usize = 50;

/// Longest accepted movie title
pub const MAX_SUBJECT_LEN: usize = 255;

/// Coarse judgment given when a movie is first added
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ThumbsDown,
    Okay,
    ThumbsUp,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::ThumbsDown, Category::Okay, Category::ThumbsUp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ThumbsDown => "thumbs_down",
            Category::Okay => "okay",
            Category::ThumbsUp => "thumbs_up",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::InvalidCategory(s.to_string()))
    }
}

/// A single (owner, movie) rated record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatedEntry {
    pub id: EntryId,
    pub owner: String,
    pub subject: String,
    pub rating: i32,
    pub category: Category,
    /// `None` until the first rank recomputation for the owner lands
    pub rank: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry data before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub owner: String,
    pub subject: String,
    pub category: Category,
    pub rating: i32,
}

/// Trims and validates a user name
pub fn normalize_owner(owner: &str) -> Result<String, AppError> {
    normalize_field("user_name", owner, MAX_OWNER_LEN)
}

/// Trims and validates a movie title
pub fn normalize_subject(subject: &str) -> Result<String, AppError> {
    normalize_field("movie_title", subject, MAX_SUBJECT_LEN)
}

fn normalize_field(field: &str, value: &str, max_len: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_str() {
        assert_eq!("thumbs_down".parse::<Category>().unwrap(), Category::ThumbsDown);
        assert_eq!("okay".parse::<Category>().unwrap(), Category::Okay);
        assert_eq!("thumbs_up".parse::<Category>().unwrap(), Category::ThumbsUp);
    }

    #[test]
    fn test_category_from_str_rejects_unknown() {
        let err = "meh".parse::<Category>().unwrap_err();
        assert!(matches!(err, AppError::InvalidCategory(ref s) if s == "meh"));
        assert!("Thumbs_Up".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&Category::ThumbsUp).unwrap();
        assert_eq!(json, "\"thumbs_up\"");
        let parsed: Category = serde_json::from_str("\"thumbs_down\"").unwrap();
        assert_eq!(parsed, Category::ThumbsDown);
    }

    #[test]
    fn test_normalize_owner() {
        assert_eq!(normalize_owner("  alice ").unwrap(), "alice");
        assert!(normalize_owner("   ").is_err());
        assert!(normalize_owner(&"x".repeat(MAX_OWNER_LEN + 1)).is_err());
        assert!(normalize_owner(&"x".repeat(MAX_OWNER_LEN)).is_ok());
    }

    #[test]
    fn test_normalize_subject() {
        assert_eq!(normalize_subject("The Matrix\n").unwrap(), "The Matrix");
        assert!(normalize_subject("").is_err());
    }
}
