//! Analysis payload returned by the vision model
//!
//! Validation is a fixed set of named rules, each checked independently so
//! the first violated rule can be reported by name.

use memestash_common::db::MemeRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum title length in characters
pub const TITLE_MAX_CHARS: usize = 30;

/// Minimum number of tags on a validated analysis
pub const MIN_TAGS: usize = 5;

/// Maximum number of tags on a validated analysis
pub const MAX_TAGS: usize = 15;

/// Structured caption/tag payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeAnalysis {
    /// Text visible in the image (may be empty)
    #[serde(default)]
    pub text_content: String,
    pub description: String,
    pub tags: Vec<String>,
    pub title: String,
}

/// Validation rules applied to every analysis before it is stored as success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    TitleNotBlank,
    TitleWithinLength,
    DescriptionNotBlank,
    TagCountInRange,
}

impl ValidationRule {
    /// All rules, in the order they are checked
    pub const ALL: [ValidationRule; 4] = [
        ValidationRule::DescriptionNotBlank,
        ValidationRule::TitleNotBlank,
        ValidationRule::TitleWithinLength,
        ValidationRule::TagCountInRange,
    ];

    /// Check one rule against an analysis
    pub fn check(&self, analysis: &MemeAnalysis) -> Result<(), ValidationError> {
        match self {
            ValidationRule::TitleNotBlank => {
                if analysis.title.trim().is_empty() {
                    return Err(ValidationError::TitleBlank);
                }
            }
            ValidationRule::TitleWithinLength => {
                let len = analysis.title.chars().count();
                if len > TITLE_MAX_CHARS {
                    return Err(ValidationError::TitleTooLong { len });
                }
            }
            ValidationRule::DescriptionNotBlank => {
                if analysis.description.trim().is_empty() {
                    return Err(ValidationError::DescriptionBlank);
                }
            }
            ValidationRule::TagCountInRange => {
                let count = analysis.tags.len();
                if !(MIN_TAGS..=MAX_TAGS).contains(&count) {
                    return Err(ValidationError::TagCount { count });
                }
            }
        }
        Ok(())
    }
}

/// Violated validation rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be blank")]
    TitleBlank,

    #[error("title has {len} characters, maximum is {max}", max = TITLE_MAX_CHARS)]
    TitleTooLong { len: usize },

    #[error("description must not be blank")]
    DescriptionBlank,

    #[error("expected {min}-{max} tags, got {count}", min = MIN_TAGS, max = MAX_TAGS)]
    TagCount { count: usize },
}

impl MemeAnalysis {
    /// Apply every validation rule, returning the first violation
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationRule::ALL
            .iter()
            .try_for_each(|rule| rule.check(self))
    }

    /// Fixed result returned when no AI credentials are configured
    pub fn offline_placeholder() -> Self {
        Self {
            text_content: "Sample text content".to_string(),
            description: "A sample meme showing a funny internet moment, full of jokes and online pop culture.".to_string(),
            tags: ["sample", "meme", "funny", "internet-meme", "test"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            title: "Sample meme".to_string(),
        }
    }

    /// Content stored while analysis is pending or after it failed
    ///
    /// `source_label` names where the image came from (e.g. "discord", "remote").
    pub fn pending_placeholder(source_label: &str) -> Self {
        Self {
            text_content: String::new(),
            description: "Analysis pending...".to_string(),
            tags: vec![
                "pending".to_string(),
                "meme".to_string(),
                source_label.to_string(),
                "unprocessed".to_string(),
                "auto-fetched".to_string(),
            ],
            title: "Pending analysis".to_string(),
        }
    }

    /// Overwrite the analysis fields of a stored record
    pub fn apply_to(&self, record: &mut MemeRecord) {
        record.text_content = self.text_content.clone();
        record.description = self.description.clone();
        record.tags = self.tags.clone();
        record.title = self.title.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> MemeAnalysis {
        MemeAnalysis {
            text_content: "when the build passes".to_string(),
            description: "A cat staring at a monitor".to_string(),
            tags: (1..=5).map(|i| format!("tag{}", i)).collect(),
            title: "Build cat".to_string(),
        }
    }

    #[test]
    fn test_valid_analysis_passes() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn test_tag_count_bounds() {
        let mut a = valid();
        a.tags.truncate(4);
        assert_eq!(a.validate(), Err(ValidationError::TagCount { count: 4 }));

        a.tags = (0..15).map(|i| i.to_string()).collect();
        assert_eq!(a.validate(), Ok(()));

        a.tags.push("sixteen".to_string());
        assert_eq!(a.validate(), Err(ValidationError::TagCount { count: 16 }));
    }

    #[test]
    fn test_blank_title_rejected() {
        let mut a = valid();
        a.title = "   ".to_string();
        assert_eq!(a.validate(), Err(ValidationError::TitleBlank));
    }

    #[test]
    fn test_blank_description_rejected() {
        let mut a = valid();
        a.description = "\n\t".to_string();
        assert_eq!(a.validate(), Err(ValidationError::DescriptionBlank));
    }

    #[test]
    fn test_title_length_counts_characters_not_bytes() {
        let mut a = valid();
        // 30 multi-byte characters is within the limit
        a.title = "猫".repeat(30);
        assert_eq!(a.validate(), Ok(()));

        a.title = "x".repeat(31);
        assert_eq!(a.validate(), Err(ValidationError::TitleTooLong { len: 31 }));
    }

    #[test]
    fn test_offline_placeholder_is_deterministic_and_valid() {
        assert_eq!(MemeAnalysis::offline_placeholder(), MemeAnalysis::offline_placeholder());
        assert_eq!(MemeAnalysis::offline_placeholder().validate(), Ok(()));
    }

    #[test]
    fn test_pending_placeholder_carries_source_label() {
        let p = MemeAnalysis::pending_placeholder("remote");
        assert!(p.tags.contains(&"remote".to_string()));
        assert!(p.text_content.is_empty());
    }

    #[test]
    fn test_missing_text_content_defaults_to_empty() {
        let a: MemeAnalysis = serde_json::from_str(
            r#"{"description":"d","tags":["a","b","c","d","e"],"title":"t"}"#,
        )
        .unwrap();
        assert_eq!(a.text_content, "");
    }
}
