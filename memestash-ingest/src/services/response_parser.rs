//! Vision model response parsing
//!
//! Two stages: strip the markdown fence the model often wraps its JSON in,
//! then decode and validate the payload.

use thiserror::Error;

use crate::models::{MemeAnalysis, ValidationError};

/// Characters of raw content kept on a format error
pub const EXCERPT_CHARS: usize = 200;

/// Why a response could not be turned into an analysis
#[derive(Debug, Error)]
pub enum FormatErrorCause {
    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Unparseable or invalid model content
#[derive(Debug, Error)]
#[error("{cause} (content: {excerpt:?})")]
pub struct FormatError {
    pub cause: FormatErrorCause,
    /// Leading characters of the raw response content
    pub excerpt: String,
}

/// Strip an optional leading ```json / ``` fence and an optional trailing fence
pub fn extract_fenced_payload(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Decode the fenced or bare payload and apply every validation rule
pub fn decode_and_validate(raw: &str) -> Result<MemeAnalysis, FormatError> {
    let excerpt = || raw.chars().take(EXCERPT_CHARS).collect::<String>();

    let analysis: MemeAnalysis =
        serde_json::from_str(extract_fenced_payload(raw)).map_err(|e| FormatError {
            cause: e.into(),
            excerpt: excerpt(),
        })?;

    analysis.validate().map_err(|e| FormatError {
        cause: e.into(),
        excerpt: excerpt(),
    })?;

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"text_content":"top text","description":"A dog in sunglasses","tags":["dog","cool","sunglasses","summer","meme"],"title":"Cool dog"}"#;

    #[test]
    fn test_fenced_and_bare_payloads_decode_identically() {
        let bare = decode_and_validate(PAYLOAD).unwrap();
        let json_fence = decode_and_validate(&format!("```json\n{}\n```", PAYLOAD)).unwrap();
        let plain_fence = decode_and_validate(&format!("  ```\n{}\n```  \n", PAYLOAD)).unwrap();

        assert_eq!(bare, json_fence);
        assert_eq!(bare, plain_fence);
    }

    #[test]
    fn test_leading_fence_without_trailing_fence() {
        assert_eq!(
            extract_fenced_payload(&format!("```json\n{}", PAYLOAD)),
            PAYLOAD
        );
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let err = decode_and_validate("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err.cause, FormatErrorCause::Decode(_)));
        assert_eq!(err.excerpt, "Sorry, I can't help with that.");
    }

    #[test]
    fn test_rule_violation_is_validation_error() {
        let raw = r#"{"description":"d","tags":["a","b"],"title":"t"}"#;
        let err = decode_and_validate(raw).unwrap_err();
        assert!(matches!(
            err.cause,
            FormatErrorCause::Validation(ValidationError::TagCount { count: 2 })
        ));
    }

    #[test]
    fn test_excerpt_is_truncated() {
        let raw = "x".repeat(500);
        let err = decode_and_validate(&raw).unwrap_err();
        assert_eq!(err.excerpt.chars().count(), EXCERPT_CHARS);
    }
}
