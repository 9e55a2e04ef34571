//! Per-operation response normalization.
//!
//! Upstream image responses are heterogeneous: some carry a hosted URL,
//! others inline Base64 under one of several field names. Normalization
//! collapses both into a single `{url}` shape.

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base64 field names probed when no URL is present, in precedence order.
/// The order is a documented contract, not incidental.
const BASE64_FIELDS: [&str; 3] = ["b64_json", "image_base64", "base64"];

/// Canonical image result: either a passthrough HTTP(S) URL or a
/// constructed `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedImageResult {
    pub url: String,
}

/// Validate a chat completion body.
///
/// A missing message-content field is malformed (retryable); content that
/// is present but empty is terminal and never retried.
pub fn validate_chat(body: &Value) -> RelayResult<()> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            RelayError::MalformedResponse(
                "chat response has no message content in the first choice".into(),
            )
        })?;

    if content.trim().is_empty() {
        return Err(RelayError::EmptyResponse);
    }

    Ok(())
}

/// Normalize an image generation body into [`NormalizedImageResult`].
///
/// A URL always takes precedence; only otherwise are the Base64 fields
/// probed, in [`BASE64_FIELDS`] order.
pub fn normalize_image(body: &Value) -> RelayResult<NormalizedImageResult> {
    let item = body
        .get("data")
        .and_then(|d| d.get(0))
        .ok_or_else(|| RelayError::MalformedResponse("image response has no data entries".into()))?;

    if let Some(url) = item
        .get("url")
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
    {
        return Ok(NormalizedImageResult {
            url: url.to_string(),
        });
    }

    for field in BASE64_FIELDS {
        if let Some(b64) = item
            .get(field)
            .and_then(|b| b.as_str())
            .filter(|b| !b.is_empty())
        {
            return Ok(NormalizedImageResult {
                url: format!("data:image/png;base64,{}", b64),
            });
        }
    }

    Err(RelayError::MalformedResponse(
        "image response has neither a URL nor inline Base64 data".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_chat_ok() {
        let body = json!({"choices": [{"message": {"content": "Once upon a time"}}]});
        assert!(validate_chat(&body).is_ok());
    }

    #[test]
    fn test_validate_chat_missing_content_is_malformed() {
        let body = json!({"choices": [{"message": {}}]});
        let err = validate_chat(&body).unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse(_)));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_validate_chat_no_choices_is_malformed() {
        let body = json!({"choices": []});
        assert!(matches!(
            validate_chat(&body).unwrap_err(),
            RelayError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_validate_chat_empty_content_is_terminal() {
        let body = json!({"choices": [{"message": {"content": ""}}]});
        let err = validate_chat(&body).unwrap_err();
        assert!(matches!(err, RelayError::EmptyResponse));
        assert!(err.is_terminal());
    }

    #[test]
    fn test_validate_chat_whitespace_content_is_terminal() {
        let body = json!({"choices": [{"message": {"content": "   \n"}}]});
        assert!(matches!(
            validate_chat(&body).unwrap_err(),
            RelayError::EmptyResponse
        ));
    }

    #[test]
    fn test_normalize_image_url_passthrough() {
        let body = json!({"data": [{"url": "https://x"}]});
        let result = normalize_image(&body).unwrap();
        assert_eq!(result.url, "https://x");
    }

    #[test]
    fn test_normalize_image_url_takes_precedence_over_base64() {
        let body = json!({"data": [{"url": "https://x", "b64_json": "QQ=="}]});
        assert_eq!(normalize_image(&body).unwrap().url, "https://x");
    }

    #[test]
    fn test_normalize_image_b64_json() {
        let body = json!({"data": [{"b64_json": "QQ=="}]});
        let result = normalize_image(&body).unwrap();
        assert_eq!(result.url, "data:image/png;base64,QQ==");
    }

    #[test]
    fn test_normalize_image_base64_field_order() {
        // b64_json wins over the other spellings
        let body = json!({"data": [{"base64": "Yg==", "image_base64": "YQ==", "b64_json": "QQ=="}]});
        assert_eq!(normalize_image(&body).unwrap().url, "data:image/png;base64,QQ==");

        // image_base64 wins over base64
        let body = json!({"data": [{"base64": "Yg==", "image_base64": "YQ=="}]});
        assert_eq!(normalize_image(&body).unwrap().url, "data:image/png;base64,YQ==");

        // base64 is the last resort
        let body = json!({"data": [{"base64": "Yg=="}]});
        assert_eq!(normalize_image(&body).unwrap().url, "data:image/png;base64,Yg==");
    }

    #[test]
    fn test_normalize_image_no_data_is_malformed() {
        let err = normalize_image(&json!({})).unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse(_)));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_normalize_image_no_recognized_field_is_malformed() {
        let body = json!({"data": [{"revised_prompt": "a cat"}]});
        assert!(matches!(
            normalize_image(&body).unwrap_err(),
            RelayError::MalformedResponse(_)
        ));
    }
}
