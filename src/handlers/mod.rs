//! HTTP binding for the relay operations (/relay/{operation})

use crate::cache::ImageCache;
use crate::error::{RelayError, RelayResult};
use crate::relay::{Operation, Relay, RelayOutput};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Shared state for the relay endpoints. The cache is the only shared
/// mutable resource; handlers serialize access through the mutex.
pub struct AppState {
    pub relay: Relay,
    pub image_cache: Option<Mutex<ImageCache>>,
}

pub async fn relay_handler(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
    body: Bytes,
) -> RelayResult<Response> {
    let operation: Operation = operation.parse()?;

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Failed to parse request as JSON: {}", e);
        RelayError::InvalidRequest(format!("Invalid JSON: {}", e))
    })?;

    tracing::debug!(%operation, "Received relay request");

    let cache_key = match (operation, &state.image_cache) {
        (Operation::Image, Some(_)) => Some(image_cache_key(&payload)),
        _ => None,
    };

    // Consult the cache before any network call.
    if let (Some(key), Some(cache)) = (&cache_key, &state.image_cache) {
        if let Some(result) = cache.lock().get(key) {
            tracing::debug!("Image cache hit");
            return Ok(Json(result).into_response());
        }
    }

    let output = state.relay.call(operation, &payload).await?;

    match output {
        RelayOutput::Json(value) => Ok(Json(value).into_response()),
        RelayOutput::Image(result) => {
            if let (Some(key), Some(cache)) = (cache_key, &state.image_cache) {
                cache.lock().put(key, result.clone());
            }
            Ok(Json(result).into_response())
        }
        RelayOutput::Binary {
            content_type,
            bytes,
        } => Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response()),
    }
}

pub async fn health_handler() -> &'static str {
    "OK"
}

fn image_cache_key(payload: &Value) -> String {
    let character_id = string_field(payload, &["character_id", "characterId"]);
    let archetype = string_field(payload, &["archetype"]);
    let prompt = string_field(payload, &["prompt"]);
    ImageCache::key(character_id, archetype, prompt)
}

fn string_field<'a>(payload: &'a Value, names: &[&str]) -> &'a str {
    names
        .iter()
        .find_map(|name| payload.get(name).and_then(|v| v.as_str()))
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_cache_key_accepts_both_id_spellings() {
        let snake = json!({"character_id": "c1", "archetype": "wizard", "prompt": "a cat"});
        let camel = json!({"characterId": "c1", "archetype": "wizard", "prompt": "a cat"});
        assert_eq!(image_cache_key(&snake), image_cache_key(&camel));
    }

    #[test]
    fn test_image_cache_key_missing_id_is_empty_string() {
        let without = json!({"archetype": "wizard", "prompt": "a cat"});
        let explicit = json!({"character_id": "", "archetype": "wizard", "prompt": "a cat"});
        assert_eq!(image_cache_key(&without), image_cache_key(&explicit));
    }
}
