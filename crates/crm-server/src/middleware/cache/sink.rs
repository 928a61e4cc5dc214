//! Response sink that copies emitted JSON into the cache.

use crate::cache::CacheClient;
use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, Response, StatusCode},
    response::IntoResponse,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps the outbound response of one request.
///
/// A `200 OK` JSON response with a known length is forwarded unchanged
/// while a detached task writes the same bytes to the cache. Only the body
/// is stored and a hit replays it as `200 OK`, so any other status (203,
/// 206, errors) passes through untouched, as do other content types and
/// streamed bodies.
pub(crate) struct CachingSink {
    cache: CacheClient,
    key: String,
    ttl: Duration,
    max_body_bytes: usize,
}

impl CachingSink {
    pub(crate) fn new(cache: CacheClient, key: String, ttl: Duration, max_body_bytes: usize) -> Self {
        Self {
            cache,
            key,
            ttl,
            max_body_bytes,
        }
    }

    /// Forward `response`, scheduling the cache write if it qualifies.
    pub(crate) async fn emit(self, response: Response<Body>) -> Response<Body> {
        if !self.accepts(&response) {
            debug!(key = %self.key, status = %response.status(), "Response bypasses cache");
            return response;
        }

        let (parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read handler response body");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        self.store_detached(bytes.clone());
        Response::from_parts(parts, Body::from(bytes))
    }

    fn accepts(&self, response: &Response<Body>) -> bool {
        if response.status() != StatusCode::OK {
            return false;
        }

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        is_json
            && matches!(
                response.body().size_hint().exact(),
                Some(len) if len <= self.max_body_bytes as u64
            )
    }

    /// Spawn the cache write; the request never waits on it.
    fn store_detached(self, body: Bytes) {
        let json = match String::from_utf8(body.to_vec()) {
            Ok(json) => json,
            Err(_) => {
                warn!(key = %self.key, "Response body is not UTF-8, not caching");
                return;
            }
        };

        tokio::spawn(async move {
            match self.cache.set_raw(&self.key, json, self.ttl).await {
                Ok(()) => debug!(key = %self.key, "Cached response"),
                Err(e) => warn!(key = %self.key, error = %e, "Failed to cache response"),
            }
        });
    }
}

/// Response for a cache hit.
pub(crate) fn cached_response(json: String) -> Response<Body> {
    ([(header::CONTENT_TYPE, "application/json")], json).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryStore};
    use crate::config::CacheConfig;
    use axum::Json;
    use std::sync::Arc;

    fn sink(store: &Arc<MemoryStore>, max_body_bytes: usize) -> CachingSink {
        let cache = CacheClient::with_store(CacheConfig::default(), store.clone());
        CachingSink::new(cache, "cache:/t:{}".into(), Duration::from_secs(60), max_body_bytes)
    }

    async fn wait_for(store: &MemoryStore, key: &str) -> Option<String> {
        for _ in 0..50 {
            if let Some(value) = store.get(key).await.unwrap() {
                return Some(value);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_json_response_is_forwarded_and_stored() {
        let store = Arc::new(MemoryStore::new());
        let response = Json(serde_json::json!({"orders": [1, 2]})).into_response();

        let forwarded = sink(&store, 1024).emit(response).await;
        assert_eq!(forwarded.status(), StatusCode::OK);
        let body = axum::body::to_bytes(forwarded.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"orders":[1,2]}"#);

        assert_eq!(
            wait_for(&store, "cache:/t:{}").await.as_deref(),
            Some(r#"{"orders":[1,2]}"#)
        );
    }

    #[tokio::test]
    async fn test_error_status_is_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let response = (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "x"}))).into_response();

        let forwarded = sink(&store, 1024).emit(response).await;
        assert_eq!(forwarded.status(), StatusCode::NOT_FOUND);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_non_200_success_is_not_stored() {
        let store = Arc::new(MemoryStore::new());
        for status in [
            StatusCode::CREATED,
            StatusCode::NON_AUTHORITATIVE_INFORMATION,
            StatusCode::PARTIAL_CONTENT,
        ] {
            let response = (status, Json(serde_json::json!({"part": 1}))).into_response();
            let forwarded = sink(&store, 1024).emit(response).await;
            assert_eq!(forwarded.status(), status);
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_plain_text_is_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let forwarded = sink(&store, 1024).emit("hello".into_response()).await;

        assert_eq!(forwarded.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_passes_through() {
        let store = Arc::new(MemoryStore::new());
        let response = Json(serde_json::json!({"blob": "x".repeat(64)})).into_response();

        let forwarded = sink(&store, 16).emit(response).await;
        let body = axum::body::to_bytes(forwarded.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.len() > 16);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cached_response_shape() {
        let response = cached_response(r#"{"a":1}"#.into());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
