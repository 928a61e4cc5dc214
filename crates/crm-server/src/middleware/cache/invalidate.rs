//! Cache invalidation middleware for mutating routes.

use crate::cache::CacheClient;
use axum::{body::Body, extract::Request, http::Response};
use futures::future::BoxFuture;
use std::{
    convert::Infallible,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{info, warn};

/// Deletes every cache key matching a glob before the request proceeds.
///
/// The wrapped service always runs, whether the deletion succeeded, matched
/// nothing, or failed.
#[derive(Clone)]
pub struct InvalidateLayer {
    cache: CacheClient,
    pattern: Arc<str>,
}

impl InvalidateLayer {
    pub fn new(cache: CacheClient, pattern: impl Into<Arc<str>>) -> Self {
        Self {
            cache,
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl<S> Layer<S> for InvalidateLayer {
    type Service = InvalidateMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InvalidateMiddleware {
            inner,
            cache: self.cache.clone(),
            pattern: self.pattern.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InvalidateMiddleware<S> {
    inner: S,
    cache: CacheClient,
    pattern: Arc<str>,
}

impl<S> Service<Request> for InvalidateMiddleware<S>
where
    S: Service<Request, Response = Response<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let cache = self.cache.clone();
        let pattern = self.pattern.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match cache.delete_by_pattern(&pattern).await {
                Ok(deleted) => info!(pattern = %pattern, deleted = deleted, "Cache invalidated"),
                Err(e) => warn!(pattern = %pattern, error = %e, "Cache invalidation failed"),
            }

            inner.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheResult, CacheStore, MemoryStore};
    use crate::config::CacheConfig;
    use async_trait::async_trait;
    use axum::{http::StatusCode, routing::post, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Ok(None)
        }
        async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> CacheResult<()> {
            Ok(())
        }
        async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
            Err(CacheError::Backend("KEYS timed out".into()))
        }
    }

    fn app(cache: CacheClient) -> Router {
        Router::new().route(
            "/orders",
            post(|| async { StatusCode::CREATED })
                .layer(InvalidateLayer::new(cache, "cache:/orders*")),
        )
    }

    async fn post_orders(app: Router) -> StatusCode {
        app.oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_matching_keys_removed_before_handler() {
        let store = Arc::new(MemoryStore::new());
        let ttl = Duration::from_secs(60);
        store.set_ex("cache:/orders:{}", "[]".into(), ttl).await.unwrap();
        store.set_ex("cache:/orders/1:{}", "{}".into(), ttl).await.unwrap();
        store.set_ex("cache:/masters:{}", "[]".into(), ttl).await.unwrap();

        let cache = CacheClient::with_store(CacheConfig::default(), store.clone());
        assert_eq!(post_orders(app(cache)).await, StatusCode::CREATED);

        assert_eq!(store.len(), 1);
        assert!(store.get("cache:/masters:{}").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_no_matches_still_runs_handler() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheClient::with_store(CacheConfig::default(), store);
        assert_eq!(post_orders(app(cache)).await, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_failed_invalidation_still_runs_handler() {
        let cache = CacheClient::with_store(CacheConfig::default(), Arc::new(BrokenStore));
        assert_eq!(post_orders(app(cache)).await, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_disabled_cache_runs_handler() {
        assert_eq!(post_orders(app(CacheClient::disabled())).await, StatusCode::CREATED);
    }

    #[test]
    fn test_pattern_accessor() {
        let layer = InvalidateLayer::new(CacheClient::disabled(), "cache:/calls*");
        assert_eq!(layer.pattern(), "cache:/calls*");
    }
}
