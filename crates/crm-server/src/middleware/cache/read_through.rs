//! Read-through response cache middleware.

use super::sink::{cached_response, CachingSink};
use crate::cache::{keys, CacheClient};
use axum::{
    body::Body,
    extract::{OriginalUri, Request},
    http::{Method, Response},
};
use futures::future::BoxFuture;
use std::{
    convert::Infallible,
    task::{Context, Poll},
    time::Duration,
};
use tower::{Layer, Service};
use tracing::{debug, warn};

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Serves cached JSON for `GET` requests and fills the cache on a miss.
///
/// A cache that is down or unconfigured only costs latency: lookup failures
/// are logged and the request falls through to the wrapped service.
#[derive(Clone)]
pub struct ReadThroughLayer {
    cache: CacheClient,
    ttl: Duration,
    max_body_bytes: usize,
}

impl ReadThroughLayer {
    pub fn new(cache: CacheClient) -> Self {
        Self {
            cache,
            ttl: DEFAULT_TTL,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Use the TTL and body limit from the client's configuration.
    pub fn from_config(cache: CacheClient) -> Self {
        let ttl = cache.config().read_through_ttl();
        let max_body_bytes = cache.config().max_body_bytes;
        Self::new(cache).with_ttl(ttl).with_max_body_bytes(max_body_bytes)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl<S> Layer<S> for ReadThroughLayer {
    type Service = ReadThroughMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ReadThroughMiddleware {
            inner,
            cache: self.cache.clone(),
            ttl: self.ttl,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[derive(Clone)]
pub struct ReadThroughMiddleware<S> {
    inner: S,
    cache: CacheClient,
    ttl: Duration,
    max_body_bytes: usize,
}

impl<S> Service<Request> for ReadThroughMiddleware<S>
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
        let ttl = self.ttl;
        let max_body_bytes = self.max_body_bytes;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if req.method() != Method::GET {
                return inner.call(req).await;
            }

            let key = cache_key(&req);

            match cache.get_raw(&key).await {
                Ok(Some(json)) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(cached_response(json));
                }
                Ok(None) => debug!(key = %key, "Cache miss"),
                Err(e) => warn!(key = %key, error = %e, "Cache lookup failed, serving from handler"),
            }

            let sink = CachingSink::new(cache, key, ttl, max_body_bytes);
            let response = inner.call(req).await?;
            Ok(sink.emit(response).await)
        })
    }
}

/// Key for a request, using the path as received before any router nesting.
fn cache_key(req: &Request) -> String {
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or_else(|| req.uri());

    keys::request_key(uri.path(), uri.query())
}
