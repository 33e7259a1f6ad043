//! Tower layer for rate limiting in Axum.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderName, HeaderValue, Request, Response, StatusCode, header},
};
use tower::{Layer, Service};

use crate::decision::Decision;
use crate::key::{ClientKey, HasHeaders, HasIpAddr, IpKey, Key};
use crate::limiter::RateLimiter;
use crate::policy::{FailureAction, FailurePolicy};
use crate::storage::Storage;

/// Body of a rejected request.
pub const TOO_MANY_REQUESTS_BODY: &str = "Too many requests";

/// Body of a request that failed because the store did.
pub const STORE_FAILURE_BODY: &str = "Service unavailable";

/// Tower layer for rate limiting.
pub struct RateLimitLayer<S, K = IpKey> {
    limiter: Arc<RateLimiter<S>>,
    key_extractor: K,
    failure_policy: FailurePolicy,
}

impl<S: Storage> RateLimitLayer<S> {
    /// Create a layer keyed on the peer address, failing with 503 on store faults.
    pub fn new(limiter: RateLimiter<S>) -> Self {
        Self::from_shared(Arc::new(limiter))
    }

    /// Create a layer around a limiter that is also used elsewhere.
    pub fn from_shared(limiter: Arc<RateLimiter<S>>) -> Self {
        Self {
            limiter,
            key_extractor: IpKey::new(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl<S, K> RateLimitLayer<S, K> {
    /// Use a different key extractor.
    pub fn with_key<K2>(self, key_extractor: K2) -> RateLimitLayer<S, K2> {
        RateLimitLayer {
            limiter: self.limiter,
            key_extractor,
            failure_policy: self.failure_policy,
        }
    }

    /// Choose how store faults are answered.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

impl<S, K: Clone> Clone for RateLimitLayer<S, K> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            key_extractor: self.key_extractor.clone(),
            failure_policy: self.failure_policy,
        }
    }
}

impl<S, K, Inner> Layer<Inner> for RateLimitLayer<S, K>
where
    K: Clone,
{
    type Service = RateLimitService<S, K, Inner>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
            key_extractor: self.key_extractor.clone(),
            failure_policy: self.failure_policy,
        }
    }
}

/// The rate limiting service.
pub struct RateLimitService<S, K, Inner> {
    inner: Inner,
    limiter: Arc<RateLimiter<S>>,
    key_extractor: K,
    failure_policy: FailurePolicy,
}

impl<S, K, Inner> Clone for RateLimitService<S, K, Inner>
where
    K: Clone,
    Inner: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            key_extractor: self.key_extractor.clone(),
            failure_policy: self.failure_policy,
        }
    }
}

/// Wrapper around Axum request for key extraction.
pub struct AxumRequest<'a> {
    request: &'a Request<Body>,
}

impl<'a> AxumRequest<'a> {
    /// Wrap a request.
    pub fn new(request: &'a Request<Body>) -> Self {
        Self { request }
    }
}

impl HasHeaders for AxumRequest<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }
}

impl HasIpAddr for AxumRequest<'_> {
    fn client_ip(&self) -> Option<IpAddr> {
        // Present when served through `into_make_service_with_connect_info`
        self.request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }
}

impl<S, K, Inner> Service<Request<Body>> for RateLimitService<S, K, Inner>
where
    S: Storage,
    K: for<'a> Key<AxumRequest<'a>> + Clone,
    Inner: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    Inner::Future: Send,
{
    type Response = Response<Body>;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let client = self
            .key_extractor
            .extract(&AxumRequest::new(&request))
            .unwrap_or_else(|| {
                tracing::warn!("no client address on request, using shared key");
                ClientKey::unknown()
            });

        let limiter = Arc::clone(&self.limiter);
        let failure_policy = self.failure_policy;

        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match limiter.decide(&client).await {
                Ok(decision) if decision.is_allowed() => {
                    let response = inner.call(request).await?;
                    Ok(add_rate_limit_headers(response, &decision))
                }
                Ok(decision) => {
                    tracing::info!(client = %client, "request rate limited");
                    Ok(rate_limited_response(&decision))
                }
                Err(e) => match failure_policy.action() {
                    FailureAction::Admit => {
                        tracing::warn!(client = %client, error = %e, "store fault, failing open");
                        inner.call(request).await
                    }
                    FailureAction::Reject => {
                        tracing::warn!(client = %client, error = %e, "store fault, failing closed");
                        Ok(plain_response(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS_BODY))
                    }
                    FailureAction::Fail => {
                        tracing::error!(client = %client, error = %e, "store fault");
                        Ok(plain_response(StatusCode::SERVICE_UNAVAILABLE, STORE_FAILURE_BODY))
                    }
                },
            }
        })
    }
}

/// Add rate limit headers to a response.
fn add_rate_limit_headers(mut response: Response<Body>, decision: &Decision) -> Response<Body> {
    let headers = response.headers_mut();
    for (name, value) in decision.info().to_headers() {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            headers.insert(name, value);
        }
    }
    response
}

/// Create a 429 Too Many Requests response.
fn rate_limited_response(decision: &Decision) -> Response<Body> {
    let response = plain_response(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS_BODY);
    add_rate_limit_headers(response, decision)
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::SlidingCounter;
    use crate::quota::Quota;
    use crate::storage::MemoryStorage;
    use axum::body::to_bytes;
    use std::convert::Infallible;
    use tower::ServiceExt;
    use tower::service_fn;

    fn request_from(addr: &str) -> Request<Body> {
        let mut request = Request::builder().method("POST").uri("/").body(Body::empty()).unwrap();
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    async fn ok_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
        Ok(Response::new(Body::from("OK!")))
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let request = request_from("[::ffff:10.0.0.1]:4000");
        let view = AxumRequest::new(&request);
        let key = IpKey::new().extract(&view).unwrap();
        assert_eq!(key.as_str(), "10.0.0.1");
    }

    #[test]
    fn test_no_connect_info() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(AxumRequest::new(&request).client_ip().is_none());
    }

    #[tokio::test]
    async fn test_denied_request_is_429_with_headers() {
        let limiter = RateLimiter::new(Arc::new(MemoryStorage::new()), SlidingCounter::new(), Quota::per_seconds(1, 10));
        let service = RateLimitLayer::new(limiter).layer(service_fn(ok_handler));

        let response = service.clone().oneshot(request_from("1.2.3.4:1000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

        let response = service.oneshot(request_from("1.2.3.4:1001")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "10");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], TOO_MANY_REQUESTS_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_failure_policies() {
        for (policy, expected) in [
            (FailurePolicy::Error, StatusCode::SERVICE_UNAVAILABLE),
            (FailurePolicy::Open, StatusCode::OK),
            (FailurePolicy::Closed, StatusCode::TOO_MANY_REQUESTS),
        ] {
            let storage = Arc::new(MemoryStorage::new());
            storage.set_unavailable(true);
            let limiter = RateLimiter::new(storage, SlidingCounter::new(), Quota::default());
            let service = RateLimitLayer::new(limiter)
                .with_failure_policy(policy)
                .layer(service_fn(ok_handler));

            let response = service.oneshot(request_from("1.2.3.4:1000")).await.unwrap();
            assert_eq!(response.status(), expected, "policy {}", policy);
        }
    }
}
