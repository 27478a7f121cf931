//! Rate-limited client wrapper.
//!
//! Wraps any [`Client`] with rate limiting using the governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::{Client, Request};
use crate::error::RetrieveResult;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A client wrapper that waits for a permit before every request.
///
/// Useful when paginating through many pages of one site.
pub struct RateLimitedClient<C> {
    inner: C,
    limiter: Arc<DefaultRateLimiter>,
}

impl<C: Client> RateLimitedClient<C> {
    /// Allow at most `requests_per_second` requests.
    pub fn new(inner: C, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        Self::with_quota(inner, quota)
    }

    /// Allow bursts of up to `burst` requests on top of the sustained rate.
    pub fn with_burst(inner: C, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        )
        .allow_burst(NonZeroU32::new(burst).expect("burst must be > 0"));
        Self::with_quota(inner, quota)
    }

    pub fn with_quota(inner: C, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Clone> Clone for RateLimitedClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

#[async_trait]
impl<C: Client> Client for RateLimitedClient<C> {
    async fn fetch(&self, request: &Request) -> RetrieveResult<String> {
        self.limiter.until_ready().await;
        self.inner.fetch(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::MockClient;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_passes_requests_through() {
        let mock = MockClient::new().with_page("https://example.com", "ok");
        let client = RateLimitedClient::new(mock.clone(), 100);

        assert_eq!(client.fetch(&Request::new("https://example.com")).await.unwrap(), "ok");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_limits_sustained_rate() {
        let mock = MockClient::new().with_page("a", "ok");
        let client = RateLimitedClient::with_burst(mock, 10, 1);

        let start = Instant::now();
        for _ in 0..3 {
            client.fetch(&Request::new("a")).await.unwrap();
        }

        // First request is immediate, the next two wait ~100ms each
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_clones_share_the_limiter() {
        let client = RateLimitedClient::with_burst(MockClient::new().with_page("a", "ok"), 1, 2);
        let clone = client.clone();

        client.fetch(&Request::new("a")).await.unwrap();
        clone.fetch(&Request::new("a")).await.unwrap();
        assert!(client.limiter.check().is_err());
    }
}
