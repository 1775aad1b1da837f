//! HTTP client with rate limiting for the SoundCloud APIs.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting so batch fan-out cannot flood the API
//! * Consistent timeouts and headers
//!
//! # Rate Limiting
//!
//! The v2 API is undocumented and throttles aggressively when hammered:
//! * 50 calls per 5-second interval
//! * Automatic request throttling
//! * Allows bursts up to the maximum calls per interval
//! * Requests that would exceed the limit are delayed
//!
//! The stream pipeline launches one resolution task per collection element
//! with no concurrency cap; this limiter is what spaces the resulting
//! requests out on the wire.

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    self,
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER},
    Method, Url,
};

use crate::{config::Config, error::Result};

/// HTTP client with built-in rate limiting.
///
/// Wraps `reqwest::Client` to provide:
/// * Rate limiting for API quotas
/// * Consistent configuration
pub struct Client {
    /// Unlimited request client for special cases.
    ///
    /// Direct access to underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    /// Rate limiter for API quota compliance.
    rate_limiter: DefaultDirectRateLimiter,

    /// The standard headers attached to every request.
    ///
    /// Exposed through [`Client::headers`] so callers can attach the same
    /// set to requests they build against signed media URLs.
    headers: HeaderMap,
}

impl Client {
    /// Standard rate limit interval.
    ///
    /// A rolling window of 5 seconds during which a maximum number of
    /// calls can be made.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(5);

    /// Maximum allowed API calls per interval.
    ///
    /// Requests beyond this limit will be automatically delayed.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 50;

    /// Duration to keep idle connections alive.
    ///
    /// Prevents frequent reconnection overhead for subsequent requests.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for individual network reads.
    ///
    /// Reads that take longer than 5 seconds will timeout to allow faster
    /// recovery from network issues.
    const READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// The web origin that requests present themselves as coming from.
    const WEB_ORIGIN: &'static str = "https://soundcloud.com";

    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration including user agent and language
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails.
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_static(Self::WEB_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static(Self::WEB_ORIGIN));

        // Not having `Accept-Language` set is non-fatal.
        if let Ok(lang) = HeaderValue::from_str(&config.app_lang) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }

        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .default_headers(headers.clone())
            .user_agent(&config.user_agent);

        // Rate limit own requests as to not DoS the SoundCloud infrastructure.
        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
            headers,
        })
    }

    /// The standard headers attached to every request.
    ///
    /// These are the same headers that must accompany fetches of signed
    /// media URLs.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Builds a request with specified method and URL.
    ///
    /// Creates a raw request that can be executed with `execute()`.
    pub fn request<U>(&self, method: Method, url: U) -> reqwest::Request
    where
        U: Into<Url>,
    {
        reqwest::Request::new(method, url.into())
    }

    /// Builds a GET request.
    ///
    /// Convenience method for `request()` with GET method.
    pub fn get<U>(&self, url: U) -> reqwest::Request
    where
        U: Into<Url>,
    {
        self.request(Method::GET, url)
    }

    /// Executes a request with rate limiting.
    ///
    /// Applies rate limiting before executing the request to
    /// comply with API quotas.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * Request execution fails
    /// * Network error occurs
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        // No need to await with jitter because the level of concurrency is low.
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.unlimited.execute(request).map_err(Into::into))
    }
}
