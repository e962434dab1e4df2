use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;

pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 10.0;
pub const DEFAULT_BURST: u32 = 20;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained refill rate, tokens per second
    pub requests_per_second: f64,
    /// Bucket capacity, and the tokens a new client starts with
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
        }
    }
}

impl RateLimitConfig {
    /// # Environment Variables
    /// - `RATE_LIMIT_RPS`: refill rate (default: 10.0)
    /// - `RATE_LIMIT_BURST`: burst capacity (default: 20)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            requests_per_second: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|rps: &f64| *rps > 0.0)
                .unwrap_or(defaults.requests_per_second),
            burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|burst| *burst > 0)
                .unwrap_or(defaults.burst),
        }
    }
}

#[derive(Clone)]
struct Bucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl Bucket {
    fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_update: Instant::now(),
        }
    }

    fn allow_request(&mut self, tokens: u32) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = f64::min(
            self.capacity as f64,
            self.tokens + elapsed * self.refill_rate,
        );
        self.last_update = now;

        // Consume token
        if self.tokens >= tokens as f64 {
            self.tokens -= tokens as f64;
            true
        } else {
            false // Rate limited
        }
    }
}

/// Token-bucket limiter with one bucket per client identity.
///
/// Buckets are created on first sight with a full burst and are never
/// evicted, so memory grows with the number of distinct clients seen over
/// the life of the process.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    // Un-keyed bucket for internal callers that don't gate per client
    global: Mutex<Bucket>,
    capacity: u32,
    refill_rate: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            global: Mutex::new(Bucket::new(config.burst, config.requests_per_second)),
            capacity: config.burst,
            refill_rate: config.requests_per_second,
        }
    }

    /// Take one token from `identity`'s bucket.
    pub fn allow(&self, identity: &str) -> bool {
        if let Some(mut bucket) = self.buckets.get_mut(identity) {
            return bucket.allow_request(1);
        }
        self.buckets
            .entry(identity.to_string())
            .or_insert_with(|| Bucket::new(self.capacity, self.refill_rate))
            .allow_request(1)
    }

    /// Take one token from the shared bucket.
    pub fn allow_global(&self) -> bool {
        self.global.lock().allow_request(1)
    }

    pub fn check_rate_limit(&self, identity: &str) -> Result<(), AppError> {
        if self.allow(identity) {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded(format!("Rate limit for {}", identity)))
        }
    }

    /// Distinct identities seen so far
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Client identity: the first non-empty of `X-Forwarded-For`, `X-Real-IP`,
/// then the peer address.
pub fn client_identity(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware gating a route on the caller's bucket. A rejected request
/// never reaches the handler.
pub async fn limit_by_client(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), remote);

    if let Err(e) = limiter.check_rate_limit(&identity) {
        tracing::warn!(client = %identity, tracked_clients = limiter.tracked_clients(), "Rate limit exceeded");
        return Err(e);
    }
    Ok(next.run(request).await)
}
