//! Per-client token-bucket rate limiting for the HTTP API.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn full(burst: f64, at: Instant) -> Self {
        Self {
            tokens: burst,
            refilled_at: at,
        }
    }

    fn take(&mut self, at: Instant, per_sec: f64, burst: f64) -> bool {
        let elapsed = at.saturating_duration_since(self.refilled_at).as_secs_f64();
        self.refilled_at = at;
        self.tokens = (self.tokens + elapsed * per_sec).min(burst);

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

/// Shared limiter state; cheap to clone into middleware.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(per_sec: f64, burst: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            per_sec: per_sec.max(0.0),
            burst: burst.max(1.0),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.rate_limit_per_sec, config.rate_limit_burst)
    }

    /// Spend one token for `ip`. `false` means the request must be refused.
    pub async fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, at: Instant) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(ip)
            .or_insert_with(|| Bucket::full(self.burst, at))
            .take(at, self.per_sec, self.burst)
    }

    /// Forget clients idle for longer than `max_idle`.
    pub async fn purge_idle(&self, max_idle: Duration) -> usize {
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        let now = Instant::now();
        buckets.retain(|_, b| now.saturating_duration_since(b.refilled_at) < max_idle);
        let purged = before - buckets.len();
        if purged > 0 {
            debug!(purged, "Purged idle rate-limit buckets");
        }
        purged
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    if let Some(ip) = client_ip(&req) {
        if !limiter.check(ip).await {
            warn!(ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
            return Err(ServerError::RateLimited);
        }
    }
    Ok(next.run(req).await)
}

/// The peer address, else the first `X-Forwarded-For` hop, else
/// `X-Real-IP`.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|v| v.trim().parse().ok()))
}
