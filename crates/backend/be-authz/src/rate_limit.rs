//! Per-client-IP request limits.
//!
//! Each [`RateLimit`] owns its own keyed GCRA limiter, so two routers built
//! from the same policy do not share counters.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::AuthzError;

pub type KeyedRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// `max_requests` per `window`, per client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u32,
    pub message: &'static str,
}

impl RateLimitPolicy {
    pub const GENERAL: Self = Self {
        name: "general",
        window: Duration::from_secs(15 * 60),
        max_requests: 50,
        message: "Too many requests from this IP, please try again after 15 minutes",
    };

    pub const AUTH: Self = Self {
        name: "auth",
        window: Duration::from_secs(60 * 60),
        max_requests: 10,
        message: "Too many login attempts, please try again after an hour",
    };

    pub const CARD: Self = Self {
        name: "card",
        window: Duration::from_secs(60 * 60),
        max_requests: 50,
        message: "Too many card operations, please try again after an hour",
    };

    pub const CHARGE: Self = Self {
        name: "charge",
        window: Duration::from_secs(60 * 60),
        max_requests: 20,
        message: "Too many charge operations, please try again after an hour",
    };

    pub const ANALYTICS: Self = Self {
        name: "analytics",
        window: Duration::from_secs(5 * 60),
        max_requests: 30,
        message: "Too many analytics requests, please try again after 5 minutes",
    };

    /// The whole allowance is available as a burst and refills evenly over
    /// the window.
    pub fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.max_requests).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(self.window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}

#[derive(Clone)]
pub struct RateLimit {
    policy: RateLimitPolicy,
    limiter: Arc<KeyedRateLimiter>,
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RateLimit {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            limiter: Arc::new(RateLimiter::keyed(policy.quota())),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Number of client addresses currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Forgets clients whose allowance has fully refilled, so the key set
    /// stays bounded by the addresses seen within one window.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), AuthzError> {
        self.limiter.check_key(&ip).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after_secs = wait
                .as_secs()
                .saturating_add(u64::from(wait.subsec_nanos() > 0))
                .max(1);
            warn!(
                limiter = self.policy.name,
                %ip,
                retry_after_secs,
                "Rate limit exceeded"
            );
            AuthzError::RateLimited {
                message: self.policy.message,
                retry_after_secs,
            }
        })
    }
}

/// Client address: the peer socket when known, else the first
/// `X-Forwarded-For` entry, else the unspecified address.
pub fn client_ip(req: &Request) -> IpAddr {
    resolve_ip(req.extensions(), req.headers())
}

fn resolve_ip(extensions: &Extensions, headers: &HeaderMap) -> IpAddr {
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Extractor form of [`client_ip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(resolve_ip(&parts.extensions, &parts.headers)))
    }
}

pub async fn rate_limit(State(limit): State<RateLimit>, req: Request, next: Next) -> Response {
    match limit.check(client_ip(&req)) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}
