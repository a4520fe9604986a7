//! Fixed-window request limits per user and per client address.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;

pub const USER_REQUESTS_PER_MINUTE: u32 = 100;
pub const ADDRESS_REQUESTS_PER_MINUTE: u32 = 1000;

const WINDOW: Duration = Duration::from_secs(60);
const IDLE_EVICTION: Duration = Duration::from_secs(10 * 60);
pub const EVICTION_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bucket {
    User,
    Address,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    UserLimited,
    AddressLimited,
}

#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(Bucket, String), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, user: &str, address: &str) -> Verdict {
        self.check_at(user, address, Instant::now())
    }

    /// Counts one request against both the user's and the address's window.
    pub fn check_at(&self, user: &str, address: &str, now: Instant) -> Verdict {
        let mut windows = self.lock();
        let user_count = hit(&mut windows, Bucket::User, user, now);
        let address_count = hit(&mut windows, Bucket::Address, address, now);

        if user_count > USER_REQUESTS_PER_MINUTE {
            Verdict::UserLimited
        } else if address_count > ADDRESS_REQUESTS_PER_MINUTE {
            Verdict::AddressLimited
        } else {
            Verdict::Allowed
        }
    }

    /// Drops windows that have seen no traffic for ten minutes.
    pub fn evict_stale_at(&self, now: Instant) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.started) <= IDLE_EVICTION);
        before - windows.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(Bucket, String), Window>> {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn hit(
    windows: &mut HashMap<(Bucket, String), Window>,
    bucket: Bucket,
    id: &str,
    now: Instant,
) -> u32 {
    let window = windows
        .entry((bucket, id.to_string()))
        .or_insert(Window {
            started: now,
            count: 0,
        });
    if now.saturating_duration_since(window.started) >= WINDOW {
        window.started = now;
        window.count = 0;
    }
    window.count = window.count.saturating_add(1);
    window.count
}

/// Client address: `CF-Connecting-IP`, then the first `X-Forwarded-For`
/// entry, then the socket peer.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    if let Some(ip) = header("cf-connecting-ip") {
        return ip.to_string();
    }
    if let Some(first) = header("x-forwarded-for").and_then(|v| v.split(',').next()) {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Runs inside [`crate::auth::require_auth`], so the principal is known.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let address = client_address(req.headers(), peer);
    let user = req
        .extensions()
        .get::<AuthUser>()
        .map(|AuthUser(user)| user.to_string())
        .unwrap_or_default();

    match state.rate_limiter.check(&user, &address) {
        Verdict::Allowed => Ok(next.run(req).await),
        verdict => {
            warn!(%user, %address, ?verdict, "rate limit exceeded");
            Err(AppError::RateLimited)
        }
    }
}

/// Periodically evicts idle windows until `cancel` fires.
pub async fn run_eviction_loop(limiter: Arc<RateLimiter>, cancel: CancellationToken) {
    let mut ticker = interval(EVICTION_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = limiter.evict_stale_at(Instant::now());
                if evicted > 0 {
                    debug!(evicted, remaining = limiter.len(), "evicted idle rate-limit windows");
                }
            }
        }
    }
    info!("rate-limit eviction stopped");
}
