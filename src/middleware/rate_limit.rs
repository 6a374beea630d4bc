use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::middleware::client_ip::peer_ip;
use crate::router::ProxyState;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request counter per peer address.
///
/// A window opens on a caller's first request and admits `max` requests;
/// the next one is refused until `window` has passed since it opened.
#[derive(Debug)]
pub struct IpRateLimiter {
    window: Duration,
    max: u32,
    windows: DashMap<IpAddr, Window>,
}

impl IpRateLimiter {
    /// A `max` of zero is treated as one.
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max: max.max(1),
            windows: DashMap::new(),
        }
    }

    /// `Err` carries how long until the caller's window closes.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            hits: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        if entry.hits >= self.max {
            return Err(self.window.saturating_sub(elapsed));
        }
        entry.hits += 1;
        Ok(())
    }

    /// Forget callers whose window has closed.
    pub fn prune(&self) {
        self.prune_at(Instant::now());
    }

    fn prune_at(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        self.windows.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Whole seconds a refused caller should wait, never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Layer for the `/api` router.
pub async fn limit_by_ip(
    State(state): State<ProxyState>,
    req: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    let ip = peer_ip(req.extensions()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(wait) = state.limiter.check(ip) {
        warn!(ip = %ip, path = %req.uri().path(), "rate limit exceeded");
        return Err(ProxyError::RateLimited {
            retry_after_secs: retry_after_secs(wait),
        });
    }
    Ok(next.run(req).await)
}

/// Drop closed windows once per window so the map tracks only active callers.
pub fn spawn_janitor(limiter: Arc<IpRateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.tick().await;
        loop {
            tick.tick().await;
            limiter.prune();
            debug!(tracked = limiter.len(), "rate limiter pruned");
        }
    })
}
