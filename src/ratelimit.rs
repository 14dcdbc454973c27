use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Fixed-window request counter per client address.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    windows: Arc<RwLock<HashMap<IpAddr, (Instant, u32)>>>, // ip -> (window start, hits)
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        RateLimiter {
            max_per_window,
            window,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn per_minute(max: u32) -> Self {
        Self::new(max, Duration::from_secs(60))
    }

    pub fn is_enabled(&self) -> bool {
        self.max_per_window > 0
    }

    /// Record a hit from `ip`. Returns false once the window is full.
    pub async fn check(&self, ip: IpAddr) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        // Drop stale entries so the table doesn't grow without bound.
        windows.retain(|_, (start, _)| now.duration_since(*start) < self.window);

        let entry = windows.entry(ip).or_insert((now, 0));
        if entry.1 >= self.max_per_window {
            return false;
        }
        entry.1 += 1;
        true
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_max_then_rejects() {
        let limiter = RateLimiter::per_minute(3);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(ip).await);
        assert!(limiter.check(ip).await);
        assert!(limiter.check(ip).await);
        assert!(!limiter.check(ip).await);

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(other).await);
        assert_eq!(limiter.tracked_clients().await, 2);
    }

    #[tokio::test]
    async fn window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(ip).await);
        assert!(!limiter.check(ip).await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check(ip).await);
    }

    #[tokio::test]
    async fn zero_disables_limiting() {
        let limiter = RateLimiter::per_minute(0);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(!limiter.is_enabled());
        for _ in 0..100 {
            assert!(limiter.check(ip).await);
        }
        assert_eq!(limiter.tracked_clients().await, 0);
    }
}
