use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Counts failed sign-ins per email inside a sliding window.
#[derive(Clone)]
pub struct SigninThrottle {
    // email -> (failures, window_start)
    state: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
}

impl SigninThrottle {
    pub fn new(max_failures: u32, window_secs: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window: Duration::from_secs(window_secs),
        }
    }

    pub async fn is_limited(&self, email: &str) -> bool {
        let state = self.state.lock().await;
        match state.get(email) {
            Some((failures, start)) => {
                start.elapsed() <= self.window && *failures >= self.max_failures
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, email: &str) {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let entry = state.entry(email.to_string()).or_insert((0, now));

        // Reset if window expired
        if now.duration_since(entry.1) > self.window {
            *entry = (1, now);
            return;
        }
        entry.0 += 1;
    }

    pub async fn clear(&self, email: &str) {
        self.state.lock().await.remove(email);
    }

    /// Periodic cleanup of old entries
    pub async fn cleanup(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.retain(|_, (_, start)| now.duration_since(*start) <= self.window * 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limits_after_max_failures() {
        let throttle = SigninThrottle::new(3, 60);
        for _ in 0..2 {
            throttle.record_failure("a@b.co").await;
        }
        assert!(!throttle.is_limited("a@b.co").await);

        throttle.record_failure("a@b.co").await;
        assert!(throttle.is_limited("a@b.co").await);
        assert!(!throttle.is_limited("other@b.co").await);
    }

    #[tokio::test]
    async fn test_clear_resets_counter() {
        let throttle = SigninThrottle::new(1, 60);
        throttle.record_failure("a@b.co").await;
        assert!(throttle.is_limited("a@b.co").await);

        throttle.clear("a@b.co").await;
        assert!(!throttle.is_limited("a@b.co").await);
    }

    #[tokio::test]
    async fn test_zero_window_never_limits() {
        let throttle = SigninThrottle::new(1, 0);
        throttle.record_failure("a@b.co").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!throttle.is_limited("a@b.co").await);
        throttle.cleanup().await;
    }
}
