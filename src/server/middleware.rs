//! # Middleware Module
//!
//! Request timing and completion logging. The same timer measures the
//! handling time fed into the submission statistics.

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Request timing and logging helper
#[derive(Debug, Clone, Copy)]
pub struct RequestMiddleware {
    /// Request start time for latency calculation
    start_time: Instant,
}

impl RequestMiddleware {
    /// Start timing a request
    #[must_use]
    pub fn started() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Time since [`started`](Self::started)
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log request completion with timing
    pub fn log_completion(&self, status_code: u16, path: &str, method: &str) {
        let elapsed_ms = self.elapsed().as_secs_f64() * 1000.0;
        if status_code >= 500 {
            warn!(
                "Request completed: {} {} - {} ({:.2}ms)",
                method, path, status_code, elapsed_ms
            );
        } else {
            info!(
                "Request completed: {} {} - {} ({:.2}ms)",
                method, path, status_code, elapsed_ms
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotonic() {
        let middleware = RequestMiddleware::started();
        std::thread::sleep(Duration::from_millis(2));
        let first = middleware.elapsed();
        let second = middleware.elapsed();

        assert!(first >= Duration::from_millis(2));
        assert!(second >= first);
    }

    #[test]
    fn test_log_completion_does_not_panic() {
        let middleware = RequestMiddleware::started();
        middleware.log_completion(200, "/hash", "POST");
        middleware.log_completion(503, "/hash/1", "GET");
        middleware.log_completion(404, "/nope", "GET");
    }
}
