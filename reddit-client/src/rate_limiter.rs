use regex::Regex;
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Fixed backoff ladder (seconds) used when the provider gives no retry
/// hint, indexed by 1-based attempt number.
const BACKOFF_LADDER_SECS: [u64; 3] = [30, 60, 120];

/// Quota rejections for the same request are retried at most this many
/// times before the caller abandons the thread for the run.
const MAX_QUOTA_ATTEMPTS: u32 = 3;

/// Random jitter added on top of every backoff wait.
const JITTER_MAX_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    /// Extra sleep past the oldest window entry's expiry.
    pub safety_margin: Duration,
}

impl RateLimitConfig {
    /// Reddit allows 100 requests per minute for OAuth2 clients; the
    /// default targets 90 to keep margin under the server-side cap.
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 90,
            time_window: Duration::from_secs(60),
            safety_margin: Duration::from_secs(1),
        }
    }
}

/// How to proceed after the provider rejected a request as over-quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffDecision {
    pub wait: Duration,
    pub retry: bool,
}

#[derive(Debug, Clone, Default)]
struct LimiterCounters {
    throttled_waits: u64,
    backoffs_taken: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub window_requests: u32,
    pub max_requests: u32,
    pub throttled_waits: u64,
    pub backoffs_taken: u64,
}

impl RateLimitStatus {
    pub fn window_utilization_percentage(&self) -> f64 {
        (self.window_requests as f64 / self.max_requests as f64) * 100.0
    }
}

/// Sliding-window request throttle for one provider quota. `admit()` is
/// the sole blocking point in the pipeline and is called immediately
/// before every outbound request. Window state is process-local; sharing
/// one quota across processes needs external coordination.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<VecDeque<Instant>>,
    counters: StdMutex<LimiterCounters>,
    hint_pattern: Regex,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(config.max_requests as usize)),
            counters: StdMutex::new(LimiterCounters::default()),
            hint_pattern: Regex::new(r"(?i)(\d+)\s*(minutes?|seconds?)").expect("hint regex"),
            config,
        }
    }

    /// Block cooperatively until one more request fits under the cap for
    /// the trailing window, then record it.
    pub async fn admit(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while let Some(oldest) = window.front() {
                    if now.duration_since(*oldest) >= self.config.time_window {
                        window.pop_front();
                    } else {
                        break;
                    }
                }
                if (window.len() as u32) < self.config.max_requests {
                    window.push_back(now);
                    None
                } else {
                    let oldest = *window.front().expect("window is at capacity");
                    let remaining = self
                        .config
                        .time_window
                        .saturating_sub(now.duration_since(oldest));
                    Some(remaining + self.config.safety_margin)
                }
            };

            match wait {
                None => return,
                Some(wait) => {
                    debug!("Rate limit window full, waiting {:?}", wait);
                    self.counters.lock().unwrap().throttled_waits += 1;
                    sleep(wait).await;
                }
            }
        }
    }

    /// Decide the wait after a provider over-limit rejection. `attempt`
    /// is 1-indexed; past the third attempt the caller gets `retry =
    /// false` and abandons the thread for this run.
    pub fn on_rate_limited(&self, provider_message: &str, attempt: u32) -> BackoffDecision {
        if attempt > MAX_QUOTA_ATTEMPTS {
            warn!(
                attempt,
                "Quota retries exhausted, signalling caller to stop"
            );
            return BackoffDecision {
                wait: Duration::ZERO,
                retry: false,
            };
        }

        self.counters.lock().unwrap().backoffs_taken += 1;
        let base = match self.parse_retry_hint(provider_message) {
            Some(hinted) => {
                debug!("Provider supplied retry hint: {:?}", hinted);
                hinted
            }
            None => {
                let rung = (attempt as usize - 1).min(BACKOFF_LADDER_SECS.len() - 1);
                Duration::from_secs(BACKOFF_LADDER_SECS[rung])
            }
        };
        let jitter = Duration::from_millis(fastrand::u64(0..=JITTER_MAX_MS));
        BackoffDecision {
            wait: base + jitter,
            retry: true,
        }
    }

    /// Extract a "retry in N minutes/seconds" hint from a provider error
    /// payload, if present.
    fn parse_retry_hint(&self, message: &str) -> Option<Duration> {
        let caps = self.hint_pattern.captures(message)?;
        let amount: u64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_ascii_lowercase();
        if unit.starts_with("minute") {
            Some(Duration::from_secs(amount * 60))
        } else {
            Some(Duration::from_secs(amount))
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let window = self.window.lock().await;
        let counters = self.counters.lock().unwrap().clone();
        RateLimitStatus {
            window_requests: window.len() as u32,
            max_requests: self.config.max_requests,
            throttled_waits: counters.throttled_waits,
            backoffs_taken: counters.backoffs_taken,
        }
    }
}
