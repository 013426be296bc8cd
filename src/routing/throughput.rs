use crate::{Error, ErrorContext, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// One coalesced rate observation: `count` attempts since the previous flush.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputReport {
    pub count: u64,
    pub window: Duration,
}

impl ThroughputReport {
    pub fn per_second(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            self.count as f64
        } else {
            self.count as f64 / secs
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThroughputSnapshot {
    pub pending: u64,
    pub since_last_flush: Duration,
    pub interval: Duration,
}

#[derive(Debug)]
struct State {
    requests_since_last_flush: u64,
    last_flush: Instant,
}

/// Coalescing request counter, flushed at most once per `interval`.
///
/// Increment and read-reset happen under one lock, so concurrent dispatchers never lose
/// an increment and exactly one of them observes each flush.
pub struct ThroughputObserver {
    interval: Duration,
    state: Mutex<State>,
}

impl ThroughputObserver {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(State {
                requests_since_last_flush: 0,
                last_flush: Instant::now(),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Count one attempt. Returns a report when the interval has elapsed since the last flush.
    pub fn record(&self) -> Result<Option<ThroughputReport>> {
        let mut st = self.state.lock().map_err(|_| {
            Error::runtime_with_context(
                "ThroughputObserver poisoned",
                ErrorContext::new().with_source("throughput_observer"),
            )
        })?;
        st.requests_since_last_flush += 1;

        let now = Instant::now();
        let window = now.duration_since(st.last_flush);
        if window < self.interval {
            return Ok(None);
        }

        let report = ThroughputReport {
            count: st.requests_since_last_flush,
            window,
        };
        st.requests_since_last_flush = 0;
        st.last_flush = now;
        Ok(Some(report))
    }

    /// Current counter state. A poisoned lock is read through with a warning.
    pub fn snapshot(&self) -> ThroughputSnapshot {
        let st = self.state.lock().unwrap_or_else(|poisoned| {
            warn!("ThroughputObserver poisoned, reading last known state");
            poisoned.into_inner()
        });
        ThroughputSnapshot {
            pending: st.requests_since_last_flush,
            since_last_flush: st.last_flush.elapsed(),
            interval: self.interval,
        }
    }
}

impl Default for ThroughputObserver {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
