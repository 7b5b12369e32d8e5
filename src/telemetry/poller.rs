//! Repeated capture cycles on a fixed interval
//!
//! Each iteration gets its own timeout. A failed or stalled cycle is logged
//! and counted; the loop keeps running until Ctrl+C (or whatever shutdown
//! future the caller passes) resolves.

use super::Sample;
use crate::config::Config;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Extra time an iteration gets on top of the serial timeout
pub const ITERATION_GRACE_MS: u64 = 1000;

/// Outcome counters of a polling run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Cycles started, including one cut short by shutdown
    pub iterations: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
}

/// Drives capture cycles on an interval
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    iteration_timeout: Duration,
    max_iterations: Option<u64>,
}

impl Poller {
    /// Create a poller
    ///
    /// # Arguments
    ///
    /// * `interval` - Time between iteration starts (must be non-zero)
    /// * `iteration_timeout` - Upper bound on one iteration
    pub fn new(interval: Duration, iteration_timeout: Duration) -> Self {
        Self {
            interval,
            iteration_timeout,
            max_iterations: None,
        }
    }

    /// Poller for the `[poll]` and `[serial]` configuration sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_millis(config.poll.interval_ms.max(1)),
            Duration::from_millis(config.serial.timeout_ms + ITERATION_GRACE_MS),
        )
    }

    /// Stop after `count` iterations
    pub fn with_max_iterations(mut self, count: u64) -> Self {
        self.max_iterations = Some(count);
        self
    }

    /// Run iterations until shutdown or the iteration limit
    ///
    /// The first iteration starts immediately. Missed ticks are delayed
    /// rather than burst, so a slow cycle never triggers back to back captures.
    pub async fn run<I, Fut, E, S>(&self, mut iteration: I, mut emit: E, shutdown: S) -> PollStats
    where
        I: FnMut() -> Fut,
        Fut: Future<Output = Result<Sample>>,
        E: FnMut(&Sample),
        S: Future<Output = ()>,
    {
        let mut stats = PollStats::default();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Polling every {} ms", self.interval.as_millis());

        loop {
            if self.max_iterations.is_some_and(|max| stats.iterations >= max) {
                debug!("Reached iteration limit");
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    info!("Received shutdown, stopping poller");
                    break;
                }
            }

            stats.iterations += 1;

            // Shutdown also cancels a cycle in progress
            let outcome = tokio::select! {
                outcome = timeout(self.iteration_timeout, iteration()) => outcome,
                _ = &mut shutdown => {
                    info!("Received shutdown during capture cycle {}, stopping poller", stats.iterations);
                    break;
                }
            };

            match outcome {
                Ok(Ok(sample)) => {
                    stats.succeeded += 1;
                    emit(&sample);
                }
                Ok(Err(e)) => {
                    stats.failed += 1;
                    warn!("Capture cycle {} failed: {}", stats.iterations, e);
                }
                Err(_) => {
                    stats.timed_out += 1;
                    warn!(
                        "Capture cycle {} exceeded {} ms",
                        stats.iterations,
                        self.iteration_timeout.as_millis()
                    );
                }
            }
        }

        info!(
            "Polled {} cycles ({} ok, {} failed, {} timed out)",
            stats.iterations, stats.succeeded, stats.failed, stats.timed_out
        );
        stats
    }
}
