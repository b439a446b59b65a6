// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exponential backoff shared by the role-label work queue and the
//! `MySQLCluster` error policy.
//!
//! The queue uses the client-go per-item limiter defaults (5ms doubling up to
//! 1000s, no jitter). Controller error requeues are jittered so a burst of
//! failing clusters does not come back in lockstep.

use rand::Rng;
use std::time::Duration;

use crate::constants::{QUEUE_BACKOFF_BASE_MILLIS, QUEUE_BACKOFF_MAX_SECS};

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor for controller requeues (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Exponential backoff keyed on a failure count.
///
/// Unlike a stateful iterator, the delay is a pure function of how many times
/// an item has already failed, so one instance can serve every queue key.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Delay after the first failure
    pub initial_interval: Duration,
    /// Upper bound on any single delay
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            initial_interval,
            max_interval,
            multiplier,
            randomization_factor,
        }
    }

    /// Delay before the next attempt of an item that has failed `failures` times.
    ///
    /// `failures == 0` yields the initial interval.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_interval.as_secs_f64();
        let capped = if secs.is_finite() { secs.min(max) } else { max };
        self.apply_jitter(Duration::from_secs_f64(capped))
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Per-key limiter for the role-label work queue.
///
/// # Retry Schedule
///
/// 1. 5ms
/// 2. 10ms
/// 3. 20ms
/// 4. 40ms
/// 5. 80ms
///
/// and so on, doubling until capped at 1000s.
#[must_use]
pub fn queue_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(QUEUE_BACKOFF_BASE_MILLIS),
        Duration::from_secs(QUEUE_BACKOFF_MAX_SECS),
        BACKOFF_MULTIPLIER,
        0.0,
    )
}

/// Spread a fixed controller requeue interval by ±10%.
#[must_use]
pub fn jittered_requeue(interval: Duration) -> Duration {
    ExponentialBackoff::new(interval, interval, 1.0, RANDOMIZATION_FACTOR).delay(0)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
