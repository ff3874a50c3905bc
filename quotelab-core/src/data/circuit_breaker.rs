//! Provider gate: refuses requests during a cooldown window.
//!
//! Trips immediately on an IP ban (HTTP 403) and after repeated rate-limit
//! or server failures. While open, all provider calls fail fast with
//! `FetchError::CircuitOpen` instead of hammering the remote.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct GateState {
    /// When set, requests are refused until this deadline.
    open_until: Option<Instant>,
    consecutive_failures: u32,
}

/// Gate guarding a single provider.
#[derive(Debug)]
pub struct ProviderGate {
    state: Mutex<GateState>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl ProviderGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(GateState {
                open_until: None,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: 3,
        }
    }

    /// Default gate: 30-minute cooldown, opens after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }

    /// Whether a request may proceed right now. An expired cooldown closes
    /// the gate and resets the failure counter.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.open_until {
            None => true,
            Some(deadline) => {
                if Instant::now() >= deadline {
                    state.open_until = None;
                    state.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request; resets the failure counter.
    pub fn note_success(&self) {
        self.state.lock().unwrap().consecutive_failures = 0;
    }

    /// Record a failed request; opens the gate once the threshold is hit.
    pub fn note_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
        }
    }

    /// Open the gate immediately (used on HTTP 403 / IP ban).
    pub fn trip_now(&self) {
        self.state.lock().unwrap().open_until = Some(Instant::now() + self.cooldown);
    }

    /// Time left before requests are allowed again (zero when closed).
    pub fn remaining_cooldown(&self) -> Duration {
        let state = self.state.lock().unwrap();
        match state.open_until {
            None => Duration::ZERO,
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
        }
    }
}
