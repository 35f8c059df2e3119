//! Sliding-window circuit breaker per channel family (spec §4.8).
//!
//! Window of 10 calls, opens at >=50% failure rate, half-opens after a
//! cool-off, closes on a successful probe.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    window: usize,
    failure_rate_pct: u8,
    cool_off: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    state: State,
    results: VecDeque<bool>,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(window: usize, failure_rate_pct: u8, cool_off: Duration) -> Self {
        Self {
            window,
            failure_rate_pct,
            cool_off,
            inner: Mutex::new(Inner {
                state: State::Closed,
                results: VecDeque::with_capacity(window),
                opened_at: None,
            }),
        }
    }

    /// Returns `true` if a call may proceed. An `Open` breaker past its
    /// cool-off transitions to `HalfOpen` and allows exactly one probe.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => true,
            State::HalfOpen => true,
            State::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cool_off {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == State::HalfOpen {
            inner.state = State::Closed;
            inner.results.clear();
            inner.opened_at = None;
            return;
        }
        push(&mut inner.results, self.window, true);
        self.recompute(&mut inner);
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == State::HalfOpen {
            inner.state = State::Open;
            inner.opened_at = Some(Instant::now());
            return;
        }
        push(&mut inner.results, self.window, false);
        self.recompute(&mut inner);
    }

    fn recompute(&self, inner: &mut Inner) {
        if inner.results.len() < self.window {
            return;
        }
        let failures = inner.results.iter().filter(|ok| !**ok).count();
        let failure_pct = (failures * 100) / inner.results.len();
        if failure_pct as u8 >= self.failure_rate_pct {
            inner.state = State::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

fn push(results: &mut VecDeque<bool>, window: usize, ok: bool) {
    results.push_back(ok);
    while results.len() > window {
        results.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_majority_failures_in_window() {
        let breaker = CircuitBreaker::new(10, 50, Duration::from_secs(30));
        for _ in 0..5 {
            breaker.record_failure();
        }
        for _ in 0..4 {
            breaker.record_success();
        }
        assert!(breaker.allow());
        breaker.record_failure();
        assert!(!breaker.allow());
    }

    #[test]
    fn half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new(10, 50, Duration::from_millis(1));
        for _ in 0..10 {
            breaker.record_failure();
        }
        assert!(!breaker.allow());
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.allow());
        breaker.record_success();
        assert!(breaker.allow());
    }
}
