use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Current state of the RPC circuit breaker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Snapshot of breaker internals for observability.
#[derive(Debug, Copy, Clone)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub opened_at: Option<Instant>,
}

/// Error returned when the breaker refuses to allow an RPC attempt.
#[derive(Debug)]
pub enum CircuitBreakerError {
    CircuitOpen,
}

impl std::fmt::Display for CircuitBreakerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "RPC circuit breaker is open"),
        }
    }
}

impl std::error::Error for CircuitBreakerError {}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
    half_open_in_flight: usize,
}

/// Circuit breaker with Closed/Open/Half-Open transitions, shared by all RPC
/// methods of one client so a misbehaving endpoint is backed off as a whole.
#[derive(Debug, Clone)]
pub struct RpcCircuitBreaker {
    state: Arc<Mutex<BreakerState>>,
    failure_threshold: usize,
    cooldown: Duration,
    half_open_sample: usize,
}

impl Default for RpcCircuitBreaker {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(20), 1)
    }
}

impl RpcCircuitBreaker {
    pub fn new(failure_threshold: usize, cooldown: Duration, half_open_sample: usize) -> Self {
        let cooldown = if cooldown.is_zero() {
            Duration::from_secs(1)
        } else {
            cooldown
        };

        Self {
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_in_flight: 0,
            })),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            half_open_sample: half_open_sample.max(1),
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let guard = self.state.lock().expect("circuit breaker mutex poisoned");
        CircuitBreakerSnapshot {
            state: guard.state,
            consecutive_failures: guard.consecutive_failures,
            opened_at: guard.opened_at,
        }
    }

    /// Checks whether a new RPC attempt is allowed, moving an expired Open
    /// circuit to Half-Open and reserving one of its probe slots.
    pub fn try_acquire(&self) -> Result<CircuitState, CircuitBreakerError> {
        let mut guard = self.state.lock().expect("circuit breaker mutex poisoned");

        if guard.state == CircuitState::Open {
            let expired = guard
                .opened_at
                .is_some_and(|opened_at| opened_at.elapsed() >= self.cooldown);
            if !expired {
                return Err(CircuitBreakerError::CircuitOpen);
            }
            self.transition(&mut guard, CircuitState::HalfOpen);
            guard.half_open_in_flight = 0;
        }

        if guard.state == CircuitState::HalfOpen {
            if guard.half_open_in_flight >= self.half_open_sample {
                return Err(CircuitBreakerError::CircuitOpen);
            }
            guard.half_open_in_flight += 1;
        }

        Ok(guard.state)
    }

    pub fn record_success(&self) {
        let mut guard = self.state.lock().expect("circuit breaker mutex poisoned");
        self.release_probe_slot(&mut guard);
        guard.consecutive_failures = 0;

        if guard.state == CircuitState::HalfOpen {
            guard.opened_at = None;
            self.transition(&mut guard, CircuitState::Closed);
        }
    }

    pub fn record_failure(&self) {
        let mut guard = self.state.lock().expect("circuit breaker mutex poisoned");
        self.release_probe_slot(&mut guard);
        guard.consecutive_failures = guard.consecutive_failures.saturating_add(1);

        let should_open = guard.state == CircuitState::HalfOpen
            || (guard.state == CircuitState::Closed
                && guard.consecutive_failures >= self.failure_threshold);

        if should_open {
            guard.opened_at = Some(Instant::now());
            guard.half_open_in_flight = 0;
            self.transition(&mut guard, CircuitState::Open);
        }
    }

    fn release_probe_slot(&self, guard: &mut BreakerState) {
        if guard.state == CircuitState::HalfOpen && guard.half_open_in_flight > 0 {
            guard.half_open_in_flight -= 1;
        }
    }

    fn transition(&self, guard: &mut BreakerState, next: CircuitState) {
        if guard.state != next {
            tracing::warn!(
                previous = ?guard.state,
                next = ?next,
                consecutive_failures = guard.consecutive_failures,
                "rpc circuit breaker state changed"
            );
            guard.state = next;
        }
    }
}
