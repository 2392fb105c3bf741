use std::time::Duration;

/// What to do after the current song failed to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Restart the same song after `delay`.
    Retry { delay: Duration },
    /// Drop the song and move on to the next one.
    GiveUp,
}

/// Strategy consulted on every playback error of the queue head.
///
/// `attempt` counts the failures of the current head, starting at 1. The
/// controller resets it whenever the head changes.
pub trait RetryPolicy: Send {
    fn on_error(&mut self, attempt: u32) -> RetryDecision;
}

/// Restarts the failed song immediately, forever.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl RetryPolicy for Unbounded {
    fn on_error(&mut self, _attempt: u32) -> RetryDecision {
        RetryDecision::Retry {
            delay: Duration::ZERO,
        }
    }
}

/// Retries up to `max_attempts` times, waiting `backoff * attempt` between tries.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy for Bounded {
    fn on_error(&mut self, attempt: u32) -> RetryDecision {
        if attempt > self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.backoff.saturating_mul(attempt),
        }
    }
}

/// Builds the policy described by the configuration: `0` attempts means unbounded.
pub fn from_settings(max_attempts: u32, backoff: Duration) -> Box<dyn RetryPolicy> {
    if max_attempts == 0 {
        Box::new(Unbounded)
    } else {
        Box::new(Bounded {
            max_attempts,
            backoff,
        })
    }
}
