//! Bounded, cancellable polling for long-running server jobs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::elements::Status;
use crate::error::{SereneError, SereneResult};

/// Polling schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay before the second poll
    #[serde(with = "millis")]
    pub interval: Duration,
    /// Polls after which waiting gives up with `SereneError::Timeout`
    pub max_attempts: u32,
    /// Multiplier applied to the delay after every poll; `1.0` is a fixed
    /// interval
    pub backoff: f64,
    /// Upper bound for the delay
    #[serde(with = "millis")]
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_secs(3),
            max_attempts: 1200,
            backoff: 1.0,
            max_interval: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    /// Poll without sleeping. Used in tests and against in-memory servers.
    pub fn immediate(max_attempts: u32) -> Self {
        PollConfig {
            interval: Duration::ZERO,
            max_attempts,
            backoff: 1.0,
            max_interval: Duration::ZERO,
        }
    }

    /// Delay to wait after poll number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.max_interval.max(self.interval);
        let factor = self.backoff.max(1.0).powi(attempt.saturating_sub(1) as i32);
        // saturate instead of overflowing Duration
        Duration::try_from_secs_f64(self.interval.as_secs_f64() * factor).map_or(cap, |delay| delay.min(cap))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Shared flag a caller sets to stop a running poll
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress report from [`poll_until_terminal`]
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// Still running; the next poll happens after `next_delay`
    Waiting {
        attempt: u32,
        status: Status,
        next_delay: Duration,
    },
    Finished {
        attempts: u32,
        status: Status,
    },
}

/// Call `check` until it reports a terminal status.
///
/// Returns the terminal status, `SereneError::Timeout` once
/// `config.max_attempts` polls have seen a non-terminal status, or
/// `SereneError::Cancelled` when `cancel` is set between polls.
pub fn poll_until_terminal(
    what: &str,
    config: &PollConfig,
    cancel: Option<&CancelFlag>,
    mut check: impl FnMut() -> SereneResult<Status>,
    mut on_event: impl FnMut(&PollEvent),
) -> SereneResult<Status> {
    let mut attempt = 0;
    loop {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            info!("Stopped waiting for {} after {} polls", what, attempt);
            return Err(SereneError::Cancelled(what.to_string()));
        }

        attempt += 1;
        let status = check()?;
        if status.is_terminal() {
            on_event(&PollEvent::Finished { attempts: attempt, status });
            info!("{} finished with status {} after {} polls", what, status, attempt);
            return Ok(status);
        }

        if attempt >= config.max_attempts {
            return Err(SereneError::Timeout {
                what: what.to_string(),
                attempts: attempt,
            });
        }

        let next_delay = config.delay(attempt);
        on_event(&PollEvent::Waiting {
            attempt,
            status,
            next_delay,
        });
        debug!("Waiting {:?} for {} ({})", next_delay, what, status);
        if !next_delay.is_zero() {
            std::thread::sleep(next_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(statuses: Vec<Status>) -> impl FnMut() -> SereneResult<Status> {
        let mut it = statuses.into_iter();
        move || Ok(it.next().unwrap_or(Status::Busy))
    }

    #[test]
    fn test_reaches_terminal_status() {
        let mut events = Vec::new();
        let status = poll_until_terminal(
            "job",
            &PollConfig::immediate(10),
            None,
            script(vec![Status::Untrained, Status::Busy, Status::Complete]),
            |e| events.push(e.clone()),
        )
        .unwrap();

        assert_eq!(status, Status::Complete);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            PollEvent::Finished {
                attempts: 3,
                status: Status::Complete
            }
        );
    }

    #[test]
    fn test_error_is_terminal() {
        let status =
            poll_until_terminal("job", &PollConfig::immediate(5), None, script(vec![Status::Error]), |_| {}).unwrap();
        assert_eq!(status, Status::Error);
    }

    #[test]
    fn test_timeout() {
        let err = poll_until_terminal("job", &PollConfig::immediate(4), None, script(vec![]), |_| {}).unwrap_err();
        assert!(matches!(err, SereneError::Timeout { attempts: 4, .. }));
    }

    #[test]
    fn test_cancel_between_polls() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        let mut polls = 0;
        let err = poll_until_terminal(
            "job",
            &PollConfig::immediate(100),
            Some(&flag),
            || {
                polls += 1;
                if polls == 2 {
                    handle.cancel();
                }
                Ok(Status::Busy)
            },
            |_| {},
        )
        .unwrap_err();

        assert!(matches!(err, SereneError::Cancelled(_)));
        assert_eq!(polls, 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = PollConfig {
            interval: Duration::from_millis(100),
            max_attempts: 10,
            backoff: 2.0,
            max_interval: Duration::from_millis(500),
        };
        assert_eq!(config.delay(1), Duration::from_millis(100));
        assert_eq!(config.delay(2), Duration::from_millis(200));
        assert_eq!(config.delay(3), Duration::from_millis(400));
        assert_eq!(config.delay(4), Duration::from_millis(500));
        assert_eq!(config.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let config = PollConfig {
            interval: Duration::from_millis(u64::MAX),
            max_attempts: 3,
            backoff: 4.0,
            max_interval: Duration::from_secs(30),
        };
        assert_eq!(config.delay(1), Duration::from_millis(u64::MAX));
        assert_eq!(config.delay(3), Duration::from_millis(u64::MAX));

        let steep = PollConfig {
            backoff: f64::MAX,
            ..PollConfig::default()
        };
        assert_eq!(steep.delay(5), Duration::from_secs(30));
    }
}
