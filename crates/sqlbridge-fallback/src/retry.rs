//! Bounded connect retry with a fixed delay between attempts.

use sqlbridge_core::Result;
use sqlbridge_core::error::{ConnectionErrorKind, connection_error_with};
use std::thread;
use std::time::Duration;

/// How often and how patiently a driver connect is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Clamped to at least 1.
    pub max_attempts: u32,
    /// Sleep between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once and never sleeps.
    pub fn once() -> Self {
        RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Run `connect` up to `policy.max_attempts` times.
///
/// Sleeps `policy.delay` after each failure except the last. The final
/// failure is wrapped in a connection error naming the attempt count, with
/// the last cause chained.
#[allow(clippy::result_large_err)]
pub fn connect_with_retry<T>(
    policy: RetryPolicy,
    driver: &str,
    mut connect: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..attempts {
        match connect() {
            Ok(conn) => return Ok(conn),
            Err(err) => {
                tracing::warn!(
                    driver,
                    attempt,
                    error = %err,
                    "Driver connect failed, retrying"
                );
                thread::sleep(policy.delay);
            }
        }
    }
    match connect() {
        Ok(conn) => Ok(conn),
        Err(err) => Err(connection_error_with(
            ConnectionErrorKind::Io,
            format!("{} driver failed to connect after {} attempts: {}", driver, attempts, err),
            err,
        )),
    }
}
