use crate::{Error, Result};
use backon::{BlockingRetryable, ExponentialBuilder};
use serde::{Deserialize, Serialize};
use std::{cell::Cell, time::Duration};

/// The default maximum number of retries.
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// The default delay before the first retry.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(10);

/// The default ceiling on the delay between retries.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(160);

/// The default growth of the delay between retries.
pub const DEFAULT_FACTOR: f32 = 2.0;

/// Bounded exponential backoff for transient network failures.
///
/// Only timeouts and connection failures are retried (see
/// [Error::is_transient]). Other errors are returned as they are.
///
/// # Examples
///
/// ```
/// use pdssp_io::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries, 5);
/// let value = policy.retry(|| Ok::<_, pdssp_io::Error>(42)).unwrap();
/// assert_eq!(value, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// The maximum number of retries, not counting the first attempt.
    pub max_retries: usize,

    /// The delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,

    /// The ceiling on the delay between retries.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// How much the delay grows after each retry.
    pub factor: f32,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Runs `f`, retrying transient failures.
    ///
    /// Returns [Error::RetriesExhausted] if the last attempt also failed
    /// transiently.
    pub fn retry<T>(&self, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = Cell::new(0);
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries);
        let result = (|| {
            attempts.set(attempts.get() + 1);
            f()
        })
        .retry(backoff)
        .sleep(std::thread::sleep)
        .when(Error::is_transient)
        .notify(|err, delay| {
            tracing::warn!("request failed ({err}), retrying in {delay:?}");
        })
        .call();
        result.map_err(|err| {
            if err.is_transient() {
                Error::RetriesExhausted {
                    attempts: attempts.get(),
                    source: Box::new(err),
                }
            } else {
                err
            }
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            factor: DEFAULT_FACTOR,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::RetryPolicy;
    use crate::{Error, Result};
    use std::{cell::Cell, time::Duration};

    /// A connection error, from a port nothing listens on.
    pub(crate) fn connection_error() -> Error {
        reqwest::blocking::Client::new()
            .get("http://127.0.0.1:1")
            .send()
            .unwrap_err()
            .into()
    }

    pub(crate) fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 2.0,
        }
    }

    #[test]
    fn connection_error_is_transient() {
        assert!(connection_error().is_transient());
    }

    #[test]
    fn retries_then_succeeds() {
        let calls = Cell::new(0);
        let value = fast()
            .retry(|| {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(connection_error())
                } else {
                    Ok("ok")
                }
            })
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn exhausted() {
        let error = fast().retry(|| -> Result<()> { Err(connection_error()) }).unwrap_err();
        let Error::RetriesExhausted { attempts, source } = error else {
            panic!("expected retries to be exhausted");
        };
        assert_eq!(attempts, 4);
        assert!(source.is_transient());
    }

    #[test]
    fn other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let error = fast()
            .retry(|| -> Result<()> {
                calls.set(calls.get() + 1);
                Err(Error::MissingField("features"))
            })
            .unwrap_err();
        assert!(matches!(error, Error::MissingField("features")));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn durations_are_humantime() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"min_delay": "500ms", "max_delay": "1m"}"#).unwrap();
        assert_eq!(policy.min_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.max_retries, 5);
    }
}
