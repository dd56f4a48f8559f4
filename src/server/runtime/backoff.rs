//! Back-off timing for failed accepts.

use std::time::Duration;

/// Exponential back-off applied when a listener's `accept()` fails.
///
/// The first retry waits `initial_delay`; each further failure doubles the
/// wait up to `max_delay`. A successful accept resets it. Defaults are 10 ms
/// and 1 s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the doubled wait.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Raise both delays to at least 1 ms and order them.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use eventwire::server::BackoffConfig;
    ///
    /// let normalized = BackoffConfig {
    ///     initial_delay: Duration::from_millis(50),
    ///     max_delay: Duration::ZERO,
    /// }
    /// .normalized();
    /// assert_eq!(normalized.initial_delay, Duration::from_millis(1));
    /// assert_eq!(normalized.max_delay, Duration::from_millis(50));
    /// ```
    #[must_use]
    pub fn normalized(self) -> Self {
        let floor = Duration::from_millis(1);
        let a = self.initial_delay.max(floor);
        let b = self.max_delay.max(floor);
        Self {
            initial_delay: a.min(b),
            max_delay: a.max(b),
        }
    }
}
