//! Per-connection liveness detection.
//!
//! A server holds one [`Heartbeat`] prototype. Each connection gets its own
//! [`HeartbeatMonitor`] cloned from it: the interval, timeout and
//! [`LivenessCheck`] are shared while cancellation is per connection.

use std::{fmt, sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::Connection;

/// Decides what happens to a connection on every heartbeat tick.
pub trait LivenessCheck: Send + Sync + 'static {
    /// Inspect `connection`; `timeout` is the configured idle limit.
    fn check(&self, connection: &Connection, timeout: Duration);
}

impl<F> LivenessCheck for F
where
    F: Fn(&Connection, Duration) + Send + Sync + 'static,
{
    fn check(&self, connection: &Connection, timeout: Duration) { self(connection, timeout) }
}

/// Default check: close connections idle for longer than the timeout.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloseIdle;

impl LivenessCheck for CloseIdle {
    fn check(&self, connection: &Connection, timeout: Duration) {
        let idle = connection.idle_for();
        if idle > timeout {
            info!(
                connection_id = %connection.id(),
                idle_ms = idle.as_millis(),
                "closing idle connection"
            );
            connection.close();
        }
    }
}

/// Server-level heartbeat prototype.
#[derive(Clone)]
pub struct Heartbeat {
    interval: Duration,
    timeout: Duration,
    check: Arc<dyn LivenessCheck>,
}

impl Heartbeat {
    /// Create a prototype ticking every `interval` with the [`CloseIdle`]
    /// check.
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            check: Arc::new(CloseIdle),
        }
    }

    /// Replace the liveness check.
    #[must_use]
    pub fn with_check(mut self, check: impl LivenessCheck) -> Self {
        self.check = Arc::new(check);
        self
    }

    /// Tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration { self.interval }

    /// Idle timeout passed to the check.
    #[must_use]
    pub fn timeout(&self) -> Duration { self.timeout }

    /// Clone a monitor for one connection, stopped by `token`.
    #[must_use]
    pub fn monitor(&self, token: CancellationToken) -> HeartbeatMonitor {
        HeartbeatMonitor {
            prototype: self.clone(),
            token,
        }
    }
}

impl fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heartbeat")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Heartbeat loop bound to a single connection.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    prototype: Heartbeat,
    token: CancellationToken,
}

impl HeartbeatMonitor {
    /// Tick until the token is cancelled, running the check each time.
    ///
    /// The first tick fires one interval after the call.
    pub async fn run(self, connection: Arc<Connection>) {
        let Heartbeat {
            interval,
            timeout,
            check,
        } = self.prototype;
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = self.token.cancelled() => break,
                _ = ticker.tick() => check.check(&connection, timeout),
            }
        }
        debug!(connection_id = %connection.id(), "heartbeat stopped");
    }
}
