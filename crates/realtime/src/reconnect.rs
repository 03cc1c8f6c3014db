//! Reconnect timing: the jittered periodic rebuild and the pause after a
//! failed rebuild.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

/// Controls when the supervisor rebuilds the session.
///
/// Two independent schedules: the periodic timer (`min_interval` to
/// `max_interval`, minutes apart) paces rebuilds of a healthy session, and
/// the retry window (`retry_min` to `retry_max`, seconds apart) paces
/// attempts after a rebuild failed. A failed rebuild never waits on the
/// periodic schedule, and disabling `periodic` does not disable retries.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Rebuild after an unexpected stream end.
    pub auto_reconnect: bool,
    /// Rebuild on a timer while healthy.
    pub periodic: bool,
    /// Bounds for the periodic timer.
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// Fixed pause between teardown and rebuild.
    pub settle_delay: Duration,
    /// Bounds for the pause after a failed rebuild.
    pub retry_min: Duration,
    pub retry_max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(cfg: &ReconnectConfig) -> Self {
        Self {
            auto_reconnect: cfg.auto_reconnect,
            periodic: cfg.periodic,
            min_interval: Duration::from_secs(cfg.min_interval_secs),
            max_interval: Duration::from_secs(cfg.max_interval_secs),
            settle_delay: Duration::from_secs(cfg.settle_delay_secs),
            retry_min: Duration::from_secs(cfg.retry_min_secs),
            retry_max: Duration::from_secs(cfg.retry_max_secs),
        }
    }
}

impl ReconnectPolicy {
    /// Delay until the next periodic rebuild, or `None` when disabled.
    pub fn next_interval(&self) -> Option<Duration> {
        self.periodic
            .then(|| uniform_between(self.min_interval, self.max_interval))
    }

    /// Pause before the next rebuild attempt after a failure.
    pub fn retry_delay(&self) -> Duration {
        uniform_between(self.retry_min, self.retry_max)
    }
}

/// Uniform in `[lo, hi]`; swapped bounds are tolerated.
fn uniform_between(lo: Duration, hi: Duration) -> Duration {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let lo_ms = lo.as_millis() as u64;
    let hi_ms = hi.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(lo_ms..=hi_ms))
}
