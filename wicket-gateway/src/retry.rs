//! Polling pace policies for the long-poll synchronizer.

use std::time::Duration;

/// Controls how long the synchronizer pauses between poll iterations.
///
/// `consecutive_failures` is 0 after a successful poll and counts up while
/// polls keep failing, so a policy can back off on trouble and snap back on
/// recovery.
pub trait PollPolicy: Send + Sync + 'static {
    fn next_delay(&self, consecutive_failures: u32) -> Duration;
}

/// Always pause the same amount between polls.
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(Duration::from_secs(1))
    }
}

impl PollPolicy for FixedDelay {
    fn next_delay(&self, _: u32) -> Duration {
        self.0
    }
}

/// Double the pause on each consecutive failure, up to a cap.
pub struct ExponentialBackoff {
    pub base: Duration,
    pub cap:  Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap:  Duration::from_secs(30),
        }
    }
}

impl PollPolicy for ExponentialBackoff {
    fn next_delay(&self, consecutive_failures: u32) -> Duration {
        let shift = consecutive_failures.min(16);
        let delay = self.base.saturating_mul(1u32 << shift.min(31));
        delay.min(self.cap)
    }
}
