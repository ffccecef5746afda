//! Pre-attempt delay strategies
//!
//! Development deployments pause a random moment before each upstream call to
//! look less like a script. Production uses [`NoDelay`].

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use super::profile::HeaderProfile;

#[async_trait]
pub trait AttemptDelay: Send + Sync {
    /// Called before every attempt, including the first one
    async fn before_attempt(&self, profile: &HeaderProfile);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl AttemptDelay for NoDelay {
    async fn before_attempt(&self, _profile: &HeaderProfile) {}
}

/// Sleeps a uniformly random duration in `[min, max]`
#[derive(Debug, Clone, Copy)]
pub struct JitterDelay {
    min: Duration,
    max: Duration,
}

impl JitterDelay {
    /// Bounds are swapped if given in the wrong order
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn pick(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

#[async_trait]
impl AttemptDelay for JitterDelay {
    async fn before_attempt(&self, profile: &HeaderProfile) {
        let delay = self.pick();
        tracing::debug!(
            profile = profile.name(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "delaying upstream attempt"
        );
        tokio::time::sleep(delay).await;
    }
}
