//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Primary orchestration and lifecycle management."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::time::Duration;

use hsup_common::config::InstallConfig;

/// Delay applied between first-run installation attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Retry schedule for an idempotent setup operation.
///
/// The delay is fixed: it neither grows with the attempt count nor carries
/// jitter. Persistent failures show up as one warning per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Pause after every failed attempt.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Unbounded policy with a fixed `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    /// Cap the number of attempts. `0` is treated as `1`.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Build the install policy from configuration.
    pub fn from_config(config: &InstallConfig) -> Self {
        let policy = Self::fixed(config.retry_delay);
        match config.max_attempts {
            Some(limit) => policy.with_max_attempts(limit),
            None => policy,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none()
    }

    /// Whether another attempt may follow `attempts` failed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(limit) => attempts < limit,
            None => true,
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded_sixty_seconds() {
        let policy = RetryPolicy::default();
        assert!(policy.is_unbounded());
        assert_eq!(policy.delay, Duration::from_secs(60));
        assert!(policy.should_retry(u32::MAX));
    }

    #[test]
    fn delay_does_not_grow() {
        let policy = RetryPolicy::fixed(Duration::from_secs(60));
        for attempt in [1, 2, 10, 1_000] {
            assert_eq!(policy.delay_for(attempt), Duration::from_secs(60));
        }
    }

    #[test]
    fn bounded_policy_stops_at_limit() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1)).with_max_attempts(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn zero_limit_still_allows_one_attempt() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, Some(1));
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn built_from_install_config() {
        let config = InstallConfig {
            retry_delay: Duration::from_secs(5),
            max_attempts: Some(4),
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.delay, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, Some(4));

        let unbounded = RetryPolicy::from_config(&InstallConfig::default());
        assert!(unbounded.is_unbounded());
        assert_eq!(unbounded.delay, DEFAULT_RETRY_DELAY);
    }
}
