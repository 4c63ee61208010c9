// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Advisor configuration.
//!
//! [`AdvisorConfig`] carries the externally-loaded flags and tunables the
//! advisor consults. Loading them (system properties, feature flags) is the
//! embedder's concern; the defaults here match a stock configuration.

use thermocline_core::time::Duration;

/// Flags and tunables consulted by the advisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvisorConfig {
    /// Attempt config-bearing session creation before falling back to the
    /// minimal creation call.
    pub use_config_sessions: bool,
    /// Report the CPU/GPU duration split alongside the combined total.
    pub gpu_aware_reporting: bool,
    /// Idle interval after which an update-imminent notification is allowed
    /// again. `None` (or a non-positive interval) disables throttling
    /// entirely.
    pub update_timeout: Option<Duration>,
    /// Headroom added to every reported total against measurement error.
    pub target_safety_margin: Duration,
    /// Master switch for actual-duration reporting.
    pub report_actual_durations: bool,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            use_config_sessions: true,
            gpu_aware_reporting: true,
            update_timeout: Some(Duration::from_millis(80)),
            target_safety_margin: Duration::from_millis(1),
            report_actual_durations: true,
        }
    }
}

impl AdvisorConfig {
    /// Returns the debounce interval, if throttling is enabled.
    #[must_use]
    pub(crate) fn debounce_interval(&self) -> Option<Duration> {
        self.update_timeout.filter(|timeout| timeout.nanos() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_configuration() {
        let config = AdvisorConfig::default();
        assert_eq!(config.update_timeout, Some(Duration::from_millis(80)));
        assert_eq!(config.target_safety_margin, Duration::from_millis(1));
        assert!(config.use_config_sessions);
        assert!(config.report_actual_durations);
    }

    #[test]
    fn zero_interval_disables_throttling() {
        let config = AdvisorConfig {
            update_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(config.debounce_interval(), None);
        let config = AdvisorConfig {
            update_timeout: None,
            ..Default::default()
        };
        assert_eq!(config.debounce_interval(), None);
    }
}
