// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Power service and compositor contracts.
//!
//! The advisor never talks to a power service directly; a platform
//! integration implements [`PowerHal`] (and the [`HintSession`] handles it
//! creates) over whatever IPC the platform provides. Every call reports
//! success, a distinguished *unsupported* outcome, or a generic failure —
//! the advisor's recovery behavior differs sharply between the last two
//! (see [`HalError`]).

use thermocline_core::estimator::WorkDuration;
use thermocline_core::time::Duration;

/// Why a power service call did not succeed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// The service does not implement the requested feature. Permanently
    /// downgrades the corresponding capability for the process lifetime.
    #[error("operation not supported by the power service")]
    Unsupported,
    /// Any other failure. The session (if any) is discarded and lazily
    /// recreated on the next call.
    #[error("power service call failed: {0}")]
    Failure(String),
}

/// Result of a power service call.
pub type HalResult<T> = Result<T, HalError>;

/// Load hints reportable on a hint session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionHint {
    /// CPU load is ramping up; clocks should follow promptly.
    CpuLoadUp,
    /// CPU load baseline should be re-established.
    CpuLoadReset,
}

/// Power modes the advisor may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerMode {
    /// Sustained GPU-heavy composition is in progress.
    ExpensiveRendering,
}

/// One-shot boosts the advisor may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Boost {
    /// A display update is about to happen.
    DisplayUpdateImminent,
}

/// Identifies the workload class a hint session belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionTag {
    /// The display compositor's main loop.
    Compositor,
}

/// Service-assigned session parameters returned by config-bearing creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Service-side identifier for the created session.
    pub id: i64,
}

/// A stateful duration-reporting stream against the power service.
///
/// Obtained from [`PowerHal::create_hint_session_with_config`] or
/// [`PowerHal::create_hint_session`]; dropped (and later recreated) by the
/// advisor after any failing call.
pub trait HintSession: Send {
    /// Sends a one-shot load hint.
    fn send_hint(&mut self, hint: SessionHint) -> HalResult<()>;

    /// Updates the deadline the workload should finish within.
    fn update_target(&mut self, target: Duration) -> HalResult<()>;

    /// Reports measured work durations, oldest first.
    fn report_actual(&mut self, durations: &[WorkDuration]) -> HalResult<()>;
}

/// Client for the platform power service.
///
/// Implementations must not block indefinitely: a slow service stalls hint
/// reporting but must never stall the rendering pipeline beyond the single
/// call the advisor makes under its session lock.
pub trait PowerHal: Send + Sync {
    /// Probes the service's preferred hint update rate.
    ///
    /// Success doubles as the capability probe for hint sessions: a service
    /// without session support fails this call.
    fn preferred_rate(&self) -> HalResult<Duration>;

    /// Creates a hint session, returning the service-assigned config.
    fn create_hint_session_with_config(
        &self,
        pid: i32,
        uid: i32,
        thread_ids: &[i32],
        target: Duration,
        tag: SessionTag,
    ) -> HalResult<(Box<dyn HintSession>, SessionConfig)>;

    /// Creates a hint session the pre-config way.
    fn create_hint_session(
        &self,
        pid: i32,
        uid: i32,
        thread_ids: &[i32],
        target: Duration,
    ) -> HalResult<Box<dyn HintSession>>;

    /// Enables or disables a power mode.
    fn set_mode(&self, mode: PowerMode, enabled: bool) -> HalResult<()>;

    /// Requests a one-shot boost with a service-defined argument.
    fn set_boost(&self, boost: Boost, value: i32) -> HalResult<()>;
}

/// Callbacks from the advisor back into the compositor.
pub trait CompositorHooks: Send + Sync {
    /// The display has been idle long enough that any forced
    /// expensive-rendering mode should be dropped.
    fn disable_expensive_rendering(&self);
}
