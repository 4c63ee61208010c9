// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Power-hint session lifecycle and update-imminent debouncing.
//!
//! `thermocline_advisor` sits between a display compositor and a platform
//! power service. The compositor feeds it raw stage timestamps each frame
//! (collected per display) plus frame-global markers; the advisor folds them
//! into one combined CPU/GPU work estimate via [`thermocline_core`] and
//! reports it over a stateful hint session, handling capability
//! negotiation, fallback, failure recovery, and rate-limited
//! update-imminent notifications.
//!
//! # Call pattern
//!
//! ```rust,ignore
//! let mut advisor = PowerAdvisor::new(hal, hooks, AdvisorConfig::default());
//! advisor.init();
//! advisor.on_boot_finished();
//! advisor.enable_power_hint_session(true);
//! advisor.start_power_hint_session(main_thread_ids);
//!
//! // Every frame, in present order:
//! advisor.set_commit_start(commit_time);
//! advisor.set_expected_present_time(expected_present);
//! for display in &displays {
//!     advisor.set_present_timing(*display, start, end);
//!     // ... remaining per-display setters ...
//! }
//! advisor.set_compositor_present_timing(prev_fence_time, present_end);
//! advisor.set_composite_end(composite_end);
//! advisor.report_actual_work_duration();
//! ```
//!
//! The power service itself and the compositor callbacks are contracts (see
//! [`hal`]); platform integrations implement them over whatever IPC the
//! platform provides.
//!
//! **[`advisor`]** — The [`PowerAdvisor`] facade the compositor calls.
//!
//! **[`hal`]** — [`PowerHal`](hal::PowerHal) / [`HintSession`](hal::HintSession)
//! contracts, outcome taxonomy, and the [`CompositorHooks`](hal::CompositorHooks)
//! callback seam.
//!
//! **[`config`]** — Externally-loaded flags and tunables.
//!
//! **[`debounce`]** — The reset-on-activity idle timer behind the
//! update-imminent rate limit.
//!
//! **[`clock`]** — Monotonic clock reads.

pub mod advisor;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod hal;
mod session;

pub use advisor::PowerAdvisor;
pub use config::AdvisorConfig;
