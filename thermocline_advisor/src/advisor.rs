// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositor-facing advisor facade.
//!
//! [`PowerAdvisor`] is what the compositor talks to: it owns the raw
//! [`TimingStore`], the hint-session lifecycle, the per-display expensive
//! rendering bookkeeping, and the update-imminent debouncer. All entry
//! points are called from the compositor thread; the only cross-thread
//! traffic is the debounce worker touching two atomics and calling back
//! through [`CompositorHooks`].
//!
//! Every operation degrades to a no-op rather than an error when its
//! preconditions are not met (before boot, hinting disabled or unsupported,
//! not enough history yet): the rendering pipeline must never be held up by
//! an absent or slow power service.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration as StdDuration;

use log::{debug, info, trace};
use parking_lot::Mutex;
use thermocline_core::display::DisplayId;
use thermocline_core::fence::GpuFence;
use thermocline_core::store::TimingStore;
use thermocline_core::time::{Duration, TimePoint};

use crate::clock;
use crate::config::AdvisorConfig;
use crate::debounce::IdleTimer;
use crate::hal::{Boost, CompositorHooks, HalError, PowerHal, PowerMode, SessionHint};
use crate::session::SessionManager;

// State shared with the debounce worker thread.
struct ActivityState {
    // Whether the next update-imminent notification may go through.
    send_update_imminent: AtomicBool,
    // Nanosecond timestamp of the last recorded screen update.
    last_screen_updated: AtomicI64,
}

fn to_std_duration(duration: Duration) -> StdDuration {
    StdDuration::from_nanos(u64::try_from(duration.nanos()).unwrap_or(0))
}

/// Frame timing collection and power-hint session management for a display
/// compositor.
///
/// Construct once, call [`init`](Self::init) after the embedder finishes its
/// own setup, and feed it timestamps every frame. See the crate docs for the
/// full call pattern.
pub struct PowerAdvisor {
    hal: Arc<dyn PowerHal>,
    config: AdvisorConfig,
    store: TimingStore,
    session: Mutex<SessionManager>,
    hint_session_enabled: Option<bool>,
    supports_hint_session: Option<bool>,
    boot_finished: AtomicBool,
    expensive_displays: BTreeSet<DisplayId>,
    notified_expensive_rendering: bool,
    has_expensive_rendering: bool,
    has_display_update_imminent: bool,
    debounce: Option<IdleTimer>,
    activity: Arc<ActivityState>,
}

impl PowerAdvisor {
    /// Creates an advisor over the given power service client and
    /// compositor callbacks.
    #[must_use]
    pub fn new(
        hal: Arc<dyn PowerHal>,
        hooks: Arc<dyn CompositorHooks>,
        config: AdvisorConfig,
    ) -> Self {
        let activity = Arc::new(ActivityState {
            send_update_imminent: AtomicBool::new(true),
            last_screen_updated: AtomicI64::new(0),
        });

        let debounce = config.debounce_interval().map(|interval| {
            let on_reset = Arc::clone(&activity);
            let on_timeout = Arc::clone(&activity);
            let timeout_hooks = Arc::clone(&hooks);
            IdleTimer::new(
                to_std_duration(interval),
                move || {
                    on_reset.send_update_imminent.store(false, Ordering::SeqCst);
                },
                move || {
                    // The timer may have been scheduled optimistically: if
                    // the screen updated again while the countdown ran, we
                    // are not actually idle yet. Wait out the remainder.
                    loop {
                        let idle_gap = clock::now().nanos()
                            - on_timeout.last_screen_updated.load(Ordering::SeqCst);
                        if idle_gap >= interval.nanos() {
                            break;
                        }
                        std::thread::sleep(to_std_duration(Duration::from_nanos(
                            interval.nanos() - idle_gap,
                        )));
                    }
                    on_timeout.send_update_imminent.store(true, Ordering::SeqCst);
                    timeout_hooks.disable_expensive_rendering();
                },
            )
        });

        Self {
            hal,
            config,
            store: TimingStore::new(),
            session: Mutex::new(SessionManager::new()),
            hint_session_enabled: None,
            supports_hint_session: None,
            boot_finished: AtomicBool::new(false),
            expensive_displays: BTreeSet::new(),
            notified_expensive_rendering: false,
            has_expensive_rendering: true,
            has_display_update_imminent: true,
            debounce,
            activity,
        }
    }

    /// Starts the debounce timer. Deferred from construction so the
    /// embedder can finish its own setup first.
    pub fn init(&mut self) {
        if let Some(timer) = &mut self.debounce {
            timer.start();
        }
    }

    /// Marks boot as complete, enabling service-facing operations.
    pub fn on_boot_finished(&self) {
        self.boot_finished.store(true, Ordering::SeqCst);
    }

    /// Enables or disables hint sessions for this process.
    pub fn enable_power_hint_session(&mut self, enabled: bool) {
        self.hint_session_enabled = Some(enabled);
    }

    /// Whether hint sessions are enabled and the service supports them.
    ///
    /// Support is probed once and cached for the process lifetime, since the
    /// underlying capability cannot change at runtime.
    pub fn use_power_hint_session(&mut self) -> bool {
        self.hint_session_enabled.unwrap_or(false) && self.supports_power_hint_session()
    }

    fn supports_power_hint_session(&mut self) -> bool {
        if self.supports_hint_session.is_none() {
            self.supports_hint_session = Some(self.hal.preferred_rate().is_ok());
        }
        self.supports_hint_session.unwrap_or(false)
    }

    fn boot_complete(&self) -> bool {
        self.boot_finished.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Timing data collection
    // ------------------------------------------------------------------

    /// Records when GPU work for `display` was submitted this frame.
    pub fn set_gpu_start_time(&mut self, display: DisplayId, start: TimePoint) {
        self.store.set_gpu_start_time(display, start);
    }

    /// Installs the completion fence for `display`'s GPU work this frame.
    pub fn set_gpu_fence(&mut self, display: DisplayId, fence: Box<dyn GpuFence + Send>) {
        self.store.set_gpu_fence(display, fence);
    }

    /// Records the validate-stage window for `display`.
    pub fn set_validate_timing(&mut self, display: DisplayId, start: TimePoint, end: TimePoint) {
        self.store.set_validate_timing(display, start, end);
    }

    /// Records the present-stage window for `display`.
    pub fn set_present_timing(&mut self, display: DisplayId, start: TimePoint, end: TimePoint) {
        self.store.set_present_timing(display, start, end);
    }

    /// Records whether validate and present were merged into one call.
    pub fn set_skipped_validate(&mut self, display: DisplayId, skipped: bool) {
        self.store.set_skipped_validate(display, skipped);
    }

    /// Records whether GPU compositing was used for `display` this frame.
    pub fn set_requires_gpu_composition(&mut self, display: DisplayId, requires: bool) {
        self.store.set_requires_gpu_composition(display, requires);
    }

    /// Records the time the present call was parked waiting for a vsync.
    pub fn set_present_delayed_time(&mut self, display: DisplayId, delayed_until: TimePoint) {
        self.store.set_present_delayed_time(display, delayed_until);
    }

    /// Records the expected present time for the frame being composed.
    pub fn set_expected_present_time(&mut self, expected: TimePoint) {
        self.store.set_expected_present_time(expected);
    }

    /// Records when the compositor began committing this frame.
    pub fn set_commit_start(&mut self, commit_start: TimePoint) {
        self.store.set_commit_start(commit_start);
    }

    /// Records the previous frame's present-fence signal time and the
    /// compositor's own present-end time.
    pub fn set_compositor_present_timing(
        &mut self,
        present_fence_time: TimePoint,
        present_end: TimePoint,
    ) {
        self.store
            .set_compositor_present_timing(present_fence_time, present_end);
    }

    /// Records how long this frame's start was delayed past its target.
    pub fn set_frame_delay(&mut self, delay: Duration) {
        self.store.set_frame_delay(delay);
    }

    /// Records when post-composition work finished.
    pub fn set_composite_end(&mut self, composite_end: TimePoint) {
        self.store.set_composite_end(composite_end);
    }

    /// Replaces the set of displays participating in the frame, in
    /// presentation order.
    pub fn set_displays(&mut self, displays: Vec<DisplayId>) {
        self.store.set_displays(displays);
    }

    /// Updates the full frame (vsync) period the total estimate is measured
    /// against.
    pub fn set_total_frame_target_work_duration(&mut self, target: Duration) {
        self.store.set_total_frame_target_duration(target);
    }

    // ------------------------------------------------------------------
    // Hint session operations
    // ------------------------------------------------------------------

    /// Pushes a new per-frame work target to the power service.
    ///
    /// Skips silently when hinting is off or the target is unchanged; a
    /// failed call drops the session for lazy recreation.
    pub fn update_target_work_duration(&mut self, target: Duration) {
        self.store.set_target_duration(target);
        if !self.use_power_hint_session() {
            debug!("power hint session target cannot be set, skipping");
            return;
        }
        let mut session = self.session.lock();
        session.update_target(&*self.hal, self.config.use_config_sessions, target);
    }

    /// Estimates this frame's work and reports it to the power service.
    ///
    /// No-op before boot, when reporting is disabled, or while timing
    /// history is still filling; negative estimates are discarded.
    pub fn report_actual_work_duration(&mut self) {
        if !self.boot_complete()
            || !self.config.report_actual_durations
            || !self.use_power_hint_session()
        {
            debug!("actual work duration power hint cannot be sent, skipping");
            return;
        }
        let now = clock::now();
        let Some(mut duration) = self
            .store
            .estimate_work_duration(now, self.config.gpu_aware_reporting)
        else {
            debug!("failed to estimate the actual work duration, skipping");
            return;
        };
        if duration.total.is_negative() {
            debug!("negative work duration estimate, skipping");
            return;
        }
        duration.total = duration.total + self.config.target_safety_margin;
        debug!(
            "sending actual work duration of {}ns (cpu {}ns, gpu {}ns)",
            duration.total.nanos(),
            duration.cpu.nanos(),
            duration.gpu.nanos()
        );
        let target = self.store.target_duration();
        let mut session = self.session.lock();
        session.report(&*self.hal, self.config.use_config_sessions, target, duration);
    }

    /// Starts a hint session covering the given threads.
    ///
    /// Returns `false` before boot completion, when hinting is disabled or
    /// unsupported, or when a session is already running.
    ///
    /// # Panics
    ///
    /// Starting a session with no thread IDs is a contract violation on the
    /// caller's side and panics.
    pub fn start_power_hint_session(&mut self, thread_ids: Vec<i32>) -> bool {
        self.session.lock().set_thread_ids(thread_ids);
        // Hold off until boot completion to avoid an early-boot dependency
        // on the power service.
        if !self.boot_complete() {
            return false;
        }
        if !self.use_power_hint_session() {
            info!("cannot start power hint session: disabled or unsupported");
            return false;
        }
        let mut session = self.session.lock();
        assert!(
            session.has_thread_ids(),
            "no thread ids provided to the power hint session"
        );
        session.start(
            &*self.hal,
            self.config.use_config_sessions,
            self.store.target_duration(),
        )
    }

    /// Tells the power service that CPU load is ramping up.
    pub fn notify_cpu_load_up(&mut self) {
        // Hold off until boot completion to avoid an early-boot dependency
        // on the power service.
        if !self.boot_complete() {
            return;
        }
        if self.use_power_hint_session() {
            let mut session = self.session.lock();
            session.send_hint(
                &*self.hal,
                self.config.use_config_sessions,
                self.store.target_duration(),
                SessionHint::CpuLoadUp,
            );
        }
    }

    /// Tells the power service a display update is imminent, rate-limited
    /// by the idle debouncer.
    pub fn notify_display_update_imminent_and_cpu_reset(&mut self) {
        if !self.boot_complete() {
            return;
        }

        if self.activity.send_update_imminent.swap(false, Ordering::SeqCst) {
            debug!("notifying display update imminent");
            if self.use_power_hint_session() {
                let mut session = self.session.lock();
                session.send_hint(
                    &*self.hal,
                    self.config.use_config_sessions,
                    self.store.target_duration(),
                    SessionHint::CpuLoadReset,
                );
            }

            if !self.has_display_update_imminent {
                debug!("skipped the update-imminent boost: unsupported by the power service");
            } else if let Err(err) = self.hal.set_boost(Boost::DisplayUpdateImminent, 0) {
                if err == HalError::Unsupported {
                    self.has_display_update_imminent = false;
                }
            }

            match &self.debounce {
                Some(timer) => timer.reset(),
                // Without a timer nothing throttles service calls; allow the
                // next notification through immediately.
                None => self
                    .activity
                    .send_update_imminent
                    .store(true, Ordering::SeqCst),
            }
        }

        if self.debounce.is_some() {
            self.activity
                .last_screen_updated
                .store(clock::now().nanos(), Ordering::SeqCst);
        }
    }

    /// Flags `display` as (not) doing sustained GPU-heavy composition,
    /// driving the expensive-rendering power mode across all displays.
    pub fn set_expensive_rendering_expected(&mut self, display: DisplayId, expected: bool) {
        if !self.has_expensive_rendering {
            debug!("skipped expensive rendering mode: unsupported by the power service");
            return;
        }
        if expected {
            self.expensive_displays.insert(display);
        } else {
            self.expensive_displays.remove(&display);
        }

        let expects_expensive_rendering = !self.expensive_displays.is_empty();
        if self.notified_expensive_rendering != expects_expensive_rendering {
            if let Err(err) = self
                .hal
                .set_mode(PowerMode::ExpensiveRendering, expects_expensive_rendering)
            {
                if err == HalError::Unsupported {
                    self.has_expensive_rendering = false;
                }
                return;
            }
            self.notified_expensive_rendering = expects_expensive_rendering;
            trace!(
                "expensive rendering {}",
                if expects_expensive_rendering {
                    "begins"
                } else {
                    "ends"
                }
            );
        }
    }
}

impl fmt::Debug for PowerAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerAdvisor")
            .field("config", &self.config)
            .field("boot_finished", &self.boot_finished)
            .field("hint_session_enabled", &self.hint_session_enabled)
            .field("supports_hint_session", &self.supports_hint_session)
            .field("notified_expensive_rendering", &self.notified_expensive_rendering)
            .finish_non_exhaustive()
    }
}
