// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hint-session lifecycle.
//!
//! [`SessionManager`] owns the one hint session the advisor maintains
//! against the power service: creation with capability negotiation and
//! fallback, target updates, actual-duration reporting with an at-least-once
//! retry queue, and teardown on failure. A failed call discards the session;
//! the next call transparently recreates it. There is no in-flight
//! cancellation or mid-call retry.
//!
//! The manager itself is not synchronized; the advisor wraps it in the one
//! session mutex and holds that lock only for the duration of each service
//! call.

use log::{debug, error, info, warn};
use thermocline_core::estimator::WorkDuration;
use thermocline_core::time::Duration;

use crate::hal::{HalError, HintSession, PowerHal, SessionConfig, SessionHint, SessionTag};

/// Whether a session is currently established.
///
/// The explicit two-state shape (rather than an optional handle) is what
/// makes the discard-and-recreate contract visible at the type level.
pub(crate) enum SessionState {
    /// No session; the next use will attempt creation.
    Absent,
    /// An established session handle.
    Active(Box<dyn HintSession>),
}

pub(crate) struct SessionManager {
    state: SessionState,
    thread_ids: Vec<i32>,
    unreported: Vec<WorkDuration>,
    last_target_sent: Duration,
    session_config: Option<SessionConfig>,
    // Config-bearing creation is disabled for the process lifetime after an
    // explicit unsupported outcome, or after any failure on the very first
    // attempt. A later non-unsupported failure leaves it enabled so the
    // next creation retries the config path.
    config_supported: bool,
    first_config_check: bool,
}

fn process_identity() -> (i32, i32) {
    let pid = rustix::process::getpid().as_raw_nonzero().get();
    // The service ABI carries uids as signed integers.
    let uid = rustix::process::getuid().as_raw() as i32;
    (pid, uid)
}

impl SessionManager {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Absent,
            thread_ids: Vec::new(),
            unreported: Vec::new(),
            last_target_sent: Duration::ZERO,
            session_config: None,
            config_supported: true,
            first_config_check: true,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active(_))
    }

    pub(crate) fn set_thread_ids(&mut self, thread_ids: Vec<i32>) {
        self.thread_ids = thread_ids;
    }

    pub(crate) fn has_thread_ids(&self) -> bool {
        !self.thread_ids.is_empty()
    }

    pub(crate) fn session_config(&self) -> Option<SessionConfig> {
        self.session_config
    }

    fn should_create_with_config(&self, use_config_sessions: bool) -> bool {
        self.config_supported && use_config_sessions
    }

    /// Establishes a session if none is running.
    ///
    /// Returns `true` when a session is active afterwards. Callers are
    /// responsible for the hinting-enabled/supported preconditions.
    pub(crate) fn ensure_running(
        &mut self,
        hal: &dyn PowerHal,
        use_config_sessions: bool,
        target: Duration,
    ) -> bool {
        if self.is_active() {
            return true;
        }
        if self.thread_ids.is_empty() {
            return false;
        }
        let (pid, uid) = process_identity();
        if self.should_create_with_config(use_config_sessions) {
            match hal.create_hint_session_with_config(
                pid,
                uid,
                &self.thread_ids,
                target,
                SessionTag::Compositor,
            ) {
                Ok((session, config)) => {
                    self.state = SessionState::Active(session);
                    self.session_config = Some(config);
                }
                Err(err) => {
                    // Unsupported always downgrades; a generic failure only
                    // does so on the very first attempt.
                    if self.first_config_check || err == HalError::Unsupported {
                        info!("config-bearing hint session unavailable, falling back: {err}");
                        self.config_supported = false;
                    }
                }
            }
            self.first_config_check = false;
        }
        // Try the minimal call immediately, in case the config path just
        // got downgraded above.
        if !self.is_active() && !self.should_create_with_config(use_config_sessions) {
            if let Ok(session) = hal.create_hint_session(pid, uid, &self.thread_ids, target) {
                self.state = SessionState::Active(session);
            }
        }
        self.is_active()
    }

    /// Sends a one-shot hint, discarding the session on failure.
    pub(crate) fn send_hint(
        &mut self,
        hal: &dyn PowerHal,
        use_config_sessions: bool,
        target: Duration,
        hint: SessionHint,
    ) {
        if !self.ensure_running(hal, use_config_sessions, target) {
            return;
        }
        if let SessionState::Active(session) = &mut self.state {
            if let Err(err) = session.send_hint(hint) {
                warn!("failed to send {hint:?}: {err}");
                self.state = SessionState::Absent;
            }
        }
    }

    /// Pushes a new target duration, skipping unchanged values.
    pub(crate) fn update_target(
        &mut self,
        hal: &dyn PowerHal,
        use_config_sessions: bool,
        target: Duration,
    ) {
        if target == self.last_target_sent {
            return;
        }
        if !self.ensure_running(hal, use_config_sessions, target) {
            return;
        }
        debug!("sending target work duration of {}ns", target.nanos());
        self.last_target_sent = target;
        if let SessionState::Active(session) = &mut self.state {
            if let Err(err) = session.update_target(target) {
                warn!("failed to update the target work duration: {err}");
                self.state = SessionState::Absent;
            }
        }
    }

    /// Queues a measured duration and reports the whole queue.
    ///
    /// The queue is cleared only on a confirmed success; a failure keeps
    /// every sample (including the one just queued) for the next attempt.
    pub(crate) fn report(
        &mut self,
        hal: &dyn PowerHal,
        use_config_sessions: bool,
        target: Duration,
        duration: WorkDuration,
    ) {
        self.unreported.push(duration);
        if !self.ensure_running(hal, use_config_sessions, target) {
            debug!("hint session not running and could not be started, skipping report");
            return;
        }
        if let SessionState::Active(session) = &mut self.state {
            match session.report_actual(&self.unreported) {
                Ok(()) => self.unreported.clear(),
                Err(err) => {
                    warn!("failed to report actual work durations: {err}");
                    self.state = SessionState::Absent;
                }
            }
        }
    }

    /// Explicitly starts a session for the given threads.
    pub(crate) fn start(
        &mut self,
        hal: &dyn PowerHal,
        use_config_sessions: bool,
        target: Duration,
    ) -> bool {
        if self.is_active() {
            error!("cannot start a power hint session: already running");
            return false;
        }
        self.ensure_running(hal, use_config_sessions, target)
    }

    #[cfg(test)]
    pub(crate) fn unreported_len(&self) -> usize {
        self.unreported.len()
    }
}
