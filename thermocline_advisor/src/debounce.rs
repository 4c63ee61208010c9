// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reset-on-activity idle timer.
//!
//! [`IdleTimer`] drives the update-imminent debounce: every recorded
//! activity fires the *reset* callback and re-arms the countdown; once the
//! configured interval passes with no further activity, the *timeout*
//! callback fires and the timer goes back to sleep until the next activity.
//!
//! Both callbacks run on the timer's worker thread, never on the caller's.

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration as StdDuration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

type Callback = Box<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerState {
    /// No countdown running; waiting for activity.
    Idle,
    /// Activity arrived and has not been consumed by the worker yet.
    Armed,
    /// Countdown in progress.
    Waiting,
    /// Shutting down.
    Stopped,
}

struct Shared {
    interval: StdDuration,
    state: Mutex<TimerState>,
    condvar: Condvar,
    reset_callback: Callback,
    timeout_callback: Callback,
}

/// A single-shot timer that restarts its countdown on every reset.
pub struct IdleTimer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl IdleTimer {
    /// Creates a timer with the given interval and callbacks.
    ///
    /// The timer does nothing until [`start`](Self::start) is called.
    #[must_use]
    pub fn new(
        interval: StdDuration,
        reset_callback: impl Fn() + Send + Sync + 'static,
        timeout_callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                interval,
                state: Mutex::new(TimerState::Idle),
                condvar: Condvar::new(),
                reset_callback: Box::new(reset_callback),
                timeout_callback: Box::new(timeout_callback),
            }),
            worker: None,
        }
    }

    /// Spawns the worker thread. Calling `start` twice is a no-op.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.worker = Some(
            std::thread::Builder::new()
                .name("IdleTimer".into())
                .spawn(move || run(&shared))
                .expect("spawning the idle timer thread"),
        );
    }

    /// Records activity: fires the reset callback and restarts the countdown.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        if *state == TimerState::Stopped {
            return;
        }
        *state = TimerState::Armed;
        self.shared.condvar.notify_all();
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            *state = TimerState::Stopped;
            self.shared.condvar.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl fmt::Debug for IdleTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleTimer")
            .field("interval", &self.shared.interval)
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        match *state {
            TimerState::Stopped => return,
            TimerState::Idle | TimerState::Waiting => {
                // Waiting without a countdown can only happen transiently
                // around callback invocation; treat it as idle.
                *state = TimerState::Idle;
                shared.condvar.wait(&mut state);
            }
            TimerState::Armed => {
                *state = TimerState::Waiting;
                MutexGuard::unlocked(&mut state, || (shared.reset_callback)());
                countdown(shared, &mut state);
            }
        }
    }
}

// Runs one countdown. Returns with the state at Idle (timeout fired),
// Armed (activity interrupted the countdown), or Stopped.
fn countdown(shared: &Shared, state: &mut MutexGuard<'_, TimerState>) {
    let deadline = Instant::now() + shared.interval;
    loop {
        match **state {
            TimerState::Stopped | TimerState::Armed => return,
            TimerState::Idle | TimerState::Waiting => {}
        }
        let timed_out = shared
            .condvar
            .wait_until(state, deadline)
            .timed_out();
        match **state {
            TimerState::Stopped | TimerState::Armed => return,
            TimerState::Idle | TimerState::Waiting => {
                if timed_out {
                    **state = TimerState::Idle;
                    MutexGuard::unlocked(state, || (shared.timeout_callback)());
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counters() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)))
    }

    #[test]
    fn timeout_fires_after_interval_of_no_activity() {
        let (resets, timeouts) = counters();
        let (r, t) = (Arc::clone(&resets), Arc::clone(&timeouts));
        let mut timer = IdleTimer::new(
            StdDuration::from_millis(80),
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
        );
        timer.start();
        timer.reset();

        std::thread::sleep(StdDuration::from_millis(40));
        assert_eq!(
            timeouts.load(Ordering::SeqCst),
            0,
            "timeout must not fire before the interval elapses"
        );

        std::thread::sleep(StdDuration::from_millis(120));
        assert_eq!(timeouts.load(Ordering::SeqCst), 1, "timeout fired once");
        assert_eq!(resets.load(Ordering::SeqCst), 1, "reset fired once");
    }

    #[test]
    fn activity_restarts_the_countdown() {
        let (resets, timeouts) = counters();
        let (r, t) = (Arc::clone(&resets), Arc::clone(&timeouts));
        let mut timer = IdleTimer::new(
            StdDuration::from_millis(100),
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
        );
        timer.start();
        timer.reset();
        std::thread::sleep(StdDuration::from_millis(60));
        timer.reset();
        std::thread::sleep(StdDuration::from_millis(60));
        assert_eq!(
            timeouts.load(Ordering::SeqCst),
            0,
            "second reset pushed the deadline past 120ms"
        );
        std::thread::sleep(StdDuration::from_millis(100));
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);
        assert!(
            resets.load(Ordering::SeqCst) >= 2,
            "each activity fires the reset callback"
        );
    }

    #[test]
    fn timer_sleeps_again_after_firing() {
        let (_, timeouts) = counters();
        let t = Arc::clone(&timeouts);
        let mut timer = IdleTimer::new(
            StdDuration::from_millis(30),
            || {},
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
        );
        timer.start();
        timer.reset();
        std::thread::sleep(StdDuration::from_millis(120));
        assert_eq!(
            timeouts.load(Ordering::SeqCst),
            1,
            "one activity produces exactly one timeout"
        );
        timer.reset();
        std::thread::sleep(StdDuration::from_millis(80));
        assert_eq!(timeouts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unstarted_timer_never_fires() {
        let (resets, timeouts) = counters();
        let (r, t) = (Arc::clone(&resets), Arc::clone(&timeouts));
        let timer = IdleTimer::new(
            StdDuration::from_millis(10),
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
        );
        timer.reset();
        std::thread::sleep(StdDuration::from_millis(50));
        assert_eq!(timeouts.load(Ordering::SeqCst), 0);
        assert_eq!(resets.load(Ordering::SeqCst), 0);
        drop(timer);
    }

    #[test]
    fn drop_joins_the_worker() {
        let mut timer = IdleTimer::new(StdDuration::from_millis(5), || {}, || {});
        timer.start();
        timer.reset();
        drop(timer);
    }
}
