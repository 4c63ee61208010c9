// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Derived per-display timelines.
//!
//! The raw stage timestamps in [`DisplayTimingData`] are noisy: validate and
//! present may have been merged into one call, the present call may have
//! parked waiting for a vsync, and the present fence may have signaled
//! before, during, or after the wait. This module normalizes all of that
//! into a [`DisplayTimeline`], and resolves the display's GPU completion
//! fence into a best-effort [`GpuTimeline`] even while the fence is still
//! pending.

use crate::fence::FenceSignal;
use crate::store::DisplayTimingData;
use crate::time::{Duration, TimePoint};

// Modeled lag between issuing the present call and beginning to wait on its
// completion fence. Merged validate+present takes a different code path in
// the display engine with a longer setup cost.
pub(crate) const FENCE_WAIT_START_DELAY_VALIDATED: Duration = Duration::from_micros(150);
pub(crate) const FENCE_WAIT_START_DELAY_MERGED: Duration = Duration::from_micros(250);

/// Normalized presentation timeline for one display's frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayTimeline {
    /// Effective start of the present call (the validate start when the two
    /// stages were merged).
    pub present_start_time: TimePoint,
    /// Effective end of the present call.
    pub present_end_time: TimePoint,
    /// Time the present call spent parked waiting for an appropriate vsync.
    pub present_delay: Duration,
    /// When the display engine plausibly began waiting on the present fence.
    pub fence_wait_start_time: TimePoint,
    /// Whether the present call plausibly blocked on the present fence, as
    /// opposed to the fence resolving before or after the call.
    pub probably_waits_for_present_fence: bool,
    /// Work remaining in the present call after the fence resolved.
    pub post_fence_present_duration: Duration,
}

/// Estimated GPU busy interval for one display's frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuTimeline {
    /// When the GPU plausibly began this display's work.
    pub start_time: TimePoint,
    /// Estimated busy duration.
    pub duration: Duration,
}

impl DisplayTimingData {
    /// Reconstructs the presentation timeline for this display's frame.
    ///
    /// `last_present_fence_time` is the signal time of the previous frame's
    /// present fence, which is what the present call would have waited on.
    /// Returns `None` when the stage timestamps required for the effective
    /// window were never recorded.
    pub fn display_timeline(&self, last_present_fence_time: TimePoint) -> Option<DisplayTimeline> {
        // A skipped validate means the validate call was the combined
        // validate+present call, so its window is the effective one.
        let (start, end) = if self.skipped_validate {
            (self.validate_start_time?, self.validate_end_time?)
        } else {
            (self.present_start_time?, self.present_end_time?)
        };

        // The vsync park is detected against the raw present window.
        let present_delay = match (
            self.present_delayed_until,
            self.present_start_time,
            self.present_end_time,
        ) {
            (Some(delayed), Some(raw_start), Some(raw_end))
                if delayed > raw_start && delayed < raw_end =>
            {
                delayed - raw_start
            }
            _ => Duration::ZERO,
        };

        let wait_start_delay = if self.skipped_validate {
            FENCE_WAIT_START_DELAY_MERGED
        } else {
            FENCE_WAIT_START_DELAY_VALIDATED
        };
        let fence_wait_start_time = start + present_delay + wait_start_delay;

        let probably_waits_for_present_fence =
            last_present_fence_time > fence_wait_start_time && last_present_fence_time < end;

        let fence_resolved_at = if probably_waits_for_present_fence {
            last_present_fence_time
        } else {
            fence_wait_start_time
        };
        let post_fence_present_duration = end - fence_resolved_at;

        Some(DisplayTimeline {
            present_start_time: start,
            present_end_time: end,
            present_delay,
            fence_wait_start_time,
            probably_waits_for_present_fence,
            post_fence_present_duration,
        })
    }

    /// Estimates this display's GPU busy interval.
    ///
    /// `previous_end` is the resolved GPU end of the display composited just
    /// before this one; work serializes on a shared GPU queue, so this
    /// display cannot have started earlier. `now` bounds a pending fence
    /// that has already overrun its prediction.
    pub fn gpu_timeline(&self, previous_end: Option<TimePoint>, now: TimePoint) -> Option<GpuTimeline> {
        if !self.requires_gpu_composition {
            return None;
        }
        let last_valid_start = self.last_valid_gpu_start_time?;
        let fence = self.gpu_end_fence.as_ref()?;
        let own_start = self.gpu_start_time?;

        let start_time = previous_end.map_or(own_start, |prev| prev.max(own_start));

        let duration = match fence.signal_time() {
            FenceSignal::SignaledAt(end) => end - start_time,
            signal => {
                // Fall back to the last frame's resolved interval as a
                // prediction for the one still in flight.
                let last_valid_end = self.last_valid_gpu_end_time?;
                let mut predicted = last_valid_end - last_valid_start;
                if signal == FenceSignal::Pending {
                    // A pending fence that already ran past the prediction
                    // is an overrun in progress; don't under-report it.
                    predicted = predicted.max(now - start_time);
                }
                predicted
            }
        };

        Some(GpuTimeline {
            start_time,
            duration,
        })
    }
}
