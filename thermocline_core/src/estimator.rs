// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Combined per-frame work estimation.
//!
//! [`TimingStore::estimate_work_duration`] folds every display's derived
//! timelines plus the frame-global markers into one [`WorkDuration`]: how
//! long the frame took end to end, split into CPU and GPU shares. Displays
//! are walked in presentation order; time provably spent idle (parked for a
//! vsync, blocked on the present fence) is excluded, because the pipeline
//! could have done other work then.
//!
//! Two clocks measure the frame: the full pipeline total runs against the
//! whole frame period, while the compositor's own duration runs against the
//! per-frame work target. The total is rescaled onto the target unit before
//! the two are combined, so a hint consumer sees a single consistent
//! magnitude.

use crate::time::{Duration, TimePoint};
use crate::timeline::GpuTimeline;
use crate::store::TimingStore;

/// One frame's measured work, as reported to a power service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkDuration {
    /// When the estimate was produced.
    pub timestamp: TimePoint,
    /// Combined CPU+GPU estimate for the frame.
    pub total: Duration,
    /// CPU-only share of the estimate.
    pub cpu: Duration,
    /// GPU-only share of the estimate.
    pub gpu: Duration,
    /// When the measured work period began (the frame's commit start).
    pub work_period_start: TimePoint,
}

impl TimingStore {
    /// Estimates the work performed for the frame in flight.
    ///
    /// Returns `None` until a full frame of history has been recorded. The
    /// result may be negative when the underlying signals were inconsistent;
    /// callers are expected to discard such estimates. When `gpu_aware` is
    /// false the CPU/GPU split is suppressed and only the combined total is
    /// populated.
    #[must_use]
    pub fn estimate_work_duration(&self, now: TimePoint, gpu_aware: bool) -> Option<WorkDuration> {
        if !self.histories_full() {
            return None;
        }
        let commit_start = self.current_commit_start()?;
        let last_present_fence_time = self.last_present_fence_time();

        // Where presenting to the display engine is predicted to finish.
        let mut estimated_present_end = commit_start;

        // Time this frame spent doing nothing, waiting on fences or vsync.
        let mut idle_duration = Duration::ZERO;

        // Reference chain: the most recent resolved GPU end among earlier
        // displays, which a later display's work would have queued behind.
        let mut previous_valid_gpu_end: Option<TimePoint> = None;

        // Prediction chain: the accumulated GPU end estimate for this frame.
        let mut estimated_gpu_end: Option<TimePoint> = None;

        let mut first_gpu_timeline: Option<GpuTimeline> = None;

        for id in self.ordered_display_ids() {
            let Some(data) = self.display_data(id) else {
                continue;
            };
            let Some(timeline) = data.display_timeline(last_present_fence_time) else {
                continue;
            };

            estimated_present_end = timeline.present_end_time;

            if timeline.probably_waits_for_present_fence {
                idle_duration += last_present_fence_time - timeline.fence_wait_start_time;
            }
            idle_duration += timeline.present_delay;

            if let Some(gpu) = data.gpu_timeline(previous_valid_gpu_end, now) {
                if first_gpu_timeline.is_none() {
                    first_gpu_timeline = Some(gpu);
                }
                previous_valid_gpu_end = Some(gpu.start_time + gpu.duration);

                // This display's GPU work starts no earlier than its present
                // call, and no earlier than the GPU work queued before it.
                let anchor = estimated_gpu_end
                    .map_or(timeline.present_start_time, |end| {
                        end.max(timeline.present_start_time)
                    });
                estimated_gpu_end = Some(anchor + gpu.duration);
            }
        }

        // Idle time is excluded from both estimates; the pipeline could have
        // done more work in it.
        let estimated_present_end = estimated_present_end - idle_duration;
        let estimated_compositor_end = self.last_compositor_present_end() - idle_duration;

        // The frame is done when both the display engine and the GPU are,
        // and the frame delay still counts against the unmoved target.
        let frame_end = match estimated_gpu_end {
            Some(gpu_end) => gpu_end.max(estimated_present_end),
            None => estimated_present_end,
        };
        let total_duration = self.frame_delay() + (frame_end - commit_start);
        let total_duration_without_gpu =
            self.frame_delay() + (estimated_present_end - commit_start);

        // The compositor itself is done when post-composition finishes.
        let compositor_duration =
            (estimated_compositor_end - commit_start) + self.last_postcomp_duration();

        let gpu_duration = match (first_gpu_timeline, estimated_gpu_end) {
            (Some(first), Some(end)) => end - first.start_time,
            _ => Duration::ZERO,
        };

        let combined = self.combine_timing_estimates(total_duration, compositor_duration);
        let cpu = self.combine_timing_estimates(total_duration_without_gpu, compositor_duration);

        Some(WorkDuration {
            timestamp: now,
            total: combined,
            cpu: if gpu_aware { cpu } else { Duration::ZERO },
            gpu: if gpu_aware { gpu_duration } else { Duration::ZERO },
            work_period_start: commit_start,
        })
    }

    // Maps the whole-frame total onto the per-frame target unit before
    // combining it with the compositor's own duration. Without a configured
    // frame period the compositor duration stands alone.
    fn combine_timing_estimates(&self, total: Duration, compositor: Duration) -> Duration {
        let Some(frame_target) = self.total_frame_target() else {
            return compositor;
        };
        if frame_target.nanos() == 0 {
            return compositor;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "i128 intermediate avoids overflow; the quotient is back in range"
        )]
        let normalized = Duration::from_nanos(
            (i128::from(self.target_duration().nanos()) * i128::from(total.nanos())
                / i128::from(frame_target.nanos())) as i64,
        );
        compositor.max(normalized)
    }
}
