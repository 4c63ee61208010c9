// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raw per-frame timing capture.
//!
//! [`TimingStore`] is where the compositor drops raw stage timestamps and
//! fences, one set per display per frame plus a handful of frame-global
//! markers. Setters overwrite the named field and never block or fail;
//! naming a display that has not been seen before creates a default record
//! for it.
//!
//! The only bookkeeping a setter performs is GPU fence resolution: before a
//! display's completion fence is replaced, a signaled fence is archived into
//! the display's last-valid GPU interval, and that interval is corrected for
//! contention against other displays sharing the GPU queue (see
//! [`TimingStore::set_gpu_fence`]).

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::display::DisplayId;
use crate::fence::GpuFence;
use crate::history::History;
use crate::time::{Duration, TimePoint};

/// Frames of frame-global history kept: the current frame plus one full
/// frame of lookback.
pub const FRAME_HISTORY: usize = 2;

/// Raw timing record for one display's current frame.
///
/// Overwritten by the compositor each frame. The `last_valid_gpu_*` pair
/// survives across frames: it is the most recent GPU interval whose fence
/// actually signaled, used as a prediction while the current fence is still
/// pending.
#[derive(Default)]
pub struct DisplayTimingData {
    pub(crate) validate_start_time: Option<TimePoint>,
    pub(crate) validate_end_time: Option<TimePoint>,
    pub(crate) present_start_time: Option<TimePoint>,
    pub(crate) present_end_time: Option<TimePoint>,
    pub(crate) present_delayed_until: Option<TimePoint>,
    pub(crate) skipped_validate: bool,
    pub(crate) requires_gpu_composition: bool,
    pub(crate) gpu_start_time: Option<TimePoint>,
    // At most one pending fence per display. Resolution must migrate a
    // signaled fence into last_valid_gpu_* before this slot is replaced.
    pub(crate) gpu_end_fence: Option<Box<dyn GpuFence + Send>>,
    pub(crate) last_valid_gpu_start_time: Option<TimePoint>,
    pub(crate) last_valid_gpu_end_time: Option<TimePoint>,
}

impl core::fmt::Debug for DisplayTimingData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DisplayTimingData")
            .field("present_start_time", &self.present_start_time)
            .field("present_end_time", &self.present_end_time)
            .field("skipped_validate", &self.skipped_validate)
            .field("requires_gpu_composition", &self.requires_gpu_composition)
            .field("gpu_start_time", &self.gpu_start_time)
            .field("has_gpu_end_fence", &self.gpu_end_fence.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-display and frame-global raw timing for the frame in flight.
///
/// Written by the compositor thread only; derived timelines and estimates
/// are computed from it on the same thread, so no locking is involved.
#[derive(Debug, Default)]
pub struct TimingStore {
    displays: BTreeMap<DisplayId, DisplayTimingData>,
    display_order: Vec<DisplayId>,
    expected_present_times: History<FRAME_HISTORY>,
    commit_start_times: History<FRAME_HISTORY>,
    last_present_fence_time: TimePoint,
    last_compositor_present_end: TimePoint,
    frame_delay: Duration,
    last_postcomp_duration: Duration,
    target_duration: Duration,
    total_frame_target: Option<Duration>,
}

impl TimingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn display_mut(&mut self, id: DisplayId) -> &mut DisplayTimingData {
        self.displays.entry(id).or_default()
    }

    /// Records when GPU work for `id` was submitted this frame.
    ///
    /// Resolves and releases the previous completion fence first, so that a
    /// signaled interval is never lost when new GPU work begins.
    pub fn set_gpu_start_time(&mut self, id: DisplayId, start: TimePoint) {
        self.resolve_pending_fence(id);
        let data = self.display_mut(id);
        data.gpu_end_fence = None;
        data.gpu_start_time = Some(start);
    }

    /// Installs the completion fence for `id`'s GPU work this frame.
    ///
    /// The previously-installed fence is resolved (archived if signaled)
    /// before being replaced.
    pub fn set_gpu_fence(&mut self, id: DisplayId, fence: Box<dyn GpuFence + Send>) {
        self.resolve_pending_fence(id);
        self.display_mut(id).gpu_end_fence = Some(fence);
    }

    /// Records the validate-stage window for `id`.
    pub fn set_validate_timing(&mut self, id: DisplayId, start: TimePoint, end: TimePoint) {
        let data = self.display_mut(id);
        data.validate_start_time = Some(start);
        data.validate_end_time = Some(end);
    }

    /// Records the present-stage window for `id`.
    pub fn set_present_timing(&mut self, id: DisplayId, start: TimePoint, end: TimePoint) {
        let data = self.display_mut(id);
        data.present_start_time = Some(start);
        data.present_end_time = Some(end);
    }

    /// Records whether validate and present were merged into one call.
    pub fn set_skipped_validate(&mut self, id: DisplayId, skipped: bool) {
        self.display_mut(id).skipped_validate = skipped;
    }

    /// Records whether GPU compositing was used for `id` this frame.
    pub fn set_requires_gpu_composition(&mut self, id: DisplayId, requires: bool) {
        self.display_mut(id).requires_gpu_composition = requires;
    }

    /// Records the time the present call was parked waiting for a vsync.
    pub fn set_present_delayed_time(&mut self, id: DisplayId, delayed_until: TimePoint) {
        self.display_mut(id).present_delayed_until = Some(delayed_until);
    }

    /// Records the expected present time for the frame being composed.
    pub fn set_expected_present_time(&mut self, expected: TimePoint) {
        self.expected_present_times.record(expected);
    }

    /// Records when the compositor began committing this frame.
    pub fn set_commit_start(&mut self, commit_start: TimePoint) {
        self.commit_start_times.record(commit_start);
    }

    /// Records the previous frame's present-fence signal time and the
    /// compositor's own present-end time.
    pub fn set_compositor_present_timing(
        &mut self,
        present_fence_time: TimePoint,
        present_end: TimePoint,
    ) {
        self.last_present_fence_time = present_fence_time;
        self.last_compositor_present_end = present_end;
    }

    /// Records how long this frame's start was delayed past its target.
    pub fn set_frame_delay(&mut self, delay: Duration) {
        self.frame_delay = delay;
    }

    /// Records when post-composition work finished, deriving its duration
    /// from the compositor's present-end time.
    pub fn set_composite_end(&mut self, composite_end: TimePoint) {
        self.last_postcomp_duration = composite_end - self.last_compositor_present_end;
    }

    /// Replaces the set of displays participating in the frame, in
    /// presentation order.
    pub fn set_displays(&mut self, ids: Vec<DisplayId>) {
        self.display_order = ids;
    }

    /// Updates the per-frame CPU/GPU work target.
    pub fn set_target_duration(&mut self, target: Duration) {
        self.target_duration = target;
    }

    /// Updates the full frame (vsync) period the total estimate is measured
    /// against.
    pub fn set_total_frame_target_duration(&mut self, target: Duration) {
        self.total_frame_target = Some(target);
    }

    /// Current per-frame work target.
    #[must_use]
    pub fn target_duration(&self) -> Duration {
        self.target_duration
    }

    // Archives a signaled fence into the last-valid GPU interval and
    // compensates for cross-display GPU queue contention: another display
    // whose valid interval straddles this display's GPU start likely delayed
    // it, so the archived start moves up to that display's end.
    fn resolve_pending_fence(&mut self, id: DisplayId) {
        let Some(data) = self.displays.get(&id) else {
            return;
        };
        let Some(fence) = data.gpu_end_fence.as_ref() else {
            return;
        };
        let Some(end) = fence.signal_time().timestamp() else {
            return;
        };
        let Some(start) = data.gpu_start_time else {
            return;
        };

        let mut resolved_start = start;
        for (other_id, other) in &self.displays {
            if *other_id == id {
                continue;
            }
            let (Some(other_start), Some(other_end)) = (
                other.last_valid_gpu_start_time,
                other.last_valid_gpu_end_time,
            ) else {
                continue;
            };
            if other_start < start && other_end > start {
                resolved_start = other_end;
                break;
            }
        }

        if let Some(data) = self.displays.get_mut(&id) {
            data.last_valid_gpu_start_time = Some(resolved_start);
            data.last_valid_gpu_end_time = Some(end);
        }
    }

    /// Read access to the raw timing record for `id`, if one exists.
    #[must_use]
    pub fn display_data(&self, id: DisplayId) -> Option<&DisplayTimingData> {
        self.displays.get(&id)
    }

    pub(crate) fn last_present_fence_time(&self) -> TimePoint {
        self.last_present_fence_time
    }

    pub(crate) fn last_compositor_present_end(&self) -> TimePoint {
        self.last_compositor_present_end
    }

    pub(crate) fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    pub(crate) fn last_postcomp_duration(&self) -> Duration {
        self.last_postcomp_duration
    }

    pub(crate) fn total_frame_target(&self) -> Option<Duration> {
        self.total_frame_target
    }

    pub(crate) fn histories_full(&self) -> bool {
        self.expected_present_times.is_full() && self.commit_start_times.is_full()
    }

    // The measured frame's commit start: the newest history entry. The
    // lookback entry behind it only gates estimation readiness.
    pub(crate) fn current_commit_start(&self) -> Option<TimePoint> {
        self.commit_start_times.latest()
    }

    /// Display IDs that recorded a present start this frame, ordered by that
    /// timestamp rather than by map or insertion order.
    pub(crate) fn ordered_display_ids(&self) -> Vec<DisplayId> {
        let mut ids: Vec<DisplayId> = self
            .display_order
            .iter()
            .copied()
            .filter(|id| {
                self.displays
                    .get(id)
                    .is_some_and(|data| data.present_start_time.is_some())
            })
            .collect();
        ids.sort_by_key(|id| self.displays.get(id).and_then(|data| data.present_start_time));
        ids
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::vec;

    use super::*;
    use crate::fence::SharedFence;

    fn ms(millis: i64) -> TimePoint {
        TimePoint::from_nanos(millis * 1_000_000)
    }

    #[test]
    fn first_touch_creates_default_record() {
        let mut store = TimingStore::new();
        let id = DisplayId(7);
        assert!(store.display_data(id).is_none());
        store.set_skipped_validate(id, true);
        let data = store.display_data(id).expect("record created on first set");
        assert!(data.skipped_validate);
        assert_eq!(data.present_start_time, None);
    }

    #[test]
    fn signaled_fence_archives_into_last_valid_interval() {
        let mut store = TimingStore::new();
        let id = DisplayId(0);
        let fence = SharedFence::new();
        let handle = fence.handle();

        store.set_gpu_start_time(id, ms(1));
        store.set_gpu_fence(id, Box::new(fence));
        handle.signal_at(ms(5));

        // New GPU work resolves the old fence before replacing anything.
        store.set_gpu_start_time(id, ms(20));
        let data = store.display_data(id).expect("record exists");
        assert_eq!(data.last_valid_gpu_start_time, Some(ms(1)));
        assert_eq!(data.last_valid_gpu_end_time, Some(ms(5)));
        assert!(data.gpu_end_fence.is_none(), "old fence released");
        assert_eq!(data.gpu_start_time, Some(ms(20)));
    }

    #[test]
    fn pending_fence_is_not_archived() {
        let mut store = TimingStore::new();
        let id = DisplayId(0);

        store.set_gpu_start_time(id, ms(1));
        store.set_gpu_fence(id, Box::new(SharedFence::new()));
        store.set_gpu_start_time(id, ms(2));

        let data = store.display_data(id).expect("record exists");
        assert_eq!(data.last_valid_gpu_start_time, None);
        assert_eq!(data.last_valid_gpu_end_time, None);
    }

    #[test]
    fn contending_display_corrects_archived_start() {
        let mut store = TimingStore::new();
        let a = DisplayId(0);
        let b = DisplayId(1);

        // Display A finished a valid interval [1ms, 5ms].
        let fence_a = SharedFence::new();
        let handle_a = fence_a.handle();
        store.set_gpu_start_time(a, ms(1));
        store.set_gpu_fence(a, Box::new(fence_a));
        handle_a.signal_at(ms(5));
        store.set_gpu_start_time(a, ms(100));

        // Display B recorded its start at 3ms, inside A's interval, and its
        // fence signals at 9ms.
        let fence_b = SharedFence::new();
        let handle_b = fence_b.handle();
        store.set_gpu_start_time(b, ms(3));
        store.set_gpu_fence(b, Box::new(fence_b));
        handle_b.signal_at(ms(9));
        store.set_gpu_fence(b, Box::new(SharedFence::new()));

        let data = store.display_data(b).expect("record exists");
        let corrected = data
            .last_valid_gpu_start_time
            .expect("interval was archived");
        assert_eq!(corrected, ms(5), "start moves up to A's end");
        assert!(corrected >= ms(3), "corrected start never moves earlier");
        assert_eq!(data.last_valid_gpu_end_time, Some(ms(9)));
    }

    #[test]
    fn non_straddling_interval_leaves_start_alone() {
        let mut store = TimingStore::new();
        let a = DisplayId(0);
        let b = DisplayId(1);

        // A's valid interval [1ms, 2ms] ends before B starts at 3ms.
        let fence_a = SharedFence::new();
        let handle_a = fence_a.handle();
        store.set_gpu_start_time(a, ms(1));
        store.set_gpu_fence(a, Box::new(fence_a));
        handle_a.signal_at(ms(2));
        store.set_gpu_start_time(a, ms(100));

        let fence_b = SharedFence::new();
        let handle_b = fence_b.handle();
        store.set_gpu_start_time(b, ms(3));
        store.set_gpu_fence(b, Box::new(fence_b));
        handle_b.signal_at(ms(9));
        store.set_gpu_start_time(b, ms(200));

        let data = store.display_data(b).expect("record exists");
        assert_eq!(data.last_valid_gpu_start_time, Some(ms(3)));
    }

    #[test]
    fn ordered_ids_sort_by_present_start_not_map_order() {
        let mut store = TimingStore::new();
        let a = DisplayId(1);
        let b = DisplayId(2);
        let c = DisplayId(3);
        store.set_displays(vec![a, b, c]);
        store.set_present_timing(a, ms(10), ms(11));
        store.set_present_timing(b, ms(5), ms(6));
        // c never records a present start and must not participate.
        store.set_skipped_validate(c, false);

        assert_eq!(store.ordered_display_ids(), vec![b, a]);
    }

    #[test]
    fn displays_absent_from_order_list_do_not_participate() {
        let mut store = TimingStore::new();
        let a = DisplayId(1);
        let b = DisplayId(2);
        store.set_displays(vec![a]);
        store.set_present_timing(a, ms(10), ms(11));
        store.set_present_timing(b, ms(5), ms(6));

        assert_eq!(store.ordered_display_ids(), vec![a]);
    }

    #[test]
    fn composite_end_derives_postcomp_duration() {
        let mut store = TimingStore::new();
        store.set_compositor_present_timing(ms(12), ms(14));
        store.set_composite_end(ms(15));
        assert_eq!(store.last_postcomp_duration(), Duration::from_millis(1));
    }

    #[test]
    fn histories_require_one_full_frame_of_lookback() {
        let mut store = TimingStore::new();
        assert!(!store.histories_full());
        store.set_expected_present_time(ms(16));
        store.set_commit_start(ms(0));
        assert!(!store.histories_full());
        store.set_expected_present_time(ms(32));
        store.set_commit_start(ms(16));
        assert!(store.histories_full());
        assert_eq!(store.current_commit_start(), Some(ms(16)));
    }
}
