// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware completion fences.
//!
//! A fence is an asynchronous handle that resolves to a timestamp once a
//! hardware operation (GPU composition, presentation) finishes. Timing code
//! never blocks on a fence: it polls [`GpuFence::signal_time`] and falls back
//! to prior-frame data while the signal is still [`FenceSignal::Pending`].

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicI64, Ordering};

use crate::time::TimePoint;

/// Result of polling a completion fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FenceSignal {
    /// The fence is broken or was never armed; no timestamp will ever arrive.
    Invalid,
    /// The hardware operation has not finished yet.
    Pending,
    /// The operation finished at the given time.
    SignaledAt(TimePoint),
}

impl FenceSignal {
    /// Returns the completion timestamp, if the fence has signaled.
    #[inline]
    #[must_use]
    pub const fn timestamp(self) -> Option<TimePoint> {
        match self {
            Self::SignaledAt(t) => Some(t),
            Self::Invalid | Self::Pending => None,
        }
    }
}

/// Non-blocking query interface for GPU completion fences.
///
/// Implementations wrap whatever the platform hands back for submitted GPU
/// work. `signal_time` must never block; a still-running operation reports
/// [`FenceSignal::Pending`].
pub trait GpuFence {
    /// Polls the fence for its current state.
    fn signal_time(&self) -> FenceSignal;
}

// Slot encoding shared by SharedFence and its handle. Mirrors the common
// driver convention of overloading the timestamp word.
const SLOT_INVALID: i64 = -1;
const SLOT_PENDING: i64 = i64::MAX;

/// A [`GpuFence`] backed by a shared atomic timestamp slot.
///
/// Useful when completion is observed on another thread (a driver callback,
/// a poll loop): keep a [`SharedFenceHandle`] there and hand the fence itself
/// to the timing store. Starts out pending.
#[derive(Debug)]
pub struct SharedFence {
    slot: Arc<AtomicI64>,
}

impl Default for SharedFence {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedFence {
    /// Creates a new fence in the pending state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(AtomicI64::new(SLOT_PENDING)),
        }
    }

    /// Returns a handle that can resolve this fence from any thread.
    #[must_use]
    pub fn handle(&self) -> SharedFenceHandle {
        SharedFenceHandle {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl GpuFence for SharedFence {
    fn signal_time(&self) -> FenceSignal {
        match self.slot.load(Ordering::Acquire) {
            SLOT_INVALID => FenceSignal::Invalid,
            SLOT_PENDING => FenceSignal::Pending,
            nanos => FenceSignal::SignaledAt(TimePoint::from_nanos(nanos)),
        }
    }
}

/// Resolver side of a [`SharedFence`].
#[derive(Clone)]
pub struct SharedFenceHandle {
    slot: Arc<AtomicI64>,
}

impl SharedFenceHandle {
    /// Marks the fence as signaled at `time`.
    ///
    /// Timestamps that collide with the reserved pending/invalid slot values
    /// are recorded as invalid.
    pub fn signal_at(&self, time: TimePoint) {
        let nanos = time.nanos();
        let value = if nanos == SLOT_PENDING || nanos == SLOT_INVALID {
            SLOT_INVALID
        } else {
            nanos
        };
        self.slot.store(value, Ordering::Release);
    }

    /// Marks the fence as permanently invalid.
    pub fn invalidate(&self) {
        self.slot.store(SLOT_INVALID, Ordering::Release);
    }
}

impl fmt::Debug for SharedFenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFenceHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_fence_is_pending() {
        let fence = SharedFence::new();
        assert_eq!(fence.signal_time(), FenceSignal::Pending);
        assert_eq!(fence.signal_time().timestamp(), None);
    }

    #[test]
    fn handle_resolves_to_timestamp() {
        let fence = SharedFence::new();
        let handle = fence.handle();
        handle.signal_at(TimePoint::from_nanos(12_000_000));
        assert_eq!(
            fence.signal_time(),
            FenceSignal::SignaledAt(TimePoint::from_nanos(12_000_000))
        );
        assert_eq!(
            fence.signal_time().timestamp(),
            Some(TimePoint::from_nanos(12_000_000))
        );
    }

    #[test]
    fn invalidated_fence_stays_invalid() {
        let fence = SharedFence::new();
        fence.handle().invalidate();
        assert_eq!(fence.signal_time(), FenceSignal::Invalid);
    }

    #[test]
    fn reserved_slot_values_degrade_to_invalid() {
        let fence = SharedFence::new();
        fence.handle().signal_at(TimePoint::from_nanos(i64::MAX));
        assert_eq!(
            fence.signal_time(),
            FenceSignal::Invalid,
            "pending sentinel must not masquerade as a timestamp"
        );
    }
}
