// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host monotonic clock reads.

use rustix::time::{ClockId, Timespec, clock_gettime};
use thermocline_core::time::TimePoint;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Returns the current monotonic host time in nanoseconds.
#[must_use]
pub fn now() -> TimePoint {
    timespec_to_time_point(clock_gettime(ClockId::Monotonic))
}

fn timespec_to_time_point(timespec: Timespec) -> TimePoint {
    let nanos = timespec
        .tv_sec
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(timespec.tv_nsec.clamp(0, NANOS_PER_SECOND - 1));
    TimePoint::from_nanos(nanos)
}
