// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display identification.
//!
//! [`DisplayId`] is a lightweight handle identifying one physical or virtual
//! display. The compositor assigns these; core treats them as opaque keys
//! into per-display timing records.

use core::fmt;

/// Identifies a specific display.
///
/// The compositor assigns display IDs to distinguish concurrently-composited
/// displays. Core code passes them through without interpreting the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DisplayId(pub u64);

impl fmt::Debug for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayId({})", self.0)
    }
}
