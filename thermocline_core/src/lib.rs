// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core timing model and per-frame work estimation for adaptive power
//! hinting.
//!
//! `thermocline_core` reconstructs, from raw stage timestamps and hardware
//! completion fences collected across concurrently-composited displays, a
//! single best-effort estimate of how much CPU and GPU work a display
//! pipeline performed for one frame. It is `no_std` compatible (with
//! `alloc`) and fully deterministic: the current time is always an input,
//! never read from a clock.
//!
//! # Architecture
//!
//! Raw data flows bottom-up from compositor setters to one estimate per
//! frame:
//!
//! ```text
//!   Compositor setters
//!       │
//!       ▼
//!   TimingStore (raw timestamps, fences) ──► DisplayTimeline / GpuTimeline
//!                                                │
//!                    ┌───────────────────────────┘
//!                    ▼
//!   TimingStore::estimate_work_duration() ──► WorkDuration
//! ```
//!
//! **[`store`]** — Keyed per-display timing records plus frame-global
//! markers, written once per display per frame. Installs and resolves GPU
//! completion fences, compensating for cross-display GPU queue contention.
//!
//! **[`timeline`]** — Normalizes raw stage timestamps into per-display
//! presentation and GPU timelines, resolving pending/invalid fence states
//! without ever blocking.
//!
//! **[`estimator`]** — Folds the per-display timelines into one combined
//! CPU/GPU [`WorkDuration`](estimator::WorkDuration) per frame, excluding
//! provable idle time and normalizing against the current target period.
//!
//! **[`fence`]** — The non-blocking [`GpuFence`](fence::GpuFence) query
//! contract and a shared-slot implementation.
//!
//! **[`history`]** — Fixed-capacity timestamp lookback.
//!
//! **[`time`]** — Signed nanosecond [`TimePoint`](time::TimePoint) and
//! [`Duration`](time::Duration).
//!
//! **[`display`]** — Opaque display identification.

#![no_std]

extern crate alloc;

pub mod display;
pub mod estimator;
pub mod fence;
pub mod history;
pub mod store;
pub mod time;
pub mod timeline;
