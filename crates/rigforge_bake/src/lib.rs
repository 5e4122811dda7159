// SPDX-License-Identifier: MIT OR Apache-2.0
//! Batch bake scheduler for `RigForge`.
//!
//! Baking - sampling an animated or constrained value every frame of a range
//! and writing explicit keys - is O(frames x channels) expensive. Components
//! authored independently would otherwise each trigger their own
//! whole-timeline evaluation. The [`BakeQueue`] collapses requests with equal
//! parameter fingerprints into one evaluation over the union of affected
//! objects, and runs everything in three strict phases:
//! pre-process (by priority), bake commands, post-process.
//!
//! Work is explicit buffering, not parallelism: everything executes
//! synchronously inside [`BakeQueue::run_queue`] on the single host thread.

pub mod fingerprint;
pub mod queue;

pub use fingerprint::{fingerprint, ParamBag};
pub use queue::{default_queue, BakeError, BakeQueue, QueueState, RunReport};
