// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-scene primitive surface for `RigForge`.
//!
//! The rigging core never talks to a host 3D package directly. Everything it
//! needs from the host - node lifecycle, typed attributes, attribute
//! fan-in connections, keyframe curves, constraints, and session state - is
//! expressed through the [`HostScene`] trait. A real integration implements
//! the trait over the host's API; [`OfflineScene`] is the in-memory
//! implementation used for headless batch processing and tests.

pub mod host;
pub mod node;
pub mod offline;
pub mod range;
pub mod value;

pub use host::{HostScene, Transform3};
pub use node::{ConstraintKind, SceneNodeId};
pub use offline::OfflineScene;
pub use range::{BakeRange, RangeError};
pub use value::{AttrBag, SceneValue};
