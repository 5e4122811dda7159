// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bake-range policy resolution.

use crate::host::HostScene;
use crate::node::SceneNodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which span of the timeline a bake covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[derive(Default)]
pub enum BakeRange {
    /// The full playback range.
    #[default]
    FullPlayback,
    /// The current frame only.
    CurrentFrame,
    /// An explicit span. Bounds arrive as floats from configuration and must
    /// be whole frames.
    Explicit {
        /// First frame
        start: f64,
        /// Last frame
        end: f64,
    },
    /// The span covered by existing keys on the targets.
    Keyed,
}

/// Range resolution failure. Fails closed: nothing is baked.
#[derive(Debug, Error)]
pub enum RangeError {
    /// An explicit bound is not a whole frame
    #[error("bake range bound {0} is not a whole frame")]
    NonIntegerBound(f64),

    /// An explicit bound is too large to be a frame number
    #[error("bake range bound {0} is outside the representable frame window")]
    OutOfRangeBound(f64),

    /// An explicit range is inverted
    #[error("bake range {start}..{end} is inverted")]
    Inverted {
        /// First frame
        start: i64,
        /// Last frame
        end: i64,
    },
}

impl BakeRange {
    /// Resolve the policy to an inclusive `(start, end)` frame span.
    ///
    /// `Keyed` with no keys on any target falls back to the current frame;
    /// an unkeyed target set is routine during first-time rigging.
    pub fn resolve(
        &self,
        scene: &dyn HostScene,
        targets: &[SceneNodeId],
    ) -> Result<(i64, i64), RangeError> {
        match self {
            Self::FullPlayback => Ok(scene.playback_range()),
            Self::CurrentFrame => {
                let f = scene.current_frame();
                Ok((f, f))
            }
            Self::Explicit { start, end } => {
                let start = whole_frame(*start)?;
                let end = whole_frame(*end)?;
                if start > end {
                    return Err(RangeError::Inverted { start, end });
                }
                Ok((start, end))
            }
            Self::Keyed => {
                let mut frames: Vec<i64> = targets
                    .iter()
                    .flat_map(|t| scene.keyed_frames(*t))
                    .collect();
                frames.sort_unstable();
                match (frames.first(), frames.last()) {
                    (Some(first), Some(last)) => Ok((*first, *last)),
                    _ => {
                        let f = scene.current_frame();
                        Ok((f, f))
                    }
                }
            }
        }
    }
}

fn whole_frame(bound: f64) -> Result<i64, RangeError> {
    if bound.fract() != 0.0 || !bound.is_finite() {
        return Err(RangeError::NonIntegerBound(bound));
    }
    // `as i64` saturates instead of failing, so an absurd whole-valued bound
    // like 1e20 would otherwise resolve to an i64::MAX-frame span.
    if bound.abs() >= i64::MAX as f64 {
        return Err(RangeError::OutOfRangeBound(bound));
    }
    Ok(bound as i64)
}
