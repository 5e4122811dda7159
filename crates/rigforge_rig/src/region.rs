// SPDX-License-Identifier: MIT OR Apache-2.0
//! Skeleton regions: the joint chains components build onto.

use rigforge_scene::{HostScene, SceneNodeId};
use serde::{Deserialize, Serialize};

/// Which side of the character a region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left limb chains
    Left,
    /// Right limb chains
    Right,
    /// Spine, neck, and other center chains
    Center,
}

impl Side {
    /// The persisted string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "center" => Some(Self::Center),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named joint chain on one side of the skeleton.
///
/// Joints are strict root-to-leaf; binding and baking both iterate in this
/// order so a joint's parent is always handled before the joint itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonRegion {
    /// Side of the character
    pub side: Side,
    /// Region name, e.g. "arm", "leg", "spine"
    pub name: String,
    /// Joint chain, root to leaf
    pub joints: Vec<SceneNodeId>,
}

impl SkeletonRegion {
    /// Create a region.
    pub fn new(side: Side, name: impl Into<String>, joints: Vec<SceneNodeId>) -> Self {
        Self {
            side,
            name: name.into(),
            joints,
        }
    }

    /// Number of joints in the chain.
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Whether any joint in the chain already carries baked keys.
    pub fn has_baked_animation(&self, scene: &dyn HostScene) -> bool {
        self.joints.iter().any(|j| scene.has_animation(*j))
    }
}
