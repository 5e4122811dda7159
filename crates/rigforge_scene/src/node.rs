// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene node handles and constraint kinds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a native scene node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneNodeId(pub Uuid);

impl SceneNodeId {
    /// Create a new random node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the string form produced by [`SceneNodeId::to_string`].
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SceneNodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SceneNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of constraint the host can build between two transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Driven follows driver translation and rotation
    Parent,
    /// Driven follows driver translation only
    Point,
    /// Driven follows driver rotation only
    Orient,
    /// Driven aims at the driver
    Aim,
    /// Driven position constrained between weighted drivers
    PoleVector,
}

impl ConstraintKind {
    /// Suffix the host uses when naming the constraint node.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Parent => "parentConstraint",
            Self::Point => "pointConstraint",
            Self::Orient => "orientConstraint",
            Self::Aim => "aimConstraint",
            Self::PoleVector => "poleVectorConstraint",
        }
    }
}
