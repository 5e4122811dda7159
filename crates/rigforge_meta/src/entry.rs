// SPDX-License-Identifier: MIT OR Apache-2.0
//! Metadata node handles and the wrapper trait.

use crate::property::PropertyNode;
use rigforge_scene::SceneNodeId;
use serde::{Deserialize, Serialize};

/// Scene attribute carrying a metadata node's type tag.
pub const META_TYPE_ATTR: &str = "meta_type";

/// Handle to a metadata node - a native scene node stamped with
/// [`META_TYPE_ATTR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaHandle(pub SceneNodeId);

impl MetaHandle {
    /// The underlying scene node.
    pub fn scene_node(self) -> SceneNodeId {
        self.0
    }
}

impl std::fmt::Display for MetaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<SceneNodeId> for MetaHandle {
    fn from(id: SceneNodeId) -> Self {
        Self(id)
    }
}

/// A typed wrapper reconstructed from a persisted tag.
///
/// Wrappers are thin: they hold only a handle, all persisted state lives in
/// the scene node's attribute bag. That keeps reconstruction after
/// save/reload trivial.
pub trait MetaNode {
    /// The wrapped node.
    fn handle(&self) -> MetaHandle;

    /// The registry tag this wrapper was resolved from.
    fn type_tag(&self) -> &'static str;

    /// Downcast to the property interface, if this is a property.
    fn as_property(&self) -> Option<&dyn PropertyNode> {
        None
    }
}
