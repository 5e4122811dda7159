// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `HostScene` trait - the black-box primitive surface of the host tool.

use crate::node::{ConstraintKind, SceneNodeId};
use crate::value::{AttrBag, SceneValue};
use serde::{Deserialize, Serialize};

/// A world-space transform, decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3 {
    /// Translation
    pub translate: [f64; 3],
    /// Euler rotation, degrees
    pub rotate: [f64; 3],
    /// Scale
    pub scale: [f64; 3],
}

impl Default for Transform3 {
    fn default() -> Self {
        Self {
            translate: [0.0; 3],
            rotate: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform3 {
    /// A transform at the given translation with identity rotation/scale.
    pub fn at(translate: [f64; 3]) -> Self {
        Self {
            translate,
            ..Self::default()
        }
    }
}

/// Everything the rigging core needs from the host 3D package.
///
/// The trait is object safe: bake commands and property actions receive a
/// `&mut dyn HostScene` so a queue built against one host works against any.
/// All operations are synchronous; the host scene graph is single-threaded.
pub trait HostScene {
    // --- node lifecycle ---

    /// Create a transform node. Never fails; the host allocates a unique name
    /// derived from `name` if it collides.
    fn create_node(&mut self, name: &str) -> SceneNodeId;

    /// Delete nodes in one batch. Unknown ids are skipped.
    fn delete_nodes(&mut self, ids: &[SceneNodeId]);

    /// Whether the node still exists.
    fn node_exists(&self, id: SceneNodeId) -> bool;

    /// The node's name, if it exists.
    fn node_name(&self, id: SceneNodeId) -> Option<String>;

    /// Reparent `child` under `parent`, or to the scene root with `None`.
    fn reparent(&mut self, child: SceneNodeId, parent: Option<SceneNodeId>);

    /// The node's parent, if any.
    fn parent(&self, id: SceneNodeId) -> Option<SceneNodeId>;

    // --- attributes ---

    /// Set (creating if needed) a typed attribute.
    fn set_attr(&mut self, id: SceneNodeId, key: &str, value: SceneValue);

    /// Read an attribute.
    fn get_attr(&self, id: SceneNodeId, key: &str) -> Option<SceneValue>;

    /// The node's full attribute bag.
    fn attrs(&self, id: SceneNodeId) -> Option<AttrBag>;

    /// All nodes carrying an attribute named `key`, in creation order.
    fn nodes_with_attr(&self, key: &str) -> Vec<SceneNodeId>;

    // --- attribute connections (relationship fan-in links) ---

    /// Connect `src.src_key -> dst.dst_key`. Idempotent.
    fn connect_attr(&mut self, src: SceneNodeId, src_key: &str, dst: SceneNodeId, dst_key: &str);

    /// Remove the connection if present. Idempotent.
    fn disconnect_attr(
        &mut self,
        src: SceneNodeId,
        src_key: &str,
        dst: SceneNodeId,
        dst_key: &str,
    );

    /// Source nodes feeding `dst.dst_key`, in connection order.
    fn attr_sources(&self, dst: SceneNodeId, dst_key: &str) -> Vec<SceneNodeId>;

    /// Destination nodes fed by `src.src_key`, in connection order.
    fn attr_destinations(&self, src: SceneNodeId, src_key: &str) -> Vec<SceneNodeId>;

    // --- animation primitives ---

    /// Key a channel at a frame.
    fn set_key(&mut self, id: SceneNodeId, channel: &str, frame: i64, value: f64);

    /// Sample a channel at a frame (keyed curves interpolate, static
    /// attributes pass through).
    fn sample(&self, id: SceneNodeId, channel: &str, frame: i64) -> Option<f64>;

    /// Remove all keys on all channels of the node.
    fn clear_keys(&mut self, id: SceneNodeId);

    /// The sorted union of keyed frames across the node's channels.
    fn keyed_frames(&self, id: SceneNodeId) -> Vec<i64>;

    /// Whether the node carries any keyframes.
    fn has_animation(&self, id: SceneNodeId) -> bool;

    /// Resolved world transform at a frame, honoring live constraints.
    fn world_transform_at(&self, id: SceneNodeId, frame: i64) -> Option<Transform3>;

    /// Resolved world transform at the current frame.
    fn world_transform(&self, id: SceneNodeId) -> Option<Transform3> {
        self.world_transform_at(id, self.current_frame())
    }

    /// Write a world transform as static channel values.
    fn set_world_transform(&mut self, id: SceneNodeId, xf: Transform3);

    // --- constraints ---

    /// Build a constraint; the returned id is the constraint node itself.
    fn constrain(
        &mut self,
        driver: SceneNodeId,
        driven: SceneNodeId,
        kind: ConstraintKind,
    ) -> SceneNodeId;

    /// Constraint nodes currently driving `driven`.
    fn constraints_on(&self, driven: SceneNodeId) -> Vec<SceneNodeId>;

    /// The driver of a constraint node, if `id` is one.
    fn constraint_driver(&self, id: SceneNodeId) -> Option<SceneNodeId>;

    /// Remove one constraint node.
    fn remove_constraint(&mut self, constraint: SceneNodeId);

    // --- session state ---

    /// Whether auto-keyframing is on.
    fn autokey_enabled(&self) -> bool;

    /// Toggle auto-keyframing.
    fn set_autokey(&mut self, enabled: bool);

    /// Playback range (start, end), inclusive.
    fn playback_range(&self) -> (i64, i64);

    /// The current frame.
    fn current_frame(&self) -> i64;

    /// Move the current frame.
    fn set_current_frame(&mut self, frame: i64);
}
