// SPDX-License-Identifier: MIT OR Apache-2.0
//! The metadata graph overlaid on the host scene.

use crate::entry::{MetaHandle, MetaNode, META_TYPE_ATTR};
use crate::registry::TypeRegistry;
use rigforge_scene::{AttrBag, HostScene, SceneNodeId, SceneValue};
use serde::{Deserialize, Serialize};

// Attribute keys realizing relationship edges as fan-in links.
const OWN_SRC: &str = "children";
const OWN_DST: &str = "parent";
const REF_SRC: &str = "refs";
const REF_DST: &str = "ref_of";

/// Kind of a directed relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Parent structurally owns the child; cascade delete follows these.
    Ownership,
    /// A non-owning pointer, e.g. a component referencing skeleton joints.
    Reference,
}

impl EdgeKind {
    fn keys(self) -> (&'static str, &'static str) {
        match self {
            Self::Ownership => (OWN_SRC, OWN_DST),
            Self::Reference => (REF_SRC, REF_DST),
        }
    }
}

/// Typed metadata graph over a host scene.
///
/// Owns the scene handle and the [`TypeRegistry`]; all structural mutation of
/// rig metadata goes through here so persistence stays consistent.
pub struct MetadataGraph<S: HostScene> {
    scene: S,
    registry: TypeRegistry,
}

impl<S: HostScene> MetadataGraph<S> {
    /// Wrap a scene with an empty registry.
    pub fn new(scene: S) -> Self {
        Self {
            scene,
            registry: TypeRegistry::new(),
        }
    }

    /// Wrap a scene with a pre-populated registry.
    pub fn with_registry(scene: S, registry: TypeRegistry) -> Self {
        Self { scene, registry }
    }

    /// The underlying scene.
    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// The underlying scene, mutably.
    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    /// The type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The type registry, mutably.
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Allocate a new scene node tagged with `tag` and carrying `attrs`.
    pub fn create_node(&mut self, tag: &str, attrs: AttrBag) -> MetaHandle {
        let id = self.scene.create_node(tag);
        self.stamp(id, tag, attrs)
    }

    /// Stamp an existing scene node as a metadata node. Used when the node
    /// was created by host primitives (controls, rig joints) rather than by
    /// the graph.
    pub fn adopt(&mut self, id: SceneNodeId, tag: &str, attrs: AttrBag) -> MetaHandle {
        self.stamp(id, tag, attrs)
    }

    fn stamp(&mut self, id: SceneNodeId, tag: &str, attrs: AttrBag) -> MetaHandle {
        self.scene
            .set_attr(id, META_TYPE_ATTR, SceneValue::Str(tag.to_string()));
        for (key, value) in attrs {
            self.scene.set_attr(id, &key, value);
        }
        MetaHandle(id)
    }

    /// The persisted type tag, if the node is a metadata node.
    pub fn type_tag_of(&self, id: SceneNodeId) -> Option<String> {
        self.scene
            .get_attr(id, META_TYPE_ATTR)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Reconstruct the typed wrapper for a node.
    ///
    /// Returns `None` - never an error - when the node carries no tag or the
    /// tag fails to resolve. Unresolved tags are logged; schema drift must
    /// not crash scene load.
    pub fn wrap(&self, id: SceneNodeId) -> Option<Box<dyn MetaNode>> {
        let tag = self.type_tag_of(id)?;
        match self.registry.get(&tag, true) {
            Some(factory) => Some(factory(MetaHandle(id))),
            None => {
                tracing::warn!(%tag, node = %id, "unresolved meta type tag, node left inert");
                None
            }
        }
    }

    /// Add a directed edge. Idempotent.
    pub fn connect(&mut self, parent: MetaHandle, child: SceneNodeId, kind: EdgeKind) {
        let (src_key, dst_key) = kind.keys();
        self.scene.connect_attr(parent.0, src_key, child, dst_key);
    }

    /// Remove edges of both kinds between the pair. Idempotent.
    pub fn disconnect(&mut self, parent: MetaHandle, child: SceneNodeId) {
        for kind in [EdgeKind::Ownership, EdgeKind::Reference] {
            let (src_key, dst_key) = kind.keys();
            self.scene.disconnect_attr(parent.0, src_key, child, dst_key);
        }
    }

    /// Owned children whose tag matches `tag` (empty tag matches all).
    pub fn get_downstream(&self, node: MetaHandle, tag: &str) -> Vec<MetaHandle> {
        self.scene
            .attr_destinations(node.0, OWN_SRC)
            .into_iter()
            .filter(|id| self.tag_matches(*id, tag))
            .map(MetaHandle)
            .collect()
    }

    /// First owned child whose tag matches, for single-child queries.
    pub fn get_downstream_first(&self, node: MetaHandle, tag: &str) -> Option<MetaHandle> {
        self.get_downstream(node, tag).into_iter().next()
    }

    /// Owning parents whose tag matches `tag` (empty tag matches all).
    pub fn get_upstream(&self, node: MetaHandle, tag: &str) -> Vec<MetaHandle> {
        self.scene
            .attr_sources(node.0, OWN_DST)
            .into_iter()
            .filter(|id| self.tag_matches(*id, tag))
            .map(MetaHandle)
            .collect()
    }

    /// First owning parent whose tag matches, for single-parent queries.
    pub fn get_upstream_first(&self, node: MetaHandle, tag: &str) -> Option<MetaHandle> {
        self.get_upstream(node, tag).into_iter().next()
    }

    /// Nodes referenced by `node` (non-owning edges).
    pub fn references(&self, node: MetaHandle) -> Vec<SceneNodeId> {
        self.scene.attr_destinations(node.0, REF_SRC)
    }

    /// Metadata nodes holding a reference to `node`.
    pub fn referenced_by(&self, node: SceneNodeId) -> Vec<MetaHandle> {
        self.scene
            .attr_sources(node, REF_DST)
            .into_iter()
            .map(MetaHandle)
            .collect()
    }

    /// Every metadata node of the given tag. Full scan; entity count is
    /// bounded by rig size, not animation length.
    pub fn get_all_of_type(&self, tag: &str) -> Vec<MetaHandle> {
        self.scene
            .nodes_with_attr(META_TYPE_ATTR)
            .into_iter()
            .filter(|id| self.tag_matches(*id, tag))
            .map(MetaHandle)
            .collect()
    }

    /// Delete a node and its downstream ownership subtree in one batch.
    ///
    /// Chains may overlap ones already deleted, so every node is
    /// existence-checked during collection. Returns the number of scene nodes
    /// deleted; a repeated call on the same root is a no-op returning 0.
    pub fn delete_chain(&mut self, node: MetaHandle) -> usize {
        let chain = collect_chain(&self.scene, node.0);
        self.scene.delete_nodes(&chain);
        chain.len()
    }

    /// Convenience attribute read.
    pub fn attr(&self, node: MetaHandle, key: &str) -> Option<SceneValue> {
        self.scene.get_attr(node.0, key)
    }

    /// Convenience attribute write.
    pub fn set_attr(&mut self, node: MetaHandle, key: &str, value: SceneValue) {
        self.scene.set_attr(node.0, key, value);
    }

    fn tag_matches(&self, id: SceneNodeId, tag: &str) -> bool {
        if tag.is_empty() {
            return self.scene.get_attr(id, META_TYPE_ATTR).is_some();
        }
        self.type_tag_of(id).as_deref() == Some(tag)
    }
}

/// Realize an edge directly on a scene, for deferred work that runs outside
/// the graph wrapper (queue callables only see the host scene).
pub fn connect_on_scene<S: HostScene + ?Sized>(
    scene: &mut S,
    parent: SceneNodeId,
    child: SceneNodeId,
    kind: EdgeKind,
) {
    let (src_key, dst_key) = kind.keys();
    scene.connect_attr(parent, src_key, child, dst_key);
}

/// Collect a node plus its downstream ownership subtree, existence-checked
/// per node. Shared with deferred deletions that run outside the graph.
pub fn collect_chain<S: HostScene + ?Sized>(scene: &S, root: SceneNodeId) -> Vec<SceneNodeId> {
    let mut chain = Vec::new();
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        if chain.contains(&id) || !scene.node_exists(id) {
            continue;
        }
        chain.push(id);
        pending.extend(scene.attr_destinations(id, OWN_SRC));
    }
    chain
}
