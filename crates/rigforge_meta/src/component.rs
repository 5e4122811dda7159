// SPDX-License-Identifier: MIT OR Apache-2.0
//! The component family: one rig region's persisted structure.
//!
//! A `ComponentEntry` owns four sub-networks - skeleton joints, rig joints,
//! controls, attachment references - each behind a hidden group node.
//! Controls and rig joints carry an explicit `ordered_index` attribute
//! because native relationship edges guarantee no ordering after reload.

use crate::entry::{MetaHandle, MetaNode};
use crate::graph::{EdgeKind, MetadataGraph};
use rigforge_scene::{AttrBag, HostScene, SceneNodeId, SceneValue};

/// Public tag of a component entry.
pub const COMPONENT_TAG: &str = "rigforge.component";
/// Hidden tag of a sub-network group node.
pub const GROUP_TAG: &str = "rigforge.group";
/// Hidden tag of an animator control.
pub const CONTROL_TAG: &str = "rigforge.control";
/// Hidden tag of a rig joint mirroring a skeleton joint.
pub const RIG_JOINT_TAG: &str = "rigforge.rig_joint";
/// Attribute persisting stable member order.
pub const ORDERED_INDEX_ATTR: &str = "ordered_index";

const ROLE_ATTR: &str = "role";

/// The four sub-networks a component owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubNetwork {
    /// References to the driven skeleton joints
    SkeletonJoints,
    /// Owned rig joints mirroring the skeleton
    RigJoints,
    /// Owned animator controls
    Controls,
    /// References to externally attached nodes
    Attachments,
}

impl SubNetwork {
    /// Persisted role string of the group node.
    pub fn role(self) -> &'static str {
        match self {
            Self::SkeletonJoints => "skeleton_joints",
            Self::RigJoints => "rig_joints",
            Self::Controls => "controls",
            Self::Attachments => "attachments",
        }
    }

    fn owns_members(self) -> bool {
        matches!(self, Self::RigJoints | Self::Controls)
    }
}

/// Typed wrapper over a component's metadata node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentEntry {
    handle: MetaHandle,
}

impl MetaNode for ComponentEntry {
    fn handle(&self) -> MetaHandle {
        self.handle
    }
    fn type_tag(&self) -> &'static str {
        COMPONENT_TAG
    }
}

impl ComponentEntry {
    /// Create the component node plus its four sub-network groups.
    pub fn create<S: HostScene>(
        graph: &mut MetadataGraph<S>,
        side: &str,
        region: &str,
        component_type: &str,
        module: &str,
    ) -> Self {
        let mut attrs = AttrBag::new();
        attrs.insert("side".into(), side.into());
        attrs.insert("region".into(), region.into());
        attrs.insert("component_type".into(), component_type.into());
        attrs.insert("module".into(), module.into());
        let handle = graph.create_node(COMPONENT_TAG, attrs);

        for network in [
            SubNetwork::SkeletonJoints,
            SubNetwork::RigJoints,
            SubNetwork::Controls,
            SubNetwork::Attachments,
        ] {
            let mut group_attrs = AttrBag::new();
            group_attrs.insert(ROLE_ATTR.into(), network.role().into());
            let group = graph.create_node(GROUP_TAG, group_attrs);
            graph.connect(handle, group.0, EdgeKind::Ownership);
        }
        Self { handle }
    }

    /// Rewrap an existing component node.
    pub fn from_handle(handle: MetaHandle) -> Self {
        Self { handle }
    }

    /// The sub-network group node.
    pub fn group<S: HostScene>(
        &self,
        graph: &MetadataGraph<S>,
        network: SubNetwork,
    ) -> Option<MetaHandle> {
        graph
            .get_downstream(self.handle, GROUP_TAG)
            .into_iter()
            .find(|g| {
                graph.attr(*g, ROLE_ATTR).as_ref().and_then(SceneValue::as_str)
                    == Some(network.role())
            })
    }

    /// Add a member to a sub-network. Owned sub-networks stamp the member
    /// with an `ordered_index`; reference sub-networks link without touching
    /// the member node.
    pub fn add_member<S: HostScene>(
        &self,
        graph: &mut MetadataGraph<S>,
        network: SubNetwork,
        member: SceneNodeId,
        index: usize,
    ) {
        let Some(group) = self.group(graph, network) else {
            return;
        };
        if network.owns_members() {
            graph.set_attr(
                MetaHandle(member),
                ORDERED_INDEX_ATTR,
                SceneValue::Int(index as i64),
            );
            graph.connect(group, member, EdgeKind::Ownership);
        } else {
            graph.connect(group, member, EdgeKind::Reference);
        }
    }

    /// Members of a sub-network. Owned members come back sorted by their
    /// persisted `ordered_index`, reference members in link order.
    pub fn members<S: HostScene>(
        &self,
        graph: &MetadataGraph<S>,
        network: SubNetwork,
    ) -> Vec<SceneNodeId> {
        let Some(group) = self.group(graph, network) else {
            return Vec::new();
        };
        if network.owns_members() {
            let mut members: Vec<SceneNodeId> = graph
                .get_downstream(group, "")
                .into_iter()
                .map(MetaHandle::scene_node)
                .collect();
            members.sort_by_key(|m| {
                graph
                    .scene()
                    .get_attr(*m, ORDERED_INDEX_ATTR)
                    .and_then(|v| v.as_int())
                    .unwrap_or(i64::MAX)
            });
            members
        } else {
            graph.references(group)
        }
    }

    /// The animator controls, in `ordered_index` order.
    pub fn controls<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Vec<SceneNodeId> {
        self.members(graph, SubNetwork::Controls)
    }

    /// The rig joints, in `ordered_index` order.
    pub fn rig_joints<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Vec<SceneNodeId> {
        self.members(graph, SubNetwork::RigJoints)
    }

    /// The referenced skeleton joints, root to leaf.
    pub fn skeleton_joints<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Vec<SceneNodeId> {
        self.members(graph, SubNetwork::SkeletonJoints)
    }

    /// Externally attached nodes.
    pub fn attachments<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Vec<SceneNodeId> {
        self.members(graph, SubNetwork::Attachments)
    }

    fn string_attr<S: HostScene>(&self, graph: &MetadataGraph<S>, key: &str) -> Option<String> {
        graph
            .attr(self.handle, key)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// The component's side.
    pub fn side<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Option<String> {
        self.string_attr(graph, "side")
    }

    /// The component's skeleton region name.
    pub fn region<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Option<String> {
        self.string_attr(graph, "region")
    }

    /// The component kind tag used to build it.
    pub fn component_type<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Option<String> {
        self.string_attr(graph, "component_type")
    }

    /// The module the kind lives in.
    pub fn module<S: HostScene>(&self, graph: &MetadataGraph<S>) -> Option<String> {
        self.string_attr(graph, "module")
    }
}

/// Register the component-family wrappers. The component itself is public;
/// groups, controls, and rig joints are internal plumbing.
pub fn register_base_types(registry: &mut crate::registry::TypeRegistry) {
    registry.add(COMPONENT_TAG, |h| {
        Box::new(ComponentEntry::from_handle(h))
    });
    registry.add_hidden(GROUP_TAG, |h| Box::new(GroupEntry(h)));
    registry.add_hidden(CONTROL_TAG, |h| Box::new(ControlEntry(h)));
    registry.add_hidden(RIG_JOINT_TAG, |h| Box::new(RigJointEntry(h)));
}

/// Wrapper over a sub-network group node.
pub struct GroupEntry(pub MetaHandle);

impl MetaNode for GroupEntry {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        GROUP_TAG
    }
}

/// Wrapper over an animator control node.
pub struct ControlEntry(pub MetaHandle);

impl MetaNode for ControlEntry {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        CONTROL_TAG
    }
}

/// Wrapper over a rig joint node.
pub struct RigJointEntry(pub MetaHandle);

impl MetaNode for RigJointEntry {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        RIG_JOINT_TAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigforge_scene::OfflineScene;

    fn graph() -> MetadataGraph<OfflineScene> {
        let mut g = MetadataGraph::new(OfflineScene::new());
        register_base_types(g.registry_mut());
        g
    }

    #[test]
    fn test_create_builds_four_groups() {
        let mut g = graph();
        let entry = ComponentEntry::create(&mut g, "left", "arm", "rigforge.fk", "rigforge_rig");
        assert_eq!(g.get_downstream(entry.handle(), GROUP_TAG).len(), 4);
        assert_eq!(entry.side(&g).as_deref(), Some("left"));
        assert_eq!(entry.component_type(&g).as_deref(), Some("rigforge.fk"));
    }

    #[test]
    fn test_controls_sort_by_ordered_index_not_link_order() {
        let mut g = graph();
        let entry = ComponentEntry::create(&mut g, "left", "arm", "rigforge.fk", "rigforge_rig");
        let c2 = g.scene_mut().create_node("ctl2");
        let c0 = g.scene_mut().create_node("ctl0");
        let c1 = g.scene_mut().create_node("ctl1");
        // Linked out of order on purpose.
        entry.add_member(&mut g, SubNetwork::Controls, c2, 2);
        entry.add_member(&mut g, SubNetwork::Controls, c0, 0);
        entry.add_member(&mut g, SubNetwork::Controls, c1, 1);
        assert_eq!(entry.controls(&g), vec![c0, c1, c2]);
    }

    #[test]
    fn test_cascade_delete_takes_owned_members_not_skeleton() {
        let mut g = graph();
        let entry = ComponentEntry::create(&mut g, "left", "arm", "rigforge.fk", "rigforge_rig");
        let skel = g.scene_mut().create_node("joint1");
        let ctl = g.scene_mut().create_node("ctl");
        entry.add_member(&mut g, SubNetwork::SkeletonJoints, skel, 0);
        entry.add_member(&mut g, SubNetwork::Controls, ctl, 0);

        // component + 4 groups + control
        assert_eq!(g.delete_chain(entry.handle()), 6);
        assert!(g.scene().node_exists(skel), "skeleton is never owned");
        assert!(!g.scene().node_exists(ctl));
    }
}
