// SPDX-License-Identifier: MIT OR Apache-2.0
//! The rig-component lifecycle: build, attach, bake-and-remove, switch.
//!
//! One [`RigComponent`] orchestrates one rig region as a state machine:
//! `Unbuilt -> Built -> Attached -> (Removed | Switched)`. Validation happens
//! before any scene mutation; execution-phase failures inside a batch are
//! absorbed at the [`BakeQueue`] boundary so one failing component cannot
//! corrupt the rest of a file load.

use crate::baking::{bake_params, bake_transforms, BAKE_KIND};
use crate::kinds::{kind_by_tag, pole_vector_position, RigComponentKind};
use crate::region::SkeletonRegion;
use rigforge_bake::{BakeError, BakeQueue, ParamBag};
use rigforge_meta::{
    collect_chain, connect_on_scene, ComponentEntry, EdgeKind, MetadataGraph, MetaNode,
    SubNetwork, CONTROL_TAG, RIG_JOINT_TAG,
};
use rigforge_scene::{
    AttrBag, BakeRange, ConstraintKind, HostScene, RangeError, SceneNodeId, SceneValue,
    Transform3,
};
use thiserror::Error;

/// Attribute on the component entry declaring a pending rig switch.
pub const SWITCH_TO_ATTR: &str = "switch_to_type";
/// Attribute on a control naming its current space driver.
pub const SPACE_DRIVER_ATTR: &str = "space_driver";

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Default)]
pub enum RigState {
    /// No scene structure exists yet
    #[default]
    Unbuilt,
    /// Controls and metadata built, driving the original region
    Built,
    /// Constrained onto a (possibly different) skeleton region
    Attached,
    /// Baked down and deleted
    Removed,
    /// Torn down pending a rebuild as another kind
    Switched,
}

/// Options for a `rig()` call.
#[derive(Debug, Clone)]
pub struct RigOptions {
    /// Route attach-and-bake through the queue instead of running inline.
    pub use_queue: bool,
    /// Frame span policy for any baking the build triggers.
    pub bake_range: BakeRange,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            use_queue: false,
            bake_range: BakeRange::FullPlayback,
        }
    }
}

/// What feeds a control's space after a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceDriver {
    /// Free in world space
    World,
    /// Aimed at a target node
    Aim,
    /// Driven by a dynamic simulation node
    Dynamic,
}

impl SpaceDriver {
    /// The persisted string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::World => "world",
            Self::Aim => "aim",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Lifecycle failure.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The region is too short for the component kind. Raised before any
    /// scene mutation.
    #[error("{component} needs at least {needed} joints, region has {got}")]
    Validation {
        /// Component kind tag
        component: String,
        /// Minimum joint count
        needed: usize,
        /// Joints provided
        got: usize,
    },

    /// The operation is not legal in the current state
    #[error("operation `{operation}` invalid in state {state:?}")]
    InvalidState {
        /// The refused operation
        operation: &'static str,
        /// State at the time of the call
        state: RigState,
    },

    /// No kind is registered under the tag
    #[error("unknown component kind: {0}")]
    UnknownKind(String),

    /// The component has no entry; `rig()` has not run
    #[error("component has no entry; rig() has not run")]
    NotBuilt,

    /// A space switch needs a driver target it was not given
    #[error("space switch requires a driver target")]
    MissingDriverTarget,

    /// `switch_rigging` found no declared target
    #[error("component declares no switch target")]
    MissingSwitchTarget,

    /// Bake-range policy rejected the span
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Inline bake execution failed
    #[error(transparent)]
    Bake(#[from] BakeError),
}

/// State machine orchestrating one rig region.
pub struct RigComponent {
    kind: Box<dyn RigComponentKind>,
    state: RigState,
    entry: Option<ComponentEntry>,
    region: Option<SkeletonRegion>,
}

impl RigComponent {
    /// Create an unbuilt component of the given kind.
    pub fn new(kind: Box<dyn RigComponentKind>) -> Self {
        Self {
            kind,
            state: RigState::Unbuilt,
            entry: None,
            region: None,
        }
    }

    /// Create from a kind tag.
    pub fn from_tag(tag: &str) -> Result<Self, LifecycleError> {
        kind_by_tag(tag)
            .map(Self::new)
            .ok_or_else(|| LifecycleError::UnknownKind(tag.to_string()))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RigState {
        self.state
    }

    /// The component's metadata entry, once built.
    pub fn entry(&self) -> Option<&ComponentEntry> {
        self.entry.as_ref()
    }

    /// The kind tag.
    pub fn kind_tag(&self) -> &'static str {
        self.kind.type_tag()
    }

    /// Build the component onto a skeleton region: `Unbuilt -> Built`.
    ///
    /// Validates the joint count (and, for an animated region, the bake
    /// span) before any scene mutation. Creates the component entry with its
    /// control/rig-joint/attachment metadata and binds skeleton and rig
    /// joints in strict root-to-leaf order. A region that already carries
    /// baked animation gets an attach-and-bake pass, inline or via the queue
    /// per [`RigOptions::use_queue`].
    pub fn rig<S: HostScene>(
        &mut self,
        graph: &mut MetadataGraph<S>,
        queue: &mut BakeQueue,
        region: SkeletonRegion,
        options: &RigOptions,
    ) -> Result<(), LifecycleError> {
        if !matches!(self.state, RigState::Unbuilt | RigState::Switched) {
            return Err(LifecycleError::InvalidState {
                operation: "rig",
                state: self.state,
            });
        }
        let needed = self.kind.min_joints();
        if region.joint_count() < needed {
            return Err(LifecycleError::Validation {
                component: self.kind.type_tag().to_string(),
                needed,
                got: region.joint_count(),
            });
        }
        // Validation of the bake span also happens while the scene is still
        // untouched.
        let span = if region.has_baked_animation(graph.scene()) {
            Some(options.bake_range.resolve(graph.scene(), &region.joints)?)
        } else {
            None
        };

        let entry = ComponentEntry::create(
            graph,
            region.side.as_str(),
            &region.name,
            self.kind.type_tag(),
            self.kind.module(),
        );
        for (i, joint) in region.joints.iter().enumerate() {
            entry.add_member(graph, SubNetwork::SkeletonJoints, *joint, i);
        }
        // Edge enumeration order is not stable across reload, so the joint
        // order is persisted explicitly on the entry.
        let order = region
            .joints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        graph.set_attr(entry.handle(), "skeleton_order", SceneValue::Str(order));

        let mut rig_joints = Vec::with_capacity(region.joint_count());
        for (i, joint) in region.joints.iter().enumerate() {
            let xf = graph.scene().world_transform(*joint);
            let name = format!("{}_{}_rig{}_jnt", region.side, region.name, i);
            let rj = graph.scene_mut().create_node(&name);
            if let Some(xf) = xf {
                graph.scene_mut().set_world_transform(rj, xf);
            }
            graph.adopt(rj, RIG_JOINT_TAG, AttrBag::new());
            entry.add_member(graph, SubNetwork::RigJoints, rj, i);
            rig_joints.push(rj);
        }

        let controls = self.kind.build_controls(graph.scene_mut(), &region);
        for (i, control) in controls.iter().enumerate() {
            graph.adopt(*control, CONTROL_TAG, AttrBag::new());
            entry.add_member(graph, SubNetwork::Controls, *control, i);
        }

        // Existing skeleton motion has to be lifted onto the controls before
        // the rig joints start driving the skeleton, so the attach-and-bake
        // runs (or is queued ahead of) the bind constraints.
        if let Some((start, end)) = span {
            self.schedule_attach_bake(graph, queue, &region, &controls, start, end, options)?;
        }
        let bind_pairs: Vec<(SceneNodeId, SceneNodeId)> = rig_joints
            .iter()
            .copied()
            .zip(region.joints.iter().copied())
            .collect();
        if span.is_some() && options.use_queue {
            // Binds wait until after the queued bake has read the skeleton.
            let attach_group = entry
                .group(graph, SubNetwork::Attachments)
                .map(|g| g.scene_node());
            queue.add_post_process(
                Box::new(move |scene, _| {
                    for (rj, sj) in &bind_pairs {
                        let constraint = scene.constrain(*rj, *sj, ConstraintKind::Parent);
                        if let Some(group) = attach_group {
                            connect_on_scene(scene, group, constraint, EdgeKind::Reference);
                        }
                    }
                    Ok(())
                }),
                ParamBag::new(),
            );
        } else {
            // Bind root to leaf: a joint's parent is constrained before the
            // joint itself.
            for (rj, sj) in &bind_pairs {
                let constraint = graph.scene_mut().constrain(*rj, *sj, ConstraintKind::Parent);
                entry.add_member(graph, SubNetwork::Attachments, constraint, 0);
            }
        }

        self.entry = Some(entry);
        self.region = Some(region);
        self.state = RigState::Built;
        Ok(())
    }

    /// Which skeleton joint each control takes its motion from during an
    /// attach-and-bake, honoring the kind's control layout.
    fn motion_sources(&self, controls: &[SceneNodeId], region: &SkeletonRegion) -> Vec<(SceneNodeId, SceneNodeId)> {
        let indices = self.kind_source_indices(controls.len(), region.joint_count());
        controls
            .iter()
            .zip(indices)
            .filter_map(|(c, j)| region.joints.get(j).map(|joint| (*c, *joint)))
            .collect()
    }

    fn kind_source_indices(&self, control_count: usize, joint_count: usize) -> Vec<usize> {
        match self.kind.type_tag() {
            crate::kinds::IK_TAG => {
                // root, goal, pole (pole tracks the mid joint)
                let mut v = vec![0, joint_count - 1];
                if control_count >= 3 {
                    v.push(joint_count / 2);
                }
                v
            }
            crate::kinds::REVERSE_FOOT_TAG => {
                // heel..ankle map onto the last four joints, leaf first
                (0..4).map(|i| joint_count - 1 - i).collect()
            }
            crate::kinds::RIBBON_TAG => {
                // primary controls interleaved with mids; each mid follows
                // the joint before it
                let mut v = Vec::with_capacity(control_count);
                for i in 0..joint_count {
                    v.push(i);
                    if i + 1 < joint_count {
                        v.push(i);
                    }
                }
                v
            }
            _ => (0..joint_count).collect(),
        }
    }

    fn schedule_attach_bake<S: HostScene>(
        &self,
        graph: &mut MetadataGraph<S>,
        queue: &mut BakeQueue,
        region: &SkeletonRegion,
        controls: &[SceneNodeId],
        start: i64,
        end: i64,
        options: &RigOptions,
    ) -> Result<(), LifecycleError> {
        let pairs = self.motion_sources(controls, region);
        if options.use_queue {
            queue.add_pre_process(
                Box::new(move |scene, _| {
                    Ok(pairs
                        .iter()
                        .map(|(control, joint)| {
                            scene.constrain(*joint, *control, ConstraintKind::Parent)
                        })
                        .collect())
                }),
                ParamBag::new(),
                0,
            );
            queue.add_command(
                BAKE_KIND,
                Box::new(bake_transforms),
                controls.to_vec(),
                bake_params(start, end),
            );
        } else {
            let scene = graph.scene_mut();
            let temps: Vec<SceneNodeId> = pairs
                .iter()
                .map(|(control, joint)| scene.constrain(*joint, *control, ConstraintKind::Parent))
                .collect();
            let result = bake_transforms(scene, controls, &bake_params(start, end));
            scene.delete_nodes(&temps);
            result?;
        }
        Ok(())
    }

    /// Constrain the rig's controls onto a possibly different compatible
    /// skeleton region: `Built -> Attached`. Re-attaching an already
    /// attached component retargets it.
    ///
    /// Chains of three or more joints also get a pole-vector position
    /// computed from the target chain and keyed onto the pole control.
    pub fn attach_to_skeleton<S: HostScene>(
        &mut self,
        graph: &mut MetadataGraph<S>,
        target_region: &SkeletonRegion,
    ) -> Result<(), LifecycleError> {
        if !matches!(self.state, RigState::Built | RigState::Attached) {
            return Err(LifecycleError::InvalidState {
                operation: "attach_to_skeleton",
                state: self.state,
            });
        }
        let needed = self.kind.min_joints();
        if target_region.joint_count() < needed {
            return Err(LifecycleError::Validation {
                component: self.kind.type_tag().to_string(),
                needed,
                got: target_region.joint_count(),
            });
        }
        let entry = self.entry.ok_or(LifecycleError::NotBuilt)?;

        let controls = entry.controls(graph);
        let pairs = self.motion_sources(&controls, target_region);
        for (control, joint) in &pairs {
            let constraint = graph
                .scene_mut()
                .constrain(*control, *joint, ConstraintKind::Parent);
            entry.add_member(graph, SubNetwork::Attachments, constraint, 0);
        }
        for joint in &target_region.joints {
            entry.add_member(graph, SubNetwork::Attachments, *joint, 0);
        }

        if target_region.joint_count() >= 3 {
            self.bake_pole_vector(graph, &controls, target_region);
        }

        self.state = RigState::Attached;
        Ok(())
    }

    fn bake_pole_vector<S: HostScene>(
        &self,
        graph: &mut MetadataGraph<S>,
        controls: &[SceneNodeId],
        region: &SkeletonRegion,
    ) {
        let pole = controls.iter().find(|c| {
            graph
                .scene()
                .node_name(**c)
                .is_some_and(|n| n.contains("_pole_"))
        });
        let Some(pole) = pole.copied() else {
            return;
        };
        let translate = |j: SceneNodeId| {
            graph
                .scene()
                .world_transform(j)
                .map(|x| x.translate)
                .unwrap_or_default()
        };
        let count = region.joint_count();
        let position = pole_vector_position(
            translate(region.joints[0]),
            translate(region.joints[count / 2]),
            translate(region.joints[count - 1]),
        );
        let scene = graph.scene_mut();
        scene.set_world_transform(pole, Transform3::at(position));
        let frame = scene.current_frame();
        for (channel, value) in ["tx", "ty", "tz"].iter().zip(position) {
            scene.set_key(pole, channel, frame, value);
        }
    }

    /// Bake the driven joints down to plain keys and delete the component's
    /// subtree: `-> Removed`.
    ///
    /// Joints still externally attached (a constraint not owned by this
    /// component) keep their live drivers and are excluded from the bake;
    /// everything else bakes over `range`. With `immediate` false the whole
    /// operation is enqueued as a queue post-process, so many components can
    /// bake-and-remove in one batched pass during file load.
    pub fn bake_and_remove<S: HostScene>(
        &mut self,
        graph: &mut MetadataGraph<S>,
        queue: &mut BakeQueue,
        range: BakeRange,
        immediate: bool,
    ) -> Result<(), LifecycleError> {
        if !matches!(self.state, RigState::Built | RigState::Attached) {
            return Err(LifecycleError::InvalidState {
                operation: "bake_and_remove",
                state: self.state,
            });
        }
        let entry = self.entry.ok_or(LifecycleError::NotBuilt)?;

        // The attachments group mixes constraint nodes (ours, used for the
        // external-attachment check) with the joints a retarget currently
        // drives; the latter must bake too or their pose dies with the rig.
        let (own, attached): (Vec<SceneNodeId>, Vec<SceneNodeId>) = entry
            .attachments(graph)
            .into_iter()
            .partition(|m| graph.scene().constraint_driver(*m).is_some());
        let mut joints = entry.skeleton_joints(graph);
        for joint in attached {
            if !joints.contains(&joint) {
                joints.push(joint);
            }
        }
        let targets: Vec<SceneNodeId> = joints
            .into_iter()
            .filter(|j| {
                graph
                    .scene()
                    .constraints_on(*j)
                    .iter()
                    .all(|c| own.contains(c))
            })
            .collect();

        let (start, end) = range.resolve(graph.scene(), &targets)?;
        let root = entry.handle().scene_node();

        if immediate {
            bake_transforms(graph.scene_mut(), &targets, &bake_params(start, end))?;
            graph.delete_chain(entry.handle());
        } else {
            queue.add_post_process(
                Box::new(move |scene, params| {
                    bake_transforms(scene, &targets, params)?;
                    let chain = collect_chain(scene, root);
                    scene.delete_nodes(&chain);
                    Ok(())
                }),
                bake_params(start, end),
            );
        }

        self.entry = None;
        self.region = None;
        self.state = RigState::Removed;
        Ok(())
    }

    /// Replace the constraint graph feeding one control while preserving its
    /// world pose, so the visual result is continuous across the switch.
    pub fn switch_space<S: HostScene>(
        &mut self,
        graph: &mut MetadataGraph<S>,
        control: SceneNodeId,
        driver: SpaceDriver,
        targets: &[SceneNodeId],
    ) -> Result<(), LifecycleError> {
        if !matches!(self.state, RigState::Built | RigState::Attached) {
            return Err(LifecycleError::InvalidState {
                operation: "switch_space",
                state: self.state,
            });
        }
        let entry = self.entry.ok_or(LifecycleError::NotBuilt)?;
        if driver == SpaceDriver::Aim && targets.is_empty() {
            return Err(LifecycleError::MissingDriverTarget);
        }

        // Sample before touching anything, restore after: the pose must not
        // jump when the driver changes.
        let pose = graph.scene().world_transform(control);

        for constraint in graph.scene().constraints_on(control) {
            graph.scene_mut().remove_constraint(constraint);
        }

        match driver {
            SpaceDriver::World => {}
            SpaceDriver::Aim => {
                let target = targets[0];
                graph
                    .scene_mut()
                    .constrain(target, control, ConstraintKind::Aim);
            }
            SpaceDriver::Dynamic => {
                let name = graph
                    .scene()
                    .node_name(control)
                    .unwrap_or_else(|| "control".to_string());
                let sim = graph.scene_mut().create_node(&format!("{name}_dynamics"));
                if let Some(pose) = pose {
                    graph.scene_mut().set_world_transform(sim, pose);
                }
                graph.scene_mut().constrain(sim, control, ConstraintKind::Parent);
                // Owned by the component so cascade delete takes it along.
                graph.connect(entry.handle(), sim, EdgeKind::Ownership);
            }
        }

        graph.scene_mut().set_attr(
            control,
            SPACE_DRIVER_ATTR,
            SceneValue::Str(driver.as_str().to_string()),
        );
        if let Some(pose) = pose {
            graph.scene_mut().set_world_transform(control, pose);
        }
        Ok(())
    }

    /// Declare the kind this component should switch to on the next
    /// [`RigComponent::switch_rigging`] call.
    pub fn declare_switch_target<S: HostScene>(
        &self,
        graph: &mut MetadataGraph<S>,
        tag: &str,
    ) -> Result<(), LifecycleError> {
        let entry = self.entry.ok_or(LifecycleError::NotBuilt)?;
        graph.set_attr(entry.handle(), SWITCH_TO_ATTR, SceneValue::Str(tag.to_string()));
        Ok(())
    }

    /// Destroy the current subtree and rebuild as the declared target kind:
    /// `-> Switched -> Built`.
    pub fn switch_rigging<S: HostScene>(
        &mut self,
        graph: &mut MetadataGraph<S>,
        queue: &mut BakeQueue,
        options: &RigOptions,
    ) -> Result<(), LifecycleError> {
        if !matches!(self.state, RigState::Built | RigState::Attached) {
            return Err(LifecycleError::InvalidState {
                operation: "switch_rigging",
                state: self.state,
            });
        }
        let entry = self.entry.ok_or(LifecycleError::NotBuilt)?;

        let tag = graph
            .attr(entry.handle(), SWITCH_TO_ATTR)
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or(LifecycleError::MissingSwitchTarget)?;
        let kind = kind_by_tag(&tag).ok_or_else(|| LifecycleError::UnknownKind(tag.clone()))?;

        let region = match self.region.clone() {
            Some(region) => region,
            None => self.region_from_entry(graph, entry)?,
        };

        graph.delete_chain(entry.handle());
        self.entry = None;
        self.kind = kind;
        self.state = RigState::Switched;
        self.rig(graph, queue, region, options)
    }

    fn region_from_entry<S: HostScene>(
        &self,
        graph: &MetadataGraph<S>,
        entry: ComponentEntry,
    ) -> Result<SkeletonRegion, LifecycleError> {
        let side = entry
            .side(graph)
            .and_then(|s| crate::region::Side::parse(&s))
            .ok_or(LifecycleError::NotBuilt)?;
        let name = entry.region(graph).ok_or(LifecycleError::NotBuilt)?;
        Ok(SkeletonRegion::new(side, name, entry.skeleton_joints(graph)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Fk, Ik, FK_TAG, IK_TAG};
    use crate::region::Side;
    use rigforge_meta::register_base_types;
    use rigforge_scene::OfflineScene;

    fn graph() -> MetadataGraph<OfflineScene> {
        let mut g = MetadataGraph::new(OfflineScene::new());
        register_base_types(g.registry_mut());
        g
    }

    fn chain(g: &mut MetadataGraph<OfflineScene>, count: usize) -> Vec<SceneNodeId> {
        (0..count)
            .map(|i| {
                let j = g.scene_mut().create_node(&format!("joint{i}"));
                g.scene_mut()
                    .set_world_transform(j, Transform3::at([i as f64 * 2.0, 0.5, 0.0]));
                j
            })
            .collect()
    }

    #[test]
    fn test_ik_on_one_joint_fails_closed() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 1);
        let before = g.scene().node_count();

        let mut comp = RigComponent::new(Box::new(Ik));
        let err = comp
            .rig(
                &mut g,
                &mut queue,
                SkeletonRegion::new(Side::Left, "arm", joints),
                &RigOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Validation { needed: 2, got: 1, .. }
        ));
        assert_eq!(g.scene().node_count(), before, "zero scene mutation");
        assert_eq!(comp.state(), RigState::Unbuilt);
    }

    #[test]
    fn test_fk_end_to_end_unanimated() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 3);
        let region = SkeletonRegion::new(Side::Left, "arm", joints.clone());

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region, &RigOptions::default())
            .unwrap();

        assert_eq!(comp.state(), RigState::Built);
        assert_eq!(g.get_all_of_type(rigforge_meta::COMPONENT_TAG).len(), 1);

        let entry = comp.entry().unwrap();
        let controls = entry.controls(&g);
        assert_eq!(controls.len(), 3);
        for (i, control) in controls.iter().enumerate() {
            let name = g.scene().node_name(*control).unwrap();
            assert!(name.contains(&format!("fk{i}")), "controls in joint order");
        }
        assert!(queue.is_empty(), "no queued work for an unanimated region");

        // Skeleton joints end up driven by the rig joints.
        for joint in &joints {
            assert_eq!(g.scene().constraints_on(*joint).len(), 1);
        }
    }

    #[test]
    fn test_animated_region_bakes_controls_inline() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 2);
        g.scene_mut().set_key(joints[0], "tx", 1, 0.0);
        g.scene_mut().set_key(joints[0], "tx", 10, 9.0);
        let region = SkeletonRegion::new(Side::Left, "arm", joints);

        let before = g.scene().node_count();
        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(
            &mut g,
            &mut queue,
            region,
            &RigOptions {
                use_queue: false,
                bake_range: BakeRange::Keyed,
            },
        )
        .unwrap();

        let controls = comp.entry().unwrap().controls(&g);
        assert!(g.scene().has_animation(controls[0]), "motion transferred");
        assert_eq!(g.scene().sample(controls[0], "tx", 10), Some(9.0));
        assert!(queue.is_empty());
        // Transient constraints were cleaned up: the only new constraints
        // left are the two skeleton binds.
        let after = g.scene().node_count();
        // entry + 4 groups + 2 rig joints + 2 controls + 2 bind constraints
        assert_eq!(after - before, 11);
    }

    #[test]
    fn test_animated_region_routes_through_queue() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 2);
        g.scene_mut().set_key(joints[1], "ty", 1, 1.0);
        g.scene_mut().set_key(joints[1], "ty", 5, 5.0);
        let region = SkeletonRegion::new(Side::Left, "arm", joints);

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(
            &mut g,
            &mut queue,
            region,
            &RigOptions {
                use_queue: true,
                bake_range: BakeRange::Keyed,
            },
        )
        .unwrap();

        assert_eq!(queue.command_count(), 1);
        let controls = comp.entry().unwrap().controls(&g);
        assert!(!g.scene().has_animation(controls[1]), "nothing baked yet");

        let report = queue.run_queue(g.scene_mut());
        assert!(report.failures.is_empty());
        assert!(g.scene().has_animation(controls[1]));
        assert_eq!(report.transients_deleted, 2, "temp constraints removed");
        // The skeleton binds land only after the bake has read the joints,
        // and are still recorded as component attachments.
        let joints = comp.entry().unwrap().skeleton_joints(&g);
        for joint in &joints {
            assert_eq!(g.scene().constraints_on(*joint).len(), 1);
        }
        assert_eq!(comp.entry().unwrap().attachments(&g).len(), 2);
    }

    #[test]
    fn test_bake_and_remove_immediate() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 3);
        let region = SkeletonRegion::new(Side::Left, "arm", joints.clone());

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region, &RigOptions::default())
            .unwrap();
        let entry_node = comp.entry().unwrap().handle().scene_node();

        comp.bake_and_remove(&mut g, &mut queue, BakeRange::CurrentFrame, true)
            .unwrap();

        assert_eq!(comp.state(), RigState::Removed);
        assert!(!g.scene().node_exists(entry_node), "subtree deleted");
        for joint in &joints {
            assert!(g.scene().node_exists(*joint), "skeleton survives");
            assert!(g.scene().has_animation(*joint), "motion baked down");
            assert!(
                g.scene().constraints_on(*joint).is_empty(),
                "bind constraints died with the rig joints"
            );
        }
    }

    #[test]
    fn test_bake_and_remove_as_queued_post_process() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 2);
        let region = SkeletonRegion::new(Side::Right, "leg", joints.clone());

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region, &RigOptions::default())
            .unwrap();
        let entry_node = comp.entry().unwrap().handle().scene_node();

        comp.bake_and_remove(&mut g, &mut queue, BakeRange::CurrentFrame, false)
            .unwrap();
        assert!(g.scene().node_exists(entry_node), "deferred until run_queue");

        let report = queue.run_queue(g.scene_mut());
        assert!(report.failures.is_empty());
        assert!(!g.scene().node_exists(entry_node));
        assert!(g.scene().has_animation(joints[0]));
    }

    #[test]
    fn test_externally_attached_joint_excluded_from_bake() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 2);
        let region = SkeletonRegion::new(Side::Left, "arm", joints.clone());

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region, &RigOptions::default())
            .unwrap();

        // A foreign constraint keeps driving the leaf joint.
        let foreign = g.scene_mut().create_node("foreign_driver");
        g.scene_mut()
            .constrain(foreign, joints[1], ConstraintKind::Parent);

        comp.bake_and_remove(&mut g, &mut queue, BakeRange::CurrentFrame, true)
            .unwrap();
        assert!(g.scene().has_animation(joints[0]), "unattached joint baked");
        assert!(
            !g.scene().has_animation(joints[1]),
            "externally attached joint left live"
        );
    }

    #[test]
    fn test_attach_to_different_region_retargets() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let source = SkeletonRegion::new(Side::Left, "arm", chain(&mut g, 3));
        let target_joints = chain(&mut g, 3);
        let target = SkeletonRegion::new(Side::Right, "arm", target_joints.clone());

        let mut comp = RigComponent::new(Box::new(Ik));
        comp.rig(&mut g, &mut queue, source, &RigOptions::default())
            .unwrap();
        comp.attach_to_skeleton(&mut g, &target).unwrap();

        assert_eq!(comp.state(), RigState::Attached);
        assert!(!g.scene().constraints_on(target_joints[0]).is_empty());

        // IK on a 3-joint chain keys a pole-vector position.
        let controls = comp.entry().unwrap().controls(&g);
        let pole = controls
            .iter()
            .find(|c| g.scene().node_name(**c).unwrap().contains("_pole_"))
            .copied()
            .unwrap();
        assert!(g.scene().has_animation(pole));
    }

    #[test]
    fn test_retargeted_joints_bake_before_removal() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let source = SkeletonRegion::new(Side::Left, "arm", chain(&mut g, 3));
        let target_joints = chain(&mut g, 3);
        let target = SkeletonRegion::new(Side::Right, "arm", target_joints.clone());

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, source, &RigOptions::default())
            .unwrap();
        comp.attach_to_skeleton(&mut g, &target).unwrap();

        // Pose a control; the retargeted joint follows it live.
        let control = comp.entry().unwrap().controls(&g)[0];
        g.scene_mut()
            .set_world_transform(control, Transform3::at([9.0, 9.0, 9.0]));
        let posed = g.scene().world_transform(target_joints[0]).unwrap();
        assert_eq!(posed.translate, [9.0, 9.0, 9.0]);

        comp.bake_and_remove(&mut g, &mut queue, BakeRange::CurrentFrame, true)
            .unwrap();

        // The driven pose survives as plain keys once the rig is gone.
        assert!(g.scene().has_animation(target_joints[0]));
        assert!(g.scene().constraints_on(target_joints[0]).is_empty());
        let after = g.scene().world_transform(target_joints[0]).unwrap();
        assert_eq!(after.translate, [9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_switch_space_preserves_world_pose() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let region = SkeletonRegion::new(Side::Left, "arm", chain(&mut g, 2));

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region, &RigOptions::default())
            .unwrap();
        let control = comp.entry().unwrap().controls(&g)[1];
        let before = g.scene().world_transform(control).unwrap();

        let aim_target = g.scene_mut().create_node("aim_target");
        comp.switch_space(&mut g, control, SpaceDriver::Aim, &[aim_target])
            .unwrap();

        let after = g.scene().world_transform(control).unwrap();
        assert_eq!(before.translate, after.translate, "pose continuous");
        assert_eq!(
            g.scene().get_attr(control, SPACE_DRIVER_ATTR),
            Some(SceneValue::Str("aim".into()))
        );
        assert_eq!(g.scene().constraints_on(control).len(), 1);
    }

    #[test]
    fn test_switch_space_aim_without_target_fails() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let region = SkeletonRegion::new(Side::Left, "arm", chain(&mut g, 2));
        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region, &RigOptions::default())
            .unwrap();
        let control = comp.entry().unwrap().controls(&g)[0];
        assert!(matches!(
            comp.switch_space(&mut g, control, SpaceDriver::Aim, &[]),
            Err(LifecycleError::MissingDriverTarget)
        ));
    }

    #[test]
    fn test_switch_rigging_rebuilds_as_declared_kind() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let joints = chain(&mut g, 3);
        let region = SkeletonRegion::new(Side::Left, "arm", joints);

        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region, &RigOptions::default())
            .unwrap();
        assert_eq!(comp.kind_tag(), FK_TAG);
        let old_entry = comp.entry().unwrap().handle().scene_node();

        comp.declare_switch_target(&mut g, IK_TAG).unwrap();
        comp.switch_rigging(&mut g, &mut queue, &RigOptions::default())
            .unwrap();

        assert_eq!(comp.kind_tag(), IK_TAG);
        assert_eq!(comp.state(), RigState::Built);
        assert!(!g.scene().node_exists(old_entry), "old subtree destroyed");
        let entry = comp.entry().unwrap();
        assert_eq!(entry.component_type(&g).as_deref(), Some(IK_TAG));
        // IK on 3 joints: root, goal, pole.
        assert_eq!(entry.controls(&g).len(), 3);
    }

    #[test]
    fn test_rig_twice_is_an_invalid_transition() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let region = SkeletonRegion::new(Side::Left, "arm", chain(&mut g, 2));
        let mut comp = RigComponent::new(Box::new(Fk));
        comp.rig(&mut g, &mut queue, region.clone(), &RigOptions::default())
            .unwrap();
        assert!(matches!(
            comp.rig(&mut g, &mut queue, region, &RigOptions::default()),
            Err(LifecycleError::InvalidState { .. })
        ));
    }
}
