// SPDX-License-Identifier: MIT OR Apache-2.0
//! The built-in rig component kinds.

use crate::region::SkeletonRegion;
use rigforge_scene::{HostScene, SceneNodeId, Transform3};

/// FK chain tag.
pub const FK_TAG: &str = "rigforge.fk";
/// IK chain tag.
pub const IK_TAG: &str = "rigforge.ik";
/// Ribbon tag.
pub const RIBBON_TAG: &str = "rigforge.ribbon";
/// Reverse-foot tag.
pub const REVERSE_FOOT_TAG: &str = "rigforge.reverse_foot";

/// A rig building block: produces controls that drive a skeleton region.
///
/// The set is open; anything implementing this trait and resolvable through
/// [`kind_by_tag`] (or a caller-side registry) can participate in the
/// lifecycle.
pub trait RigComponentKind: Send {
    /// Registry tag persisted on the component entry.
    fn type_tag(&self) -> &'static str;

    /// Module name persisted for configuration files.
    fn module(&self) -> &'static str {
        "rigforge_rig"
    }

    /// Minimum joint count the kind can rig. Validated before any mutation.
    fn min_joints(&self) -> usize;

    /// Create the control transforms for a region, in stable order.
    /// Controls are scene nodes only at this point; the lifecycle stamps
    /// them into the metadata graph afterwards.
    fn build_controls(
        &self,
        scene: &mut dyn HostScene,
        region: &SkeletonRegion,
    ) -> Vec<SceneNodeId>;
}

/// Resolve a built-in kind from its tag.
pub fn kind_by_tag(tag: &str) -> Option<Box<dyn RigComponentKind>> {
    match tag {
        FK_TAG => Some(Box::new(Fk)),
        IK_TAG => Some(Box::new(Ik)),
        RIBBON_TAG => Some(Box::new(Ribbon)),
        REVERSE_FOOT_TAG => Some(Box::new(ReverseFoot)),
        _ => None,
    }
}

/// Tags of the built-in kinds, for enumeration by configuration layers.
pub fn builtin_tags() -> [&'static str; 4] {
    [FK_TAG, IK_TAG, RIBBON_TAG, REVERSE_FOOT_TAG]
}

fn control_at(
    scene: &mut dyn HostScene,
    name: &str,
    source: Option<Transform3>,
) -> SceneNodeId {
    let ctl = scene.create_node(name);
    if let Some(xf) = source {
        scene.set_world_transform(ctl, xf);
    }
    ctl
}

/// One control per joint, in chain order.
pub struct Fk;

impl RigComponentKind for Fk {
    fn type_tag(&self) -> &'static str {
        FK_TAG
    }

    fn min_joints(&self) -> usize {
        1
    }

    fn build_controls(
        &self,
        scene: &mut dyn HostScene,
        region: &SkeletonRegion,
    ) -> Vec<SceneNodeId> {
        let mut controls = Vec::with_capacity(region.joint_count());
        for (i, joint) in region.joints.iter().enumerate() {
            let xf = scene.world_transform(*joint);
            let name = format!("{}_{}_fk{}_ctl", region.side, region.name, i);
            controls.push(control_at(scene, &name, xf));
        }
        controls
    }
}

/// Root and goal controls, plus a pole-vector control for chains of three or
/// more.
pub struct Ik;

impl RigComponentKind for Ik {
    fn type_tag(&self) -> &'static str {
        IK_TAG
    }

    fn min_joints(&self) -> usize {
        2
    }

    fn build_controls(
        &self,
        scene: &mut dyn HostScene,
        region: &SkeletonRegion,
    ) -> Vec<SceneNodeId> {
        let first = region.joints[0];
        let last = region.joints[region.joint_count() - 1];
        let root_xf = scene.world_transform(first);
        let goal_xf = scene.world_transform(last);

        let mut controls = vec![
            control_at(
                scene,
                &format!("{}_{}_ik_root_ctl", region.side, region.name),
                root_xf,
            ),
            control_at(
                scene,
                &format!("{}_{}_ik_goal_ctl", region.side, region.name),
                goal_xf,
            ),
        ];

        if region.joint_count() >= 3 {
            let mid = region.joints[region.joint_count() / 2];
            let pole = pole_vector_position(
                root_xf.map(|x| x.translate).unwrap_or_default(),
                scene
                    .world_transform(mid)
                    .map(|x| x.translate)
                    .unwrap_or_default(),
                goal_xf.map(|x| x.translate).unwrap_or_default(),
            );
            controls.push(control_at(
                scene,
                &format!("{}_{}_ik_pole_ctl", region.side, region.name),
                Some(Transform3::at(pole)),
            ));
        }
        controls
    }
}

/// Per-joint controls plus interpolated mid controls between neighbors.
pub struct Ribbon;

impl RigComponentKind for Ribbon {
    fn type_tag(&self) -> &'static str {
        RIBBON_TAG
    }

    fn min_joints(&self) -> usize {
        3
    }

    fn build_controls(
        &self,
        scene: &mut dyn HostScene,
        region: &SkeletonRegion,
    ) -> Vec<SceneNodeId> {
        let mut controls = Vec::new();
        let translations: Vec<[f64; 3]> = region
            .joints
            .iter()
            .map(|j| {
                scene
                    .world_transform(*j)
                    .map(|x| x.translate)
                    .unwrap_or_default()
            })
            .collect();

        for (i, t) in translations.iter().enumerate() {
            let name = format!("{}_{}_ribbon{}_ctl", region.side, region.name, i);
            controls.push(control_at(scene, &name, Some(Transform3::at(*t))));
            if let Some(next) = translations.get(i + 1) {
                let mid = scale3(add3(*t, *next), 0.5);
                let name = format!("{}_{}_ribbon{}_mid_ctl", region.side, region.name, i);
                controls.push(control_at(scene, &name, Some(Transform3::at(mid))));
            }
        }
        controls
    }
}

/// Heel, toe, ball, and ankle controls over the last four joints of a leg
/// chain, ordered for the reverse-foot roll.
pub struct ReverseFoot;

impl RigComponentKind for ReverseFoot {
    fn type_tag(&self) -> &'static str {
        REVERSE_FOOT_TAG
    }

    fn min_joints(&self) -> usize {
        4
    }

    fn build_controls(
        &self,
        scene: &mut dyn HostScene,
        region: &SkeletonRegion,
    ) -> Vec<SceneNodeId> {
        // The reverse-foot hierarchy pivots leaf-first: heel drives toe
        // drives ball drives ankle.
        let count = region.joint_count();
        let foot = &region.joints[count - 4..];
        let labels = ["heel", "toe", "ball", "ankle"];
        labels
            .iter()
            .zip(foot.iter().rev())
            .map(|(label, joint)| {
                let xf = scene.world_transform(*joint);
                let name = format!("{}_{}_{}_ctl", region.side, region.name, label);
                control_at(scene, &name, xf)
            })
            .collect()
    }
}

/// Project a pole-vector position out of the chain plane: the mid joint
/// pushed away from the root-goal midpoint by the chain's own span.
pub fn pole_vector_position(root: [f64; 3], mid: [f64; 3], goal: [f64; 3]) -> [f64; 3] {
    let chain_mid = scale3(add3(root, goal), 0.5);
    let offset = sub3(mid, chain_mid);
    let reach = length3(sub3(goal, root)).max(1.0);
    let dir_len = length3(offset);
    if dir_len < 1e-9 {
        // Perfectly straight chain: push along an arbitrary stable axis.
        return add3(mid, [0.0, 0.0, reach]);
    }
    add3(mid, scale3(offset, reach / dir_len))
}

fn add3(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub3(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale3(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn length3(a: [f64; 3]) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}
