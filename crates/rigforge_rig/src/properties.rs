// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concrete property types shipped with the rig layer.
//!
//! Each one annotates a node with a persisted side effect: enqueue a bake,
//! strip keys after it, move geometry under a new parent first, or just tag
//! a region for later lookup.

use crate::baking::{bake_params, bake_transforms, BAKE_KIND};
use rigforge_meta::{
    ActContext, ActError, ActStage, MetaHandle, MetaNode, PropertyNode, TypeRegistry,
};
use rigforge_scene::{AttrBag, SceneNodeId, SceneValue};

/// Tag for [`BakeDerivedCurveProperty`].
pub const BAKE_DERIVED_CURVE_TAG: &str = "rigforge.bake_derived_curve";
/// Tag for [`StripAnimationProperty`].
pub const STRIP_ANIMATION_TAG: &str = "rigforge.strip_animation";
/// Tag for [`ReparentGeometryProperty`].
pub const REPARENT_GEOMETRY_TAG: &str = "rigforge.reparent_geometry";
/// Tag for [`RegionTagProperty`].
pub const REGION_TAG_TAG: &str = "rigforge.region_tag";

/// Register the shipped property types on a registry.
pub fn register_property_types(registry: &mut TypeRegistry) {
    registry.add(BAKE_DERIVED_CURVE_TAG, |h| {
        Box::new(BakeDerivedCurveProperty(h))
    });
    registry.add(STRIP_ANIMATION_TAG, |h| Box::new(StripAnimationProperty(h)));
    registry.add(REPARENT_GEOMETRY_TAG, |h| {
        Box::new(ReparentGeometryProperty(h))
    });
    registry.add(REGION_TAG_TAG, |h| Box::new(RegionTagProperty(h)));
}

/// Marks targets whose motion is derived from other nodes and must be baked
/// to explicit keys during the bake pass.
///
/// Optional `start`/`end` int attributes pin the span; without them the
/// scene's playback range is used. Acting only enqueues a command, so many
/// instances sharing span and targets collapse into one bake.
pub struct BakeDerivedCurveProperty(pub MetaHandle);

impl MetaNode for BakeDerivedCurveProperty {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        BAKE_DERIVED_CURVE_TAG
    }
    fn as_property(&self) -> Option<&dyn PropertyNode> {
        Some(self)
    }
}

impl PropertyNode for BakeDerivedCurveProperty {
    fn stage(&self) -> ActStage {
        ActStage::During
    }

    fn act(&self, ctx: &mut ActContext<'_>) -> Result<(), ActError> {
        let span = match (int_attr(&ctx.attrs, "start"), int_attr(&ctx.attrs, "end")) {
            (Some(start), Some(end)) => (start, end),
            _ => ctx.scene.playback_range(),
        };
        ctx.queue.add_command(
            BAKE_KIND,
            Box::new(bake_transforms),
            ctx.targets.clone(),
            bake_params(span.0, span.1),
        );
        Ok(())
    }
}

/// Clears all keys from its targets after the bake pass, leaving them at
/// their resolved pose.
pub struct StripAnimationProperty(pub MetaHandle);

impl MetaNode for StripAnimationProperty {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        STRIP_ANIMATION_TAG
    }
    fn as_property(&self) -> Option<&dyn PropertyNode> {
        Some(self)
    }
}

impl PropertyNode for StripAnimationProperty {
    fn stage(&self) -> ActStage {
        ActStage::Post
    }

    fn act(&self, ctx: &mut ActContext<'_>) -> Result<(), ActError> {
        for target in &ctx.targets {
            ctx.scene.clear_keys(*target);
        }
        Ok(())
    }
}

/// Moves its targets under a declared parent before any rig building runs.
///
/// The `new_parent` attribute holds the parent's node id as a string; a
/// missing or unparseable value fails the act without touching the scene.
pub struct ReparentGeometryProperty(pub MetaHandle);

impl MetaNode for ReparentGeometryProperty {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        REPARENT_GEOMETRY_TAG
    }
    fn as_property(&self) -> Option<&dyn PropertyNode> {
        Some(self)
    }
}

impl PropertyNode for ReparentGeometryProperty {
    fn stage(&self) -> ActStage {
        ActStage::Pre
    }

    fn act(&self, ctx: &mut ActContext<'_>) -> Result<(), ActError> {
        let parent = ctx
            .attrs
            .get("new_parent")
            .and_then(SceneValue::as_str)
            .and_then(SceneNodeId::parse)
            .ok_or_else(|| ActError::MissingAttr("new_parent".into()))?;
        if !ctx.scene.node_exists(parent) {
            return Err(ActError::Failed(format!("new_parent {parent} not in scene")));
        }
        for target in &ctx.targets {
            ctx.scene.reparent(*target, Some(parent));
        }
        Ok(())
    }
}

/// Pure annotation naming the side and region a node belongs to. Identity is
/// the side/region pair, so re-applying settings never stacks duplicates.
pub struct RegionTagProperty(pub MetaHandle);

impl MetaNode for RegionTagProperty {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        REGION_TAG_TAG
    }
    fn as_property(&self) -> Option<&dyn PropertyNode> {
        Some(self)
    }
}

impl PropertyNode for RegionTagProperty {
    fn stage(&self) -> ActStage {
        ActStage::Post
    }

    fn compare(&self, own: &AttrBag, data: &AttrBag) -> bool {
        ["side", "region"]
            .iter()
            .all(|key| own.get(*key) == data.get(*key))
    }

    fn act(&self, ctx: &mut ActContext<'_>) -> Result<(), ActError> {
        for key in ["side", "region"] {
            if let Some(value) = ctx.attrs.get(key) {
                for target in &ctx.targets {
                    ctx.scene.set_attr(*target, key, value.clone());
                }
            }
        }
        Ok(())
    }
}

fn int_attr(bag: &AttrBag, key: &str) -> Option<i64> {
    bag.get(key).and_then(SceneValue::as_int)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigforge_bake::BakeQueue;
    use rigforge_meta::{attach_property, run_stage, MetadataGraph};
    use rigforge_scene::{HostScene, OfflineScene};

    fn graph() -> MetadataGraph<OfflineScene> {
        let mut g = MetadataGraph::new(OfflineScene::new());
        register_property_types(g.registry_mut());
        g.registry_mut()
            .add("test.host", |h| Box::new(RegionTagProperty(h)));
        g
    }

    #[test]
    fn test_bake_derived_curve_enqueues_one_command() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let target = g.create_node("test.host", AttrBag::new());
        let driven = g.scene_mut().create_node("driven");
        g.connect(target, driven, rigforge_meta::EdgeKind::Ownership);
        g.adopt(driven, "test.host", AttrBag::new());

        let mut attrs = AttrBag::new();
        attrs.insert("start".into(), SceneValue::Int(5));
        attrs.insert("end".into(), SceneValue::Int(9));
        attach_property(&mut g, MetaHandle(driven), BAKE_DERIVED_CURVE_TAG, attrs).unwrap();

        let report = run_stage(&mut g, &mut queue, ActStage::During);
        assert!(report.failures.is_empty());
        assert_eq!(queue.command_count(), 1);
    }

    #[test]
    fn test_strip_animation_clears_keys() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let target = g.create_node("test.host", AttrBag::new());
        g.scene_mut().set_key(target.scene_node(), "tx", 1, 3.0);
        attach_property(&mut g, target, STRIP_ANIMATION_TAG, AttrBag::new()).unwrap();

        run_stage(&mut g, &mut queue, ActStage::Post);
        assert!(!g.scene().has_animation(target.scene_node()));
    }

    #[test]
    fn test_reparent_without_attr_is_reported_not_fatal() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let target = g.create_node("test.host", AttrBag::new());
        attach_property(&mut g, target, REPARENT_GEOMETRY_TAG, AttrBag::new()).unwrap();

        let report = run_stage(&mut g, &mut queue, ActStage::Pre);
        assert_eq!(report.acted, 0);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("new_parent"));
    }

    #[test]
    fn test_reparent_moves_targets() {
        let mut g = graph();
        let mut queue = BakeQueue::new();
        let target = g.create_node("test.host", AttrBag::new());
        let new_parent = g.scene_mut().create_node("geo_grp");

        let mut attrs = AttrBag::new();
        attrs.insert(
            "new_parent".into(),
            SceneValue::Str(new_parent.to_string()),
        );
        attach_property(&mut g, target, REPARENT_GEOMETRY_TAG, attrs).unwrap();

        let report = run_stage(&mut g, &mut queue, ActStage::Pre);
        assert!(report.failures.is_empty());
        assert_eq!(g.scene().parent(target.scene_node()), Some(new_parent));
    }

    #[test]
    fn test_region_tag_identity_ignores_payload() {
        let mut g = graph();
        let target = g.create_node("test.host", AttrBag::new());

        let mut a = AttrBag::new();
        a.insert("side".into(), SceneValue::Str("left".into()));
        a.insert("region".into(), SceneValue::Str("arm".into()));
        a.insert("note".into(), SceneValue::Str("first".into()));
        let h1 = attach_property(&mut g, target, REGION_TAG_TAG, a).unwrap();

        let mut b = AttrBag::new();
        b.insert("side".into(), SceneValue::Str("left".into()));
        b.insert("region".into(), SceneValue::Str("arm".into()));
        b.insert("note".into(), SceneValue::Str("second".into()));
        let h2 = attach_property(&mut g, target, REGION_TAG_TAG, b).unwrap();

        assert_eq!(h1, h2);
        assert_eq!(g.get_downstream(target, REGION_TAG_TAG).len(), 1);
    }
}
