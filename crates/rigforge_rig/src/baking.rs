// SPDX-License-Identifier: MIT OR Apache-2.0
//! The canonical bake operation all components route through.

use rigforge_bake::{BakeError, ParamBag};
use rigforge_scene::offline::TRANSFORM_CHANNELS;
use rigforge_scene::{HostScene, SceneNodeId, SceneValue};

/// Operation kind string under which all transform baking is fingerprinted.
/// Every component enqueues through this one kind, which is what lets
/// independently-authored requests over the same frame span collapse into a
/// single whole-timeline evaluation.
pub const BAKE_KIND: &str = "bake_transforms";

/// Build the parameter bag for a bake over an inclusive frame span.
pub fn bake_params(start: i64, end: i64) -> ParamBag {
    let mut params = ParamBag::new();
    params.insert("start".into(), SceneValue::Int(start));
    params.insert("end".into(), SceneValue::Int(end));
    params
}

/// Sample each target's resolved world transform every frame of the span and
/// write explicit keys, removing its dependency on the live rig.
pub fn bake_transforms(
    scene: &mut dyn HostScene,
    targets: &[SceneNodeId],
    params: &ParamBag,
) -> Result<(), BakeError> {
    let start = int_param(params, "start")?;
    let end = int_param(params, "end")?;
    for target in targets {
        if !scene.node_exists(*target) {
            return Err(BakeError::MissingTarget(*target));
        }
        // Sample the whole span first: writing keys frame-by-frame would let
        // earlier keys skew later constraint resolution.
        let mut samples = Vec::with_capacity((end - start + 1).max(0) as usize);
        for frame in start..=end {
            samples.push((frame, scene.world_transform_at(*target, frame)));
        }
        for (frame, xf) in samples {
            let Some(xf) = xf else { continue };
            let values = [
                xf.translate[0],
                xf.translate[1],
                xf.translate[2],
                xf.rotate[0],
                xf.rotate[1],
                xf.rotate[2],
                xf.scale[0],
                xf.scale[1],
                xf.scale[2],
            ];
            for (channel, value) in TRANSFORM_CHANNELS.iter().zip(values) {
                scene.set_key(*target, channel, frame, value);
            }
        }
    }
    Ok(())
}

fn int_param(params: &ParamBag, key: &str) -> Result<i64, BakeError> {
    params
        .get(key)
        .and_then(SceneValue::as_int)
        .ok_or_else(|| BakeError::Failed(format!("bake parameter `{key}` missing or mistyped")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigforge_scene::{ConstraintKind, OfflineScene, Transform3};

    #[test]
    fn test_bake_writes_keys_over_span() {
        let mut scene = OfflineScene::new();
        let driver = scene.create_node("driver");
        let driven = scene.create_node("driven");
        scene.set_key(driver, "tx", 1, 0.0);
        scene.set_key(driver, "tx", 5, 4.0);
        scene.constrain(driver, driven, ConstraintKind::Parent);

        bake_transforms(&mut scene, &[driven], &bake_params(1, 5)).unwrap();
        assert_eq!(scene.sample(driven, "tx", 3), Some(2.0));
        assert_eq!(scene.keyed_frames(driven), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_baked_result_survives_constraint_removal() {
        let mut scene = OfflineScene::new();
        let driver = scene.create_node("driver");
        let driven = scene.create_node("driven");
        scene.set_world_transform(driver, Transform3::at([3.0, 0.0, 0.0]));
        let c = scene.constrain(driver, driven, ConstraintKind::Parent);

        bake_transforms(&mut scene, &[driven], &bake_params(1, 2)).unwrap();
        scene.remove_constraint(c);
        assert_eq!(scene.sample(driven, "tx", 1), Some(3.0));
    }
}
