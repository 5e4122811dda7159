// SPDX-License-Identifier: MIT OR Apache-2.0
//! The property family: annotations that carry a side effect.
//!
//! Properties are always leaves, attached to one or more targets by an
//! ownership edge. Each concrete type declares the stage its side effect
//! runs in and how two instances compare for dedup during settings merges.

use crate::entry::{MetaHandle, MetaNode, META_TYPE_ATTR};
use crate::graph::{EdgeKind, MetadataGraph};
use rigforge_bake::{BakeError, BakeQueue};
use rigforge_scene::{AttrBag, HostScene, SceneNodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// When a property's side effect executes, relative to the bake pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActStage {
    /// Before any rig building or baking
    Pre,
    /// Alongside the bake pass
    During,
    /// After the bake pass and cleanup
    Post,
}

/// Failure inside a property's side effect.
#[derive(Debug, Error)]
pub enum ActError {
    /// A required attribute is missing or mistyped
    #[error("property attribute missing or mistyped: {0}")]
    MissingAttr(String),

    /// Enqueued bake work failed validation
    #[error(transparent)]
    Bake(#[from] BakeError),

    /// Anything else
    #[error("{0}")]
    Failed(String),
}

/// Everything a property's side effect may touch.
pub struct ActContext<'a> {
    /// The host scene.
    pub scene: &'a mut dyn HostScene,
    /// The queue side effects schedule work on.
    pub queue: &'a mut BakeQueue,
    /// Objects the property is attached to.
    pub targets: Vec<SceneNodeId>,
    /// The property's own persisted attribute bag.
    pub attrs: AttrBag,
}

/// A property annotation.
pub trait PropertyNode: MetaNode {
    /// The stage this type's side effect runs in. Static per type.
    fn stage(&self) -> ActStage;

    /// Whether several instances of this type may sit on one target.
    fn multi_allowed(&self) -> bool {
        false
    }

    /// Structural identity check used for dedup during settings merges.
    ///
    /// `own` is this instance's persisted bag, `data` the incoming one. The
    /// default compares the full bags; identity-sensitive subtypes compare
    /// key fields only.
    fn compare(&self, own: &AttrBag, data: &AttrBag) -> bool {
        strip_meta(own) == strip_meta(data)
    }

    /// Execute the side effect.
    fn act(&self, ctx: &mut ActContext<'_>) -> Result<(), ActError>;
}

fn strip_meta(bag: &AttrBag) -> AttrBag {
    let mut out = bag.clone();
    out.shift_remove(META_TYPE_ATTR);
    out
}

/// Attach a property of type `tag` to `target`, deduplicating.
///
/// When an instance of the same tag already sits on the target and compares
/// equal to `attrs`, that instance is returned untouched. When one exists
/// with different data and the type forbids duplicates, the existing
/// instance's attributes are overwritten (settings-merge semantics). Only an
/// unknown tag is an error.
pub fn attach_property<S: HostScene>(
    graph: &mut MetadataGraph<S>,
    target: MetaHandle,
    tag: &str,
    attrs: AttrBag,
) -> Result<MetaHandle, AttachError> {
    if graph.registry().get(tag, true).is_none() {
        return Err(AttachError::UnknownTag(tag.to_string()));
    }

    for existing in graph.get_downstream(target, tag) {
        let Some(wrapper) = graph.wrap(existing.0) else {
            continue;
        };
        let Some(property) = wrapper.as_property() else {
            continue;
        };
        let own = graph.scene().attrs(existing.0).unwrap_or_default();
        if property.compare(&own, &attrs) {
            return Ok(existing);
        }
        if !property.multi_allowed() {
            for (key, value) in attrs {
                graph.set_attr(existing, &key, value);
            }
            return Ok(existing);
        }
    }

    let handle = graph.create_node(tag, attrs);
    graph.connect(target, handle.0, EdgeKind::Ownership);
    Ok(handle)
}

/// Attaching a property failed before any mutation.
#[derive(Debug, Error)]
pub enum AttachError {
    /// The tag is not registered
    #[error("unknown property tag: {0}")]
    UnknownTag(String),
}

/// What one property stage pass did.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    /// Properties whose side effect ran
    pub acted: usize,
    /// Context strings for absorbed failures
    pub failures: Vec<String>,
}

/// Run every property of the given stage, in scene order.
///
/// A failing `act` is logged and absorbed; the pass continues with the
/// remaining properties.
pub fn run_stage<S: HostScene>(
    graph: &mut MetadataGraph<S>,
    queue: &mut BakeQueue,
    stage: ActStage,
) -> StageReport {
    let mut report = StageReport::default();

    // Collect first; acting mutates the scene.
    let mut pending: Vec<(Box<dyn MetaNode>, Vec<SceneNodeId>, AttrBag)> = Vec::new();
    for handle in graph.get_all_of_type("") {
        let Some(wrapper) = graph.wrap(handle.0) else {
            continue;
        };
        let Some(property) = wrapper.as_property() else {
            continue;
        };
        if property.stage() != stage {
            continue;
        }
        let targets = graph
            .get_upstream(handle, "")
            .into_iter()
            .map(MetaHandle::scene_node)
            .collect();
        let attrs = graph.scene().attrs(handle.0).unwrap_or_default();
        pending.push((wrapper, targets, attrs));
    }

    for (wrapper, targets, attrs) in pending {
        let Some(property) = wrapper.as_property() else {
            continue;
        };
        let mut ctx = ActContext {
            scene: graph.scene_mut(),
            queue,
            targets,
            attrs,
        };
        match property.act(&mut ctx) {
            Ok(()) => report.acted += 1,
            Err(e) => {
                tracing::error!(tag = wrapper.type_tag(), "property act failed: {e}");
                report
                    .failures
                    .push(format!("{}: {e}", wrapper.type_tag()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigforge_scene::{OfflineScene, SceneValue};

    struct TagNote(MetaHandle);

    impl MetaNode for TagNote {
        fn handle(&self) -> MetaHandle {
            self.0
        }
        fn type_tag(&self) -> &'static str {
            "test.tag_note"
        }
        fn as_property(&self) -> Option<&dyn PropertyNode> {
            Some(self)
        }
    }

    impl PropertyNode for TagNote {
        fn stage(&self) -> ActStage {
            ActStage::Post
        }
        // Identity-sensitive: only side and region participate.
        fn compare(&self, own: &AttrBag, data: &AttrBag) -> bool {
            ["side", "region"]
                .iter()
                .all(|k| own.get(*k) == data.get(*k))
        }
        fn act(&self, ctx: &mut ActContext<'_>) -> Result<(), ActError> {
            for target in &ctx.targets {
                ctx.scene
                    .set_attr(*target, "noted", SceneValue::Bool(true));
            }
            Ok(())
        }
    }

    fn graph() -> MetadataGraph<OfflineScene> {
        let mut g = MetadataGraph::new(OfflineScene::new());
        g.registry_mut()
            .add("test.tag_note", |h| Box::new(TagNote(h)));
        g.registry_mut()
            .add("test.host", |h| Box::new(TagNote(h)));
        g
    }

    #[test]
    fn test_attach_dedups_on_identity_fields() {
        let mut g = graph();
        let target = g.create_node("test.host", AttrBag::new());

        let mut first = AttrBag::new();
        first.insert("side".into(), "left".into());
        first.insert("region".into(), "arm".into());
        first.insert("note".into(), "a".into());
        let h1 = attach_property(&mut g, target, "test.tag_note", first).unwrap();

        // Same identity fields, different payload: merged onto h1.
        let mut second = AttrBag::new();
        second.insert("side".into(), "left".into());
        second.insert("region".into(), "arm".into());
        second.insert("note".into(), "b".into());
        let h2 = attach_property(&mut g, target, "test.tag_note", second).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(g.get_downstream(target, "test.tag_note").len(), 1);
    }

    #[test]
    fn test_attach_unknown_tag_fails_closed() {
        let mut g = graph();
        let target = g.create_node("test.host", AttrBag::new());
        let before = g.scene().node_count();
        assert!(matches!(
            attach_property(&mut g, target, "no.such.type", AttrBag::new()),
            Err(AttachError::UnknownTag(_))
        ));
        assert_eq!(g.scene().node_count(), before);
    }

    #[test]
    fn test_run_stage_acts_on_targets() {
        let mut g = graph();
        let target = g.create_node("test.host", AttrBag::new());
        attach_property(&mut g, target, "test.tag_note", AttrBag::new()).unwrap();

        let mut queue = BakeQueue::new();
        let report = run_stage(&mut g, &mut queue, ActStage::Post);
        // Both the note and the "test.host" node expose the property trait in
        // this test registry, but only the note has an upstream target.
        assert!(report.acted >= 1);
        assert_eq!(
            g.scene().get_attr(target.0, "noted"),
            Some(SceneValue::Bool(true))
        );
    }
}
