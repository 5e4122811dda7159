// SPDX-License-Identifier: MIT OR Apache-2.0
//! Add-ons layered onto a built rig without touching its component entry.
//!
//! An overdriver temporarily re-homes a control under an arbitrary driver
//! node. The metadata node remembers the original parent so removal is a
//! clean restore, even across a save/load in between.

use rigforge_meta::{EdgeKind, MetaHandle, MetaNode, MetadataGraph, PropertyNode, TypeRegistry};
use rigforge_scene::{AttrBag, HostScene, SceneNodeId, SceneValue};
use thiserror::Error;

/// Tag for [`SpaceOverdriver`] metadata nodes.
pub const OVERDRIVER_TAG: &str = "rigforge.overdriver";
/// Attribute holding the re-homed control's original parent id.
pub const ORIGINAL_PARENT_ATTR: &str = "original_parent";

/// Register add-on types on a registry.
pub fn register_addon_types(registry: &mut TypeRegistry) {
    registry.add(OVERDRIVER_TAG, |h| Box::new(SpaceOverdriver(h)));
}

/// Wrapper over an overdriver metadata node.
pub struct SpaceOverdriver(pub MetaHandle);

impl MetaNode for SpaceOverdriver {
    fn handle(&self) -> MetaHandle {
        self.0
    }
    fn type_tag(&self) -> &'static str {
        OVERDRIVER_TAG
    }
    fn as_property(&self) -> Option<&dyn PropertyNode> {
        None
    }
}

/// Applying or removing an overdriver failed.
#[derive(Debug, Error)]
pub enum OverdriverError {
    /// The control or driver node is gone
    #[error("overdriver endpoint missing from scene: {0}")]
    MissingNode(SceneNodeId),

    /// The metadata node records no driven control
    #[error("overdriver references no control")]
    NoControl,
}

/// Re-home `control` under `driver`, recording the original parent.
///
/// The overdriver node references the control rather than owning it, so a
/// component cascade delete never takes the control along with the add-on.
pub fn apply_overdriver<S: HostScene>(
    graph: &mut MetadataGraph<S>,
    control: SceneNodeId,
    driver: SceneNodeId,
) -> Result<MetaHandle, OverdriverError> {
    for id in [control, driver] {
        if !graph.scene().node_exists(id) {
            return Err(OverdriverError::MissingNode(id));
        }
    }
    let original = graph
        .scene()
        .parent(control)
        .map(|p| p.to_string())
        .unwrap_or_default();

    let mut attrs = AttrBag::new();
    attrs.insert(ORIGINAL_PARENT_ATTR.into(), SceneValue::Str(original));
    let handle = graph.create_node(OVERDRIVER_TAG, attrs);
    graph.connect(handle, control, EdgeKind::Reference);
    graph.scene_mut().reparent(control, Some(driver));
    Ok(handle)
}

/// Restore the control's original parent and delete the overdriver node.
pub fn remove_overdriver<S: HostScene>(
    graph: &mut MetadataGraph<S>,
    overdriver: MetaHandle,
) -> Result<(), OverdriverError> {
    let control = graph
        .references(overdriver)
        .into_iter()
        .next()
        .ok_or(OverdriverError::NoControl)?;
    let original = graph
        .attr(overdriver, ORIGINAL_PARENT_ATTR)
        .as_ref()
        .and_then(SceneValue::as_str)
        .and_then(SceneNodeId::parse)
        .filter(|p| graph.scene().node_exists(*p));
    if graph.scene().node_exists(control) {
        graph.scene_mut().reparent(control, original);
    }
    graph.delete_chain(overdriver);
    Ok(())
}
