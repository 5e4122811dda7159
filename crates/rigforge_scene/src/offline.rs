// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory [`HostScene`] implementation.
//!
//! `OfflineScene` backs headless batch runs and the test suite. Its constraint
//! model is deliberately trivial - a driven node takes its driver's resolved
//! transform - because the core only orchestrates the host's solvers, it never
//! reimplements them.

use crate::host::{HostScene, Transform3};
use crate::node::{ConstraintKind, SceneNodeId};
use crate::value::{AttrBag, SceneValue};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Transform channel names in bake order.
pub const TRANSFORM_CHANNELS: [&str; 9] =
    ["tx", "ty", "tz", "rx", "ry", "rz", "sx", "sy", "sz"];

// Constraint chains in a rig are short; this only guards against a cycle
// introduced by a broken caller.
const MAX_CONSTRAINT_DEPTH: u32 = 32;

#[derive(Debug, Clone, Default)]
struct NodeRecord {
    name: String,
    parent: Option<SceneNodeId>,
    attrs: AttrBag,
    curves: IndexMap<String, BTreeMap<i64, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttrLink {
    src: SceneNodeId,
    src_key_idx: usize,
    dst: SceneNodeId,
    dst_key_idx: usize,
}

#[derive(Debug, Clone, Copy)]
struct ConstraintRecord {
    driver: SceneNodeId,
    driven: SceneNodeId,
    kind: ConstraintKind,
}

/// In-memory host scene.
#[derive(Debug, Default)]
pub struct OfflineScene {
    nodes: IndexMap<SceneNodeId, NodeRecord>,
    // Link endpoints index into `link_keys` so AttrLink stays Copy.
    link_keys: Vec<String>,
    links: Vec<AttrLink>,
    constraints: IndexMap<SceneNodeId, ConstraintRecord>,
    autokey: bool,
    playback: (i64, i64),
    frame: i64,
}

impl OfflineScene {
    /// Create an empty scene with the default playback range of 1..=120.
    pub fn new() -> Self {
        Self {
            playback: (1, 120),
            frame: 1,
            ..Self::default()
        }
    }

    /// Set the playback range.
    pub fn set_playback_range(&mut self, start: i64, end: i64) {
        self.playback = (start, end);
    }

    /// Number of live nodes, constraint nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn key_idx(&mut self, key: &str) -> usize {
        match self.link_keys.iter().position(|k| k == key) {
            Some(i) => i,
            None => {
                self.link_keys.push(key.to_string());
                self.link_keys.len() - 1
            }
        }
    }

    fn find_key(&self, key: &str) -> Option<usize> {
        self.link_keys.iter().position(|k| k == key)
    }

    fn local_transform_at(&self, record: &NodeRecord, id: SceneNodeId, frame: i64) -> Transform3 {
        let mut values = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        for (i, channel) in TRANSFORM_CHANNELS.iter().enumerate() {
            if let Some(v) = self.sample(id, channel, frame) {
                values[i] = v;
            } else if let Some(v) = record.attrs.get(*channel).and_then(SceneValue::as_float) {
                values[i] = v;
            }
        }
        Transform3 {
            translate: [values[0], values[1], values[2]],
            rotate: [values[3], values[4], values[5]],
            scale: [values[6], values[7], values[8]],
        }
    }

    fn resolve_world(&self, id: SceneNodeId, frame: i64, depth: u32) -> Option<Transform3> {
        let record = self.nodes.get(&id)?;
        let local = self.local_transform_at(record, id, frame);
        if depth == 0 {
            return Some(local);
        }
        // Last constraint wins, matching host stacking behavior.
        let constraint = self
            .constraints
            .values()
            .filter(|c| c.driven == id)
            .next_back();
        let Some(constraint) = constraint else {
            return Some(local);
        };
        let driver = self.resolve_world(constraint.driver, frame, depth - 1)?;
        Some(match constraint.kind {
            ConstraintKind::Parent => driver,
            ConstraintKind::Point => Transform3 {
                translate: driver.translate,
                ..local
            },
            ConstraintKind::Orient => Transform3 {
                rotate: driver.rotate,
                ..local
            },
            // Aim and pole-vector solving stay in the host; offline they
            // leave the driven transform untouched.
            ConstraintKind::Aim | ConstraintKind::PoleVector => local,
        })
    }
}

impl HostScene for OfflineScene {
    fn create_node(&mut self, name: &str) -> SceneNodeId {
        let id = SceneNodeId::new();
        self.nodes.insert(
            id,
            NodeRecord {
                name: name.to_string(),
                ..NodeRecord::default()
            },
        );
        id
    }

    fn delete_nodes(&mut self, ids: &[SceneNodeId]) {
        for id in ids {
            self.nodes.shift_remove(id);
        }
        // A constraint whose endpoint died dies with it, node included.
        let dead: Vec<SceneNodeId> = self
            .constraints
            .iter()
            .filter(|(c_id, c)| {
                !self.nodes.contains_key(*c_id)
                    || !self.nodes.contains_key(&c.driver)
                    || !self.nodes.contains_key(&c.driven)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            self.constraints.shift_remove(id);
            self.nodes.shift_remove(id);
        }
        self.links
            .retain(|l| self.nodes.contains_key(&l.src) && self.nodes.contains_key(&l.dst));
        for record in self.nodes.values_mut() {
            if let Some(p) = record.parent {
                if ids.contains(&p) || dead.contains(&p) {
                    record.parent = None;
                }
            }
        }
    }

    fn node_exists(&self, id: SceneNodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn node_name(&self, id: SceneNodeId) -> Option<String> {
        self.nodes.get(&id).map(|r| r.name.clone())
    }

    fn reparent(&mut self, child: SceneNodeId, parent: Option<SceneNodeId>) {
        if let Some(record) = self.nodes.get_mut(&child) {
            record.parent = parent;
        }
    }

    fn parent(&self, id: SceneNodeId) -> Option<SceneNodeId> {
        self.nodes.get(&id).and_then(|r| r.parent)
    }

    fn set_attr(&mut self, id: SceneNodeId, key: &str, value: SceneValue) {
        if let Some(record) = self.nodes.get_mut(&id) {
            record.attrs.insert(key.to_string(), value);
        }
    }

    fn get_attr(&self, id: SceneNodeId, key: &str) -> Option<SceneValue> {
        self.nodes.get(&id)?.attrs.get(key).cloned()
    }

    fn attrs(&self, id: SceneNodeId) -> Option<AttrBag> {
        self.nodes.get(&id).map(|r| r.attrs.clone())
    }

    fn nodes_with_attr(&self, key: &str) -> Vec<SceneNodeId> {
        self.nodes
            .iter()
            .filter(|(_, r)| r.attrs.contains_key(key))
            .map(|(id, _)| *id)
            .collect()
    }

    fn connect_attr(&mut self, src: SceneNodeId, src_key: &str, dst: SceneNodeId, dst_key: &str) {
        let src_key_idx = self.key_idx(src_key);
        let dst_key_idx = self.key_idx(dst_key);
        let link = AttrLink {
            src,
            src_key_idx,
            dst,
            dst_key_idx,
        };
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    fn disconnect_attr(
        &mut self,
        src: SceneNodeId,
        src_key: &str,
        dst: SceneNodeId,
        dst_key: &str,
    ) {
        let (Some(src_key_idx), Some(dst_key_idx)) = (self.find_key(src_key), self.find_key(dst_key))
        else {
            return;
        };
        self.links.retain(|l| {
            !(l.src == src
                && l.src_key_idx == src_key_idx
                && l.dst == dst
                && l.dst_key_idx == dst_key_idx)
        });
    }

    fn attr_sources(&self, dst: SceneNodeId, dst_key: &str) -> Vec<SceneNodeId> {
        let Some(dst_key_idx) = self.find_key(dst_key) else {
            return Vec::new();
        };
        self.links
            .iter()
            .filter(|l| l.dst == dst && l.dst_key_idx == dst_key_idx)
            .map(|l| l.src)
            .collect()
    }

    fn attr_destinations(&self, src: SceneNodeId, src_key: &str) -> Vec<SceneNodeId> {
        let Some(src_key_idx) = self.find_key(src_key) else {
            return Vec::new();
        };
        self.links
            .iter()
            .filter(|l| l.src == src && l.src_key_idx == src_key_idx)
            .map(|l| l.dst)
            .collect()
    }

    fn set_key(&mut self, id: SceneNodeId, channel: &str, frame: i64, value: f64) {
        if let Some(record) = self.nodes.get_mut(&id) {
            record
                .curves
                .entry(channel.to_string())
                .or_default()
                .insert(frame, value);
        }
    }

    fn sample(&self, id: SceneNodeId, channel: &str, frame: i64) -> Option<f64> {
        let record = self.nodes.get(&id)?;
        let curve = record.curves.get(channel)?;
        if curve.is_empty() {
            return None;
        }
        if let Some(v) = curve.get(&frame) {
            return Some(*v);
        }
        let before = curve.range(..frame).next_back();
        let after = curve.range(frame..).next();
        match (before, after) {
            (Some((f0, v0)), Some((f1, v1))) => {
                let t = (frame - f0) as f64 / (f1 - f0) as f64;
                Some(v0 + (v1 - v0) * t)
            }
            (Some((_, v)), None) | (None, Some((_, v))) => Some(*v),
            (None, None) => None,
        }
    }

    fn clear_keys(&mut self, id: SceneNodeId) {
        if let Some(record) = self.nodes.get_mut(&id) {
            record.curves.clear();
        }
    }

    fn keyed_frames(&self, id: SceneNodeId) -> Vec<i64> {
        let Some(record) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut frames: Vec<i64> = record
            .curves
            .values()
            .flat_map(|c| c.keys().copied())
            .collect();
        frames.sort_unstable();
        frames.dedup();
        frames
    }

    fn has_animation(&self, id: SceneNodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|r| r.curves.values().any(|c| !c.is_empty()))
    }

    fn world_transform_at(&self, id: SceneNodeId, frame: i64) -> Option<Transform3> {
        self.resolve_world(id, frame, MAX_CONSTRAINT_DEPTH)
    }

    fn set_world_transform(&mut self, id: SceneNodeId, xf: Transform3) {
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
            self.set_attr(id, channel, SceneValue::Float(value));
        }
    }

    fn constrain(
        &mut self,
        driver: SceneNodeId,
        driven: SceneNodeId,
        kind: ConstraintKind,
    ) -> SceneNodeId {
        let driven_name = self.node_name(driven).unwrap_or_default();
        let id = self.create_node(&format!("{driven_name}_{}", kind.suffix()));
        self.constraints.insert(
            id,
            ConstraintRecord {
                driver,
                driven,
                kind,
            },
        );
        id
    }

    fn constraints_on(&self, driven: SceneNodeId) -> Vec<SceneNodeId> {
        self.constraints
            .iter()
            .filter(|(_, c)| c.driven == driven)
            .map(|(id, _)| *id)
            .collect()
    }

    fn constraint_driver(&self, id: SceneNodeId) -> Option<SceneNodeId> {
        self.constraints.get(&id).map(|c| c.driver)
    }

    fn remove_constraint(&mut self, constraint: SceneNodeId) {
        self.constraints.shift_remove(&constraint);
        self.nodes.shift_remove(&constraint);
    }

    fn autokey_enabled(&self) -> bool {
        self.autokey
    }

    fn set_autokey(&mut self, enabled: bool) {
        self.autokey = enabled;
    }

    fn playback_range(&self) -> (i64, i64) {
        self.playback
    }

    fn current_frame(&self) -> i64 {
        self.frame
    }

    fn set_current_frame(&mut self, frame: i64) {
        self.frame = frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_interpolates_between_keys() {
        let mut scene = OfflineScene::new();
        let n = scene.create_node("a");
        scene.set_key(n, "tx", 0, 0.0);
        scene.set_key(n, "tx", 10, 10.0);
        assert_eq!(scene.sample(n, "tx", 5), Some(5.0));
        assert_eq!(scene.sample(n, "tx", 20), Some(10.0));
    }

    #[test]
    fn test_parent_constraint_drives_world_transform() {
        let mut scene = OfflineScene::new();
        let driver = scene.create_node("driver");
        let driven = scene.create_node("driven");
        scene.set_world_transform(driver, Transform3::at([1.0, 2.0, 3.0]));
        scene.constrain(driver, driven, ConstraintKind::Parent);
        let xf = scene.world_transform(driven).unwrap();
        assert_eq!(xf.translate, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_delete_nodes_drops_links_and_constraints() {
        let mut scene = OfflineScene::new();
        let a = scene.create_node("a");
        let b = scene.create_node("b");
        scene.connect_attr(a, "children", b, "parent");
        let c = scene.constrain(a, b, ConstraintKind::Point);
        scene.delete_nodes(&[a]);
        assert!(scene.attr_sources(b, "parent").is_empty());
        assert!(scene.constraints_on(b).is_empty());
        assert!(!scene.node_exists(c), "orphaned constraint node is dropped");
    }

    #[test]
    fn test_connect_attr_is_idempotent() {
        let mut scene = OfflineScene::new();
        let a = scene.create_node("a");
        let b = scene.create_node("b");
        scene.connect_attr(a, "children", b, "parent");
        scene.connect_attr(a, "children", b, "parent");
        assert_eq!(scene.attr_destinations(a, "children").len(), 1);
    }
}
