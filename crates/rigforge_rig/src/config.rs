// SPDX-License-Identifier: MIT OR Apache-2.0
//! The JSON rig-configuration contract.
//!
//! A rig file is `{ "rigging": {side: {region: component}}, "addons":
//! {side: {region: {key: addon}}} }`. Rebuilding follows the same
//! schema-drift policy as metadata wrapping: an entry whose type, side, or
//! region no longer resolves is logged and skipped, never an error, and a
//! component that fails to build is absorbed so its siblings still load.

use crate::addons::{apply_overdriver, OVERDRIVER_TAG};
use crate::kinds::kind_by_tag;
use crate::lifecycle::{RigComponent, RigOptions};
use crate::region::{Side, SkeletonRegion};
use rigforge_bake::BakeQueue;
use rigforge_meta::{
    ComponentEntry, MetaHandle, MetadataGraph, COMPONENT_TAG, META_TYPE_ATTR,
};
use rigforge_scene::{HostScene, SceneNodeId, SceneValue};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Entry attributes that describe scene wiring rather than configuration.
const NON_CONFIG_ATTRS: [&str; 4] = [META_TYPE_ATTR, "side", "region", "skeleton_order"];

/// The document is structurally not a rig configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A section that must be a JSON object is something else
    #[error("malformed rig configuration: {0}")]
    Malformed(&'static str),
}

/// What a configuration load did and skipped.
#[derive(Default)]
pub struct ConfigReport {
    /// Components built, in document order.
    pub built: Vec<RigComponent>,
    /// Entries skipped for schema drift (unknown type, side, or region).
    pub skipped: Vec<String>,
    /// Absorbed per-component build failures.
    pub failures: Vec<String>,
}

/// Serialize every component and overdriver in the graph to the rig
/// configuration shape.
pub fn create_json_dictionary<S: HostScene>(graph: &MetadataGraph<S>) -> Value {
    let mut rigging = Map::new();
    for handle in graph.get_all_of_type(COMPONENT_TAG) {
        let entry = ComponentEntry::from_handle(handle);
        let (Some(side), Some(region)) = (entry.side(graph), entry.region(graph)) else {
            continue;
        };
        let mut component = Map::new();
        if let Some(bag) = graph.scene().attrs(handle.scene_node()) {
            for (key, value) in bag {
                if NON_CONFIG_ATTRS.contains(&key.as_str()) {
                    continue;
                }
                let json_key = if key == "component_type" { "type" } else { &key };
                component.insert(json_key.to_string(), value_to_json(&value));
            }
        }
        section_entry(&mut rigging, &side)
            .insert(region, Value::Object(component));
    }

    let mut addons = Map::new();
    for handle in graph.get_all_of_type(OVERDRIVER_TAG) {
        let Some(control) = graph.references(handle).into_iter().next() else {
            continue;
        };
        let Some(component) = component_of_control(graph, control) else {
            continue;
        };
        let (Some(side), Some(region)) = (component.side(graph), component.region(graph)) else {
            continue;
        };
        let key = graph
            .scene()
            .node_name(control)
            .unwrap_or_else(|| control.to_string());
        let mut addon = Map::new();
        addon.insert("type".into(), Value::String(OVERDRIVER_TAG.into()));
        addon.insert("control".into(), Value::String(control.to_string()));
        if let Some(driver) = graph.scene().parent(control) {
            addon.insert("driver".into(), Value::String(driver.to_string()));
        }
        if let Some(bag) = graph.scene().attrs(handle.scene_node()) {
            for (attr_key, value) in bag {
                if attr_key != META_TYPE_ATTR {
                    addon.insert(attr_key, value_to_json(&value));
                }
            }
        }
        section_entry(section_entry(&mut addons, &side), &region)
            .insert(key, Value::Object(addon));
    }

    json!({ "rigging": rigging, "addons": addons })
}

/// Rebuild the rig described by `value` onto `regions`.
///
/// `regions` maps side/region names back to live skeleton joints; an entry
/// with no matching region is schema drift and is skipped with a warning.
pub fn rig_from_json<S: HostScene>(
    graph: &mut MetadataGraph<S>,
    queue: &mut BakeQueue,
    value: &Value,
    regions: &[SkeletonRegion],
    options: &RigOptions,
) -> Result<ConfigReport, ConfigError> {
    let root = value
        .as_object()
        .ok_or(ConfigError::Malformed("document root is not an object"))?;
    let mut report = ConfigReport::default();

    if let Some(rigging) = root.get("rigging") {
        let rigging = rigging
            .as_object()
            .ok_or(ConfigError::Malformed("`rigging` is not an object"))?;
        for (side_key, by_region) in rigging {
            let Some(side) = Side::parse(side_key) else {
                skip(&mut report, format!("unknown side `{side_key}`"));
                continue;
            };
            let Some(by_region) = by_region.as_object() else {
                skip(&mut report, format!("side `{side_key}` is not an object"));
                continue;
            };
            for (region_key, component) in by_region {
                build_component(
                    graph,
                    queue,
                    &mut report,
                    side,
                    region_key,
                    component,
                    regions,
                    options,
                );
            }
        }
    }

    if let Some(addons) = root.get("addons") {
        let addons = addons
            .as_object()
            .ok_or(ConfigError::Malformed("`addons` is not an object"))?;
        for by_region in addons.values().filter_map(Value::as_object) {
            for by_key in by_region.values().filter_map(Value::as_object) {
                for (key, addon) in by_key {
                    apply_addon(graph, &mut report, key, addon);
                }
            }
        }
    }

    Ok(report)
}

fn build_component<S: HostScene>(
    graph: &mut MetadataGraph<S>,
    queue: &mut BakeQueue,
    report: &mut ConfigReport,
    side: Side,
    region_key: &str,
    component: &Value,
    regions: &[SkeletonRegion],
    options: &RigOptions,
) {
    let tag = component
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if kind_by_tag(tag).is_none() {
        skip(
            report,
            format!("{side}_{region_key}: unresolved component type `{tag}`"),
        );
        return;
    }
    let Some(region) = regions
        .iter()
        .find(|r| r.side == side && r.name == region_key)
        .cloned()
    else {
        skip(report, format!("no skeleton region for {side}_{region_key}"));
        return;
    };

    // Resolvable by the check above.
    let Ok(mut built) = RigComponent::from_tag(tag) else {
        return;
    };
    match built.rig(graph, queue, region, options) {
        Ok(()) => report.built.push(built),
        Err(e) => {
            tracing::error!(side = %side, region = region_key, "component build failed: {e}");
            report.failures.push(format!("{side}_{region_key}: {e}"));
        }
    }
}

fn apply_addon<S: HostScene>(
    graph: &mut MetadataGraph<S>,
    report: &mut ConfigReport,
    key: &str,
    addon: &Value,
) {
    let tag = addon.get("type").and_then(Value::as_str).unwrap_or_default();
    if tag != OVERDRIVER_TAG {
        skip(report, format!("{key}: unresolved addon type `{tag}`"));
        return;
    }
    let node = |field: &str| {
        addon
            .get(field)
            .and_then(Value::as_str)
            .and_then(SceneNodeId::parse)
            .filter(|id| graph.scene().node_exists(*id))
    };
    let (Some(control), Some(driver)) = (node("control"), node("driver")) else {
        skip(report, format!("{key}: addon endpoints not in scene"));
        return;
    };
    if let Err(e) = apply_overdriver(graph, control, driver) {
        report.failures.push(format!("{key}: {e}"));
    }
}

fn skip(report: &mut ConfigReport, why: String) {
    tracing::warn!("{why}; entry skipped");
    report.skipped.push(why);
}

/// The component a control belongs to, via its owning sub-network group.
fn component_of_control<S: HostScene>(
    graph: &MetadataGraph<S>,
    control: SceneNodeId,
) -> Option<ComponentEntry> {
    let group = graph.get_upstream_first(MetaHandle(control), "")?;
    let entry = graph.get_upstream_first(group, COMPONENT_TAG)?;
    Some(ComponentEntry::from_handle(entry))
}

fn section_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    match map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(section) => section,
        _ => unreachable!("sections are inserted as objects"),
    }
}

/// [`SceneValue`] to JSON. Non-finite floats become `null`.
pub fn value_to_json(value: &SceneValue) -> Value {
    match value {
        SceneValue::Bool(b) => Value::Bool(*b),
        SceneValue::Int(i) => Value::from(*i),
        SceneValue::Float(f) => Value::from(*f),
        SceneValue::Str(s) => Value::String(s.clone()),
        SceneValue::Double3(v) => json!(v),
    }
}

/// JSON to [`SceneValue`]. `None` for shapes with no attribute encoding.
pub fn json_to_value(value: &Value) -> Option<SceneValue> {
    match value {
        Value::Bool(b) => Some(SceneValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SceneValue::Int)
            .or_else(|| n.as_f64().map(SceneValue::Float)),
        Value::String(s) => Some(SceneValue::Str(s.clone())),
        Value::Array(items) if items.len() == 3 => {
            let mut v = [0.0; 3];
            for (slot, item) in v.iter_mut().zip(items) {
                *slot = item.as_f64()?;
            }
            Some(SceneValue::Double3(v))
        }
        _ => None,
    }
}
