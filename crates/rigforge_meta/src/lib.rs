// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed metadata graph for `RigForge`.
//!
//! Rig structure is persisted *inside* the host's own scene graph: every
//! metadata node is one native scene node carrying a `meta_type` string
//! attribute, a typed attribute bag, and relationship edges realized as
//! attribute fan-in connections. This is schema-on-read: the scene stores
//! only string tags, and [`TypeRegistry`] resolves them back to concrete
//! wrapper implementations on load. A tag that no longer resolves leaves the
//! node inert - logged, never an error - so scene loading tolerates version
//! drift across tool releases.

pub mod component;
pub mod entry;
pub mod graph;
pub mod property;
pub mod registry;

pub use component::{
    register_base_types, ComponentEntry, SubNetwork, COMPONENT_TAG, CONTROL_TAG,
    ORDERED_INDEX_ATTR, RIG_JOINT_TAG,
};
pub use entry::{MetaHandle, MetaNode, META_TYPE_ATTR};
pub use graph::{collect_chain, connect_on_scene, EdgeKind, MetadataGraph};
pub use property::{
    attach_property, run_stage, ActContext, ActError, ActStage, AttachError, PropertyNode,
    StageReport,
};
pub use registry::{MetaFactory, TypeRegistry};
