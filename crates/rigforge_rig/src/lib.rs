// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig components for `RigForge`: kinds, lifecycle, properties, add-ons, and
//! the JSON configuration contract.
//!
//! A [`RigComponent`] walks one skeleton region through the state machine
//! `Unbuilt -> Built -> Attached -> (Removed | Switched)`, persisting its
//! structure through `rigforge_meta` and routing expensive motion transfer
//! through the `rigforge_bake` queue. Everything a rig does is recoverable
//! from the scene alone; this crate holds no state of its own beyond the
//! in-flight state machines.

pub mod addons;
pub mod baking;
pub mod config;
pub mod kinds;
pub mod lifecycle;
pub mod properties;
pub mod region;

pub use addons::{apply_overdriver, remove_overdriver, SpaceOverdriver, OVERDRIVER_TAG};
pub use baking::{bake_params, bake_transforms, BAKE_KIND};
pub use config::{create_json_dictionary, rig_from_json, ConfigError, ConfigReport};
pub use kinds::{kind_by_tag, RigComponentKind, FK_TAG, IK_TAG, REVERSE_FOOT_TAG, RIBBON_TAG};
pub use lifecycle::{LifecycleError, RigComponent, RigOptions, RigState, SpaceDriver};
pub use properties::{
    register_property_types, BakeDerivedCurveProperty, RegionTagProperty,
    ReparentGeometryProperty, StripAnimationProperty,
};
pub use region::{Side, SkeletonRegion};

use rigforge_meta::TypeRegistry;

/// Register every metadata type this crate and the base layer ship.
pub fn register_all(registry: &mut TypeRegistry) {
    rigforge_meta::register_base_types(registry);
    register_property_types(registry);
    addons::register_addon_types(registry);
}
