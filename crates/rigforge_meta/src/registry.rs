// SPDX-License-Identifier: MIT OR Apache-2.0
//! The tag-to-factory registry behind wrapper reconstruction.

use crate::entry::{MetaHandle, MetaNode};
use indexmap::IndexMap;

/// Constructs a typed wrapper for a metadata node.
pub type MetaFactory = fn(MetaHandle) -> Box<dyn MetaNode>;

/// String-tag to constructor map, split into public and hidden namespaces.
///
/// Persisted nodes store only a string tag; this indirection resolves it back
/// to a concrete implementation without a compiled reference, which is what
/// keeps the component and property sets open. The public namespace is what
/// UI layers enumerate; internal plumbing types (groups, controls, rig
/// joints) register hidden.
#[derive(Default)]
pub struct TypeRegistry {
    public: IndexMap<String, MetaFactory>,
    hidden: IndexMap<String, MetaFactory>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public type. Re-registering a tag replaces the factory.
    pub fn add(&mut self, name: &str, factory: MetaFactory) {
        if self.public.insert(name.to_string(), factory).is_some() {
            tracing::warn!(name, "re-registered public meta type, factory replaced");
        }
    }

    /// Register a hidden (internal-namespace) type.
    pub fn add_hidden(&mut self, name: &str, factory: MetaFactory) {
        if self.hidden.insert(name.to_string(), factory).is_some() {
            tracing::warn!(name, "re-registered hidden meta type, factory replaced");
        }
    }

    /// Resolve a public tag. With `all_registries` the hidden namespace is
    /// consulted as a fallback.
    pub fn get(&self, name: &str, all_registries: bool) -> Option<MetaFactory> {
        self.public.get(name).copied().or_else(|| {
            if all_registries {
                self.hidden.get(name).copied()
            } else {
                None
            }
        })
    }

    /// Resolve a hidden tag. With `all_registries` the public namespace is
    /// consulted as a fallback.
    pub fn get_hidden(&self, name: &str, all_registries: bool) -> Option<MetaFactory> {
        self.hidden.get(name).copied().or_else(|| {
            if all_registries {
                self.public.get(name).copied()
            } else {
                None
            }
        })
    }

    /// Public tags, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.public.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(MetaHandle);

    impl MetaNode for Probe {
        fn handle(&self) -> MetaHandle {
            self.0
        }
        fn type_tag(&self) -> &'static str {
            "test.probe"
        }
    }

    fn probe_factory(h: MetaHandle) -> Box<dyn MetaNode> {
        Box::new(Probe(h))
    }

    #[test]
    fn test_namespaces_are_separate_without_fallback() {
        let mut reg = TypeRegistry::new();
        reg.add_hidden("test.probe", probe_factory);
        assert!(reg.get("test.probe", false).is_none());
        assert!(reg.get("test.probe", true).is_some());
        assert!(reg.get_hidden("test.probe", false).is_some());
    }

    #[test]
    fn test_unknown_tag_resolves_to_none() {
        let reg = TypeRegistry::new();
        assert!(reg.get("never.registered", true).is_none());
    }
}
