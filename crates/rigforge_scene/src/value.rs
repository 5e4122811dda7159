// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed attribute values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named, typed attribute bag on a scene node.
///
/// Equality is key/value based; insertion order is preserved for display but
/// does not affect comparison.
pub type AttrBag = IndexMap<String, SceneValue>;

/// A typed attribute value as the host persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneValue {
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Scalar
    Float(f64),
    /// String
    Str(String),
    /// Vector of three doubles (translation, rotation, scale)
    Double3([f64; 3]),
}

impl SceneValue {
    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Double3(_) => "double3",
        }
    }

    /// The value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The value as a scalar. Integers widen losslessly where possible.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as a double3, if it is one.
    pub fn as_double3(&self) -> Option<[f64; 3]> {
        match self {
            Self::Double3(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for SceneValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SceneValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SceneValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SceneValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for SceneValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<[f64; 3]> for SceneValue {
    fn from(v: [f64; 3]) -> Self {
        Self::Double3(v)
    }
}
