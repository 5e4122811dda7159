// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic parameter fingerprints, the queue's dedup key.

use indexmap::IndexMap;
use rigforge_scene::SceneValue;

/// A bake request's parameter bag. Insertion order never affects the
/// fingerprint.
pub type ParamBag = IndexMap<String, SceneValue>;

// 64-bit FNV-1a. The std hasher is not guaranteed stable across releases and
// fingerprints are compared across independently-built plugin components, so
// the hash is pinned here.
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, Copy)]
struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(FNV_OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 ^= u64::from(*b);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_str(&mut self, s: &str) {
        self.write(s.as_bytes());
        // Length-prefix-free separator so "ab"+"c" != "a"+"bc".
        self.write(&[0xff]);
    }

    fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    fn finish(self) -> u64 {
        self.0
    }
}

fn write_value(h: &mut Fnv1a, value: &SceneValue) {
    match value {
        SceneValue::Bool(b) => {
            h.write(&[0x01, u8::from(*b)]);
        }
        SceneValue::Int(i) => {
            h.write(&[0x02]);
            h.write(&i.to_le_bytes());
        }
        SceneValue::Float(f) => {
            h.write(&[0x03]);
            h.write_f64(*f);
        }
        SceneValue::Str(s) => {
            h.write(&[0x04]);
            h.write_str(s);
        }
        SceneValue::Double3(v) => {
            h.write(&[0x05]);
            for c in v {
                h.write_f64(*c);
            }
        }
    }
}

/// Fingerprint an operation kind plus its canonicalized parameter bag.
///
/// Two bags with equal key/value sets fingerprint equally whatever their
/// insertion order. The `kind` string is part of the hash so two different
/// operations with coincidentally identical parameters never merge.
pub fn fingerprint(kind: &str, params: &ParamBag) -> u64 {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort_unstable();

    let mut h = Fnv1a::new();
    h.write_str(kind);
    for key in keys {
        h.write_str(key);
        if let Some(value) = params.get(key) {
            write_value(&mut h, value);
        }
    }
    h.finish()
}
