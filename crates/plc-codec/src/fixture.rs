//! Fixture loader: turns a `serde_json::Value` into a [`Tree`].
//!
//! Grounded on `jacquard_common::types::value::Data::from_json`'s recursive
//! object/array/scalar conversion. Unlike that function, this loader does
//! not attempt to detect did:/at://-prefixed strings or base64 payloads —
//! that's the semantic tag layer's job, run separately over the decoded
//! tree by [`crate::semtag::sem_compress`]. This module is an external
//! collaborator (spec.md §1 item 5): it exists so tests and the CLI can
//! build [`Tree`]s from ordinary JSON fixtures, not part of the core codec.

use serde_json::Value as Json;
use smol_str::SmolStr;

use crate::error::{PlcCodecError, Result};
use crate::tree::{Leaf, TaggedPayload, Tree, canonicalize};

/// Convert a JSON value into a canonicalized [`Tree`] (CAN-1 map order).
///
/// JSON numbers that fit in `i64` become [`Leaf::Int`]; all other numbers
/// (floats, or integers too large for `i64`) become [`Leaf::Double`].
pub fn tree_from_json(value: &Json) -> Result<Tree> {
    let mut tree = json_to_tree(value)?;
    canonicalize(&mut tree);
    Ok(tree)
}

/// Parse a JSON document from a string and convert it to a [`Tree`].
pub fn tree_from_json_str(s: &str) -> Result<Tree> {
    let value: Json = serde_json::from_str(s)
        .map_err(|e| PlcCodecError::encoding_fault(format!("invalid JSON: {e}")))?;
    tree_from_json(&value)
}

fn json_to_tree(value: &Json) -> Result<Tree> {
    match value {
        Json::Null => Ok(Tree::Leaf(Leaf::Null)),
        Json::Bool(b) => Ok(Tree::Leaf(Leaf::Bool(*b))),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Tree::Leaf(Leaf::Int(i)))
            } else if let Some(f) = n.as_f64() {
                Ok(Tree::Leaf(Leaf::Double(f)))
            } else {
                Err(PlcCodecError::encoding_fault("number out of range"))
            }
        }
        Json::String(s) => Ok(Tree::Leaf(Leaf::Text(SmolStr::new(s)))),
        Json::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(json_to_tree(item)?);
            }
            Ok(Tree::Sequence(out))
        }
        Json::Object(map) => {
            let mut out = Vec::with_capacity(map.len());
            for (k, v) in map {
                out.push((SmolStr::new(k), json_to_tree(v)?));
            }
            Ok(Tree::Map(out))
        }
    }
}

/// Convert a [`Tree`] back into a `serde_json::Value`, for callers (such as
/// the CLI) that want to inspect a decoded chain as ordinary JSON.
///
/// [`Leaf::Bytes`] and [`Leaf::Tagged`] have no lossless JSON representation
/// and are rendered as base64 strings; round-tripping through this function
/// is therefore one-way, unlike [`tree_from_json`].
pub fn tree_to_json(tree: &Tree) -> Json {
    use base64::Engine;
    match tree {
        Tree::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), tree_to_json(v)))
                .collect(),
        ),
        Tree::Sequence(elems) => Json::Array(elems.iter().map(tree_to_json).collect()),
        Tree::Leaf(Leaf::Text(s)) => Json::String(s.to_string()),
        Tree::Leaf(Leaf::Int(i)) => Json::Number((*i).into()),
        Tree::Leaf(Leaf::Double(d)) => serde_json::Number::from_f64(*d)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Tree::Leaf(Leaf::Bool(b)) => Json::Bool(*b),
        Tree::Leaf(Leaf::Null) => Json::Null,
        Tree::Leaf(Leaf::Bytes(b)) => {
            Json::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        Tree::Leaf(Leaf::Tagged(_, TaggedPayload::Bytes(b))) => {
            Json::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        Tree::Leaf(Leaf::Tagged(_, TaggedPayload::Text(s))) => Json::String(s.to_string()),
    }
}
