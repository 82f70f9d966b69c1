//! Chain codec: `compress`/`decompress` over a sequence of operation trees.
//!
//! The wire format is CBOR (via `ciborium`, not `serde_ipld_dagcbor`) because
//! the semantic tag layer needs tags 6-9, and DAG-CBOR's encoder rejects any
//! tag but 42 (see `jacquard-common`'s `ipld-core`/`serde_ipld_dagcbor`
//! dependency, which this crate deliberately does not use here — noted in
//! SPEC_FULL.md §4.1/§9 and DESIGN.md). Each chain entry after the first is
//! stored as a diff against its predecessor's decoded (pre-semtag) tree;
//! decode replays the diffs with [`crate::patch::apply_diff`].

use std::collections::BTreeMap;

use ciborium::Value;
use smol_str::SmolStr;

use crate::diff::{Diff, Insertion, compute_diff};
use crate::error::{DiffError, PlcCodecError, PlcCodecErrorKind, Result};
use crate::patch::apply_diff;
use crate::semtag::{sem_compress, sem_decompress};
use crate::tree::{Leaf, TaggedPayload, Tree, canonicalize};

const KEY_UPDATES: &str = "u";
const KEY_DELETES: &str = "d";
const KEY_INSERTS: &str = "i";
const KEY_PREPENDS: &str = "p";

/// Encode a chain of operation trees into a single binary blob.
///
/// The wire format is a flat binary-object sequence
/// `[full_tree, diff_1, ..., diff_{N-1}]` (spec §6): the first operation
/// stored whole (semantically tagged), followed by one diff record per
/// subsequent operation. Every subsequent operation is diffed against the
/// previous operation's *un-tagged* decoded tree (CODEC-1: the semantic tag
/// layer is applied once, to the reconstructed trees at decode time, not
/// per-diff).
pub fn compress(ops: &[Tree]) -> Result<Vec<u8>> {
    let Some(first) = ops.first() else {
        return encode_value(&Value::Array(vec![]));
    };

    let mut first_canon = first.clone();
    canonicalize(&mut first_canon);

    let mut diffs = Vec::with_capacity(ops.len().saturating_sub(1));
    let mut prev = first_canon.clone();
    for op in &ops[1..] {
        let mut next_canon = op.clone();
        canonicalize(&mut next_canon);
        let diff = compute_diff(&prev, &next_canon);
        diffs.push(diff_to_value(&diff));
        prev = next_canon;
    }

    let first_tagged = sem_compress(first_canon);
    let mut entries = Vec::with_capacity(diffs.len() + 1);
    entries.push(tree_to_value(&first_tagged));
    entries.extend(diffs);
    encode_value(&Value::Array(entries))
}

/// Decode a blob produced by [`compress`] back into the chain of operation
/// trees (RT-1: `decompress(compress(ops)) == ops`, up to CAN-1
/// canonicalization of map key order).
pub fn decompress(blob: &[u8]) -> Result<Vec<Tree>> {
    let root: Value = ciborium::de::from_reader(blob)
        .map_err(|e| PlcCodecError::new(PlcCodecErrorKind::EncodingFault, Some(Box::new(e))))?;

    let Value::Array(mut entries) = root else {
        return Err(PlcCodecError::encoding_fault("root is not an array"));
    };
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let first_tagged = value_to_tree(&entries.remove(0))?;
    let first = sem_decompress(first_tagged)?;

    let mut ops = Vec::with_capacity(entries.len() + 1);
    ops.push(first.clone());

    let mut prev_canon = first;
    canonicalize(&mut prev_canon);
    for (i, diff_val) in entries.iter().enumerate() {
        let diff = value_to_diff(diff_val)?;
        let next = apply_diff(&prev_canon, &diff).map_err(|e| {
            PlcCodecError::new(PlcCodecErrorKind::ChainIntegrityFault, Some(Box::new(e)))
                .with_context(format!("reconstructing operation {} of the chain", i + 1))
        })?;
        ops.push(next.clone());
        prev_canon = next;
    }

    Ok(ops)
}

fn encode_value(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| PlcCodecError::new(PlcCodecErrorKind::EncodingFault, Some(Box::new(e))))?;
    Ok(buf)
}

fn text_key(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn value_as_text(v: &Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s.clone()),
        _ => None,
    }
}

// --- Tree <-> ciborium::Value -------------------------------------------

fn tree_to_value(tree: &Tree) -> Value {
    match tree {
        Tree::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (Value::Text(k.to_string()), tree_to_value(v)))
                .collect(),
        ),
        Tree::Sequence(elems) => Value::Array(elems.iter().map(tree_to_value).collect()),
        Tree::Leaf(leaf) => leaf_to_value(leaf),
    }
}

fn leaf_to_value(leaf: &Leaf) -> Value {
    match leaf {
        Leaf::Text(s) => Value::Text(s.to_string()),
        Leaf::Bytes(b) => Value::Bytes(b.to_vec()),
        Leaf::Int(i) => Value::Integer((*i).into()),
        Leaf::Double(d) => Value::Float(*d),
        Leaf::Bool(b) => Value::Bool(*b),
        Leaf::Null => Value::Null,
        Leaf::Tagged(tag, payload) => {
            let inner = match payload {
                TaggedPayload::Bytes(b) => Value::Bytes(b.to_vec()),
                TaggedPayload::Text(s) => Value::Text(s.to_string()),
            };
            Value::Tag((*tag).into(), Box::new(inner))
        }
    }
}

fn value_to_tree(value: &Value) -> Result<Tree> {
    match value {
        Value::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let key = value_as_text(k)
                    .ok_or_else(|| PlcCodecError::encoding_fault("map key is not text"))?;
                out.push((SmolStr::new(key), value_to_tree(v)?));
            }
            Ok(Tree::Map(out))
        }
        Value::Array(elems) => {
            let mut out = Vec::with_capacity(elems.len());
            for e in elems {
                out.push(value_to_tree(e)?);
            }
            Ok(Tree::Sequence(out))
        }
        Value::Text(s) => Ok(Tree::Leaf(Leaf::Text(SmolStr::new(s)))),
        Value::Bytes(b) => Ok(Tree::Leaf(Leaf::Bytes(b.clone().into()))),
        Value::Integer(i) => {
            let v: i64 = (*i)
                .try_into()
                .map_err(|_| PlcCodecError::encoding_fault("integer out of i64 range"))?;
            Ok(Tree::Leaf(Leaf::Int(v)))
        }
        Value::Float(f) => Ok(Tree::Leaf(Leaf::Double(*f))),
        Value::Bool(b) => Ok(Tree::Leaf(Leaf::Bool(*b))),
        Value::Null => Ok(Tree::Leaf(Leaf::Null)),
        Value::Tag(tag, inner) => {
            let tag = u8::try_from(*tag)
                .map_err(|_| PlcCodecError::encoding_fault("tag out of range 0-255"))?;
            let payload = match inner.as_ref() {
                Value::Bytes(b) => TaggedPayload::Bytes(b.clone().into()),
                Value::Text(s) => TaggedPayload::Text(SmolStr::new(s)),
                _ => {
                    return Err(PlcCodecError::encoding_fault(
                        "unsupported tagged payload shape",
                    ));
                }
            };
            Ok(Tree::Leaf(Leaf::Tagged(tag, payload)))
        }
        _ => Err(PlcCodecError::encoding_fault("unsupported CBOR value kind")),
    }
}

// --- Diff <-> ciborium::Value --------------------------------------------

/// Encode `diff` as a map containing only its non-empty fields (spec §6: "a
/// record whose keys are present only when their field is non-empty"). A
/// no-op diff therefore encodes as an empty map, matching SIZE-1.
fn diff_to_value(diff: &Diff) -> Value {
    let mut fields = Vec::with_capacity(4);

    if !diff.updates.is_empty() {
        let updates: Vec<Value> = diff
            .updates
            .iter()
            .map(|(idx, tree)| {
                Value::Array(vec![Value::Integer((*idx).into()), tree_to_value(tree)])
            })
            .collect();
        fields.push((text_key(KEY_UPDATES), Value::Array(updates)));
    }

    if !diff.deletes.is_empty() {
        let deletes: Vec<Value> = diff
            .deletes
            .iter()
            .map(|idx| Value::Integer((*idx).into()))
            .collect();
        fields.push((text_key(KEY_DELETES), Value::Array(deletes)));
    }

    if !diff.inserts.is_empty() {
        // Flattened [container_index, value] pairs, one per insertion, with
        // the index repeated across entries that share a container.
        let inserts: Vec<Value> = diff
            .inserts
            .iter()
            .flat_map(|(idx, items)| {
                items.iter().map(move |item| {
                    Value::Array(vec![
                        Value::Integer((*idx).into()),
                        insertion_to_value(item),
                    ])
                })
            })
            .collect();
        fields.push((text_key(KEY_INSERTS), Value::Array(inserts)));
    }

    if !diff.prepends.is_empty() {
        let prepends: Vec<Value> = diff
            .prepends
            .iter()
            .flat_map(|(idx, items)| {
                items.iter().map(move |item| {
                    Value::Array(vec![Value::Integer((*idx).into()), tree_to_value(item)])
                })
            })
            .collect();
        fields.push((text_key(KEY_PREPENDS), Value::Array(prepends)));
    }

    Value::Map(fields)
}

fn insertion_to_value(ins: &Insertion) -> Value {
    match ins {
        Insertion::MapEntry((k, v)) => {
            Value::Array(vec![Value::Text(k.to_string()), tree_to_value(v)])
        }
        Insertion::SeqElement(v) => tree_to_value(v),
    }
}

fn value_to_diff(value: &Value) -> Result<Diff> {
    let Value::Map(entries) = value else {
        return Err(PlcCodecError::encoding_fault("diff entry is not a map"));
    };
    let mut fields: BTreeMap<String, &Value> = BTreeMap::new();
    for (k, v) in entries {
        if let Some(key) = value_as_text(k) {
            fields.insert(key, v);
        }
    }

    let mut diff = Diff::default();

    if let Some(Value::Array(arr)) = fields.get(KEY_UPDATES) {
        for item in arr {
            let Value::Array(pair) = item else {
                return Err(PlcCodecError::encoding_fault("malformed update entry"));
            };
            let [idx_v, tree_v] = pair.as_slice() else {
                return Err(PlcCodecError::encoding_fault("malformed update entry"));
            };
            let idx = value_as_index(idx_v)?;
            diff.updates.insert(idx, value_to_tree(tree_v)?);
        }
    }

    if let Some(Value::Array(arr)) = fields.get(KEY_DELETES) {
        for item in arr {
            diff.deletes.insert(value_as_index(item)?);
        }
    }

    if let Some(Value::Array(arr)) = fields.get(KEY_INSERTS) {
        for item in arr {
            let Value::Array(pair) = item else {
                return Err(PlcCodecError::encoding_fault("malformed insert entry"));
            };
            let [idx_v, val_v] = pair.as_slice() else {
                return Err(PlcCodecError::encoding_fault("malformed insert entry"));
            };
            let idx = value_as_index(idx_v)?;
            let insertion = value_to_insertion(val_v, idx)?;
            diff.inserts.entry(idx).or_default().push(insertion);
        }
    }

    if let Some(Value::Array(arr)) = fields.get(KEY_PREPENDS) {
        for item in arr {
            let Value::Array(pair) = item else {
                return Err(PlcCodecError::encoding_fault("malformed prepend entry"));
            };
            let [idx_v, val_v] = pair.as_slice() else {
                return Err(PlcCodecError::encoding_fault("malformed prepend entry"));
            };
            let idx = value_as_index(idx_v)?;
            diff.prepends
                .entry(idx)
                .or_default()
                .push(value_to_tree(val_v)?);
        }
    }

    Ok(diff)
}

fn value_as_index(v: &Value) -> Result<u32> {
    let Value::Integer(i) = v else {
        return Err(PlcCodecError::encoding_fault("index is not an integer"));
    };
    let i: i64 = (*i)
        .try_into()
        .map_err(|_| PlcCodecError::encoding_fault("index out of range"))?;
    u32::try_from(i).map_err(|_| PlcCodecError::encoding_fault("negative index"))
}

fn value_to_insertion(v: &Value, container_idx: u32) -> Result<Insertion> {
    match v {
        Value::Array(pair) if pair.len() == 2 && matches!(pair[0], Value::Text(_)) => {
            let Value::Text(k) = &pair[0] else {
                unreachable!()
            };
            Ok(Insertion::MapEntry((
                SmolStr::new(k),
                value_to_tree(&pair[1])?,
            )))
        }
        other => {
            let tree = value_to_tree(other).map_err(|_| {
                PlcCodecError::from(DiffError::MalformedInsert {
                    index: container_idx,
                })
            })?;
            Ok(Insertion::SeqElement(tree))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use smol_str::SmolStr;

    fn map(entries: &[(&str, Tree)]) -> Tree {
        Tree::Map(
            entries
                .iter()
                .map(|(k, v)| (SmolStr::new(*k), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn empty_chain_round_trips() {
        let blob = compress(&[]).unwrap();
        let ops = decompress(&blob).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn single_op_round_trips() {
        let op = map(&[("rotationKeys", Tree::Sequence(vec![Tree::text("key1")]))]);
        let blob = compress(std::slice::from_ref(&op)).unwrap();
        let ops = decompress(&blob).unwrap();
        assert_eq!(ops.len(), 1);
        let mut expected = op;
        canonicalize(&mut expected);
        let mut got = ops[0].clone();
        canonicalize(&mut got);
        assert_eq!(got, expected);
    }

    #[test]
    fn multi_op_chain_round_trips() {
        let op1 = map(&[("n", Tree::int(1)), ("k", Tree::text("a"))]);
        let op2 = map(&[("n", Tree::int(1)), ("k", Tree::text("b"))]);
        let op3 = map(&[
            ("n", Tree::int(2)),
            ("k", Tree::text("b")),
            ("extra", Tree::Sequence(vec![Tree::int(1), Tree::int(2)])),
        ]);
        let ops = vec![op1, op2, op3];
        let blob = compress(&ops).unwrap();
        let decoded = decompress(&blob).unwrap();
        assert_eq!(decoded.len(), ops.len());
        for (mut got, mut expected) in decoded.into_iter().zip(ops) {
            canonicalize(&mut got);
            canonicalize(&mut expected);
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn semantic_tags_survive_round_trip() {
        let raw_key = vec![0xEDu8, 0x01, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let did_key = format!(
            "did:key:{}",
            multibase::encode(multibase::Base::Base58Btc, &raw_key)
        );
        let op = map(&[("signer", Tree::text(did_key.as_str()))]);
        let blob = compress(std::slice::from_ref(&op)).unwrap();
        let decoded = decompress(&blob).unwrap();
        assert_eq!(decoded[0], op);
        // The on-wire form must actually be tagged, not a plain text string.
        let tagged_first = sem_compress({
            let mut t = op.clone();
            canonicalize(&mut t);
            t
        });
        let value = tree_to_value(&tagged_first);
        let Value::Map(entries) = &value else {
            panic!()
        };
        let (_, signer_val) = &entries[0];
        assert!(matches!(signer_val, Value::Tag(8, _)));
    }

    #[test]
    fn malformed_blob_errors() {
        let err = decompress(&[0xff, 0xff, 0xff]);
        assert!(err.is_err());
    }

    #[test]
    fn wire_root_is_a_flat_array_not_a_map() {
        let op1 = map(&[("n", Tree::int(1))]);
        let op2 = map(&[("n", Tree::int(2))]);
        let blob = compress(&[op1, op2]).unwrap();
        let root: Value = ciborium::de::from_reader(blob.as_slice()).unwrap();
        let Value::Array(entries) = root else {
            panic!("expected root to be an array, got {root:?}");
        };
        // first_tree, diff_1
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn empty_chain_encodes_as_empty_array() {
        let blob = compress(&[]).unwrap();
        let root: Value = ciborium::de::from_reader(blob.as_slice()).unwrap();
        assert_eq!(root, Value::Array(vec![]));
    }

    #[test]
    fn no_op_diff_encodes_as_empty_map() {
        let op = map(&[("n", Tree::int(1))]);
        let blob = compress(&[op.clone(), op]).unwrap();
        let root: Value = ciborium::de::from_reader(blob.as_slice()).unwrap();
        let Value::Array(entries) = root else {
            panic!("expected array root");
        };
        assert_eq!(entries[1], Value::Map(vec![]));
    }

    #[test]
    fn diff_map_omits_empty_fields() {
        let mut diff = Diff::default();
        diff.deletes.insert(3);
        let value = diff_to_value(&diff);
        let Value::Map(entries) = value else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, text_key(KEY_DELETES));
    }

    #[test]
    fn multiple_inserts_at_same_index_flatten_to_separate_pairs() {
        let mut diff = Diff::default();
        diff.inserts.insert(
            0,
            vec![
                Insertion::SeqElement(Tree::int(1)),
                Insertion::SeqElement(Tree::int(2)),
            ],
        );
        let value = diff_to_value(&diff);
        let Value::Map(fields) = &value else {
            panic!("expected map");
        };
        let (_, Value::Array(inserts)) = &fields[0] else {
            panic!("expected array");
        };
        // Two insertions at index 0 become two separate [idx, value] pairs,
        // not one [idx, [v1, v2]] entry.
        assert_eq!(inserts.len(), 2);
        for entry in inserts {
            let Value::Array(pair) = entry else {
                panic!("expected pair");
            };
            assert_eq!(pair[0], Value::Integer(0.into()));
        }

        let round_tripped = value_to_diff(&value).unwrap();
        assert_eq!(round_tripped, diff);
    }
}
