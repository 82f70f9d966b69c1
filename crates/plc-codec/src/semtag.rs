//! Semantic tag layer: bidirectional rewriting of recognized leaf string
//! shapes as tagged binary values.
//!
//! Grounded on `jacquard_common::types::crypto::PublicKey::decode` (multibase
//! decode for `did:key:`), `jacquard_common::types::value::decode_bytes`
//! (base64 leaf detection), and `jacquard_common::types::value::parse_string`
//! (the `at://` prefix branch) — this module reuses the same building-block
//! crates (`base64`, `multibase`) for the same string shapes, but stores the
//! full multibase-decoded bytes verbatim (tags 7 and 8 don't need to
//! interpret the multicodec prefix; the codec never inspects key/CID
//! internals, per spec.md §1).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use smol_str::SmolStr;

use crate::error::{Result, SemTagError};
use crate::tree::{Leaf, TaggedPayload, Tree};

/// Signature-shaped strings: 64 raw bytes under URL-safe base64, no padding.
pub const TAG_SIG: u8 = 6;
/// CID-shaped strings: `bafyrei` prefix, 59 chars, canonical multibase.
pub const TAG_CID: u8 = 7;
/// `did:key:` multibase-encoded public keys.
pub const TAG_DID_KEY: u8 = 8;
/// `at://` URIs.
pub const TAG_AT_URI: u8 = 9;

const CID_PREFIX: &str = "bafyrei";
const CID_STR_LEN: usize = 59;
const DID_KEY_PREFIX: &str = "did:key:";
const AT_URI_PREFIX: &str = "at://";
const SIG_STR_LEN: usize = 86;
const SIG_RAW_LEN: usize = 64;

/// Apply semantic tag compression to a single leaf string, if it matches a
/// recognized shape. Non-matching strings, and non-text leaves, pass
/// through unchanged.
pub fn compress_leaf(leaf: Leaf) -> Leaf {
    let Leaf::Text(s) = leaf else { return leaf };

    // Prefix-based rules first (did:key, at://, CID), then the length-86
    // base64 rule last, per spec.md §4.2's detection order.
    if let Some(suffix) = s.strip_prefix(DID_KEY_PREFIX) {
        if let Ok((_base, raw)) = multibase::decode(suffix) {
            return Leaf::Tagged(TAG_DID_KEY, TaggedPayload::Bytes(Bytes::from(raw)));
        }
    } else if let Some(suffix) = s.strip_prefix(AT_URI_PREFIX) {
        return Leaf::Tagged(TAG_AT_URI, TaggedPayload::Text(SmolStr::new(suffix)));
    } else if s.len() == CID_STR_LEN && s.starts_with(CID_PREFIX) {
        if let Ok((_base, raw)) = multibase::decode(s.as_str()) {
            return Leaf::Tagged(TAG_CID, TaggedPayload::Bytes(Bytes::from(raw)));
        }
    } else if s.len() == SIG_STR_LEN
        && let Ok(raw) = URL_SAFE_NO_PAD.decode(s.as_str())
        && raw.len() == SIG_RAW_LEN
    {
        return Leaf::Tagged(TAG_SIG, TaggedPayload::Bytes(Bytes::from(raw)));
    }

    Leaf::Text(s)
}

/// Inverse of [`compress_leaf`]. Unknown tags pass through unchanged
/// (future-compatible); malformed payloads are an [`crate::error::PlcCodecError`].
pub fn decompress_leaf(leaf: Leaf) -> Result<Leaf> {
    let Leaf::Tagged(tag, payload) = leaf else {
        return Ok(leaf);
    };
    match tag {
        TAG_SIG => {
            let TaggedPayload::Bytes(raw) = payload else {
                return Err(malformed(tag, "expected bytes payload"));
            };
            let s = URL_SAFE_NO_PAD.encode(&raw);
            Ok(Leaf::Text(SmolStr::new(s)))
        }
        TAG_CID => {
            let TaggedPayload::Bytes(raw) = payload else {
                return Err(malformed(tag, "expected bytes payload"));
            };
            let s = multibase::encode(multibase::Base::Base32Lower, &raw);
            Ok(Leaf::Text(SmolStr::new(s)))
        }
        TAG_DID_KEY => {
            let TaggedPayload::Bytes(raw) = payload else {
                return Err(malformed(tag, "expected bytes payload"));
            };
            let s = multibase::encode(multibase::Base::Base58Btc, &raw);
            Ok(Leaf::Text(SmolStr::new(format!("{DID_KEY_PREFIX}{s}"))))
        }
        TAG_AT_URI => {
            let TaggedPayload::Text(suffix) = payload else {
                return Err(malformed(tag, "expected text payload"));
            };
            Ok(Leaf::Text(SmolStr::new(format!("{AT_URI_PREFIX}{suffix}"))))
        }
        // Unknown tag: pass through unchanged, future-compatible.
        _ => Ok(Leaf::Tagged(tag, payload)),
    }
}

fn malformed(tag: u8, msg: &str) -> crate::error::PlcCodecError {
    SemTagError::MalformedPayload {
        tag,
        source: msg.to_string().into(),
    }
    .into()
}

/// Recursively apply semantic tag compression to every leaf string in a
/// tree. Idempotent: an already-tagged leaf is never re-tagged, since
/// [`compress_leaf`] only matches [`Leaf::Text`].
pub fn sem_compress(tree: Tree) -> Tree {
    match tree {
        Tree::Map(entries) => Tree::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, sem_compress(v)))
                .collect(),
        ),
        Tree::Sequence(elems) => Tree::Sequence(elems.into_iter().map(sem_compress).collect()),
        Tree::Leaf(leaf) => Tree::Leaf(compress_leaf(leaf)),
    }
}

/// Recursively expand semantic tags in a tree. The exact inverse of
/// [`sem_compress`].
pub fn sem_decompress(tree: Tree) -> Result<Tree> {
    match tree {
        Tree::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((k, sem_decompress(v)?));
            }
            Ok(Tree::Map(out))
        }
        Tree::Sequence(elems) => {
            let mut out = Vec::with_capacity(elems.len());
            for e in elems {
                out.push(sem_decompress(e)?);
            }
            Ok(Tree::Sequence(out))
        }
        Tree::Leaf(leaf) => Ok(Tree::Leaf(decompress_leaf(leaf)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sig_round_trips() {
        let raw = [0u8; 64];
        let s = URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(s.len(), 86);
        let leaf = compress_leaf(Leaf::Text(SmolStr::new(&s)));
        assert_eq!(
            leaf,
            Leaf::Tagged(TAG_SIG, TaggedPayload::Bytes(Bytes::from(raw.to_vec())))
        );
        let back = decompress_leaf(leaf).unwrap();
        assert_eq!(back, Leaf::Text(SmolStr::new(&s)));
    }

    #[test]
    fn cid_round_trips() {
        // A real CIDv1 (dag-cbor, sha2-256) base32lower string always starts
        // with "bafyrei" and is 59 chars; build the raw 36 bytes (2-byte
        // prefix + 34-byte multihash) that produce exactly that shape.
        let raw: Vec<u8> = vec![0x01, 0x71, 0x12, 0x20]
            .into_iter()
            .chain(std::iter::repeat_n(0x42, 32))
            .collect();
        let encoded = multibase::encode(multibase::Base::Base32Lower, &raw);
        assert_eq!(encoded.len(), CID_STR_LEN);
        assert!(encoded.starts_with(CID_PREFIX));

        let leaf = compress_leaf(Leaf::Text(SmolStr::new(&encoded)));
        assert_eq!(
            leaf,
            Leaf::Tagged(TAG_CID, TaggedPayload::Bytes(Bytes::from(raw)))
        );
        let back = decompress_leaf(leaf).unwrap();
        assert_eq!(back, Leaf::Text(SmolStr::new(&encoded)));
    }

    #[test]
    fn did_key_round_trips() {
        let raw = vec![0xEDu8, 1, 2, 3, 4];
        let encoded = multibase::encode(multibase::Base::Base58Btc, &raw);
        let s = format!("did:key:{encoded}");
        let leaf = compress_leaf(Leaf::Text(SmolStr::new(&s)));
        assert_eq!(
            leaf,
            Leaf::Tagged(TAG_DID_KEY, TaggedPayload::Bytes(Bytes::from(raw)))
        );
        let back = decompress_leaf(leaf).unwrap();
        assert_eq!(back, Leaf::Text(SmolStr::new(&s)));
    }

    #[test]
    fn at_uri_round_trips() {
        let s = "at://did:plc:abc123/app.bsky.feed.post/xyz";
        let leaf = compress_leaf(Leaf::Text(SmolStr::new(s)));
        assert_eq!(
            leaf,
            Leaf::Tagged(
                TAG_AT_URI,
                TaggedPayload::Text(SmolStr::new("did:plc:abc123/app.bsky.feed.post/xyz"))
            )
        );
        let back = decompress_leaf(leaf).unwrap();
        assert_eq!(back, Leaf::Text(SmolStr::new(s)));
    }

    #[test]
    fn non_matching_string_passes_through() {
        let leaf = compress_leaf(Leaf::Text(SmolStr::new("hello world")));
        assert_eq!(leaf, Leaf::Text(SmolStr::new("hello world")));
    }

    #[test]
    fn sem_compress_is_idempotent() {
        let raw = [9u8; 64];
        let s = URL_SAFE_NO_PAD.encode(raw);
        let tree = Tree::Map(vec![(smol_str::SmolStr::new("sig"), Tree::text(s))]);
        let once = sem_compress(tree.clone());
        let twice = sem_compress(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_tag_passes_through_on_decompress() {
        let leaf = Leaf::Tagged(42, TaggedPayload::Bytes(Bytes::from_static(b"x")));
        let back = decompress_leaf(leaf.clone()).unwrap();
        assert_eq!(back, leaf);
    }
}
