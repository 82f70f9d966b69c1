//! The decoded tree: the data model every other module operates on.
//!
//! A [`Tree`] is the decoded form of a canonical binary object map (a did:plc
//! operation, or any structural part of one). Maps preserve insertion order
//! in memory; [`canonicalize_map`] restores CAN-1 order (key length, then
//! lexicographic) on write, the way `jacquard-repo`'s MST serializer
//! re-derives wire order from in-memory order on every serialize.

use bytes::Bytes;
use smol_str::SmolStr;

/// A recursive decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// A mapping from strings to trees. Insertion order significant at
    /// decode time, canonicalized (CAN-1) on re-encode.
    Map(Vec<(SmolStr, Tree)>),
    /// An ordered list of trees.
    Sequence(Vec<Tree>),
    /// A scalar value.
    Leaf(Leaf),
}

/// A scalar node.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    /// UTF-8 text.
    Text(SmolStr),
    /// Raw bytes.
    Bytes(Bytes),
    /// 64-bit signed integer.
    Int(i64),
    /// Double-precision float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// Null.
    Null,
    /// A semantically-compressed string, produced only by the semantic tag
    /// layer. `tag` is one of {6, 7, 8, 9}.
    Tagged(u8, TaggedPayload),
}

/// Payload carried by a [`Leaf::Tagged`] value.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedPayload {
    /// Raw bytes (tags 6, 7, 8).
    Bytes(Bytes),
    /// Text (tag 9).
    Text(SmolStr),
}

impl Tree {
    /// Construct a text leaf.
    pub fn text(s: impl Into<SmolStr>) -> Self {
        Tree::Leaf(Leaf::Text(s.into()))
    }

    /// Construct an integer leaf.
    pub fn int(v: i64) -> Self {
        Tree::Leaf(Leaf::Int(v))
    }

    /// True if this tree is a [`Tree::Map`].
    pub fn is_map(&self) -> bool {
        matches!(self, Tree::Map(_))
    }

    /// True if this tree is a [`Tree::Sequence`].
    pub fn is_sequence(&self) -> bool {
        matches!(self, Tree::Sequence(_))
    }

    /// Returns the map entries if this is a map.
    pub fn as_map(&self) -> Option<&[(SmolStr, Tree)]> {
        match self {
            Tree::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the sequence elements if this is a sequence.
    pub fn as_sequence(&self) -> Option<&[Tree]> {
        match self {
            Tree::Sequence(elems) => Some(elems),
            _ => None,
        }
    }
}

/// CAN-1 comparison key: sort by key length first, then lexicographically
/// by byte value.
pub fn can1_key(key: &str) -> (usize, &str) {
    (key.len(), key)
}

/// Sort a map's entries into CAN-1 canonical order, in place.
pub fn canonicalize_map(entries: &mut [(SmolStr, Tree)]) {
    entries.sort_by(|(a, _), (b, _)| can1_key(a).cmp(&can1_key(b)));
}

/// Recursively canonicalize every map in a tree (used when constructing
/// trees from sources, such as the fixture loader, that don't already
/// guarantee CAN-1).
pub fn canonicalize(tree: &mut Tree) {
    match tree {
        Tree::Map(entries) => {
            for (_, v) in entries.iter_mut() {
                canonicalize(v);
            }
            canonicalize_map(entries);
        }
        Tree::Sequence(elems) => {
            for e in elems.iter_mut() {
                canonicalize(e);
            }
        }
        Tree::Leaf(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can1_orders_by_length_then_lex() {
        let mut entries = vec![
            (SmolStr::new("bb"), Tree::int(1)),
            (SmolStr::new("a"), Tree::int(2)),
            (SmolStr::new("ac"), Tree::int(3)),
        ];
        canonicalize_map(&mut entries);
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "ac", "bb"]);
    }

    #[test]
    fn can1_recurses_into_nested_maps() {
        let mut tree = Tree::Map(vec![(
            SmolStr::new("outer"),
            Tree::Map(vec![
                (SmolStr::new("bb"), Tree::int(1)),
                (SmolStr::new("a"), Tree::int(2)),
            ]),
        )]);
        canonicalize(&mut tree);
        let Tree::Map(outer) = &tree else { panic!() };
        let Tree::Map(inner) = &outer[0].1 else {
            panic!()
        };
        assert_eq!(inner[0].0.as_str(), "a");
        assert_eq!(inner[1].0.as_str(), "bb");
    }
}
