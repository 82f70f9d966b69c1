//! Deterministic flat indexing over decoded trees (IDX-1).
//!
//! The walker is an explicit object carrying a private counter, per the
//! design note in spec.md §9: "make the walker an explicit object with an
//! integer field and a method per variant; the counter is private state...
//! Do not thread by capture."

use crate::tree::Tree;
use std::collections::HashMap;

/// A value recorded at a single flat index: either a tree node, or (for the
/// key-name slot of a map entry) the key itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexedItem<'t> {
    /// A map, sequence, or leaf node.
    Node(&'t Tree),
    /// The key name of a map entry, at the slot following its entry marker.
    Key(&'t str),
}

/// Assigns flat indices in the fixed pre-order walk described in IDX-1.
pub struct Indexer {
    counter: u32,
}

impl Indexer {
    /// Create a fresh indexer starting at 0.
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    fn next(&mut self) -> u32 {
        let idx = self.counter;
        self.counter += 1;
        idx
    }

    /// Advance the counter past an entire subtree without visiting it,
    /// consuming exactly [`subtree_count`] indices.
    pub fn skip(&mut self, tree: &Tree) {
        self.counter += subtree_count(tree);
    }

    /// Walk `tree`, recording every node (and every map-entry key name)
    /// visited into `out` keyed by its flat index. Entry-marker slots
    /// consume an index but are not recorded, matching IDX-1. Returns the
    /// index assigned to `tree` itself.
    pub fn walk<'t>(&mut self, tree: &'t Tree, out: &mut HashMap<u32, IndexedItem<'t>>) -> u32 {
        let idx = self.next();
        out.insert(idx, IndexedItem::Node(tree));
        match tree {
            Tree::Map(entries) => {
                for (key, value) in entries {
                    self.next(); // entry marker
                    let key_idx = self.next(); // key name
                    out.insert(key_idx, IndexedItem::Key(key.as_str()));
                    self.walk(value, out);
                }
            }
            Tree::Sequence(elems) => {
                for elem in elems {
                    self.walk(elem, out);
                }
            }
            Tree::Leaf(_) => {}
        }
        idx
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a mapping from flat index to node (or key name) for every index
/// `tree` consumes.
pub fn flat_index(tree: &Tree) -> HashMap<u32, IndexedItem<'_>> {
    let mut out = HashMap::new();
    Indexer::new().walk(tree, &mut out);
    out
}

/// Total number of flat indices `tree` (and its descendants) would consume
/// when walked, including map-entry administrative slots.
pub fn subtree_count(tree: &Tree) -> u32 {
    match tree {
        Tree::Map(entries) => {
            let mut total = 1;
            for (_, v) in entries {
                total += 2 + subtree_count(v);
            }
            total
        }
        Tree::Sequence(elems) => {
            let mut total = 1;
            for e in elems {
                total += subtree_count(e);
            }
            total
        }
        Tree::Leaf(_) => 1,
    }
}
