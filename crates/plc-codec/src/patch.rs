//! Patcher: reconstructs the next tree from an old tree and a [`Diff`].
//!
//! The walk is the structural inverse of [`crate::diff::compute_diff`]: it
//! consumes indices in the exact same order the differ produced them in, so
//! a `Diff`'s indices always line up with the old tree's own `Indexer` walk.
//! Grounded on `examples/original_source/compress.py`'s `apply_diff`/`_walk`,
//! reimplemented with the explicit-walker-object convention (spec.md §9)
//! rather than the original's closure-captured counter.

use std::collections::BTreeSet;

use smol_str::SmolStr;

use crate::diff::{Diff, Insertion};
use crate::error::{DiffError, PlcCodecError, Result};
use crate::index::subtree_count;
use crate::tree::{Tree, canonicalize_map};

struct Walker<'d> {
    counter: u32,
    diff: &'d Diff,
    /// Every index the walk actually examined against `diff`, whether or
    /// not it ended up being acted on. An index the diff references that
    /// never lands here was skipped entirely (e.g. it falls inside a
    /// subtree the walk replaced or deleted wholesale) and is invalid.
    reached: BTreeSet<u32>,
}

impl<'d> Walker<'d> {
    fn new(diff: &'d Diff) -> Self {
        Self {
            counter: 0,
            diff,
            reached: BTreeSet::new(),
        }
    }

    fn next(&mut self) -> u32 {
        let idx = self.counter;
        self.counter += 1;
        self.reached.insert(idx);
        idx
    }

    fn advance(&mut self, tree: &Tree) {
        self.counter += subtree_count(tree);
    }
}

/// Apply `diff` to `old`, producing the tree it was computed against
/// (DIFF-1: round-trips through [`crate::diff::compute_diff`]).
///
/// Errors with `InvalidDiff` if `diff` references an index the walk never
/// reaches (spec §4.4 "Errors").
pub fn apply_diff(old: &Tree, diff: &Diff) -> Result<Tree> {
    let mut walker = Walker::new(diff);
    let result = patch_node(&mut walker, old)?;
    check_indices_reached(&walker)?;
    Ok(result)
}

fn check_indices_reached(walker: &Walker) -> Result<()> {
    let all_referenced = walker
        .diff
        .updates
        .keys()
        .chain(walker.diff.deletes.iter())
        .chain(walker.diff.inserts.keys())
        .chain(walker.diff.prepends.keys());
    for &idx in all_referenced {
        if !walker.reached.contains(&idx) {
            return Err(PlcCodecError::invalid_diff_index(idx));
        }
    }
    Ok(())
}

fn patch_node(walker: &mut Walker, old: &Tree) -> Result<Tree> {
    let idx = walker.next();

    if let Some(replacement) = walker.diff.updates.get(&idx) {
        walker.counter -= 1;
        walker.advance(old);
        return Ok(replacement.clone());
    }

    match old {
        Tree::Map(entries) => patch_map(walker, idx, entries),
        Tree::Sequence(elems) => patch_sequence(walker, idx, elems),
        Tree::Leaf(_) => Ok(old.clone()),
    }
}

fn patch_map(walker: &mut Walker, map_idx: u32, entries: &[(SmolStr, Tree)]) -> Result<Tree> {
    let mut out: Vec<(SmolStr, Tree)> = Vec::with_capacity(entries.len());

    for (key, value) in entries {
        let entry_idx = walker.next(); // entry marker
        walker.next(); // key name

        if walker.diff.deletes.contains(&entry_idx) {
            walker.advance(value);
            continue;
        }
        let new_value = patch_node(walker, value)?;
        out.push((key.clone(), new_value));
    }

    if let Some(additions) = walker.diff.inserts.get(&map_idx) {
        for ins in additions {
            match ins {
                Insertion::MapEntry((k, v)) => out.push((k.clone(), v.clone())),
                Insertion::SeqElement(_) => {
                    return Err(DiffError::ContainerMismatch {
                        index: map_idx,
                        expected: "map",
                    }
                    .into());
                }
            }
        }
    }

    canonicalize_map(&mut out);
    Ok(Tree::Map(out))
}

fn patch_sequence(walker: &mut Walker, seq_idx: u32, elems: &[Tree]) -> Result<Tree> {
    let mut out: Vec<Tree> = Vec::with_capacity(elems.len());

    for item in elems {
        let elem_idx = walker.counter;
        walker.reached.insert(elem_idx);

        if let Some(prepended) = walker.diff.prepends.get(&elem_idx) {
            out.extend(prepended.iter().cloned());
        }

        if walker.diff.deletes.contains(&elem_idx) {
            walker.advance(item);
            continue;
        }
        let new_item = patch_node(walker, item)?;
        out.push(new_item);
    }

    if let Some(additions) = walker.diff.inserts.get(&seq_idx) {
        for ins in additions {
            match ins {
                Insertion::SeqElement(v) => out.push(v.clone()),
                Insertion::MapEntry(_) => {
                    return Err(DiffError::ContainerMismatch {
                        index: seq_idx,
                        expected: "sequence",
                    }
                    .into());
                }
            }
        }
    }

    Ok(Tree::Sequence(out))
}
