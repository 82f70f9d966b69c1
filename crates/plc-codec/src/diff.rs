//! Structural differ: computes a four-kind diff between two trees.
//!
//! The walk mirrors `jacquard-repo`'s `mst::diff` in spirit (a synchronized
//! pre-order walk of two trees, classifying changes into buckets) but this
//! codec's trees aren't content-addressed, so subtrees can't be skipped by
//! CID comparison, and sequences need an explicit alignment step the MST
//! never requires. That alignment (LCS over structural equality, with the
//! documented tie-break) is grounded on `examples/original_source/compress.py`'s
//! `compute_lcs`/`compute_diff`, reimplemented as an explicit DP table
//! rather than the original's closure-captured counter (spec.md §9).

use std::collections::{BTreeMap, BTreeSet};

use smol_str::SmolStr;

use crate::index::subtree_count;
use crate::tree::{Tree, canonicalize_map};

/// A value inserted into a Map container: `(key, subtree)`.
pub type MapInsert = (SmolStr, Tree);

/// A structural diff between two trees, indexed against the *old* tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    /// index -> replacement leaf/subtree
    pub updates: BTreeMap<u32, Tree>,
    /// set of indices (entry markers in maps, element nodes in sequences)
    pub deletes: BTreeSet<u32>,
    /// container index -> ordered list of additions
    pub inserts: BTreeMap<u32, Vec<Insertion>>,
    /// element index -> ordered list of subtrees inserted just before it
    pub prepends: BTreeMap<u32, Vec<Tree>>,
}

/// One addition recorded in [`Diff::inserts`]. Map containers carry a key;
/// sequence containers don't.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    /// Added to a Map container.
    MapEntry(MapInsert),
    /// Appended to a Sequence container.
    SeqElement(Tree),
}

impl Diff {
    /// True if every field is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
            && self.deletes.is_empty()
            && self.inserts.is_empty()
            && self.prepends.is_empty()
    }
}

struct Walker {
    counter: u32,
}

impl Walker {
    fn new() -> Self {
        Self { counter: 0 }
    }

    fn next(&mut self) -> u32 {
        let idx = self.counter;
        self.counter += 1;
        idx
    }

    fn advance(&mut self, tree: &Tree) {
        self.counter += subtree_count(tree);
    }
}

/// Compute a structural diff from `old` to `new`.
///
/// `apply_diff(old, compute_diff(old, new))` canonical-encodes equal to
/// `new` (DIFF-1).
pub fn compute_diff(old: &Tree, new: &Tree) -> Diff {
    let mut diff = Diff::default();
    let mut walker = Walker::new();
    diff_node(&mut walker, old, new, &mut diff);
    diff
}

fn diff_node(walker: &mut Walker, old: &Tree, new: &Tree, diff: &mut Diff) {
    let idx = walker.next();

    match (old, new) {
        (Tree::Map(old_entries), Tree::Map(new_entries)) => {
            diff_map(walker, idx, old_entries, new_entries, diff);
        }
        (Tree::Sequence(old_elems), Tree::Sequence(new_elems)) => {
            diff_sequence(walker, idx, old_elems, new_elems, diff);
        }
        (Tree::Leaf(old_leaf), Tree::Leaf(new_leaf)) => {
            if old_leaf != new_leaf {
                diff.updates.insert(idx, new.clone());
            }
        }
        _ => {
            // Type mismatch: whole subtree replaced.
            diff.updates.insert(idx, new.clone());
            walker.counter -= 1; // undo the `next()` above: advance() recomputes from idx
            walker.advance(old);
        }
    }
}

fn diff_map(
    walker: &mut Walker,
    map_idx: u32,
    old_entries: &[(SmolStr, Tree)],
    new_entries: &[(SmolStr, Tree)],
    diff: &mut Diff,
) {
    let old_keys: BTreeSet<&str> = old_entries.iter().map(|(k, _)| k.as_str()).collect();
    let new_map: BTreeMap<&str, &Tree> = new_entries.iter().map(|(k, v)| (k.as_str(), v)).collect();

    // Keys only in new: insert at the map's own index, CAN-1 order.
    let mut added: Vec<&(SmolStr, Tree)> = new_entries
        .iter()
        .filter(|(k, _)| !old_keys.contains(k.as_str()))
        .collect();
    added.sort_by(|(a, _), (b, _)| crate::tree::can1_key(a).cmp(&crate::tree::can1_key(b)));
    if !added.is_empty() {
        let entry = diff.inserts.entry(map_idx).or_default();
        for (k, v) in added {
            entry.push(Insertion::MapEntry((k.clone(), v.clone())));
        }
    }

    // Walk old keys in their stored (assumed-CAN-1) order.
    for (key, old_value) in old_entries {
        let entry_idx = walker.next(); // entry marker
        walker.next(); // key name

        match new_map.get(key.as_str()) {
            None => {
                diff.deletes.insert(entry_idx);
                walker.advance(old_value);
            }
            Some(new_value) => {
                diff_node(walker, old_value, new_value, diff);
            }
        }
    }
}

fn diff_sequence(
    walker: &mut Walker,
    seq_idx: u32,
    old_elems: &[Tree],
    new_elems: &[Tree],
    diff: &mut Diff,
) {
    let lcs_pairs = compute_lcs(old_elems, new_elems);
    let old_matched: BTreeSet<usize> = lcs_pairs.iter().map(|&(o, _)| o).collect();
    let new_matched: BTreeSet<usize> = lcs_pairs.iter().map(|&(_, n)| n).collect();
    let new_to_old: BTreeMap<usize, usize> = lcs_pairs.iter().map(|&(o, n)| (n, o)).collect();

    // Record the flat index of every old element, and recurse/delete.
    let mut old_elem_indices: Vec<u32> = Vec::with_capacity(old_elems.len());
    for (i, item) in old_elems.iter().enumerate() {
        let elem_idx = walker.counter;
        old_elem_indices.push(elem_idx);
        if old_matched.contains(&i) {
            let matched_new_pos = lcs_pairs
                .iter()
                .find(|&&(o, _)| o == i)
                .map(|&(_, n)| n)
                .unwrap();
            diff_node(walker, item, &new_elems[matched_new_pos], diff);
        } else {
            diff.deletes.insert(elem_idx);
            walker.advance(item);
        }
    }

    // Classify new-only elements as prepend (before the next matched old
    // element) or insert (appended to the sequence container) if none
    // follow.
    for (j, new_elem) in new_elems.iter().enumerate() {
        if new_matched.contains(&j) {
            continue;
        }
        let next_lcs_new = new_matched.iter().find(|&&np| np > j).copied();
        match next_lcs_new {
            Some(np) => {
                let old_pos = new_to_old[&np];
                let target_idx = old_elem_indices[old_pos];
                diff.prepends
                    .entry(target_idx)
                    .or_default()
                    .push(new_elem.clone());
            }
            None => {
                diff.inserts
                    .entry(seq_idx)
                    .or_default()
                    .push(Insertion::SeqElement(new_elem.clone()));
            }
        }
    }
}

/// Longest-common-subsequence alignment by structural equality. Returns
/// `(old_pos, new_pos)` pairs in increasing order of both positions.
///
/// Tie-break: when reconstructing the alignment, prefer the upper-row
/// predecessor (`dp[i-1][j] >= dp[i][j-1]` favors decrementing `i`) when
/// both directions tie, so the alignment is a deterministic function of
/// the input pair (spec.md §9).
pub fn compute_lcs(old: &[Tree], new: &[Tree]) -> Vec<(usize, usize)> {
    let n = old.len();
    let m = new.len();
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            dp[i][j] = if old[i - 1] == new[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if old[i - 1] == new[j - 1] {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] >= dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}

/// Re-canonicalize a map's entries after structural mutation (CAN-1),
/// used by the patcher; exposed here since it shares the comparator with
/// the differ's insert ordering.
pub fn canonicalize(entries: &mut [(SmolStr, Tree)]) {
    canonicalize_map(entries);
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
    fn lcs_basic() {
        let old = vec![Tree::int(1), Tree::int(2), Tree::int(3)];
        let new = vec![Tree::int(0), Tree::int(1), Tree::int(2), Tree::int(3)];
        let pairs = compute_lcs(&old, &new);
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn scenario_update_only() {
        let a = map(&[("k", Tree::text("a")), ("n", Tree::int(1))]);
        let b = map(&[("k", Tree::text("b")), ("n", Tree::int(1))]);
        let diff = compute_diff(&a, &b);
        assert_eq!(diff.updates.len(), 1);
        assert!(diff.deletes.is_empty());
        assert!(diff.inserts.is_empty());
        assert!(diff.prepends.is_empty());
        let (_, v) = diff.updates.iter().next().unwrap();
        assert_eq!(*v, Tree::text("b"));
    }

    #[test]
    fn scenario_sequence_prepend() {
        let a = map(&[(
            "xs",
            Tree::Sequence(vec![Tree::int(1), Tree::int(2), Tree::int(3)]),
        )]);
        let b = map(&[(
            "xs",
            Tree::Sequence(vec![Tree::int(0), Tree::int(1), Tree::int(2), Tree::int(3)]),
        )]);
        let diff = compute_diff(&a, &b);
        assert!(diff.updates.is_empty());
        assert!(diff.deletes.is_empty());
        assert!(diff.inserts.is_empty());
        assert_eq!(diff.prepends.len(), 1);
        let prepended = diff.prepends.values().next().unwrap();
        assert_eq!(prepended, &vec![Tree::int(0)]);
    }

    #[test]
    fn scenario_sequence_insert_at_tail() {
        let a = map(&[("xs", Tree::Sequence(vec![Tree::int(1)]))]);
        let b = map(&[("xs", Tree::Sequence(vec![Tree::int(1), Tree::int(2)]))]);
        let diff = compute_diff(&a, &b);
        assert!(diff.prepends.is_empty());
        assert_eq!(diff.inserts.len(), 1);
        let inserted = diff.inserts.values().next().unwrap();
        assert_eq!(inserted, &vec![Insertion::SeqElement(Tree::int(2))]);
    }

    #[test]
    fn scenario_map_delete() {
        let a = map(&[("k", Tree::text("a")), ("n", Tree::int(1))]);
        let b = map(&[("n", Tree::int(1))]);
        let diff = compute_diff(&a, &b);
        assert_eq!(diff.deletes.len(), 1);
        assert!(diff.updates.is_empty());
        assert!(diff.inserts.is_empty());
    }

    #[test]
    fn scenario_map_insert() {
        let a = map(&[("n", Tree::int(1))]);
        let b = map(&[("k", Tree::text("a")), ("n", Tree::int(1))]);
        let diff = compute_diff(&a, &b);
        assert!(diff.deletes.is_empty());
        assert!(diff.updates.is_empty());
        assert_eq!(diff.inserts.len(), 1);
        let inserted = diff.inserts.values().next().unwrap();
        assert_eq!(
            inserted,
            &vec![Insertion::MapEntry((SmolStr::new("k"), Tree::text("a")))]
        );
    }

    #[test]
    fn identical_trees_produce_empty_diff() {
        let a = map(&[("n", Tree::int(1))]);
        let diff = compute_diff(&a, &a.clone());
        assert!(diff.is_empty());
    }

    #[test]
    fn leaf_to_map_type_change_replaces_whole_subtree() {
        let a = map(&[("v", Tree::int(1))]);
        let b = map(&[("v", Tree::Map(vec![(SmolStr::new("x"), Tree::int(2))]))]);
        let diff = compute_diff(&a, &b);
        assert_eq!(diff.updates.len(), 1);
        let (_, v) = diff.updates.iter().next().unwrap();
        assert!(v.is_map());
    }
}
