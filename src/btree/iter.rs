use std::iter::FusedIterator;

use super::{BPlusTree, NodeId};

/// Iterator over B+ tree entries in key order, following the leaf chain
pub struct Iter<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    current_leaf: Option<NodeId>,
    current_idx: usize,
    /// Inclusive upper bound, `None` for a full scan
    upper: Option<K>,
}

impl<'a, K: Ord + Clone, V> Iter<'a, K, V> {
    pub(super) fn new(
        tree: &'a BPlusTree<K, V>,
        start_leaf: Option<NodeId>,
        start_idx: usize,
        upper: Option<K>,
    ) -> Self {
        Self {
            tree,
            current_leaf: start_leaf,
            current_idx: start_idx,
            upper,
        }
    }
}

impl<'a, K: Ord + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf_id = self.current_leaf?;
            let leaf = self.tree.node(leaf_id).as_leaf()?;

            if self.current_idx < leaf.len() {
                let key = &leaf.keys[self.current_idx];
                if self.upper.as_ref().is_some_and(|upper| key > upper) {
                    self.current_leaf = None;
                    return None;
                }

                let value = &leaf.values[self.current_idx];
                self.current_idx += 1;
                return Some((key, value));
            }

            // Move to next leaf
            self.current_leaf = leaf.next;
            self.current_idx = 0;
        }
    }
}

impl<K: Ord + Clone, V> FusedIterator for Iter<'_, K, V> {}
