//! Structural self-check used by tests and debugging tools
//!
//! Walks every node from the root, so it is O(n) and never runs implicitly.

use super::{BPlusNode, BPlusTree, BPlusTreeError, BPlusTreeResult, NodeId};

/// Key range a subtree must respect: `lower <= key < upper`
struct Bounds<'a, K> {
    lower: Option<&'a K>,
    upper: Option<&'a K>,
}

fn invalid<T>(message: String) -> BPlusTreeResult<T> {
    Err(BPlusTreeError::InvalidState(message))
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Check all structural invariants
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check all structural invariants, describing the first violation found
    ///
    /// Verifies uniform leaf depth, per-node key ordering, separator bounds,
    /// child counts, node occupancy and leaf chain integrity.
    pub fn validate(&self) -> BPlusTreeResult<()> {
        let mut leaves = Vec::new();
        let root_bounds = Bounds {
            lower: None,
            upper: None,
        };
        self.validate_node(self.root, 1, &root_bounds, &mut leaves)?;
        self.validate_leaf_chain(&leaves)
    }

    fn validate_node(
        &self,
        id: NodeId,
        depth: usize,
        bounds: &Bounds<'_, K>,
        leaves: &mut Vec<NodeId>,
    ) -> BPlusTreeResult<()> {
        if depth > self.height {
            return invalid(format!("node {id} below recorded height {}", self.height));
        }
        if self.free_list.contains(&id) {
            return invalid(format!("node {id} is reachable but on the free list"));
        }

        let node = self.node(id);
        let keys = match node {
            BPlusNode::Leaf(leaf) => &leaf.keys,
            BPlusNode::Internal(internal) => &internal.keys,
        };

        if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
            return invalid(format!("keys of node {id} are not strictly ascending"));
        }
        if let (Some(lower), Some(first)) = (bounds.lower, keys.first()) {
            if first < lower {
                return invalid(format!("node {id} holds a key below its separator"));
            }
        }
        if let (Some(upper), Some(last)) = (bounds.upper, keys.last()) {
            if last >= upper {
                return invalid(format!("node {id} holds a key at or above its separator"));
            }
        }
        if keys.len() > self.max_keys() {
            return invalid(format!("node {id} holds {} keys, over the maximum", keys.len()));
        }

        let is_root = id == self.root;
        match node {
            BPlusNode::Leaf(leaf) => {
                if depth != self.height {
                    return invalid(format!("leaf {id} at depth {depth}, expected {}", self.height));
                }
                if leaf.values.len() != leaf.keys.len() {
                    return invalid(format!("leaf {id} has mismatched keys and values"));
                }
                if !is_root && leaf.len() < self.min_leaf_keys() {
                    return invalid(format!("leaf {id} is under-occupied"));
                }
                leaves.push(id);
            }
            BPlusNode::Internal(internal) => {
                if internal.children.len() != internal.keys.len() + 1 {
                    return invalid(format!(
                        "internal node {id} has {} children for {} keys",
                        internal.children.len(),
                        internal.keys.len()
                    ));
                }
                if is_root && internal.is_empty() {
                    return invalid(format!("root {id} is a single-child pass-through"));
                }
                if !is_root && internal.len() < self.min_internal_keys() {
                    return invalid(format!("internal node {id} is under-occupied"));
                }

                for (i, &child) in internal.children.iter().enumerate() {
                    let child_bounds = Bounds {
                        lower: if i == 0 { bounds.lower } else { internal.keys.get(i - 1) },
                        upper: internal.keys.get(i).or(bounds.upper),
                    };
                    self.validate_node(child, depth + 1, &child_bounds, leaves)?;
                }
            }
        }

        Ok(())
    }

    /// `leaves` is the left-to-right order found by the tree walk
    fn validate_leaf_chain(&self, leaves: &[NodeId]) -> BPlusTreeResult<()> {
        if leaves.first() != Some(&self.first_leaf) {
            return invalid(format!("first leaf {} is not the leftmost leaf", self.first_leaf));
        }

        for (i, &id) in leaves.iter().enumerate() {
            let leaf = self.leaf(id);
            let expected_prev = i.checked_sub(1).map(|p| leaves[p]);
            let expected_next = leaves.get(i + 1).copied();

            if leaf.prev != expected_prev {
                return invalid(format!("leaf {id} has prev {:?}, expected {expected_prev:?}", leaf.prev));
            }
            if leaf.next != expected_next {
                return invalid(format!("leaf {id} has next {:?}, expected {expected_next:?}", leaf.next));
            }
        }

        Ok(())
    }
}
