//! B+ Tree implementation for ordered in-memory indexing
//!
//! This module provides a standard B+ tree data structure. It supports:
//! - Upsert semantics (one value per key; re-inserting a key overwrites)
//! - Range queries (via a doubly linked leaf chain)
//! - Any `Ord` key type with arbitrary values
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Internal
//! nodes own their children; leaf `next`/`prev` links are relations only.
//! The tree is single-threaded; callers needing shared access wrap the whole
//! tree in a lock.

mod error;
mod iter;
mod node;
#[cfg(test)]
mod tests;
mod validate;

pub use error::{BPlusTreeError, BPlusTreeResult};
pub use iter::Iter;
pub use node::{BPlusNode, InternalNode, LeafNode, NodeId};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::BPlusTreeConfig;

/// Default B+ tree order
pub const DEFAULT_ORDER: usize = 128;

/// Separator and new right sibling produced by a node split
struct Split<K> {
    separator: K,
    right: NodeId,
}

/// Structural snapshot of a tree, see [`BPlusTree::stats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeStats {
    pub order: usize,
    pub height: usize,
    pub entries: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
    /// Average leaf occupancy relative to the maximum of `order - 1` keys
    pub leaf_fill: f64,
}

/// B+ Tree data structure
///
/// Order `t` means:
/// - Every node holds at most `t - 1` keys; reaching `t` triggers a split
/// - Leaf nodes (except root) hold at least `floor(t/2)` entries
/// - Internal nodes (except root) hold at least `ceil(t/2) - 1` routing keys
#[derive(Debug)]
pub struct BPlusTree<K, V> {
    /// Root node ID (an empty leaf for an empty tree)
    root: NodeId,

    /// Tree order (max keys per node is order - 1)
    order: usize,

    /// Number of levels, root is level 1
    height: usize,

    /// Node storage
    nodes: Vec<BPlusNode<K, V>>,

    /// Free list for recycling merged-away nodes
    free_list: Vec<NodeId>,

    /// First leaf node (for full range scans)
    first_leaf: NodeId,
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Create a new empty B+ tree with the given order
    ///
    /// # Arguments
    /// * `order` - The tree order (must be >= 3)
    ///
    /// # Returns
    /// * `Ok(BPlusTree)` - A new empty B+ tree
    /// * `Err(BPlusTreeError)` - If order is invalid
    pub fn new(order: usize) -> BPlusTreeResult<Self> {
        if order < 3 {
            return Err(BPlusTreeError::InvalidOrder(order));
        }

        debug!(order, "creating B+ tree");

        Ok(Self::empty(order))
    }

    /// Create a new B+ tree with default order
    pub fn with_default_order() -> Self {
        Self::empty(DEFAULT_ORDER)
    }

    /// Initial state: the root is a single empty leaf
    fn empty(order: usize) -> Self {
        Self {
            root: 0,
            order,
            height: 1,
            nodes: vec![BPlusNode::Leaf(LeafNode::new())],
            free_list: Vec::new(),
            first_leaf: 0,
        }
    }

    /// Create a B+ tree from a config
    pub fn from_config(config: &BPlusTreeConfig) -> BPlusTreeResult<Self> {
        Self::new(config.order)
    }

    /// Get the tree order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Get tree height (1 for single leaf, 2+ with internal nodes)
    pub fn height(&self) -> usize {
        self.height
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        matches!(self.node(self.root), BPlusNode::Leaf(leaf) if leaf.is_empty())
    }

    /// Get number of entries in the tree
    ///
    /// Not cached: walks the leaf chain.
    pub fn len(&self) -> usize {
        self.leaf_ids().map(|id| self.leaf(id).len()).sum()
    }

    /// Get the number of live nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Reset to an empty tree, keeping the order
    pub fn clear(&mut self) {
        *self = Self::empty(self.order);
    }

    /// Maximum keys in any node
    fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Minimum entries in a leaf node (except root)
    fn min_leaf_keys(&self) -> usize {
        (self.order + 1).div_ceil(2) - 1 // ceil((t+1)/2) - 1
    }

    /// Minimum routing keys in an internal node (except root)
    fn min_internal_keys(&self) -> usize {
        self.order.div_ceil(2) - 1 // ceil(t/2) - 1
    }

    // ========== Node Management ==========

    /// Allocate a new node, returning its ID
    fn allocate_node(&mut self, node: BPlusNode<K, V>) -> NodeId {
        if let Some(id) = self.free_list.pop() {
            self.nodes[id] = node;
            id
        } else {
            let id = self.nodes.len();
            self.nodes.push(node);
            id
        }
    }

    /// Free a node, adding it to the free list and handing back its contents
    fn free_node(&mut self, id: NodeId) -> BPlusNode<K, V> {
        self.free_list.push(id);
        std::mem::replace(&mut self.nodes[id], BPlusNode::Leaf(LeafNode::new()))
    }

    fn node(&self, id: NodeId) -> &BPlusNode<K, V> {
        &self.nodes[id]
    }

    fn leaf(&self, id: NodeId) -> &LeafNode<K, V> {
        match &self.nodes[id] {
            BPlusNode::Leaf(node) => node,
            BPlusNode::Internal(_) => unreachable!("node {id} is not a leaf"),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode<K, V> {
        match &mut self.nodes[id] {
            BPlusNode::Leaf(node) => node,
            BPlusNode::Internal(_) => unreachable!("node {id} is not a leaf"),
        }
    }

    fn internal(&self, id: NodeId) -> &InternalNode<K> {
        match &self.nodes[id] {
            BPlusNode::Internal(node) => node,
            BPlusNode::Leaf(_) => unreachable!("node {id} is not an internal node"),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut InternalNode<K> {
        match &mut self.nodes[id] {
            BPlusNode::Internal(node) => node,
            BPlusNode::Leaf(_) => unreachable!("node {id} is not an internal node"),
        }
    }

    // ========== Search Operations ==========

    /// Search for a key
    pub fn search(&self, key: &K) -> Option<&V> {
        self.leaf(self.find_leaf(key)).search(key)
    }

    /// Search for a key, returning a mutable reference to its value
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let leaf_id = self.find_leaf(key);
        self.leaf_mut(leaf_id).search_mut(key)
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Smallest entry in the tree
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        let leaf = self.leaf(self.first_leaf);
        leaf.keys.first().zip(leaf.values.first())
    }

    /// Largest entry in the tree
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let mut current = self.root;
        while let BPlusNode::Internal(node) = self.node(current) {
            current = node.children[node.children.len() - 1];
        }
        let leaf = self.leaf(current);
        leaf.keys.last().zip(leaf.values.last())
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self, Some(self.first_leaf), 0, None)
    }

    /// Iterate over entries where lower <= key <= upper
    pub fn range(&self, lower: &K, upper: &K) -> Iter<'_, K, V> {
        if lower > upper {
            return Iter::new(self, None, 0, None);
        }

        let leaf_id = self.find_leaf(lower);
        let start = self.leaf(leaf_id).lower_bound(lower);
        Iter::new(self, Some(leaf_id), start, Some(upper.clone()))
    }

    /// Iterate over keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Return all keys in ascending order
    pub fn all_keys(&self) -> Vec<K> {
        self.leaf_ids()
            .flat_map(|id| self.leaf(id).keys.iter().cloned())
            .collect()
    }

    /// Find the leaf node that should contain the given key
    fn find_leaf(&self, key: &K) -> NodeId {
        let mut current = self.root;

        while let BPlusNode::Internal(node) = self.node(current) {
            current = node.children[node.child_index(key)];
        }

        current
    }

    /// Leaf IDs in chain order starting from the first leaf
    fn leaf_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(self.first_leaf), |&id| self.leaf(id).next)
    }

    // ========== Insert Operations ==========

    /// Insert a key-value pair into the tree
    ///
    /// If the key already exists its value is overwritten and the previous
    /// value returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (previous, split) = self.insert_into(self.root, key, value);

        if let Some(split) = split {
            self.grow_root(split);
        }

        previous
    }

    /// Insert below `node_id`, reporting a split of that node if one happened
    fn insert_into(&mut self, node_id: NodeId, key: K, value: V) -> (Option<V>, Option<Split<K>>) {
        if self.node(node_id).is_leaf() {
            let max_keys = self.max_keys();
            let leaf = self.leaf_mut(node_id);
            let previous = leaf.insert(key, value);
            let split = (leaf.len() > max_keys).then(|| self.split_leaf(node_id));
            return (previous, split);
        }

        let index = self.internal(node_id).child_index(&key);
        let child_id = self.internal(node_id).children[index];

        let (previous, split) = self.insert_into(child_id, key, value);
        let Some(split) = split else {
            return (previous, None);
        };

        let max_keys = self.max_keys();
        let node = self.internal_mut(node_id);
        node.insert_child(index, split.separator, split.right);
        let split = (node.len() > max_keys).then(|| self.split_internal(node_id));

        (previous, split)
    }

    /// Split an overflowing leaf node, splicing the new leaf into the chain
    fn split_leaf(&mut self, leaf_id: NodeId) -> Split<K> {
        let right_id = self.allocate_node(BPlusNode::Leaf(LeafNode::new()));

        let leaf = self.leaf_mut(leaf_id);
        let mut right = leaf.split();
        right.prev = Some(leaf_id);
        right.next = leaf.next.replace(right_id);

        let next_id = right.next;
        let separator = right.keys[0].clone();
        self.nodes[right_id] = BPlusNode::Leaf(right);

        if let Some(next_id) = next_id {
            self.leaf_mut(next_id).prev = Some(right_id);
        }

        trace!(leaf_id, right_id, "split leaf");

        Split {
            separator,
            right: right_id,
        }
    }

    /// Split an overflowing internal node
    fn split_internal(&mut self, node_id: NodeId) -> Split<K> {
        let (separator, right) = self.internal_mut(node_id).split();
        let right_id = self.allocate_node(BPlusNode::Internal(right));

        trace!(node_id, right_id, "split internal node");

        Split {
            separator,
            right: right_id,
        }
    }

    /// The root split: put a new root above the old root and its sibling
    fn grow_root(&mut self, split: Split<K>) {
        let new_root = InternalNode::new(vec![split.separator], vec![self.root, split.right]);
        self.root = self.allocate_node(BPlusNode::Internal(new_root));
        self.height += 1;

        debug!(root = self.root, height = self.height, "grew new root");
    }

    // ========== Delete Operations ==========

    /// Delete the entry with the given key
    /// Returns true if an entry was deleted
    pub fn delete(&mut self, key: &K) -> bool {
        self.remove(key).is_some()
    }

    /// Delete the entry with the given key, returning its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.remove_from(self.root, key)?;
        self.collapse_root();
        Some(removed)
    }

    /// Remove below `node_id`; children left underflowing are rebalanced on the way up
    fn remove_from(&mut self, node_id: NodeId, key: &K) -> Option<V> {
        if self.node(node_id).is_leaf() {
            return self.leaf_mut(node_id).remove(key);
        }

        let index = self.internal(node_id).child_index(key);
        let child_id = self.internal(node_id).children[index];

        let removed = self.remove_from(child_id, key)?;

        if self.is_underflowing(child_id) {
            self.handle_child_underflow(node_id, index);
        }
        self.refresh_separator(node_id, index);

        Some(removed)
    }

    /// Replace a redundant single-child internal root by its child
    fn collapse_root(&mut self) {
        let child_id = match self.node(self.root) {
            BPlusNode::Internal(node) if node.is_empty() => node.children[0],
            _ => return,
        };

        self.free_node(self.root);
        self.root = child_id;
        self.height -= 1;

        debug!(root = self.root, height = self.height, "collapsed root");
    }

    fn is_underflowing(&self, id: NodeId) -> bool {
        match self.node(id) {
            BPlusNode::Leaf(node) => node.len() < self.min_leaf_keys(),
            BPlusNode::Internal(node) => node.len() < self.min_internal_keys(),
        }
    }

    fn has_surplus(&self, id: NodeId) -> bool {
        match self.node(id) {
            BPlusNode::Leaf(node) => node.len() > self.min_leaf_keys(),
            BPlusNode::Internal(node) => node.len() > self.min_internal_keys(),
        }
    }

    /// Restore occupancy of children[index] by borrowing from a sibling with
    /// surplus, or else merging it with one
    fn handle_child_underflow(&mut self, parent_id: NodeId, index: usize) {
        let parent = self.internal(parent_id);
        let left_id = index.checked_sub(1).map(|i| parent.children[i]);
        let right_id = parent.children.get(index + 1).copied();

        if left_id.is_some_and(|id| self.has_surplus(id)) && self.borrow_from_left(parent_id, index) {
            return;
        }
        if right_id.is_some_and(|id| self.has_surplus(id)) && self.borrow_from_right(parent_id, index) {
            return;
        }

        if left_id.is_some() {
            self.merge_children(parent_id, index - 1);
        } else if right_id.is_some() {
            self.merge_children(parent_id, index);
        }
    }

    /// Move the left sibling's last entry (or key and child) into children[index]
    fn borrow_from_left(&mut self, parent_id: NodeId, index: usize) -> bool {
        let parent = self.internal(parent_id);
        let (left_id, node_id) = (parent.children[index - 1], parent.children[index]);

        if self.node(node_id).is_leaf() {
            let Some((key, value)) = self.leaf_mut(left_id).pop_last() else {
                return false;
            };
            self.internal_mut(parent_id).keys[index - 1] = key.clone();
            self.leaf_mut(node_id).push_front(key, value);
        } else {
            let Some((key, child)) = self.internal_mut(left_id).pop_last() else {
                return false;
            };
            let separator = std::mem::replace(&mut self.internal_mut(parent_id).keys[index - 1], key);
            let node = self.internal_mut(node_id);
            node.keys.insert(0, separator);
            node.children.insert(0, child);
        }

        trace!(node_id, left_id, "borrowed from left sibling");
        true
    }

    /// Move the right sibling's first entry (or key and child) into children[index]
    fn borrow_from_right(&mut self, parent_id: NodeId, index: usize) -> bool {
        let parent = self.internal(parent_id);
        let (node_id, right_id) = (parent.children[index], parent.children[index + 1]);

        if self.node(node_id).is_leaf() {
            let Some((key, value)) = self.leaf_mut(right_id).pop_first() else {
                return false;
            };
            self.leaf_mut(node_id).push_back(key, value);
            if let Some(first) = self.leaf(right_id).min_key().cloned() {
                self.internal_mut(parent_id).keys[index] = first;
            }
        } else {
            let Some((key, child)) = self.internal_mut(right_id).pop_first() else {
                return false;
            };
            let separator = std::mem::replace(&mut self.internal_mut(parent_id).keys[index], key);
            let node = self.internal_mut(node_id);
            node.keys.push(separator);
            node.children.push(child);
        }

        trace!(node_id, right_id, "borrowed from right sibling");
        true
    }

    /// Merge children[index + 1] into children[index], consuming the separator between them
    fn merge_children(&mut self, parent_id: NodeId, index: usize) {
        let parent = self.internal_mut(parent_id);
        let separator = parent.keys.remove(index);
        let left_id = parent.children[index];
        let right_id = parent.children.remove(index + 1);

        match self.free_node(right_id) {
            BPlusNode::Leaf(right) => {
                let next_id = right.next;
                self.leaf_mut(left_id).absorb(right);
                if let Some(next_id) = next_id {
                    self.leaf_mut(next_id).prev = Some(left_id);
                }
            }
            BPlusNode::Internal(right) => self.internal_mut(left_id).absorb(separator, right),
        }

        trace!(left_id, right_id, "merged siblings");
    }

    /// Tighten the separator left of children[index] to the first key of a leaf child
    fn refresh_separator(&mut self, parent_id: NodeId, index: usize) {
        let parent = self.internal(parent_id);
        if index == 0 || index >= parent.children.len() {
            return;
        }

        let child_id = parent.children[index];
        let first = match self.node(child_id) {
            BPlusNode::Leaf(leaf) => leaf.min_key().cloned(),
            BPlusNode::Internal(_) => None,
        };

        if let Some(first) = first {
            self.internal_mut(parent_id).keys[index - 1] = first;
        }
    }

    // ========== Diagnostics ==========

    /// Structural snapshot of the tree
    pub fn stats(&self) -> TreeStats {
        let (entries, leaf_nodes) = self
            .leaf_ids()
            .fold((0, 0), |(entries, leaves), id| (entries + self.leaf(id).len(), leaves + 1));

        TreeStats {
            order: self.order,
            height: self.height,
            entries,
            leaf_nodes,
            internal_nodes: self.node_count() - leaf_nodes,
            leaf_fill: entries as f64 / (leaf_nodes * self.max_keys()) as f64,
        }
    }
}

impl<K: Ord + Clone, V: Clone> BPlusTree<K, V> {
    /// Range search: return all entries where lower <= key <= upper
    pub fn range_query(&self, lower: &K, upper: &K) -> Vec<(K, V)> {
        self.range(lower, upper)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Ord + Clone, V> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::with_default_order()
    }
}

impl<'a, K: Ord + Clone, V> IntoIterator for &'a BPlusTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
