/// Node identifier (index into node storage)
pub type NodeId = usize;

/// Internal node: stores routing keys and child pointers
///
/// In this B+ tree variant:
/// - keys[i] separates children[i] and children[i + 1]: every key below
///   children[i] is `< keys[i]`, every key below children[i + 1] is `>= keys[i]`
/// - children.len() == keys.len() + 1
#[derive(Debug, Clone)]
pub struct InternalNode<K> {
    /// Routing keys (sorted, unique)
    pub keys: Vec<K>,
    /// Child node IDs, exclusively owned by this node
    pub children: Vec<NodeId>,
}

impl<K: Ord> InternalNode<K> {
    /// Create a new internal node with given keys and children
    pub fn new(keys: Vec<K>, children: Vec<NodeId>) -> Self {
        debug_assert_eq!(keys.len() + 1, children.len());
        Self { keys, children }
    }

    /// Number of routing keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if node has no routing keys (a single-child pass-through)
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Find the child index for a given key
    /// Returns the number of routing keys <= key, so ties go right
    pub fn child_index(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Register a split of children[index]: `separator` goes to keys[index]
    /// and the new right sibling to children[index + 1]
    pub fn insert_child(&mut self, index: usize, separator: K, right: NodeId) {
        self.keys.insert(index, separator);
        self.children.insert(index + 1, right);
    }

    /// Split this internal node around its middle key
    ///
    /// This node keeps the keys left of the middle, the returned node gets the
    /// keys right of it. The middle key is stored in neither and is returned
    /// for the parent to absorb.
    pub fn split(&mut self) -> (K, InternalNode<K>) {
        let mid = self.keys.len() / 2;

        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let separator = self
            .keys
            .pop()
            .unwrap_or_else(|| unreachable!("split of an internal node without keys"));

        (separator, InternalNode::new(right_keys, right_children))
    }

    /// Remove and return the first routing key together with the first child
    pub fn pop_first(&mut self) -> Option<(K, NodeId)> {
        if self.keys.is_empty() {
            return None;
        }
        Some((self.keys.remove(0), self.children.remove(0)))
    }

    /// Remove and return the last routing key together with the last child
    pub fn pop_last(&mut self) -> Option<(K, NodeId)> {
        let key = self.keys.pop()?;
        let child = self.children.pop()?;
        Some((key, child))
    }

    /// Append a right sibling's contents, pulling the parent's separator down
    /// between the two key lists
    pub fn absorb(&mut self, separator: K, right: InternalNode<K>) {
        self.keys.push(separator);
        self.keys.extend(right.keys);
        self.children.extend(right.children);
    }
}

/// Leaf node: stores key-value pairs, linked to its neighbours
#[derive(Debug, Clone)]
pub struct LeafNode<K, V> {
    /// Keys (sorted, unique)
    pub keys: Vec<K>,
    /// Values corresponding to keys
    pub values: Vec<V>,
    /// Next leaf to the right (relation only, never ownership)
    pub next: Option<NodeId>,
    /// Previous leaf to the left (relation only, never ownership)
    pub prev: Option<NodeId>,
}

impl<K: Ord, V> LeafNode<K, V> {
    /// Create a new empty leaf node
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
            prev: None,
        }
    }

    /// Create a leaf node with given entries
    pub fn with_entries(keys: Vec<K>, values: Vec<V>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self {
            keys,
            values,
            next: None,
            prev: None,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if leaf is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert a key-value pair in sorted order
    /// An existing key has its value replaced; the old value is returned
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.keys.binary_search(&key) {
            Ok(pos) => Some(std::mem::replace(&mut self.values[pos], value)),
            Err(pos) => {
                self.keys.insert(pos, key);
                self.values.insert(pos, value);
                None
            }
        }
    }

    /// Search for a key
    pub fn search(&self, key: &K) -> Option<&V> {
        let pos = self.keys.binary_search(key).ok()?;
        Some(&self.values[pos])
    }

    /// Search for a key, returning a mutable reference to its value
    pub fn search_mut(&mut self, key: &K) -> Option<&mut V> {
        let pos = self.keys.binary_search(key).ok()?;
        Some(&mut self.values[pos])
    }

    /// Delete the entry with the given key, returning its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let pos = self.keys.binary_search(key).ok()?;
        self.keys.remove(pos);
        Some(self.values.remove(pos))
    }

    /// Position of the first key >= the given key
    pub fn lower_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Get the minimum key in this leaf
    pub fn min_key(&self) -> Option<&K> {
        self.keys.first()
    }

    /// Get the maximum key in this leaf
    pub fn max_key(&self) -> Option<&K> {
        self.keys.last()
    }

    /// Remove and return the first entry
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        if self.keys.is_empty() {
            return None;
        }
        Some((self.keys.remove(0), self.values.remove(0)))
    }

    /// Remove and return the last entry
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let key = self.keys.pop()?;
        let value = self.values.pop()?;
        Some((key, value))
    }

    /// Prepend an entry smaller than every key in this leaf
    pub fn push_front(&mut self, key: K, value: V) {
        self.keys.insert(0, key);
        self.values.insert(0, value);
    }

    /// Append an entry larger than every key in this leaf
    pub fn push_back(&mut self, key: K, value: V) {
        self.keys.push(key);
        self.values.push(value);
    }

    /// Append a right sibling's entries and take over its `next` link
    pub fn absorb(&mut self, right: LeafNode<K, V>) {
        self.keys.extend(right.keys);
        self.values.extend(right.values);
        self.next = right.next;
    }

    /// Split this leaf node, returning the new right sibling
    /// This node keeps the first `(len + 1) / 2` entries, the new node gets the rest.
    /// Sibling links are left for the caller to splice.
    pub fn split(&mut self) -> LeafNode<K, V> {
        let mid = self.keys.len().div_ceil(2);

        let right_keys = self.keys.split_off(mid);
        let right_values = self.values.split_off(mid);

        LeafNode::with_entries(right_keys, right_values)
    }
}

impl<K: Ord, V> Default for LeafNode<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// B+ tree node (either internal or leaf)
#[derive(Debug, Clone)]
pub enum BPlusNode<K, V> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K, V>),
}

impl<K: Ord, V> BPlusNode<K, V> {
    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        matches!(self, BPlusNode::Leaf(_))
    }

    /// Number of keys stored in this node
    pub fn len(&self) -> usize {
        match self {
            BPlusNode::Internal(node) => node.len(),
            BPlusNode::Leaf(node) => node.len(),
        }
    }

    /// Get as internal node reference
    pub fn as_internal(&self) -> Option<&InternalNode<K>> {
        match self {
            BPlusNode::Internal(node) => Some(node),
            BPlusNode::Leaf(_) => None,
        }
    }

    /// Get as leaf node reference
    pub fn as_leaf(&self) -> Option<&LeafNode<K, V>> {
        match self {
            BPlusNode::Internal(_) => None,
            BPlusNode::Leaf(node) => Some(node),
        }
    }
}
