pub mod btree;
pub mod config;

pub use btree::{
    BPlusNode, BPlusTree, BPlusTreeError, BPlusTreeResult, DEFAULT_ORDER, InternalNode, Iter,
    LeafNode, NodeId, TreeStats,
};
pub use config::BPlusTreeConfig;
