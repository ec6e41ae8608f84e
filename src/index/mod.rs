pub mod btree_index;
pub mod btree_iterator;
pub mod btree_page;

pub use btree_index::BPlusTree;
pub use btree_iterator::IndexIterator;
pub use btree_page::{
    BTreePageRef, BTreePageType, HeaderPage, HeaderPageRef, InternalPage, InternalPageRef,
    LeafPage, LeafPageRef,
};
