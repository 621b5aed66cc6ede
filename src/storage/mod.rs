//! In-memory data structures backing the key space
//!
//! - [`HashTable`]: top-level namespace and hash-valued keys
//! - [`LinkedList`]: list-valued keys
//! - [`AvlTree`] + [`HashTable`] = [`SortedSet`]: sorted-set-valued keys

pub mod avl;
mod db;
pub mod hash_table;
pub mod list;
mod value;
pub mod zset;

pub use avl::AvlTree;
pub use db::Database;
pub use hash_table::HashTable;
pub use list::LinkedList;
pub use value::{Collection, Value, ValueKind};
pub use zset::SortedSet;
