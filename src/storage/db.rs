use super::hash_table::HashTable;
use super::value::{Collection, Value};
use crate::error::{Error, Result};
use bytes::Bytes;

/// The top-level key namespace.
///
/// Owned by the event loop and handed by `&mut` to every command; nothing
/// else touches it, so it carries no locking.
#[derive(Debug, Default)]
pub struct Database {
    keys: HashTable<Value>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: HashTable::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.keys.get(key)
    }

    pub fn set(&mut self, key: impl Into<Bytes>, value: Value) -> Option<Value> {
        self.keys.insert(key, value)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Value> {
        self.keys.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.keys.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Value)> {
        self.keys.iter()
    }

    /// Drop every key and everything nested under it
    pub fn flush(&mut self) {
        self.keys.clear();
    }

    /// Read a collection. A missing key is `Ok(None)`, a key of another
    /// kind is [`Error::WrongType`].
    pub fn collection<T: Collection>(&self, key: &[u8]) -> Result<Option<&T>> {
        match self.keys.get(key) {
            Some(value) => T::from_value(value).map(Some).ok_or(Error::WrongType),
            None => Ok(None),
        }
    }

    pub fn collection_mut<T: Collection>(&mut self, key: &[u8]) -> Result<Option<&mut T>> {
        match self.keys.get_mut(key) {
            Some(value) => T::from_value_mut(value).map(Some).ok_or(Error::WrongType),
            None => Ok(None),
        }
    }

    /// Mutable access to a collection, creating an empty one when the key is missing
    pub fn collection_or_default<T: Collection>(&mut self, key: &[u8]) -> Result<&mut T> {
        let value = self
            .keys
            .get_or_insert_with(key, || T::default().into_value());
        T::from_value_mut(value).ok_or(Error::WrongType)
    }

    /// Delete `key` when it holds an empty collection of kind `T`
    pub fn remove_if_empty<T: Collection>(&mut self, key: &[u8]) {
        let empty = self
            .keys
            .get(key)
            .and_then(T::from_value)
            .is_some_and(|c| c.is_empty());
        if empty {
            self.keys.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LinkedList, SortedSet};

    #[test]
    fn test_collection_or_default_creates_once() {
        let mut db = Database::new();
        db.collection_or_default::<LinkedList>(b"list")
            .unwrap()
            .push_back("a");
        db.collection_or_default::<LinkedList>(b"list")
            .unwrap()
            .push_back("b");
        assert_eq!(db.len(), 1);
        assert_eq!(db.collection::<LinkedList>(b"list").unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_type() {
        let mut db = Database::new();
        db.set("s", Value::Str(Bytes::from("x")));
        assert!(matches!(
            db.collection_or_default::<SortedSet>(b"s"),
            Err(Error::WrongType)
        ));
        assert!(matches!(db.collection::<LinkedList>(b"s"), Err(Error::WrongType)));
        assert!(db.collection::<LinkedList>(b"missing").unwrap().is_none());
    }

    #[test]
    fn test_remove_if_empty() {
        let mut db = Database::new();
        db.collection_or_default::<LinkedList>(b"list")
            .unwrap()
            .push_back("a");
        db.remove_if_empty::<LinkedList>(b"list");
        assert_eq!(db.len(), 1);

        db.collection_mut::<LinkedList>(b"list")
            .unwrap()
            .unwrap()
            .pop_back();
        db.remove_if_empty::<LinkedList>(b"list");
        assert!(db.is_empty());
    }

    #[test]
    fn test_flush() {
        let mut db = Database::with_capacity(8);
        db.set("a", Value::Int(1));
        db.collection_or_default::<SortedSet>(b"z").unwrap().add("m", 1.0);
        db.flush();
        assert!(db.is_empty());
        assert_eq!(db.keys().count(), 0);
    }
}
