use super::hash_table::HashTable;
use super::list::LinkedList;
use super::zset::SortedSet;
use bytes::Bytes;
use std::fmt;

/// A value stored under a top-level key
#[derive(Debug, Clone)]
pub enum Value {
    Str(Bytes),
    Int(i32),
    Hash(HashTable<Bytes>),
    List(LinkedList),
    ZSet(SortedSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Hash,
    List,
    ZSet,
}

impl Value {
    /// Wrap client-supplied bytes, storing canonical 32-bit integers as `Int`.
    ///
    /// "42" and "-7" become integers; "042", "+1" and "1.0" stay strings so
    /// that reading the key back never changes its spelling.
    pub fn from_bytes(bytes: Bytes) -> Self {
        let parsed = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<i32>().ok().filter(|n| n.to_string() == s));
        match parsed {
            Some(n) => Value::Int(n),
            None => Value::Str(bytes),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::String,
            Value::Int(_) => ValueKind::Integer,
            Value::Hash(_) => ValueKind::Hash,
            Value::List(_) => ValueKind::List,
            Value::ZSet(_) => ValueKind::ZSet,
        }
    }
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Hash => "hash",
            ValueKind::List => "list",
            ValueKind::ZSet => "zset",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collection kind that can live behind a top-level key
pub trait Collection: Default + Sized {
    fn from_value(value: &Value) -> Option<&Self>;
    fn from_value_mut(value: &mut Value) -> Option<&mut Self>;
    fn into_value(self) -> Value;
    fn is_empty(&self) -> bool;
}

macro_rules! impl_collection {
    ($ty:ty, $variant:ident) => {
        impl Collection for $ty {
            fn from_value(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_value_mut(value: &mut Value) -> Option<&mut Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn is_empty(&self) -> bool {
                <$ty>::is_empty(self)
            }
        }
    };
}

impl_collection!(HashTable<Bytes>, Hash);
impl_collection!(LinkedList, List);
impl_collection!(SortedSet, ZSet);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_detection() {
        assert!(matches!(Value::from_bytes(Bytes::from("42")), Value::Int(42)));
        assert!(matches!(Value::from_bytes(Bytes::from("-7")), Value::Int(-7)));
        assert!(matches!(Value::from_bytes(Bytes::from("042")), Value::Str(_)));
        assert!(matches!(Value::from_bytes(Bytes::from("+1")), Value::Str(_)));
        assert!(matches!(Value::from_bytes(Bytes::from("1.0")), Value::Str(_)));
        assert!(matches!(
            Value::from_bytes(Bytes::from("99999999999")),
            Value::Str(_)
        ));
        assert!(matches!(Value::from_bytes(Bytes::from("value")), Value::Str(_)));
    }

    #[test]
    fn test_collection_downcast() {
        let mut value = LinkedList::default().into_value();
        assert_eq!(value.kind(), ValueKind::List);
        assert!(LinkedList::from_value(&value).is_some());
        assert!(SortedSet::from_value(&value).is_none());
        assert!(<HashTable<Bytes>>::from_value_mut(&mut value).is_none());
    }
}
