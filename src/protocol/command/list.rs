use crate::error::{Error, Result};
use crate::protocol::Response;
use crate::storage::{Database, LinkedList};
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Front,
    Back,
}

/// Push one value and reply with the new length
pub fn push(db: &mut Database, key: &[u8], value: Bytes, end: End) -> Result<Response> {
    let list = db.collection_or_default::<LinkedList>(key)?;
    match end {
        End::Front => list.push_front(value),
        End::Back => list.push_back(value),
    }
    Ok(Response::count(list.len()))
}

pub fn pop(db: &mut Database, key: &[u8], end: End) -> Result<Response> {
    let popped = match db.collection_mut::<LinkedList>(key)? {
        Some(list) => match end {
            End::Front => list.pop_front(),
            End::Back => list.pop_back(),
        },
        None => None,
    };

    match popped {
        Some(value) => {
            db.remove_if_empty::<LinkedList>(key);
            Ok(Response::Str(value))
        }
        None => Ok(Response::Nil),
    }
}

/// Element at `index`; negative indexes count back from the tail
pub fn lget(db: &Database, key: &[u8], index: i64) -> Result<Response> {
    let list = db.collection::<LinkedList>(key)?;
    let len = list.map_or(0, |list| list.len());

    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };

    let value = usize::try_from(resolved)
        .ok()
        .and_then(|i| list.and_then(|list| list.get(i)));

    match value {
        Some(value) => Ok(Response::Str(value.clone())),
        None => Err(Error::InvalidArgument(format!(
            "index {} out of range",
            index
        ))),
    }
}

pub fn llen(db: &Database, key: &[u8]) -> Result<Response> {
    let len = db.collection::<LinkedList>(key)?.map_or(0, |list| list.len());
    Ok(Response::count(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_push_order() {
        let mut db = Database::new();
        assert_eq!(push(&mut db, b"l", b("b"), End::Front).unwrap(), Response::Int(1));
        assert_eq!(push(&mut db, b"l", b("a"), End::Front).unwrap(), Response::Int(2));
        assert_eq!(push(&mut db, b"l", b("c"), End::Back).unwrap(), Response::Int(3));

        assert_eq!(lget(&db, b"l", 0).unwrap(), Response::str("a"));
        assert_eq!(lget(&db, b"l", 1).unwrap(), Response::str("b"));
        assert_eq!(lget(&db, b"l", 2).unwrap(), Response::str("c"));
        assert_eq!(lget(&db, b"l", -1).unwrap(), Response::str("c"));
        assert_eq!(lget(&db, b"l", -3).unwrap(), Response::str("a"));
    }

    #[test]
    fn test_lget_out_of_range() {
        let mut db = Database::new();
        assert!(matches!(lget(&db, b"l", 0), Err(Error::InvalidArgument(_))));

        push(&mut db, b"l", b("x"), End::Back).unwrap();
        assert!(matches!(lget(&db, b"l", 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(lget(&db, b"l", -2), Err(Error::InvalidArgument(_))));
        assert!(matches!(lget(&db, b"l", i64::MIN), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_pop_until_empty_deletes_key() {
        let mut db = Database::new();
        push(&mut db, b"l", b("a"), End::Back).unwrap();
        push(&mut db, b"l", b("b"), End::Back).unwrap();

        assert_eq!(pop(&mut db, b"l", End::Back).unwrap(), Response::str("b"));
        assert_eq!(llen(&db, b"l").unwrap(), Response::Int(1));
        assert_eq!(pop(&mut db, b"l", End::Front).unwrap(), Response::str("a"));
        assert!(db.is_empty());
        assert_eq!(pop(&mut db, b"l", End::Front).unwrap(), Response::Nil);
        assert_eq!(llen(&db, b"l").unwrap(), Response::Int(0));
    }

    #[test]
    fn test_wrong_type() {
        let mut db = Database::new();
        db.set("s", crate::storage::Value::Str(b("x")));
        assert!(matches!(push(&mut db, b"s", b("v"), End::Back), Err(Error::WrongType)));
        assert!(matches!(pop(&mut db, b"s", End::Back), Err(Error::WrongType)));
        assert!(matches!(llen(&db, b"s"), Err(Error::WrongType)));
    }
}
