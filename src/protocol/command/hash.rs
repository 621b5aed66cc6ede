use crate::error::{Error, Result};
use crate::protocol::Response;
use crate::storage::{Database, HashTable};
use bytes::Bytes;

type Hash = HashTable<Bytes>;

/// 1 when `field` is new, 0 when an existing value was replaced
pub fn hset(db: &mut Database, key: &[u8], field: Bytes, value: Bytes) -> Result<Response> {
    let hash = db.collection_or_default::<Hash>(key)?;
    let is_new = hash.insert(field, value).is_none();
    Ok(Response::Int(is_new as i32))
}

pub fn hget(db: &Database, key: &[u8], field: &[u8]) -> Result<Response> {
    let hash = db
        .collection::<Hash>(key)?
        .ok_or_else(|| Error::NotFound(format!("hash '{}'", String::from_utf8_lossy(key))))?;

    match hash.get(field) {
        Some(value) => Ok(Response::Str(value.clone())),
        None => Err(Error::NotFound(format!(
            "field '{}'",
            String::from_utf8_lossy(field)
        ))),
    }
}

pub fn hdel(db: &mut Database, key: &[u8], field: &[u8]) -> Result<Response> {
    let removed = match db.collection_mut::<Hash>(key)? {
        Some(hash) => hash.remove(field).is_some(),
        None => false,
    };
    if removed {
        db.remove_if_empty::<Hash>(key);
    }
    Ok(Response::Int(removed as i32))
}

pub fn hlen(db: &Database, key: &[u8]) -> Result<Response> {
    let len = db.collection::<Hash>(key)?.map_or(0, |hash| hash.len());
    Ok(Response::count(len))
}

/// Each field as a nested `[field, value]` pair
pub fn hgetall(db: &Database, key: &[u8]) -> Result<Response> {
    let pairs = match db.collection::<Hash>(key)? {
        Some(hash) => hash
            .iter()
            .map(|(field, value)| {
                Response::Arr(vec![Response::Str(field.clone()), Response::Str(value.clone())])
            })
            .collect(),
        None => Vec::new(),
    };
    Ok(Response::Arr(pairs))
}
