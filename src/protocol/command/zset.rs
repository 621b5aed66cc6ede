use crate::error::Result;
use crate::protocol::Response;
use crate::storage::{Database, SortedSet};
use bytes::Bytes;

pub fn zadd(db: &mut Database, key: &[u8], score: f32, member: Bytes) -> Result<Response> {
    let zset = db.collection_or_default::<SortedSet>(key)?;
    let added = zset.add(member, score);
    Ok(Response::Int(added as i32))
}

pub fn zrem(db: &mut Database, key: &[u8], member: &[u8]) -> Result<Response> {
    let removed = match db.collection_mut::<SortedSet>(key)? {
        Some(zset) => zset.remove(member),
        None => false,
    };
    if removed {
        db.remove_if_empty::<SortedSet>(key);
    }
    Ok(Response::Int(removed as i32))
}

pub fn zscore(db: &Database, key: &[u8], member: &[u8]) -> Result<Response> {
    let score = db
        .collection::<SortedSet>(key)?
        .and_then(|zset| zset.score(member));
    Ok(score.map_or(Response::Nil, Response::Float))
}

pub fn zcard(db: &Database, key: &[u8]) -> Result<Response> {
    let len = db.collection::<SortedSet>(key)?.map_or(0, |zset| zset.len());
    Ok(Response::count(len))
}

pub fn zrank(db: &Database, key: &[u8], member: &[u8]) -> Result<Response> {
    let rank = db
        .collection::<SortedSet>(key)?
        .and_then(|zset| zset.rank(member));
    Ok(rank.map_or(Response::Nil, Response::count))
}

/// Up to `count` members from the first one scoring at least `min`, ascending
pub fn zrange(db: &Database, key: &[u8], min: f32, count: usize) -> Result<Response> {
    let entries = db
        .collection::<SortedSet>(key)?
        .map(|zset| zset.range(min, count))
        .unwrap_or_default();
    Ok(interleave(entries))
}

/// Up to `count` members from the last one scoring at most `max`, descending
pub fn zrevrange(db: &Database, key: &[u8], max: f32, count: usize) -> Result<Response> {
    let entries = db
        .collection::<SortedSet>(key)?
        .map(|zset| zset.rev_range(max, count))
        .unwrap_or_default();
    Ok(interleave(entries))
}

/// `[member, score, member, score, ...]`
fn interleave(entries: Vec<(Bytes, f32)>) -> Response {
    let mut items = Vec::with_capacity(entries.len() * 2);
    for (member, score) in entries {
        items.push(Response::Str(member));
        items.push(Response::Float(score));
    }
    Response::Arr(items)
}
