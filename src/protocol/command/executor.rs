use super::hash;
use super::list::{self, End};
use super::parser::{parse_command, tokenize};
use super::zset;
use super::Command;
use crate::aof::Aof;
use crate::error::{Error, Result};
use crate::protocol::Response;
use crate::storage::{Database, Value};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Whether executed writes are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Serving clients: successful writes go to the AOF
    Live,
    /// Rebuilding from the AOF: nothing is logged
    Replay,
}

/// Executes command lines against a [`Database`]
///
/// Holds no data itself; the database is passed in by the event loop on each
/// call.
#[derive(Clone, Default)]
pub struct CommandExecutor {
    aof: Option<Arc<Aof>>,
    commands_processed: Arc<AtomicU64>,
}

impl CommandExecutor {
    /// An executor that keeps nothing on disk
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor that logs successful writes to `aof`
    pub fn with_aof(aof: Arc<Aof>) -> Self {
        Self {
            aof: Some(aof),
            ..Self::default()
        }
    }

    pub fn aof(&self) -> Option<&Arc<Aof>> {
        self.aof.as_ref()
    }

    /// Commands executed without error since startup, replay included
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }

    /// Parse, execute and (in live mode) log one command line.
    ///
    /// Every failure becomes an `ERR` reply; nothing here closes the
    /// connection.
    pub fn execute_line(&self, db: &mut Database, line: &str, mode: ExecMode) -> Response {
        match self.try_execute_line(db, line, mode) {
            Ok(response) => response,
            Err(e) => e.to_response(),
        }
    }

    fn try_execute_line(&self, db: &mut Database, line: &str, mode: ExecMode) -> Result<Response> {
        let tokens = tokenize(line)?;
        let cmd = parse_command(&tokens)?;
        let is_write = cmd.is_write();

        let response = self.execute(db, cmd)?;
        self.commands_processed.fetch_add(1, Ordering::Relaxed);

        if is_write && mode == ExecMode::Live {
            if let Some(aof) = &self.aof {
                let record = tokens.join(" ");
                if let Err(e) = aof.append(&record) {
                    error!("Failed to append {:?} to AOF: {}", record, e);
                }
            }
        }

        Ok(response)
    }

    /// Execute a parsed command
    pub fn execute(&self, db: &mut Database, cmd: Command) -> Result<Response> {
        match cmd {
            Command::Ping(msg) => Ok(match msg {
                Some(m) => Response::Str(m),
                None => Response::str(Bytes::from_static(b"PONG")),
            }),

            Command::Get(key) => match db.get(&key) {
                Some(Value::Str(s)) => Ok(Response::Str(s.clone())),
                Some(Value::Int(n)) => Ok(Response::Int(*n)),
                Some(_) => Err(Error::WrongType),
                None => Ok(Response::Nil),
            },

            Command::Set { key, value } => {
                db.set(key, Value::from_bytes(value));
                Ok(Response::ok())
            }

            Command::Del(key) => Ok(Response::Int(db.remove(&key).is_some() as i32)),

            Command::HSet { key, field, value } => hash::hset(db, &key, field, value),
            Command::HGet { key, field } => hash::hget(db, &key, &field),
            Command::HDel { key, field } => hash::hdel(db, &key, &field),
            Command::HLen(key) => hash::hlen(db, &key),
            Command::HGetAll(key) => hash::hgetall(db, &key),

            Command::LPush { key, value } => list::push(db, &key, value, End::Front),
            Command::RPush { key, value } => list::push(db, &key, value, End::Back),
            Command::LPop(key) => list::pop(db, &key, End::Front),
            Command::RPop(key) => list::pop(db, &key, End::Back),
            Command::LGet { key, index } => list::lget(db, &key, index),
            Command::LLen(key) => list::llen(db, &key),

            Command::ZAdd { key, score, member } => zset::zadd(db, &key, score, member),
            Command::ZRem { key, member } => zset::zrem(db, &key, &member),
            Command::ZScore { key, member } => zset::zscore(db, &key, &member),
            Command::ZCard(key) => zset::zcard(db, &key),
            Command::ZRank { key, member } => zset::zrank(db, &key, &member),
            Command::ZRange { key, min, count } => zset::zrange(db, &key, min, count),
            Command::ZRevRange { key, max, count } => zset::zrevrange(db, &key, max, count),

            Command::Keys => Ok(Response::Arr(
                db.keys().map(|key| Response::Str(key.clone())).collect(),
            )),

            Command::FlushAll => {
                db.flush();
                Ok(Response::ok())
            }
        }
    }
}
