use bytes::Bytes;

mod executor;
mod hash;
mod list;
mod parser;
mod zset;

pub use executor::{CommandExecutor, ExecMode};
pub use parser::{parse_command, tokenize, MAX_ARGS};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Basic commands
    Ping(Option<Bytes>),
    Get(Bytes),
    Set {
        key: Bytes,
        value: Bytes,
    },
    Del(Bytes),

    // Hash commands
    HSet {
        key: Bytes,
        field: Bytes,
        value: Bytes,
    },
    HGet {
        key: Bytes,
        field: Bytes,
    },
    HDel {
        key: Bytes,
        field: Bytes,
    },
    HLen(Bytes),
    HGetAll(Bytes),

    // List commands
    LPush {
        key: Bytes,
        value: Bytes,
    },
    RPush {
        key: Bytes,
        value: Bytes,
    },
    LPop(Bytes),
    RPop(Bytes),
    LGet {
        key: Bytes,
        index: i64,
    },
    LLen(Bytes),

    // Sorted set commands
    ZAdd {
        key: Bytes,
        score: f32,
        member: Bytes,
    },
    ZRem {
        key: Bytes,
        member: Bytes,
    },
    ZScore {
        key: Bytes,
        member: Bytes,
    },
    ZCard(Bytes),
    ZRank {
        key: Bytes,
        member: Bytes,
    },
    ZRange {
        key: Bytes,
        min: f32,
        count: usize,
    },
    ZRevRange {
        key: Bytes,
        max: f32,
        count: usize,
    },

    // Server commands
    Keys,
    FlushAll,
}

impl Command {
    /// Parse a raw command line
    pub fn from_line(line: &str) -> crate::Result<Self> {
        parse_command(&tokenize(line)?)
    }

    /// Whether the command changes the key space and belongs in the AOF
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::Del(_)
                | Command::HSet { .. }
                | Command::HDel { .. }
                | Command::LPush { .. }
                | Command::RPush { .. }
                | Command::LPop(_)
                | Command::RPop(_)
                | Command::ZAdd { .. }
                | Command::ZRem { .. }
                | Command::FlushAll
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping(_) => "PING",
            Command::Get(_) => "GET",
            Command::Set { .. } => "SET",
            Command::Del(_) => "DEL",
            Command::HSet { .. } => "HSET",
            Command::HGet { .. } => "HGET",
            Command::HDel { .. } => "HDEL",
            Command::HLen(_) => "HLEN",
            Command::HGetAll(_) => "HGETALL",
            Command::LPush { .. } => "LPUSH",
            Command::RPush { .. } => "RPUSH",
            Command::LPop(_) => "LPOP",
            Command::RPop(_) => "RPOP",
            Command::LGet { .. } => "LGET",
            Command::LLen(_) => "LLEN",
            Command::ZAdd { .. } => "ZADD",
            Command::ZRem { .. } => "ZREM",
            Command::ZScore { .. } => "ZSCORE",
            Command::ZCard(_) => "ZCARD",
            Command::ZRank { .. } => "ZRANK",
            Command::ZRange { .. } => "ZRANGE",
            Command::ZRevRange { .. } => "ZREVRANGE",
            Command::Keys => "KEYS",
            Command::FlushAll => "FLUSHALL",
        }
    }
}
