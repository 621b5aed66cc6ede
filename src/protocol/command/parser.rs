use super::Command;
use crate::error::{Error, Result};
use bytes::Bytes;

/// Most arguments a command may carry after its name
pub const MAX_ARGS: usize = 10;

/// Split a command line on ASCII whitespace.
///
/// Runs of whitespace count as one separator, so the tokens joined by single
/// spaces are the canonical form of the line.
pub fn tokenize(line: &str) -> Result<Vec<&str>> {
    let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return Err(Error::EmptyCommand);
    }
    if tokens.len() - 1 > MAX_ARGS {
        return Err(Error::TooManyArguments { max: MAX_ARGS });
    }
    Ok(tokens)
}

/// Build a [`Command`] from tokens produced by [`tokenize`]
pub fn parse_command(tokens: &[&str]) -> Result<Command> {
    let (name, args) = match tokens.split_first() {
        Some((name, args)) => (*name, args),
        None => return Err(Error::EmptyCommand),
    };

    // Convert to uppercase for case-insensitive matching
    let cmd_upper = name.to_ascii_uppercase();

    let cmd = match cmd_upper.as_str() {
        "PING" => match args {
            [] => Command::Ping(None),
            [msg] => Command::Ping(Some(bytes(msg))),
            _ => return Err(arity("PING")),
        },

        "GET" => {
            let [key] = exact::<1>(args, "GET")?;
            Command::Get(bytes(key))
        }

        "SET" => {
            let [key, value] = exact::<2>(args, "SET")?;
            Command::Set {
                key: bytes(key),
                value: bytes(value),
            }
        }

        "DEL" => {
            let [key] = exact::<1>(args, "DEL")?;
            Command::Del(bytes(key))
        }

        "HSET" => {
            let [key, field, value] = exact::<3>(args, "HSET")?;
            Command::HSet {
                key: bytes(key),
                field: bytes(field),
                value: bytes(value),
            }
        }

        "HGET" => {
            let [key, field] = exact::<2>(args, "HGET")?;
            Command::HGet {
                key: bytes(key),
                field: bytes(field),
            }
        }

        "HDEL" => {
            let [key, field] = exact::<2>(args, "HDEL")?;
            Command::HDel {
                key: bytes(key),
                field: bytes(field),
            }
        }

        "HLEN" => {
            let [key] = exact::<1>(args, "HLEN")?;
            Command::HLen(bytes(key))
        }

        "HGETALL" => {
            let [key] = exact::<1>(args, "HGETALL")?;
            Command::HGetAll(bytes(key))
        }

        "LPUSH" => {
            let [key, value] = exact::<2>(args, "LPUSH")?;
            Command::LPush {
                key: bytes(key),
                value: bytes(value),
            }
        }

        "RPUSH" => {
            let [key, value] = exact::<2>(args, "RPUSH")?;
            Command::RPush {
                key: bytes(key),
                value: bytes(value),
            }
        }

        "LPOP" => {
            let [key] = exact::<1>(args, "LPOP")?;
            Command::LPop(bytes(key))
        }

        "RPOP" => {
            let [key] = exact::<1>(args, "RPOP")?;
            Command::RPop(bytes(key))
        }

        "LGET" => {
            let [key, index] = exact::<2>(args, "LGET")?;
            Command::LGet {
                key: bytes(key),
                index: parse_integer(index)?,
            }
        }

        "LLEN" => {
            let [key] = exact::<1>(args, "LLEN")?;
            Command::LLen(bytes(key))
        }

        "ZADD" => {
            let [key, score, member] = exact::<3>(args, "ZADD")?;
            Command::ZAdd {
                key: bytes(key),
                score: parse_score(score)?,
                member: bytes(member),
            }
        }

        "ZREM" => {
            let [key, member] = exact::<2>(args, "ZREM")?;
            Command::ZRem {
                key: bytes(key),
                member: bytes(member),
            }
        }

        "ZSCORE" => {
            let [key, member] = exact::<2>(args, "ZSCORE")?;
            Command::ZScore {
                key: bytes(key),
                member: bytes(member),
            }
        }

        "ZCARD" => {
            let [key] = exact::<1>(args, "ZCARD")?;
            Command::ZCard(bytes(key))
        }

        "ZRANK" => {
            let [key, member] = exact::<2>(args, "ZRANK")?;
            Command::ZRank {
                key: bytes(key),
                member: bytes(member),
            }
        }

        "ZRANGE" => {
            let [key, min, count] = exact::<3>(args, "ZRANGE")?;
            Command::ZRange {
                key: bytes(key),
                min: parse_score(min)?,
                count: parse_count(count)?,
            }
        }

        "ZREVRANGE" => {
            let [key, max, count] = exact::<3>(args, "ZREVRANGE")?;
            Command::ZRevRange {
                key: bytes(key),
                max: parse_score(max)?,
                count: parse_count(count)?,
            }
        }

        "KEYS" => {
            let [] = exact::<0>(args, "KEYS")?;
            Command::Keys
        }

        "FLUSHALL" => {
            let [] = exact::<0>(args, "FLUSHALL")?;
            Command::FlushAll
        }

        _ => return Err(Error::InvalidCommand(name.to_string())),
    };

    Ok(cmd)
}

#[inline]
fn bytes(token: &str) -> Bytes {
    Bytes::copy_from_slice(token.as_bytes())
}

#[inline]
fn arity(name: &str) -> Error {
    Error::WrongArity(name.to_string())
}

/// Destructure exactly `N` arguments
#[inline]
fn exact<'a, const N: usize>(args: &[&'a str], name: &str) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| arity(name))
}

fn parse_integer(token: &str) -> Result<i64> {
    token
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("'{}' is not an integer", token)))
}

fn parse_count(token: &str) -> Result<usize> {
    token
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("'{}' is not a valid count", token)))
}

/// Scores are finite or infinite floats; NaN has no place in the ordering
/// and `-0.0` is folded into `0.0` so equal scores share one bit pattern.
fn parse_score(token: &str) -> Result<f32> {
    match token.parse::<f32>() {
        Ok(score) if score.is_nan() => Err(Error::InvalidArgument("score is NaN".to_string())),
        Ok(score) if score == 0.0 => Ok(0.0),
        Ok(score) => Ok(score),
        Err(_) => Err(Error::InvalidArgument(format!(
            "'{}' is not a valid float",
            token
        ))),
    }
}
