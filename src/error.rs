use crate::protocol::Response;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("message too long ({len} bytes, max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("request is not valid UTF-8")]
    InvalidUtf8,

    #[error("empty command")]
    EmptyCommand,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("too many arguments (max {max})")]
    TooManyArguments { max: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convert error to an `ERR` response frame
    pub fn to_response(&self) -> Response {
        match self {
            Error::WrongArity(cmd) => Response::error(format!(
                "ERR wrong number of arguments for '{}' command",
                cmd
            )),
            Error::InvalidCommand(cmd) => {
                Response::error(format!("ERR unknown command '{}'", cmd))
            }
            Error::WrongType => Response::error(self.to_string()),
            _ => Response::error(format!("ERR {}", self)),
        }
    }

    /// Whether the connection can keep going after replying with this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::FrameTooLarge { .. })
    }
}
