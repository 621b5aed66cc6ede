//! Wire protocol and command layer
//!
//! Requests are `[len u32 LE][UTF-8 command line]`, responses are the tagged
//! frames of [`Response`].

pub mod command;
pub mod frame;
pub mod response;

pub use command::{Command, CommandExecutor, ExecMode};
pub use frame::{encode_request, RequestParser};
pub use response::{encode_response, parse_response, write_response, Response, Tag};
