//! litedb: a small in-memory key-value server
//!
//! Clients send length-prefixed command lines over TCP and receive typed
//! binary replies. Keys hold strings, integers, hashes, lists or sorted sets.
//! Every successful write is appended to an AOF that is replayed on startup.
//!
//! # Architecture
//!
//! - Single-threaded mio event loop owning the whole key space
//! - Per-connection request/response state machine
//! - Hand-built hash table, linked list and AVL-backed sorted set
//! - AOF flushed from a background thread on a fixed interval

/// Append-only command log
pub mod aof;

/// Blocking client
pub mod client;

/// Configuration management for the server
pub mod config;

/// Error types and result aliases
pub mod error;

/// Network layer for connection management
pub mod network;

/// Wire protocol and command execution
pub mod protocol;

/// Core server implementation
pub mod server;

/// In-memory data structures
pub mod storage;

pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use protocol::Response;
pub use server::{Server, ShutdownHandle};
