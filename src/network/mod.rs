mod connection;

pub use connection::{ConnState, Connection};
