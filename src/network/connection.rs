use crate::error::Error;
use crate::protocol::{write_response, CommandExecutor, ExecMode, RequestParser};
use crate::storage::Database;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

const READ_CHUNK: usize = 8192;

/// Queued reply bytes, in maximal request frames, after which reading stops
/// until the client has taken its replies.
const WRITE_HIGH_WATER_FRAMES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for (more) request bytes
    Request,
    /// Responses are queued and waiting for the socket
    Response,
    /// Finished; the owner should drop the connection
    Done,
}

/// Per-client protocol state
///
/// Owns the request framing and a single write buffer. The socket itself is
/// passed to [`Connection::drive`] so the same state machine runs over a real
/// `mio` stream or an in-memory one.
pub struct Connection {
    pub connection_id: usize,
    state: ConnState,

    // Protocol parser
    parser: RequestParser,

    // Single consolidated write buffer
    write_buffer: Vec<u8>,
    write_position: usize,
    write_high_water: usize,

    // Peer sent EOF; buffered frames are still answered
    read_closed: bool,

    // Set once the stream can no longer be trusted
    close_after_flush: bool,

    // Client metadata
    pub client_addr: Option<SocketAddr>,
    pub commands_processed: u64,
}

impl Connection {
    pub fn new(max_message_size: usize, addr: Option<SocketAddr>) -> Self {
        static CONNECTION_ID: AtomicUsize = AtomicUsize::new(0);
        let connection_id = CONNECTION_ID.fetch_add(1, Ordering::Relaxed);

        let parser = RequestParser::new(max_message_size);
        let write_high_water = parser.frame_limit().saturating_mul(WRITE_HIGH_WATER_FRAMES);

        Self {
            connection_id,
            state: ConnState::Request,
            parser,
            write_buffer: Vec::with_capacity(READ_CHUNK),
            write_position: 0,
            write_high_water,
            read_closed: false,
            close_after_flush: false,
            client_addr: addr,
            commands_processed: 0,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnState::Done
    }

    pub fn close(&mut self) {
        self.state = ConnState::Done;
    }

    /// Get pending write data as a single buffer slice
    pub fn pending_writes(&self) -> Option<&[u8]> {
        if self.write_position < self.write_buffer.len() {
            Some(&self.write_buffer[self.write_position..])
        } else {
            None
        }
    }

    /// Mark bytes as written
    pub fn consume_writes(&mut self, n: usize) {
        self.write_position += n;
        if self.write_position >= self.write_buffer.len() {
            self.write_buffer.clear();
            self.write_position = 0;
        }
    }

    /// Reply bytes queued but not yet written
    pub fn write_backlog(&self) -> usize {
        self.write_buffer.len() - self.write_position
    }

    fn is_backlogged(&self) -> bool {
        self.write_backlog() >= self.write_high_water
    }

    /// Feed request bytes and execute complete frames in order, queueing one
    /// response per frame.
    ///
    /// Execution pauses once the write backlog reaches the high-water mark;
    /// the remaining frames stay buffered until the replies drain.
    pub fn process_read(&mut self, data: &[u8], db: &mut Database, executor: &CommandExecutor) {
        self.parser.feed(data);
        self.execute_buffered(db, executor);
    }

    fn execute_buffered(&mut self, db: &mut Database, executor: &CommandExecutor) {
        while !self.close_after_flush && !self.is_backlogged() {
            match self.parser.parse_next() {
                Ok(Some(line)) => {
                    self.commands_processed += 1;
                    let response = executor.execute_line(db, &line, ExecMode::Live);
                    write_response(&mut self.write_buffer, &response);
                }
                Ok(None) => break,
                Err(e) => {
                    write_response(&mut self.write_buffer, &e.to_response());
                    if !e.is_recoverable() {
                        warn!(
                            "Closing connection {} ({:?}): {}",
                            self.connection_id, self.client_addr, e
                        );
                        self.parser.clear();
                        self.close_after_flush = true;
                        break;
                    }
                }
            }
        }
    }

    /// Run the state machine until the socket would block or the
    /// connection is done.
    ///
    /// Readiness is edge-triggered, so each step drains its direction fully.
    pub fn drive<S: Read + Write>(
        &mut self,
        stream: &mut S,
        db: &mut Database,
        executor: &CommandExecutor,
    ) -> ConnState {
        loop {
            match self.state {
                ConnState::Request => {
                    self.state_request(stream, db, executor);
                    if self.state == ConnState::Request {
                        break;
                    }
                }
                ConnState::Response => {
                    self.state_response(stream);
                    if self.state == ConnState::Response {
                        break;
                    }
                }
                ConnState::Done => break,
            }
        }
        self.state
    }

    fn state_request<S: Read>(&mut self, stream: &mut S, db: &mut Database, executor: &CommandExecutor) {
        // Frames held back by a full write buffer go first
        self.execute_buffered(db, executor);

        let mut buffer = [0u8; READ_CHUNK];
        while !self.close_after_flush && !self.read_closed && !self.is_backlogged() {
            // Never hold more than one maximal frame
            let room = self
                .parser
                .frame_limit()
                .saturating_sub(self.parser.buffered())
                .min(READ_CHUNK);
            if room == 0 {
                break;
            }

            match stream.read(&mut buffer[..room]) {
                Ok(0) => {
                    self.read_closed = true;
                    break;
                }
                Ok(n) => self.process_read(&buffer[..n], db, executor),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    if e.kind() != ErrorKind::ConnectionReset {
                        debug!("Error reading from connection {}: {}", self.connection_id, Error::Io(e));
                    }
                    self.state = ConnState::Done;
                    return;
                }
            }
        }

        self.state = if self.pending_writes().is_some() {
            ConnState::Response
        } else if self.close_after_flush || self.read_closed {
            ConnState::Done
        } else {
            ConnState::Request
        };
    }

    fn state_response<S: Write>(&mut self, stream: &mut S) {
        while let Some(data) = self.pending_writes() {
            match stream.write(data) {
                Ok(0) => {
                    self.state = ConnState::Done;
                    return;
                }
                Ok(n) => self.consume_writes(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Error writing to connection {}: {}", self.connection_id, e);
                    self.state = ConnState::Done;
                    return;
                }
            }
        }

        self.state = if self.close_after_flush {
            ConnState::Done
        } else {
            ConnState::Request
        };
    }
}
