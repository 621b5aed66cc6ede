use crate::error::{Error, Result};
use crate::protocol::{encode_request, parse_response, Response};
use bytes::{Buf, BytesMut};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Blocking client speaking the request/response framing
///
/// ```no_run
/// use litedb::{Client, Response};
///
/// let mut client = Client::connect("127.0.0.1:9000")?;
/// client.send("SET greeting hello")?;
/// assert_eq!(client.send("GET greeting")?, Response::str("hello"));
/// # Ok::<(), litedb::Error>(())
/// ```
pub struct Client {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Bound how long [`Client::send`] waits for a reply
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send one command line and wait for its reply
    pub fn send(&mut self, line: &str) -> Result<Response> {
        self.stream.write_all(&encode_request(line))?;
        self.read_response()
    }

    /// Send every line in a single write, then collect the replies in order
    pub fn pipeline(&mut self, lines: &[&str]) -> Result<Vec<Response>> {
        let mut batch = Vec::new();
        for line in lines {
            batch.extend_from_slice(&encode_request(line));
        }
        self.stream.write_all(&batch)?;

        lines.iter().map(|_| self.read_response()).collect()
    }

    /// Write raw bytes without framing them
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    /// Read the next reply from the connection
    pub fn read_response(&mut self) -> Result<Response> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some((response, consumed)) = parse_response(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok(response);
            }

            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(Error::Protocol(
                    "connection closed before a full response".to_string(),
                ));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}
