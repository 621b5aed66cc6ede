use crate::error::{Error, Result};
use bytes::{Buf, BytesMut};

/// Bytes in a request header: the 4-byte little-endian payload length
pub const REQUEST_HEADER_LEN: usize = 4;

/// Frame a command line as a request
pub fn encode_request(line: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(REQUEST_HEADER_LEN + line.len());
    buf.extend_from_slice(&(line.len() as u32).to_le_bytes());
    buf.extend_from_slice(line.as_bytes());
    buf
}

/// Accumulates request bytes and splits them into command lines
pub struct RequestParser {
    buffer: BytesMut,
    max_len: usize,
}

impl RequestParser {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(REQUEST_HEADER_LEN + max_len),
            max_len,
        }
    }

    /// Feed data into the parser
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes received but not yet consumed as a complete frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Largest frame, header included, this parser will ever hold
    pub fn frame_limit(&self) -> usize {
        REQUEST_HEADER_LEN + self.max_len
    }

    /// Parse the next complete command line.
    ///
    /// `Ok(None)` means more bytes are needed. A header announcing more than
    /// `max_len` bytes is [`Error::FrameTooLarge`] and leaves the buffer as
    /// is, since the stream cannot be resynchronized. A payload that is not
    /// UTF-8 is consumed and reported as [`Error::InvalidUtf8`].
    pub fn parse_next(&mut self) -> Result<Option<String>> {
        if self.buffer.len() < REQUEST_HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_le_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]) as usize;

        if len > self.max_len {
            return Err(Error::FrameTooLarge {
                len,
                max: self.max_len,
            });
        }

        if self.buffer.len() < REQUEST_HEADER_LEN + len {
            return Ok(None);
        }

        self.buffer.advance(REQUEST_HEADER_LEN);
        let payload = self.buffer.split_to(len);

        String::from_utf8(payload.to_vec())
            .map(Some)
            .map_err(|_| Error::InvalidUtf8)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut parser = RequestParser::new(4096);
        parser.feed(&encode_request("SET key value"));
        assert_eq!(parser.parse_next().unwrap().as_deref(), Some("SET key value"));
        assert_eq!(parser.parse_next().unwrap(), None);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut parser = RequestParser::new(4096);
        let frame = encode_request("GET key");
        for (i, byte) in frame.iter().enumerate() {
            assert_eq!(parser.parse_next().unwrap(), None, "early frame at byte {}", i);
            parser.feed(&[*byte]);
        }
        assert_eq!(parser.parse_next().unwrap().as_deref(), Some("GET key"));
    }

    #[test]
    fn test_pipelined_frames() {
        let mut parser = RequestParser::new(4096);
        let mut data = encode_request("PING");
        data.extend(encode_request("KEYS"));
        data.extend(&encode_request("GET a")[..3]);
        parser.feed(&data);

        assert_eq!(parser.parse_next().unwrap().as_deref(), Some("PING"));
        assert_eq!(parser.parse_next().unwrap().as_deref(), Some("KEYS"));
        assert_eq!(parser.parse_next().unwrap(), None);
        assert_eq!(parser.buffered(), 3);
    }

    #[test]
    fn test_empty_payload() {
        let mut parser = RequestParser::new(16);
        parser.feed(&encode_request(""));
        assert_eq!(parser.parse_next().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut parser = RequestParser::new(8);
        parser.feed(&encode_request("123456789"));
        assert!(matches!(
            parser.parse_next(),
            Err(Error::FrameTooLarge { len: 9, max: 8 })
        ));

        let mut parser = RequestParser::new(8);
        parser.feed(&encode_request("12345678"));
        assert_eq!(parser.parse_next().unwrap().as_deref(), Some("12345678"));
    }

    #[test]
    fn test_invalid_utf8_is_consumed() {
        let mut parser = RequestParser::new(64);
        parser.feed(&[2, 0, 0, 0, 0xff, 0xfe]);
        parser.feed(&encode_request("PING"));
        assert!(matches!(parser.parse_next(), Err(Error::InvalidUtf8)));
        assert_eq!(parser.parse_next().unwrap().as_deref(), Some("PING"));
    }
}
