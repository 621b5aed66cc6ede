use crate::error::{Error, Result};
use bytes::Bytes;

/// Bytes in a response header: 1-byte tag + 4-byte length
pub const RESPONSE_HEADER_LEN: usize = 5;

/// Deepest array nesting accepted when decoding
const MAX_DEPTH: usize = 64;

/// Wire tag of each response kind
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Nil = 0,
    Err = 1,
    Str = 2,
    Int = 3,
    Float = 4,
    Arr = 5,
}

impl TryFrom<u8> for Tag {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        Ok(match byte {
            0 => Tag::Nil,
            1 => Tag::Err,
            2 => Tag::Str,
            3 => Tag::Int,
            4 => Tag::Float,
            5 => Tag::Arr,
            other => return Err(Error::Protocol(format!("unknown response tag {}", other))),
        })
    }
}

/// A typed reply.
///
/// Every kind is framed as `[tag][len u32 LE][payload]`. `Int` and `Float`
/// carry 4-byte little-endian payloads; for `Arr` the length field is the
/// element count and the elements follow as complete frames.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Nil,
    Err(String),
    Str(Bytes),
    Int(i32),
    Float(f32),
    Arr(Vec<Response>),
}

impl Response {
    pub fn ok() -> Self {
        Response::Str(Bytes::from_static(b"OK"))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Err(msg.into())
    }

    pub fn str(s: impl Into<Bytes>) -> Self {
        Response::Str(s.into())
    }

    /// Counts travel as `INT`; anything past `i32::MAX` saturates
    pub fn count(n: usize) -> Self {
        Response::Int(i32::try_from(n).unwrap_or(i32::MAX))
    }

    pub fn tag(&self) -> Tag {
        match self {
            Response::Nil => Tag::Nil,
            Response::Err(_) => Tag::Err,
            Response::Str(_) => Tag::Str,
            Response::Int(_) => Tag::Int,
            Response::Float(_) => Tag::Float,
            Response::Arr(_) => Tag::Arr,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Err(_))
    }
}

#[inline]
fn put_header(buf: &mut Vec<u8>, tag: Tag, len: usize) {
    buf.push(tag as u8);
    buf.extend_from_slice(&(len as u32).to_le_bytes());
}

/// Format a response into a freshly allocated buffer
pub fn encode_response(value: &Response) -> Vec<u8> {
    let mut result = Vec::with_capacity(encoded_len(value));
    write_response(&mut result, value);
    result
}

/// Append the encoding of `value` to `buf`
pub fn write_response(buf: &mut Vec<u8>, value: &Response) {
    match value {
        Response::Nil => put_header(buf, Tag::Nil, 0),
        Response::Err(msg) => {
            put_header(buf, Tag::Err, msg.len());
            buf.extend_from_slice(msg.as_bytes());
        }
        Response::Str(s) => {
            put_header(buf, Tag::Str, s.len());
            buf.extend_from_slice(s);
        }
        Response::Int(n) => {
            put_header(buf, Tag::Int, 4);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Response::Float(f) => {
            put_header(buf, Tag::Float, 4);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Response::Arr(items) => {
            put_header(buf, Tag::Arr, items.len());
            for item in items {
                write_response(buf, item);
            }
        }
    }
}

/// Exact number of bytes [`write_response`] produces for `value`
pub fn encoded_len(value: &Response) -> usize {
    RESPONSE_HEADER_LEN
        + match value {
            Response::Nil => 0,
            Response::Err(msg) => msg.len(),
            Response::Str(s) => s.len(),
            Response::Int(_) | Response::Float(_) => 4,
            Response::Arr(items) => items.iter().map(encoded_len).sum(),
        }
}

/// Decode one response from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the value and the
/// number of bytes it occupied.
pub fn parse_response(buf: &[u8]) -> Result<Option<(Response, usize)>> {
    parse_value(buf, 0)
}

fn parse_value(buf: &[u8], depth: usize) -> Result<Option<(Response, usize)>> {
    if buf.len() < RESPONSE_HEADER_LEN {
        return Ok(None);
    }
    if depth > MAX_DEPTH {
        return Err(Error::Protocol("response nested too deeply".to_string()));
    }

    let tag = Tag::try_from(buf[0])?;
    let len = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    let body = &buf[RESPONSE_HEADER_LEN..];

    let value = match tag {
        Tag::Nil => {
            fixed_payload(tag, len, body, 0)?;
            Response::Nil
        }
        Tag::Int => match fixed_payload(tag, len, body, 4)? {
            Some(b) => Response::Int(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            None => return Ok(None),
        },
        Tag::Float => match fixed_payload(tag, len, body, 4)? {
            Some(b) => Response::Float(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            None => return Ok(None),
        },
        Tag::Str => match body.get(..len) {
            Some(b) => Response::Str(Bytes::copy_from_slice(b)),
            None => return Ok(None),
        },
        Tag::Err => match body.get(..len) {
            Some(b) => Response::Err(
                String::from_utf8(b.to_vec())
                    .map_err(|_| Error::Protocol("invalid UTF-8 in error".to_string()))?,
            ),
            None => return Ok(None),
        },
        Tag::Arr => {
            // every element needs at least a header
            let mut items = Vec::with_capacity(len.min(body.len() / RESPONSE_HEADER_LEN));
            let mut pos = RESPONSE_HEADER_LEN;
            for _ in 0..len {
                match parse_value(&buf[pos..], depth + 1)? {
                    Some((item, consumed)) => {
                        items.push(item);
                        pos += consumed;
                    }
                    None => return Ok(None),
                }
            }
            return Ok(Some((Response::Arr(items), pos)));
        }
    };

    let consumed = match &value {
        Response::Nil => RESPONSE_HEADER_LEN,
        _ => RESPONSE_HEADER_LEN + len,
    };
    Ok(Some((value, consumed)))
}

/// Payload of a fixed-width kind, `None` while it is still incomplete
fn fixed_payload(tag: Tag, len: usize, body: &[u8], expected: usize) -> Result<Option<&[u8]>> {
    if len != expected {
        return Err(Error::Protocol(format!(
            "{:?} response with length {}, expected {}",
            tag, len, expected
        )));
    }
    Ok(body.get(..expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &Response) -> Response {
        let bytes = encode_response(value);
        assert_eq!(bytes.len(), encoded_len(value));
        let (decoded, consumed) = parse_response(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        decoded
    }

    #[test]
    fn test_nil_layout() {
        assert_eq!(encode_response(&Response::Nil), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_str_layout() {
        let bytes = encode_response(&Response::str("value"));
        assert_eq!(bytes[0], Tag::Str as u8);
        assert_eq!(u32::from_le_bytes(bytes[1..5].try_into().unwrap()), 5);
        assert_eq!(&bytes[5..], b"value");
    }

    #[test]
    fn test_int_and_float_layout() {
        let bytes = encode_response(&Response::Int(123));
        assert_eq!(bytes[0], Tag::Int as u8);
        assert_eq!(u32::from_le_bytes(bytes[1..5].try_into().unwrap()), 4);
        assert_eq!(i32::from_le_bytes(bytes[5..9].try_into().unwrap()), 123);

        let bytes = encode_response(&Response::Float(123.456));
        assert_eq!(bytes[0], Tag::Float as u8);
        assert_eq!(f32::from_le_bytes(bytes[5..9].try_into().unwrap()), 123.456);
    }

    #[test]
    fn test_error_layout() {
        let bytes = encode_response(&Response::error("error message"));
        assert_eq!(bytes[0], Tag::Err as u8);
        assert_eq!(u32::from_le_bytes(bytes[1..5].try_into().unwrap()), 13);
        assert_eq!(&bytes[5..], b"error message");
    }

    #[test]
    fn test_array_length_is_element_count() {
        let arr = Response::Arr(vec![Response::str("a"), Response::Float(1.0)]);
        let bytes = encode_response(&arr);
        assert_eq!(bytes[0], Tag::Arr as u8);
        assert_eq!(u32::from_le_bytes(bytes[1..5].try_into().unwrap()), 2);
        assert_eq!(bytes[5], Tag::Str as u8);
    }

    #[test]
    fn test_roundtrips() {
        let values = [
            Response::Nil,
            Response::error("ERR nope"),
            Response::str(""),
            Response::str("hello"),
            Response::Int(i32::MIN),
            Response::Float(-0.0),
            Response::Float(f32::INFINITY),
            Response::Arr(vec![]),
            Response::Arr(vec![
                Response::Int(1),
                Response::Arr(vec![Response::Nil, Response::Arr(vec![Response::str("deep")])]),
                Response::error("inner"),
            ]),
        ];
        for value in &values {
            assert_eq!(&roundtrip(value), value);
        }
    }

    #[test]
    fn test_float_roundtrip_is_bit_exact() {
        let nan = f32::from_bits(0x7fc0_1234);
        match roundtrip(&Response::Float(nan)) {
            Response::Float(f) => assert_eq!(f.to_bits(), nan.to_bits()),
            other => panic!("expected float, got {:?}", other),
        }
        match roundtrip(&Response::Float(-0.0)) {
            Response::Float(f) => assert_eq!(f.to_bits(), (-0.0f32).to_bits()),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_input_needs_more() {
        let bytes = encode_response(&Response::Arr(vec![Response::str("abc"), Response::Int(7)]));
        for cut in 0..bytes.len() {
            assert!(parse_response(&bytes[..cut]).unwrap().is_none(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_trailing_bytes_are_left_alone() {
        let mut bytes = encode_response(&Response::Int(1));
        bytes.extend_from_slice(&encode_response(&Response::Nil));
        let (value, consumed) = parse_response(&bytes).unwrap().unwrap();
        assert_eq!(value, Response::Int(1));
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_rejects_bad_frames() {
        assert!(parse_response(&[9, 0, 0, 0, 0]).is_err());
        assert!(parse_response(&[Tag::Int as u8, 2, 0, 0, 0, 1, 2]).is_err());
        assert!(parse_response(&[Tag::Nil as u8, 1, 0, 0, 0]).is_err());
    }
}
