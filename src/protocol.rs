//! The wire codec.
//!
//! Requests arrive as length-prefixed frames holding an argument vector;
//! responses leave as a typed token stream wrapped in its own length prefix.
//! All integers on the wire are little-endian; strings are raw bytes.
//!
//! Request frame:
//!
//! ```text
//! u32 len | u32 argc | argc x (u32 arg_len, arg bytes)
//! ```
//!
//! Response tokens: nil, error (code + message), string, integer, double,
//! and array (header plus that many child tokens). Both directions live
//! here: the server serializes replies, the CLI and the tests parse them.

use crate::error::{ZedisError, ZedisResult};
use bytes::{Buf, BufMut, BytesMut};

/// Hard ceiling on a request frame's payload length.
pub const MAX_FRAME_SIZE: usize = 4096;

const TAG_NIL: u8 = 0;
const TAG_ERROR: u8 = 1;
const TAG_STRING: u8 = 2;
const TAG_INTEGER: u8 = 3;
const TAG_DOUBLE: u8 = 4;
const TAG_ARRAY: u8 = 5;

/// Client-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Verb not in the dispatcher table.
    Unknown = 1,
    /// Key exists with an incompatible kind.
    Type = 2,
    /// Wrong argument count or unparseable argument.
    Arg = 3,
}

impl ErrorCode {
    fn from_wire(code: i32) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Unknown),
            2 => Some(ErrorCode::Type),
            3 => Some(ErrorCode::Arg),
            _ => None,
        }
    }
}

/// One response token.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Error(ErrorCode, String),
    String(Vec<u8>),
    Integer(i64),
    Double(f64),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn error(code: ErrorCode, msg: impl Into<String>) -> Self {
        Reply::Error(code, msg.into())
    }

    /// Append this token (and children) to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Reply::Nil => buf.put_u8(TAG_NIL),
            Reply::Error(code, msg) => {
                buf.put_u8(TAG_ERROR);
                buf.put_i32_le(*code as i32);
                buf.put_u32_le(msg.len() as u32);
                buf.put_slice(msg.as_bytes());
            }
            Reply::String(data) => {
                buf.put_u8(TAG_STRING);
                buf.put_u32_le(data.len() as u32);
                buf.put_slice(data);
            }
            Reply::Integer(n) => {
                buf.put_u8(TAG_INTEGER);
                buf.put_i64_le(*n);
            }
            Reply::Double(d) => {
                buf.put_u8(TAG_DOUBLE);
                buf.put_f64_le(*d);
            }
            Reply::Array(items) => {
                buf.put_u8(TAG_ARRAY);
                buf.put_u32_le(items.len() as u32);
                for item in items {
                    item.write_to(buf);
                }
            }
        }
    }
}

/// Try to parse one complete request frame off the front of `buf`.
/// Returns `Ok(None)` when more bytes are needed; on success the frame is
/// consumed. A malformed or oversized frame is a protocol error and the
/// caller drops the connection.
pub fn parse_request(buf: &mut BytesMut) -> ZedisResult<Option<Vec<Vec<u8>>>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_le_bytes(buf[0..4].try_into().expect("4 bytes")) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ZedisError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_SIZE}-byte limit"
        )));
    }
    if buf.len() < 4 + len {
        return Ok(None);
    }

    let payload = &buf[4..4 + len];
    if payload.len() < 4 {
        return Err(ZedisError::Protocol("truncated argument count".into()));
    }
    let argc = u32::from_le_bytes(payload[0..4].try_into().expect("4 bytes")) as usize;
    let mut args = Vec::with_capacity(argc.min(64));
    let mut pos = 4;
    for _ in 0..argc {
        if payload.len() - pos < 4 {
            return Err(ZedisError::Protocol("truncated argument length".into()));
        }
        let arg_len =
            u32::from_le_bytes(payload[pos..pos + 4].try_into().expect("4 bytes")) as usize;
        pos += 4;
        if payload.len() - pos < arg_len {
            return Err(ZedisError::Protocol("argument runs past the frame".into()));
        }
        args.push(payload[pos..pos + arg_len].to_vec());
        pos += arg_len;
    }
    if pos != payload.len() {
        return Err(ZedisError::Protocol("trailing bytes in frame".into()));
    }

    buf.advance(4 + len);
    Ok(Some(args))
}

/// Serialize a request frame (client side).
pub fn write_request(buf: &mut BytesMut, args: &[&[u8]]) {
    let len: usize = 4 + args.iter().map(|a| 4 + a.len()).sum::<usize>();
    buf.put_u32_le(len as u32);
    buf.put_u32_le(args.len() as u32);
    for arg in args {
        buf.put_u32_le(arg.len() as u32);
        buf.put_slice(arg);
    }
}

/// Append `reply` to `buf` framed with its own length prefix.
pub fn write_response(buf: &mut BytesMut, reply: &Reply) {
    let mark = buf.len();
    buf.put_u32_le(0);
    reply.write_to(buf);
    let body_len = (buf.len() - mark - 4) as u32;
    buf[mark..mark + 4].copy_from_slice(&body_len.to_le_bytes());
}

/// Parse one reply token stream (client side). The whole of `data` must be
/// consumed; the caller has already stripped the response length prefix.
pub fn parse_reply(data: &[u8]) -> ZedisResult<Reply> {
    let (reply, consumed) = parse_token(data, 0)?;
    if consumed != data.len() {
        return Err(ZedisError::Protocol("trailing bytes after reply".into()));
    }
    Ok(reply)
}

fn parse_token(data: &[u8], pos: usize) -> ZedisResult<(Reply, usize)> {
    let err = |msg: &str| ZedisError::Protocol(msg.into());
    let tag = *data.get(pos).ok_or_else(|| err("missing token tag"))?;
    let pos = pos + 1;
    match tag {
        TAG_NIL => Ok((Reply::Nil, pos)),
        TAG_ERROR => {
            let code = read_i32(data, pos).ok_or_else(|| err("truncated error code"))?;
            let code = ErrorCode::from_wire(code).ok_or_else(|| err("unknown error code"))?;
            let len = read_u32(data, pos + 4).ok_or_else(|| err("truncated error length"))? as usize;
            let start = pos + 8;
            let body = data
                .get(start..start + len)
                .ok_or_else(|| err("truncated error message"))?;
            let msg = String::from_utf8_lossy(body).into_owned();
            Ok((Reply::Error(code, msg), start + len))
        }
        TAG_STRING => {
            let len = read_u32(data, pos).ok_or_else(|| err("truncated string length"))? as usize;
            let start = pos + 4;
            let body = data
                .get(start..start + len)
                .ok_or_else(|| err("truncated string body"))?;
            Ok((Reply::String(body.to_vec()), start + len))
        }
        TAG_INTEGER => {
            let bytes = data
                .get(pos..pos + 8)
                .ok_or_else(|| err("truncated integer"))?;
            let n = i64::from_le_bytes(bytes.try_into().expect("8 bytes"));
            Ok((Reply::Integer(n), pos + 8))
        }
        TAG_DOUBLE => {
            let bytes = data
                .get(pos..pos + 8)
                .ok_or_else(|| err("truncated double"))?;
            let d = f64::from_le_bytes(bytes.try_into().expect("8 bytes"));
            Ok((Reply::Double(d), pos + 8))
        }
        TAG_ARRAY => {
            let count = read_u32(data, pos).ok_or_else(|| err("truncated array header"))?;
            let mut pos = pos + 4;
            let mut items = Vec::with_capacity((count as usize).min(64));
            for _ in 0..count {
                let (item, next) = parse_token(data, pos)?;
                items.push(item);
                pos = next;
            }
            Ok((Reply::Array(items), pos))
        }
        other => Err(err(&format!("unknown token tag {other:#x}"))),
    }
}

fn read_u32(data: &[u8], pos: usize) -> Option<u32> {
    data.get(pos..pos + 4)
        .map(|b| u32::from_le_bytes(b.try_into().expect("4 bytes")))
}

fn read_i32(data: &[u8], pos: usize) -> Option<i32> {
    data.get(pos..pos + 4)
        .map(|b| i32::from_le_bytes(b.try_into().expect("4 bytes")))
}
