use bytes::{Buf, Bytes, BytesMut};

use super::types::RespValue;
use crate::error::{Error, Result};

/// Longest bulk string accepted from a sentinel (512mb, proto-max-bulk-len)
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Deepest array nesting accepted. Sentinel replies use two levels.
pub const MAX_NESTING: usize = 32;

/// Incremental RESP2 reply parser
pub struct Parser;

impl Parser {
    /// Parse a complete RESP value from buffer.
    /// Returns None if buffer doesn't contain a complete message.
    /// Advances buffer past the parsed data.
    #[inline]
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>> {
        if buf.is_empty() {
            return Ok(None);
        }

        match Self::parse_value(buf, 0)? {
            Some((value, consumed)) => {
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Parse value, returning (value, bytes_consumed) or None if incomplete
    fn parse_value(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        match buf[0] {
            b'+' => Self::parse_simple_string(buf),
            b'-' => Self::parse_error(buf),
            b':' => Self::parse_integer(buf),
            b'$' => Self::parse_bulk_string(buf),
            b'*' => Self::parse_array(buf, depth),
            other => Err(Error::Protocol(format!(
                "unexpected reply type byte 0x{:02x}",
                other
            ))),
        }
    }

    /// Find \r\n in buffer, return position of \r
    #[inline]
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        memchr::memchr(b'\r', buf).and_then(|pos| {
            if pos + 1 < buf.len() && buf[pos + 1] == b'\n' {
                Some(pos)
            } else {
                None
            }
        })
    }

    fn parse_length(buf: &[u8], crlf_pos: usize, what: &str) -> Result<i64> {
        std::str::from_utf8(&buf[1..crlf_pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Protocol(format!("invalid {} length", what)))
    }

    fn parse_simple_string(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        match Self::find_crlf(buf) {
            Some(pos) => {
                let s = Bytes::copy_from_slice(&buf[1..pos]);
                Ok(Some((RespValue::SimpleString(s), pos + 2)))
            }
            None => Ok(None),
        }
    }

    fn parse_error(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        match Self::find_crlf(buf) {
            Some(pos) => {
                let s = Bytes::copy_from_slice(&buf[1..pos]);
                Ok(Some((RespValue::Error(s), pos + 2)))
            }
            None => Ok(None),
        }
    }

    fn parse_integer(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        match Self::find_crlf(buf) {
            Some(pos) => {
                let s = std::str::from_utf8(&buf[1..pos])
                    .map_err(|_| Error::Protocol("invalid integer".into()))?;
                let n: i64 = s
                    .parse()
                    .map_err(|_| Error::Protocol("invalid integer".into()))?;
                Ok(Some((RespValue::Integer(n), pos + 2)))
            }
            None => Ok(None),
        }
    }

    fn parse_bulk_string(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        let crlf_pos = match Self::find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let len = Self::parse_length(buf, crlf_pos, "bulk")?;
        if len == -1 {
            return Ok(Some((RespValue::Null, crlf_pos + 2)));
        }
        if len < 0 {
            return Err(Error::Protocol("negative bulk length".into()));
        }
        if len > MAX_BULK_LEN {
            return Err(Error::Protocol("invalid bulk length".into()));
        }

        let len = len as usize;
        let data_start = crlf_pos + 2;
        let data_end = data_start + len;
        let total_len = data_end + 2; // +2 for trailing \r\n

        if buf.len() < total_len {
            return Ok(None);
        }
        if &buf[data_end..total_len] != b"\r\n" {
            return Err(Error::Protocol("bulk string not terminated by CRLF".into()));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
        Ok(Some((RespValue::BulkString(data), total_len)))
    }

    fn parse_array(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>> {
        if depth >= MAX_NESTING {
            return Err(Error::Protocol("nesting too deep".into()));
        }

        let crlf_pos = match Self::find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let len = Self::parse_length(buf, crlf_pos, "array")?;
        if len == -1 {
            return Ok(Some((RespValue::NullArray, crlf_pos + 2)));
        }
        if len < 0 {
            return Err(Error::Protocol("negative array length".into()));
        }

        let len = len as usize;
        let mut items = Vec::with_capacity(len.min(1024));
        let mut offset = crlf_pos + 2;

        for _ in 0..len {
            match Self::parse_value(&buf[offset..], depth + 1)? {
                Some((value, consumed)) => {
                    items.push(value);
                    offset += consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(items), offset)))
    }
}
