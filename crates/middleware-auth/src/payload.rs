//! Deterministic byte layout for the request and response payloads fed to
//! the signature routines.
//!
//! Numbers use a compact little-endian varint: one byte below 0xFD,
//! `0xFD` + u16, `0xFE` + u32, and `0xFF` + i64 for larger values and for
//! the `-1` sentinel marking an absent field.

use crate::error::AuthError;

/// Encode `n` onto `buf` as a signed compact varint.
pub fn write_varint_num(buf: &mut Vec<u8>, n: i64) {
    if n < 0 {
        buf.push(0xFF);
        buf.extend_from_slice(&n.to_le_bytes());
    } else if n < 0xFD {
        buf.push(n as u8);
    } else if n <= 0xFFFF {
        buf.push(0xFD);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xFFFF_FFFF {
        buf.push(0xFE);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}

/// Sequential reader over an encoded payload.
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        PayloadReader { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], AuthError> {
        if self.remaining() < n {
            return Err(AuthError::BadRequest(format!(
                "payload truncated: wanted {} bytes, {} remain",
                n,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a signed compact varint.
    pub fn read_varint_num(&mut self) -> Result<i64, AuthError> {
        let first = self.read_bytes(1)?[0];
        match first {
            0xFF => {
                let bytes: [u8; 8] = self.read_bytes(8)?.try_into().expect("8 bytes");
                Ok(i64::from_le_bytes(bytes))
            }
            0xFE => {
                let bytes: [u8; 4] = self.read_bytes(4)?.try_into().expect("4 bytes");
                Ok(u32::from_le_bytes(bytes) as i64)
            }
            0xFD => {
                let bytes: [u8; 2] = self.read_bytes(2)?.try_into().expect("2 bytes");
                Ok(u16::from_le_bytes(bytes) as i64)
            }
            b => Ok(b as i64),
        }
    }

    /// Read a varint-length-prefixed UTF-8 string; `-1` yields None.
    fn read_optional_string(&mut self) -> Result<Option<String>, AuthError> {
        let len = self.read_varint_num()?;
        if len < 0 {
            return Ok(None);
        }
        let bytes = self.read_bytes(len as usize)?;
        let s = String::from_utf8(bytes.to_vec())
            .map_err(|e| AuthError::BadRequest(format!("payload string is not utf-8: {}", e)))?;
        Ok(Some(s))
    }
}

/// Write a varint-length-prefixed UTF-8 string.
fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint_num(buf, s.len() as i64);
    buf.extend_from_slice(s.as_bytes());
}

/// Write the shared header-list section: count (or -1), then
/// length-prefixed key/value pairs. Headers must already be filtered and
/// sorted.
fn write_headers(buf: &mut Vec<u8>, headers: &[(String, String)]) {
    if headers.is_empty() {
        write_varint_num(buf, -1);
        return;
    }
    write_varint_num(buf, headers.len() as i64);
    for (key, value) in headers {
        write_string(buf, key);
        write_string(buf, value);
    }
}

fn read_headers(r: &mut PayloadReader<'_>) -> Result<Vec<(String, String)>, AuthError> {
    let count = r.read_varint_num()?;
    if count < 0 {
        return Ok(Vec::new());
    }
    let mut headers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = r
            .read_optional_string()?
            .ok_or_else(|| AuthError::BadRequest("missing header key".into()))?;
        let value = r
            .read_optional_string()?
            .ok_or_else(|| AuthError::BadRequest("missing header value".into()))?;
        headers.push((key, value));
    }
    Ok(headers)
}

/// Write the shared body section: length (or -1 when empty) plus bytes.
fn write_body(buf: &mut Vec<u8>, body: &[u8]) {
    if body.is_empty() {
        write_varint_num(buf, -1);
        return;
    }
    write_varint_num(buf, body.len() as i64);
    buf.extend_from_slice(body);
}

fn read_body(r: &mut PayloadReader<'_>) -> Result<Vec<u8>, AuthError> {
    let len = r.read_varint_num()?;
    if len < 0 {
        return Ok(Vec::new());
    }
    Ok(r.read_bytes(len as usize)?.to_vec())
}

/// The canonical byte layout a client signs for a general request and the
/// server reproduces to verify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload {
    /// The base64-decoded request ID (the client's request nonce).
    pub request_id: Vec<u8>,
    /// HTTP method.
    pub method: String,
    /// URL path.
    pub path: String,
    /// Raw query string, when present.
    pub query: Option<String>,
    /// Filtered, sorted headers bound into the signature.
    pub headers: Vec<(String, String)>,
    /// Request body bytes.
    pub body: Vec<u8>,
}

impl RequestPayload {
    /// Encode deterministically.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.request_id);
        write_string(&mut buf, &self.method);
        write_string(&mut buf, &self.path);
        match &self.query {
            Some(q) => write_string(&mut buf, q),
            None => write_varint_num(&mut buf, -1),
        }
        write_headers(&mut buf, &self.headers);
        write_body(&mut buf, &self.body);
        buf
    }

    /// Decode a payload previously produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(data: &[u8]) -> Result<Self, AuthError> {
        let mut r = PayloadReader::new(data);
        let request_id = r.read_bytes(crate::brc104::REQUEST_ID_LENGTH)?.to_vec();
        let method = r
            .read_optional_string()?
            .ok_or_else(|| AuthError::BadRequest("missing method".into()))?;
        let path = r
            .read_optional_string()?
            .ok_or_else(|| AuthError::BadRequest("missing path".into()))?;
        let query = r.read_optional_string()?;
        let headers = read_headers(&mut r)?;
        let body = read_body(&mut r)?;
        Ok(RequestPayload {
            request_id,
            method,
            path,
            query,
            headers,
            body,
        })
    }
}

/// The canonical byte layout the server signs over its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePayload {
    /// The base64-decoded request ID this response answers.
    pub request_id: Vec<u8>,
    /// HTTP status code.
    pub status: i64,
    /// Filtered, sorted headers bound into the signature.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl ResponsePayload {
    /// Encode deterministically.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.request_id);
        write_varint_num(&mut buf, self.status);
        write_headers(&mut buf, &self.headers);
        write_body(&mut buf, &self.body);
        buf
    }

    /// Decode a payload previously produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(data: &[u8]) -> Result<Self, AuthError> {
        let mut r = PayloadReader::new(data);
        let request_id = r.read_bytes(crate::brc104::REQUEST_ID_LENGTH)?.to_vec();
        let status = r.read_varint_num()?;
        let headers = read_headers(&mut r)?;
        let body = read_body(&mut r)?;
        Ok(ResponsePayload {
            request_id,
            status,
            headers,
            body,
        })
    }
}
