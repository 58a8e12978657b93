use bytes::{BufMut, Bytes, BytesMut};
use flate2::{Compression, write::GzEncoder};
use http::StatusCode;
use std::io::{self, Write};
use std::time::SystemTime;

/// How a response body is encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Gzip,
}

impl Encoding {
    /// Encodes `body` for transmission
    ///
    /// Gzip output uses a zero mtime so identical bodies compress to
    /// identical bytes.
    pub fn apply(self, body: &[u8]) -> io::Result<Bytes> {
        match self {
            Encoding::Plain => Ok(Bytes::copy_from_slice(body)),
            Encoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
                encoder.write_all(body)?;
                Ok(Bytes::from(encoder.finish()?))
            }
        }
    }
}

/// A fully shaped response, written to the client as-is
///
/// `headers` is the complete, ordered header block; `body` is the payload
/// after encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSpec {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
    pub encoding: Encoding,
}

impl ResponseSpec {
    /// Returns the first header value matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Answer for a request that could not be framed; closes the connection
    pub fn error(status: StatusCode, now: SystemTime) -> Self {
        let body = Bytes::from_static(status.canonical_reason().unwrap_or("Error").as_bytes());
        Self {
            status,
            content_type: "text/plain; charset=UTF-8",
            headers: vec![
                ("Date", httpdate::fmt_http_date(now)),
                ("Content-Type", "text/plain; charset=UTF-8".to_string()),
                ("Content-Length", body.len().to_string()),
                ("Connection", "close".to_string()),
            ],
            body,
            encoding: Encoding::Plain,
        }
    }

    /// Serializes the status line, headers and body into `dst`
    pub fn write_to(&self, dst: &mut BytesMut) {
        let reason = self.status.canonical_reason().unwrap_or("");
        dst.reserve(64 + self.body.len());
        dst.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason).as_bytes());
        for (name, value) in &self.headers {
            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(&self.body);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.write_to(&mut dst);
        dst.freeze()
    }
}
