//! Header policies
//!
//! Each route family emits a fixed, ordered header block. Most values are
//! literals; the rest are filled per response.

/// A header value in a policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyValue {
    Fixed(&'static str),
    /// Current time in RFC 7231 format
    Date,
    /// The route's content type
    ContentType,
    /// Byte length of the encoded body
    ContentLength,
}

pub type HeaderPolicy = &'static [(&'static str, PolicyValue)];

/// Impersonates an nginx deployment of the upstream service
pub static SPOOFED_HEADERS: HeaderPolicy = &[
    (
        "Cache-Control",
        PolicyValue::Fixed("no-cache, no-store, must-revalidate, proxy-revalidate, max-age=0"),
    ),
    ("Connection", PolicyValue::Fixed("keep-alive")),
    ("Content-Encoding", PolicyValue::Fixed("gzip")),
    ("Content-Length", PolicyValue::ContentLength),
    ("Content-Type", PolicyValue::ContentType),
    ("Cross-Origin-Opener-Policy", PolicyValue::Fixed("same-origin")),
    ("Date", PolicyValue::Date),
    ("Referrer-Policy", PolicyValue::Fixed("same-origin")),
    ("Server", PolicyValue::Fixed("nginx/1.24.0 (Ubuntu)")),
    ("Strict-Transport-Security", PolicyValue::Fixed("max-age=3600")),
    ("Vary", PolicyValue::Fixed("Origin, Accept-Encoding")),
    ("X-Content-Type-Options", PolicyValue::Fixed("nosniff")),
    ("X-Frame-Options", PolicyValue::Fixed("DENY")),
    ("X-TC-Digest", PolicyValue::Fixed("4f2564d324730e58cdedcb55a06a240d")),
];

pub static GENERIC_HEADERS: HeaderPolicy = &[
    ("Date", PolicyValue::Date),
    ("Content-Type", PolicyValue::ContentType),
    ("Content-Length", PolicyValue::ContentLength),
    ("Connection", PolicyValue::Fixed("keep-alive")),
    ("Access-Control-Allow-Origin", PolicyValue::Fixed("*")),
];

/// Resolves a policy into concrete header pairs
pub fn render(
    policy: HeaderPolicy,
    date: &str,
    content_type: &str,
    content_length: usize,
) -> Vec<(&'static str, String)> {
    policy
        .iter()
        .map(|(name, value)| {
            let value = match value {
                PolicyValue::Fixed(v) => (*v).to_string(),
                PolicyValue::Date => date.to_string(),
                PolicyValue::ContentType => content_type.to_string(),
                PolicyValue::ContentLength => content_length.to_string(),
            };
            (*name, value)
        })
        .collect()
}
