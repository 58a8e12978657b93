use super::request::IncomingRequest;
use super::response::ResponseSpec;
use bytes::{Buf, BytesMut};
use http::{HeaderName, HeaderValue, Method, StatusCode, Version};
use std::io;
use std::time::SystemTime;
use tokio_util::codec::{Decoder, Encoder};

const MAX_HEADERS: usize = 64;

/// Largest request body accepted unless configured otherwise
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Value of the `Server` header the transport adds outside raw header mode
pub const DEFAULT_SERVER: &str = concat!("mocksrv/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Incomplete request")]
    IncompleteRequest,
    #[error("Request body too large: {actual} bytes, maximum allowed: {max} bytes")]
    BodyTooLarge { actual: usize, max: usize },
}

impl HttpProtocolError {
    /// Status the client is answered with when framing fails
    pub fn status(&self) -> StatusCode {
        match self {
            HttpProtocolError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

struct PendingRequest {
    request: IncomingRequest,
    body_len: Option<usize>,
}

/// HTTP/1.1 framing: decodes requests off a byte stream and encodes responses
///
/// A request head is parsed once; the body is then waited for until the
/// declared `Content-Length` bytes are buffered. Requests without a valid
/// `Content-Length` carry no body.
///
/// In raw header mode the encoder writes exactly the headers in the
/// [`ResponseSpec`]. Otherwise it adds `Server` and `Date` when missing, the
/// way a stock HTTP server would.
pub struct RequestCodec {
    raw_headers: bool,
    max_body_size: usize,
    pending: Option<PendingRequest>,
}

impl RequestCodec {
    pub fn new(raw_headers: bool) -> Self {
        Self {
            raw_headers,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            pending: None,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn raw_headers(&self) -> bool {
        self.raw_headers
    }

    /// True once a request head has been parsed but its body is still pending
    pub fn is_mid_request(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

fn parse_head(src: &[u8]) -> Result<Option<(IncomingRequest, usize)>, HttpProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let parsed_len = match req.parse(src) {
        Ok(httparse::Status::Complete(parsed_len)) => parsed_len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => {
            return Err(HttpProtocolError::HttpParse(format!(
                "Failed to parse headers: {e}"
            )));
        }
    };

    let method = req.method.unwrap_or_default();
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| HttpProtocolError::InvalidRequest(format!("Invalid method {method:?}")))?;
    let target = req.path.unwrap_or("/");

    let mut request = IncomingRequest::new(method, target);
    request.version = match req.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    for header in req.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| {
            HttpProtocolError::InvalidRequest(format!("Invalid header name {:?}", header.name))
        })?;
        let value = HeaderValue::from_bytes(header.value).map_err(|_| {
            HttpProtocolError::InvalidRequest(format!("Invalid value for header {}", header.name))
        })?;
        request.headers.append(name, value);
    }

    Ok(Some((request, parsed_len)))
}

impl Decoder for RequestCodec {
    type Item = IncomingRequest;
    type Error = HttpProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            let Some((request, parsed_len)) = parse_head(src)? else {
                return Ok(None);
            };
            src.advance(parsed_len);
            let body_len = request.content_length();
            if let Some(actual) = body_len.filter(|len| *len > self.max_body_size) {
                return Err(HttpProtocolError::BodyTooLarge {
                    actual,
                    max: self.max_body_size,
                });
            }
            self.pending = Some(PendingRequest { request, body_len });
        }

        let needed = self
            .pending
            .as_ref()
            .and_then(|pending| pending.body_len)
            .unwrap_or(0);
        if src.len() < needed {
            src.reserve(needed - src.len());
            return Ok(None);
        }

        let Some(PendingRequest { mut request, body_len }) = self.pending.take() else {
            return Ok(None);
        };
        if let Some(len) = body_len {
            request.body = Some(src.split_to(len).freeze());
        }
        Ok(Some(request))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(request) => Ok(Some(request)),
            None if src.is_empty() && self.pending.is_none() => Ok(None),
            None => Err(HttpProtocolError::IncompleteRequest),
        }
    }
}

impl Encoder<ResponseSpec> for RequestCodec {
    type Error = HttpProtocolError;

    fn encode(&mut self, mut response: ResponseSpec, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if !self.raw_headers {
            if !response.has_header("Date") {
                response
                    .headers
                    .insert(0, ("Date", httpdate::fmt_http_date(SystemTime::now())));
            }
            if !response.has_header("Server") {
                response.headers.insert(0, ("Server", DEFAULT_SERVER.to_string()));
            }
        }
        response.write_to(dst);
        Ok(())
    }
}
