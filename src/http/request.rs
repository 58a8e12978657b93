use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH};
use http::{HeaderMap, Method, Uri, Version};
use std::net::SocketAddr;

/// Query string parameters, keyed in order of first appearance
///
/// Values are percent-decoded, `+` becomes a space, and blank values are
/// dropped.
///
/// ```
/// use mocksrv::QueryParams;
///
/// let query = QueryParams::parse("id=1&tag=a&id=2&empty=");
/// assert_eq!(query.get("id"), Some(&["1".to_string(), "2".to_string()][..]));
/// assert_eq!(query.get("empty"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Vec<String>)>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let mut params: Vec<(String, Vec<String>)> = Vec::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match params.iter_mut().find(|(k, _)| k.as_str() == key.as_ref()) {
                Some((_, values)) => values.push(value.into_owned()),
                None => params.push((key.into_owned(), vec![value.into_owned()])),
            }
        }
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed HTTP request, alive for the duration of one dispatch
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    pub version: Version,
    /// Path component of the request target, trailing slash preserved
    pub path: String,
    pub query: QueryParams,
    pub headers: HeaderMap,
    /// Present only when the request declared a valid `Content-Length`
    pub body: Option<Bytes>,
    pub peer: Option<SocketAddr>,
}

impl IncomingRequest {
    /// Builds a request from a method and a raw request target
    ///
    /// Both origin-form (`/path?query`) and absolute-form
    /// (`http://host/path?query`) targets are accepted.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            version: Version::HTTP_11,
            path,
            query: QueryParams::parse(&query),
            headers: HeaderMap::new(),
            body: None,
            peer: None,
        }
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Declared body length; absent or malformed values read as `None`
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Whether the connection should be closed once this request is answered
    pub fn wants_close(&self) -> bool {
        let connection = self
            .headers
            .get(CONNECTION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        match connection.as_deref() {
            Some(value) if value.contains("close") => true,
            Some(value) if value.contains("keep-alive") => false,
            _ => self.version == Version::HTTP_10 || self.version == Version::HTTP_09,
        }
    }
}

fn split_target(target: &str) -> (String, String) {
    // Uri keeps the path as sent, dot segments and escapes included
    if target.starts_with("http://") || target.starts_with("https://") {
        if let Ok(uri) = target.parse::<Uri>() {
            return (uri.path().to_string(), uri.query().unwrap_or_default().to_string());
        }
    }

    let target = target.split('#').next().unwrap_or_default();
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    }
}
