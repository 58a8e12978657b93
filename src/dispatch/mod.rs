//! Request dispatch
//!
//! Maps a request onto one of a handful of canned endpoints and shapes the
//! exact response for it: status, body, encoding and the full header block.

pub mod policy;


use crate::fixture::FixtureSource;
use crate::http::{Encoding, IncomingRequest, ResponseSpec};
use crate::{MockError, Result};
use bytes::Bytes;
use http::StatusCode;
use policy::{GENERIC_HEADERS, HeaderPolicy, SPOOFED_HEADERS};
use std::time::SystemTime;
use tracing::info;

pub const PROCESS_QUEUE_BODY: &str =
    "The request has been accepted for processing, but the processing has not been completed.";
pub const SERVER_INFO_BODY: &str = "Server info response";
pub const UNKNOWN_ENDPOINT_BODY: &str = r#"{"error": "Unknown endpoint"}"#;

const JSON: &str = "application/json; charset=UTF-8";
// Spelled the way the impersonated nginx deployment sends it
const SPOOFED_JSON: &str = "application/json; charset=utf-8";
const TEXT: &str = "text/plain; charset=UTF-8";

/// Strips exactly one trailing `/`
///
/// ```
/// use mocksrv::normalize_path;
///
/// assert_eq!(normalize_path("/get_server.php/"), "/get_server.php");
/// assert_eq!(normalize_path("/get_server.php//"), "/get_server.php/");
/// ```
pub fn normalize_path(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Endpoint a request is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Serves the fixture, gzip-compressed behind forged nginx headers
    TapService,
    ProcessQueue,
    GetServer,
    Unknown,
}

/// Normalized paths and the routes they map to
pub static ENDPOINT_TABLE: &[(&str, Route)] = &[
    ("/tapservice/api", Route::TapService),
    ("/process_queue.php", Route::ProcessQueue),
    ("/get_server.php", Route::GetServer),
];

impl Route {
    pub fn classify(path: &str) -> Route {
        let normalized = normalize_path(path);
        ENDPOINT_TABLE
            .iter()
            .find(|(endpoint, _)| *endpoint == normalized)
            .map(|(_, route)| *route)
            .unwrap_or(Route::Unknown)
    }

    pub fn status(self) -> StatusCode {
        match self {
            Route::TapService => StatusCode::OK,
            _ => StatusCode::ACCEPTED,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Route::TapService => SPOOFED_JSON,
            Route::Unknown => JSON,
            Route::ProcessQueue | Route::GetServer => TEXT,
        }
    }

    pub fn encoding(self) -> Encoding {
        match self {
            Route::TapService => Encoding::Gzip,
            _ => Encoding::Plain,
        }
    }

    pub fn header_policy(self) -> HeaderPolicy {
        match self {
            Route::TapService => SPOOFED_HEADERS,
            _ => GENERIC_HEADERS,
        }
    }

    /// Literal body, for every route except the fixture-backed one
    pub fn static_body(self) -> Option<&'static str> {
        match self {
            Route::TapService => None,
            Route::ProcessQueue => Some(PROCESS_QUEUE_BODY),
            Route::GetServer => Some(SERVER_INFO_BODY),
            Route::Unknown => Some(UNKNOWN_ENDPOINT_BODY),
        }
    }
}

/// Shapes the response for `route` around an unencoded `body`
///
/// Pure given `now`: the same inputs always produce the same bytes.
pub fn build_response(route: Route, body: &[u8], now: SystemTime) -> Result<ResponseSpec> {
    let encoding = route.encoding();
    let body = encoding.apply(body).map_err(MockError::Encoding)?;
    let headers = policy::render(
        route.header_policy(),
        &httpdate::fmt_http_date(now),
        route.content_type(),
        body.len(),
    );

    Ok(ResponseSpec {
        status: route.status(),
        content_type: route.content_type(),
        headers,
        body,
        encoding,
    })
}

/// Turns requests into responses; holds no per-request state
#[derive(Debug, Clone)]
pub struct Dispatcher {
    fixture: FixtureSource,
}

impl Dispatcher {
    pub fn new(fixture: FixtureSource) -> Self {
        Self { fixture }
    }

    pub fn fixture(&self) -> &FixtureSource {
        &self.fixture
    }

    pub async fn handle(&self, req: &IncomingRequest) -> Result<ResponseSpec> {
        self.handle_at(req, SystemTime::now()).await
    }

    /// Like [`Dispatcher::handle`] with an explicit clock for the `Date` header
    pub async fn handle_at(&self, req: &IncomingRequest, now: SystemTime) -> Result<ResponseSpec> {
        let client = req
            .peer
            .map(|peer| peer.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        info!(%client, method = %req.method, path = %req.path, query = ?req.query, "Handling request");

        match &req.body {
            Some(body) => info!(body = %String::from_utf8_lossy(body), "Request body"),
            None => info!("No Content-Length header provided"),
        }

        let route = Route::classify(&req.path);
        let body = self.body_for(route).await;
        info!(?route, response = %String::from_utf8_lossy(&body), "Response");

        build_response(route, &body, now)
    }

    async fn body_for(&self, route: Route) -> Bytes {
        match route.static_body() {
            Some(body) => Bytes::from_static(body.as_bytes()),
            None => self.fixture.load_or_fallback().await,
        }
    }
}
