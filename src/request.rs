//! Incoming request view.
use bytes::Bytes;
use http::header::{AsHeaderName, HeaderMap};
use http::{Method, Uri};

/// Immutable view of the request being served.
///
/// The body has already been read in full by the time the view exists;
/// the server bridge drains it before the task starts, so no exit path
/// can leave unread bytes on the connection.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl IncomingRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> IncomingRequest {
        IncomingRequest {
            method,
            uri,
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name` as a string, if present and valid UTF-8.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
