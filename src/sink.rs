//! Buffered wire sink.
use std::io;

use http::StatusCode;
use http::header::HeaderMap;

use crate::header::Headers;

/// Buffered response writer the task emits into.
///
/// The head is flushed exactly once: [`write_head`][Sink::write_head]
/// snapshots the status and headers, and later header mutation or repeat
/// flushes do not change what was captured. Body bytes accumulate through
/// the [`io::Write`] impl.
#[derive(Debug, Default)]
pub struct Sink {
    headers: Headers,
    head: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
}

impl Sink {
    pub fn new() -> Sink {
        Sink::default()
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Status captured by the head flush, if it happened.
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|(status, _)| *status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn append_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    // one-shot; repeat flushes keep the first head
    pub(crate) fn write_head(&mut self, status: StatusCode) {
        if self.head.is_none() {
            self.head = Some((status, self.headers.snapshot()));
        }
    }

    /// Dismantle into status, headers and body.
    ///
    /// A sink whose head never got flushed yields a bare 500: the task
    /// aborted before producing a response.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        match self.head {
            Some((status, headers)) => (status, headers, self.body),
            None => (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), Vec::new()),
        }
    }
}

impl io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
