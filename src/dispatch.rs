//! Response dispatching.
//!
//! The dispatcher is the only place byte emission is authorised. The task
//! asks [`content_type`][Dispatcher::content_type] before anything is
//! written; a rejection there means no body byte ever reaches the wire.
use std::io;

use mime::Mime;

use crate::html::TemplateError;
use crate::response::Response;

// defeats JSON-array script inclusion; must be bit-exact on the wire
const JSON_SENTINEL: &[u8] = b")]}',\n";

/// Maps typed responses to on-wire bytes.
///
/// Shared across tasks; implementations must be safe for concurrent use
/// with independent requests.
pub trait Dispatcher: Send + Sync {
    /// The Content-Type this dispatcher will produce for `resp`, `None`
    /// for a bodyless response, or an error if the response is not of a
    /// recognised safe shape.
    ///
    /// The task must refuse to emit the body when this fails.
    fn content_type(&self, resp: &Response) -> Result<Option<Mime>, DispatchError>;

    /// Emit the encoded bytes of `resp` into `sink`.
    fn write(&self, sink: &mut dyn io::Write, resp: &Response) -> Result<(), DispatchError>;
}

/// Dispatcher that recognises exactly the safe payload shapes.
///
/// `Error`, `Redirect` and every `Custom` payload are refused: errors and
/// redirects are written by the task itself, and custom payloads require
/// a dispatcher that knows their concrete type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDispatcher;

impl Dispatcher for DefaultDispatcher {
    fn content_type(&self, resp: &Response) -> Result<Option<Mime>, DispatchError> {
        match resp {
            Response::Html(_) | Response::Template(_) => Ok(Some(mime::TEXT_HTML_UTF_8)),
            Response::Json(_) => Ok(Some(mime::APPLICATION_JSON)),
            Response::NoContent => Ok(None),
            Response::Error(_) | Response::Redirect(_) | Response::Custom(_) => {
                Err(DispatchError::Unsafe)
            }
        }
    }

    fn write(&self, sink: &mut dyn io::Write, resp: &Response) -> Result<(), DispatchError> {
        match resp {
            Response::Html(html) => {
                sink.write_all(html.as_str().as_bytes())?;
                Ok(())
            }
            Response::Template(tpl) => {
                let html = tpl.render()?;
                sink.write_all(html.as_str().as_bytes())?;
                Ok(())
            }
            Response::Json(json) => {
                // sentinel first; an encode failure must leave it as the
                // only bytes written
                sink.write_all(JSON_SENTINEL)?;
                let mut encoded = Vec::new();
                json.encode(&mut encoded).map_err(DispatchError::Json)?;
                encoded.push(b'\n');
                sink.write_all(&encoded)?;
                Ok(())
            }
            Response::NoContent => Ok(()),
            Response::Error(_) | Response::Redirect(_) | Response::Custom(_) => {
                Err(DispatchError::Unsafe)
            }
        }
    }
}

// ===== Error =====

/// Dispatch failure.
#[derive(Debug)]
pub enum DispatchError {
    /// The response is not of a shape the dispatcher recognises as safe.
    Unsafe,
    /// Template execution failed.
    Template(TemplateError),
    /// The JSON payload could not be encoded.
    Json(serde_json::Error),
    /// The sink refused the bytes.
    Io(io::Error),
}

impl From<TemplateError> for DispatchError {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

impl From<io::Error> for DispatchError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unsafe => None,
            Self::Template(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsafe => f.write_str("not a recognised safe response shape"),
            Self::Template(err) => write!(f, "template execution failed: {err}"),
            Self::Json(err) => write!(f, "json encoding failed: {err}"),
            Self::Io(err) => write!(f, "sink write failed: {err}"),
        }
    }
}
