//! Typed response values.
//!
//! Handlers never hand raw bytes to the framework; they hand one of the
//! [`Response`] variants to the task, and the dispatcher decides whether
//! that shape is safe to put on the wire.
mod json;

use std::any::Any;

use http::StatusCode;

use crate::html::{FuncMap, Html, Template, TemplateError};

pub use json::JsonResponse;

/// The payload shapes a handler is permitted to produce.
pub enum Response {
    /// Safe-HTML string, written verbatim.
    Html(Html),
    /// Safe template plus the data and function bindings to render it with.
    Template(TemplateResponse),
    /// Serialisable value, emitted behind the anti-hijacking sentinel.
    Json(JsonResponse),
    /// No body; the response is a bare 204.
    NoContent,
    /// Client or server error with a textual reason.
    Error(ErrorResponse),
    /// Redirect to another location.
    Redirect(Redirect),
    /// Escape hatch for custom dispatchers.
    ///
    /// The default dispatcher refuses every custom payload; only a
    /// dispatcher that recognises the concrete type may write it.
    Custom(Box<dyn CustomResponse>),
}

impl Response {
    /// Wrap an arbitrary value for a custom dispatcher.
    pub fn custom(value: impl Any + Send + Sync) -> Response {
        Response::Custom(Box::new(value))
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Html(html) => f.debug_tuple("Html").field(html).finish(),
            Self::Template(tpl) => f.debug_tuple("Template").field(tpl).finish(),
            Self::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Self::NoContent => f.write_str("NoContent"),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Redirect(redirect) => f.debug_tuple("Redirect").field(redirect).finish(),
            Self::Custom(_) => f.debug_struct("Custom").finish_non_exhaustive(),
        }
    }
}

impl From<Html> for Response {
    fn from(html: Html) -> Response {
        Response::Html(html)
    }
}

impl From<TemplateResponse> for Response {
    fn from(tpl: TemplateResponse) -> Response {
        Response::Template(tpl)
    }
}

impl From<JsonResponse> for Response {
    fn from(json: JsonResponse) -> Response {
        Response::Json(json)
    }
}

impl From<Redirect> for Response {
    fn from(redirect: Redirect) -> Response {
        Response::Redirect(redirect)
    }
}

/// Payload for [`Response::Custom`].
///
/// Implemented for every `Any + Send + Sync` type; a custom dispatcher
/// recognises its own payloads by downcasting [`as_any`][Self::as_any].
pub trait CustomResponse: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> CustomResponse for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ===== Template =====

/// A template invocation: the template, its data value and the function
/// bindings the placeholders call.
pub struct TemplateResponse {
    template: Template,
    data: String,
    funcs: FuncMap,
}

impl TemplateResponse {
    pub fn new(template: Template, data: impl Into<String>) -> TemplateResponse {
        TemplateResponse {
            template,
            data: data.into(),
            funcs: FuncMap::new(),
        }
    }

    /// Bind a zero-argument function the template may call by name.
    pub fn func(
        mut self,
        name: &'static str,
        f: impl Fn() -> String + Send + Sync + 'static,
    ) -> TemplateResponse {
        self.funcs.insert(name, Box::new(f));
        self
    }

    pub(crate) fn render(&self) -> Result<Html, TemplateError> {
        self.template.execute(&self.data, &self.funcs)
    }
}

impl std::fmt::Debug for TemplateResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResponse").finish_non_exhaustive()
    }
}

// ===== Error =====

/// Error response value: a status in `[400, 600)` plus a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    code: StatusCode,
    reason: String,
}

impl ErrorResponse {
    /// # Panics
    ///
    /// Panics if `code` is not a client or server error status.
    pub fn new(code: StatusCode, reason: impl Into<String>) -> ErrorResponse {
        assert!(
            code.is_client_error() || code.is_server_error(),
            "error response status must be in [400, 600)",
        );
        ErrorResponse {
            code,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

// ===== Redirect =====

/// Redirect response value: a location plus a `3xx` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    /// Redirect with 307 Temporary Redirect.
    pub fn new(location: impl Into<String>) -> Redirect {
        Redirect {
            location: location.into(),
            status: StatusCode::TEMPORARY_REDIRECT,
        }
    }

    /// Redirect with a custom status code.
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a redirection status.
    pub fn with_status(status: StatusCode, location: impl Into<String>) -> Redirect {
        assert!(status.is_redirection(), "redirect status must be in [300, 400)");
        Redirect {
            location: location.into(),
            status,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}
