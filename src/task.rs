//! Per-request task state machine.
//!
//! One [`Task`] is created for every HTTP request and owns the whole
//! response lifecycle: it walks the interceptors' Before phase, runs the
//! handler, and exposes the write entry points that drive the Commit and
//! OnError phases before the dispatcher is allowed to emit bytes.
//!
//! The task is single-owner and one-shot. At most one write entry may
//! succeed; calling a second one is a programmer error and panics. The
//! top-level panic trap in [`process_request`] converts such faults into
//! a best-effort 500.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use http::header::{CONTENT_TYPE, HeaderValue, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{Method, StatusCode};

use crate::common::log_error;
use crate::dispatch::{DefaultDispatcher, Dispatcher};
use crate::header::{Cookie, HeaderError, Headers};
use crate::html::Html;
use crate::request::IncomingRequest;
use crate::response::{ErrorResponse, Response};
use crate::sink::Sink;

/// Serves a request through a [`Task`].
pub trait Handler: Send + Sync {
    fn serve(&self, task: &mut Task, req: &IncomingRequest) -> Outcome;
}

/// Adapt a function into a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut Task, &IncomingRequest) -> Outcome + Send + Sync,
{
    HandlerFn { f }
}

/// [`Handler`] returned by [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut Task, &IncomingRequest) -> Outcome + Send + Sync,
{
    fn serve(&self, task: &mut Task, req: &IncomingRequest) -> Outcome {
        (self.f)(task, req)
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Three-phase hook wrapping the handler.
///
/// Interceptors are process-wide and shared across requests; per-request
/// scratch state belongs on the task, not on the interceptor.
pub trait Interceptor: Send + Sync {
    /// Runs before the handler, in registration order. Writing a response
    /// here stops the chain and skips the handler.
    fn before(&self, task: &mut Task, req: &IncomingRequest);

    /// Runs in reverse registration order between response construction
    /// and byte emission. Headers may still be mutated; writing a
    /// response here is a programmer error.
    fn commit(&self, task: &mut Task, req: &IncomingRequest, resp: &Response) {
        let _ = (task, req, resp);
    }

    /// Runs in reverse registration order before an error response is
    /// emitted. Writing here is a programmer error.
    fn on_error(&self, task: &mut Task, req: &IncomingRequest, resp: &Response) {
        let _ = (task, req, resp);
    }
}

/// Opaque token returned by the write entry points.
///
/// A handler that declines to write returns
/// [`not_written`][Outcome::not_written] and the framework synthesises a
/// 204 No Content.
#[derive(Debug)]
pub struct Outcome {
    _priv: (),
}

impl Outcome {
    /// Nothing has been written; the framework takes over.
    pub fn not_written() -> Outcome {
        Outcome { _priv: () }
    }

    pub(crate) fn written() -> Outcome {
        Outcome { _priv: () }
    }
}

// ===== Config =====

/// Immutable per-handler configuration, cloned cheaply into every task.
#[derive(Clone)]
pub struct HandlerConfig {
    handler: Arc<dyn Handler>,
    dispatcher: Arc<dyn Dispatcher>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl HandlerConfig {
    /// Configuration serving `handler` through the default dispatcher,
    /// with no interceptors.
    pub fn new(handler: impl Handler + 'static) -> HandlerConfig {
        HandlerConfig {
            handler: Arc::new(handler),
            dispatcher: Arc::new(DefaultDispatcher),
            interceptors: Vec::new(),
        }
    }

    /// Replace the dispatcher.
    pub fn dispatcher(mut self, dispatcher: impl Dispatcher + 'static) -> HandlerConfig {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    /// Append an interceptor; Before runs in the order of these calls.
    pub fn intercept(mut self, interceptor: impl Interceptor + 'static) -> HandlerConfig {
        self.interceptors.push(Arc::new(interceptor));
        self
    }
}

impl std::fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

// ===== Task =====

/// The per-request response controller.
pub struct Task {
    sink: Sink,
    req: Arc<IncomingRequest>,
    dispatcher: Arc<dyn Dispatcher>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    code: Option<StatusCode>,
    written: bool,
    written_error: bool,
    committing: bool,
}

/// Serve one request: Before interceptors in order, then the handler,
/// then a synthesised 204 if nothing wrote.
///
/// Any panic below this point is trapped and converted into a 500 through
/// [`Task::write_error`], which runs the OnError phase once; a second
/// fault inside that is swallowed and the sink is returned as-is.
pub fn process_request(config: HandlerConfig, req: IncomingRequest) -> Sink {
    let HandlerConfig {
        handler,
        dispatcher,
        interceptors,
    } = config;
    let mut task = Task {
        sink: Sink::new(),
        req: Arc::new(req),
        dispatcher,
        interceptors,
        code: None,
        written: false,
        written_error: false,
        committing: false,
    };

    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| task.run(handler.as_ref()))) {
        log_error!("request task panicked: {}", panic_message(&panic));
        task.committing = false;
        if !task.written_error {
            let _ = catch_unwind(AssertUnwindSafe(|| {
                task.write_error(StatusCode::INTERNAL_SERVER_ERROR);
            }));
        }
    }
    task.sink
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl Task {
    fn run(&mut self, handler: &dyn Handler) {
        let req = Arc::clone(&self.req);
        let interceptors = self.interceptors.clone();
        for interceptor in &interceptors {
            interceptor.before(self, &req);
            if self.written {
                return;
            }
        }

        handler.serve(self, &req);
        if !self.written {
            self.no_content();
        }
    }

    /// Hand `resp` to the dispatcher.
    ///
    /// Runs the Commit phase, asks the dispatcher for the Content-Type,
    /// flushes the head with the pending status (200 if none was set) and
    /// lets the dispatcher emit the body.
    ///
    /// # Panics
    ///
    /// Panics if a response was already written, if called from the
    /// Commit or OnError phase, or if the dispatcher refuses or fails to
    /// write the response.
    pub fn write(&mut self, resp: impl Into<Response>) -> Outcome {
        let resp = resp.into();
        self.assert_writable();
        self.written = true;
        self.commit_phase(&resp);

        let content_type = match self.dispatcher.content_type(&resp) {
            Ok(content_type) => content_type,
            Err(err) => panic!("dispatcher refused the response: {err}"),
        };
        if let Some(mime) = content_type {
            self.sink
                .headers_mut()
                .force_set(CONTENT_TYPE, HeaderValue::from_str(mime.as_ref()).unwrap());
        }

        self.sink.write_head(self.code.unwrap_or(StatusCode::OK));
        let dispatcher = Arc::clone(&self.dispatcher);
        if let Err(err) = dispatcher.write(&mut self.sink, &resp) {
            panic!("dispatcher failed to write the response: {err}");
        }
        Outcome::written()
    }

    /// Respond with 204 No Content.
    ///
    /// # Panics
    ///
    /// Panics if a response was already written or if called from the
    /// Commit or OnError phase.
    pub fn no_content(&mut self) -> Outcome {
        self.assert_writable();
        self.written = true;
        self.commit_phase(&Response::NoContent);
        self.sink.write_head(StatusCode::NO_CONTENT);
        Outcome::written()
    }

    /// Respond with a plain-text error for `code`.
    ///
    /// Runs the OnError phase in reverse order, then writes the status
    /// text as a `text/plain` body.
    ///
    /// # Panics
    ///
    /// Panics if called twice, from the Commit or OnError phase, or with
    /// a status outside `[400, 600)`.
    pub fn write_error(&mut self, code: StatusCode) -> Outcome {
        assert!(
            !self.committing,
            "write is forbidden during the commit and error phases",
        );
        assert!(!self.written_error, "write_error called twice");
        self.written = true;
        self.written_error = true;

        let reason = code.canonical_reason().unwrap_or("");
        let resp = Response::Error(ErrorResponse::new(code, reason));
        self.error_phase(&resp);

        let headers = self.sink.headers_mut();
        headers.force_set(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        headers.force_set(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        self.sink.write_head(code);
        self.sink.append_body(reason.as_bytes());
        self.sink.append_body(b"\n");
        Outcome::written()
    }

    /// Respond with a redirect to `location`.
    ///
    /// GET and HEAD responses carry the HTML content type; only GET gets
    /// a small body linking to the target, with the location escaped.
    ///
    /// # Panics
    ///
    /// Panics if a response was already written, if called from the
    /// Commit or OnError phase, or if `code` is not a redirection status.
    pub fn redirect(&mut self, req: &IncomingRequest, location: &str, code: StatusCode) -> Outcome {
        assert!(code.is_redirection(), "redirect status must be in [300, 400)");
        self.assert_writable();
        self.written = true;

        let is_get = req.method() == &Method::GET;
        let headers = self.sink.headers_mut();
        headers.force_set(LOCATION, HeaderValue::from_str(location).unwrap());
        if is_get || req.method() == &Method::HEAD {
            headers.force_set(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        }
        self.sink.write_head(code);
        if is_get {
            let anchor = format!(
                "<a href=\"{}\">{}</a>.\n",
                Html::escaped(location),
                code.canonical_reason().unwrap_or(""),
            );
            self.sink.append_body(anchor.as_bytes());
        }
        Outcome::written()
    }

    /// Record the status the next [`write`][Task::write] will use.
    ///
    /// A no-op once a response was written.
    ///
    /// # Panics
    ///
    /// Panics if `code` is outside `[100, 600)`.
    pub fn set_code(&mut self, code: StatusCode) {
        if self.written {
            return;
        }
        assert!(code.as_u16() < 600, "status code must be in [100, 600)");
        self.code = Some(code);
    }

    /// Response headers; mutation is only meaningful before a write entry
    /// flushes the head.
    pub fn headers(&mut self) -> &mut Headers {
        self.sink.headers_mut()
    }

    /// Append a validated `Set-Cookie` header.
    pub fn set_cookie(&mut self, cookie: &Cookie) -> Result<(), HeaderError> {
        self.sink.headers_mut().set_cookie(cookie)
    }

    /// The request this task is serving.
    pub fn request(&self) -> &IncomingRequest {
        &self.req
    }

    fn assert_writable(&self) {
        assert!(
            !self.committing,
            "write is forbidden during the commit and error phases",
        );
        assert!(!self.written, "response was already written");
    }

    // reverse order, so interceptor k sees the response after k+1..N-1
    fn commit_phase(&mut self, resp: &Response) {
        let req = Arc::clone(&self.req);
        let interceptors = self.interceptors.clone();
        self.committing = true;
        for interceptor in interceptors.iter().rev() {
            interceptor.commit(self, &req, resp);
        }
        self.committing = false;
    }

    fn error_phase(&mut self, resp: &Response) {
        let req = Arc::clone(&self.req);
        let interceptors = self.interceptors.clone();
        self.committing = true;
        for interceptor in interceptors.iter().rev() {
            interceptor.on_error(self, &req, resp);
        }
        self.committing = false;
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("code", &self.code)
            .field("written", &self.written)
            .field("written_error", &self.written_error)
            .field("committing", &self.committing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::header::{HeaderMap, LOCATION, SET_COOKIE};
    use http::{Method, StatusCode, Uri};

    use crate::dispatch::DefaultDispatcher;
    use crate::header::Cookie;
    use crate::html::Html;
    use crate::request::IncomingRequest;
    use crate::response::Response;
    use crate::sink::Sink;

    use super::{HandlerConfig, Interceptor, Outcome, Task, handler_fn, process_request};

    fn request(method: Method) -> IncomingRequest {
        IncomingRequest::new(method, Uri::from_static("/"), HeaderMap::new(), Bytes::new())
    }

    fn bare_task() -> Task {
        Task {
            sink: Sink::new(),
            req: Arc::new(request(Method::GET)),
            dispatcher: Arc::new(DefaultDispatcher),
            interceptors: Vec::new(),
            code: None,
            written: false,
            written_error: false,
            committing: false,
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records phase entry and optionally writes from Before.
    struct Recorder {
        name: &'static str,
        log: Log,
        write_in_before: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Recorder {
            Recorder {
                name,
                log: Arc::clone(log),
                write_in_before: false,
            }
        }

        fn writing(name: &'static str, log: &Log) -> Recorder {
            Recorder {
                name,
                log: Arc::clone(log),
                write_in_before: true,
            }
        }

        fn record(&self, phase: &str) {
            self.log.lock().unwrap().push(format!("{}.{phase}", self.name));
        }
    }

    impl Interceptor for Recorder {
        fn before(&self, task: &mut Task, _req: &IncomingRequest) {
            self.record("before");
            if self.write_in_before {
                task.write(Html::escaped("early"));
            }
        }

        fn commit(&self, _task: &mut Task, _req: &IncomingRequest, _resp: &Response) {
            self.record("commit");
        }

        fn on_error(&self, _task: &mut Task, _req: &IncomingRequest, _resp: &Response) {
            self.record("on_error");
        }
    }

    #[test]
    fn write_defaults_to_200() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.write(Html::escaped("<h1>Hello World!</h1>"))
        }));
        let (status, headers, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("content-type").unwrap(), "text/html; charset=utf-8");
        assert_eq!(body, b"&lt;h1&gt;Hello World!&lt;/h1&gt;");
    }

    #[test]
    fn declined_handler_synthesises_204() {
        let config =
            HandlerConfig::new(handler_fn(|_: &mut Task, _: &IncomingRequest| Outcome::not_written()));
        let (status, _, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[test]
    fn write_error_uses_status_text() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.write_error(StatusCode::FORBIDDEN)
        }));
        let (status, headers, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(headers.get("content-type").unwrap(), "text/plain; charset=utf-8");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(body, b"Forbidden\n");
    }

    #[test]
    fn set_code_applies_to_write() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.set_code(StatusCode::CREATED);
            task.write(Html::escaped("made"))
        }));
        let (status, _, _) = process_request(config, request(Method::GET)).into_parts();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[test]
    fn set_code_after_write_is_ignored() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            let outcome = task.write(Html::escaped("done"));
            task.set_code(StatusCode::ACCEPTED);
            outcome
        }));
        let (status, _, _) = process_request(config, request(Method::GET)).into_parts();
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn set_code_out_of_range_is_a_500() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.set_code(StatusCode::from_u16(600).unwrap());
            task.no_content()
        }));
        let (status, _, _) = process_request(config, request(Method::GET)).into_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn before_runs_in_registration_order() {
        let log = Log::default();
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| task.no_content()))
            .intercept(Recorder::new("a", &log))
            .intercept(Recorder::new("b", &log))
            .intercept(Recorder::new("c", &log));
        process_request(config, request(Method::GET));

        assert_eq!(
            *log.lock().unwrap(),
            ["a.before", "b.before", "c.before", "c.commit", "b.commit", "a.commit"],
        );
    }

    #[test]
    fn before_write_short_circuits_the_chain() {
        let log = Log::default();
        let handler_ran = Arc::new(Mutex::new(false));
        let ran = Arc::clone(&handler_ran);
        let config = HandlerConfig::new(handler_fn(move |task: &mut Task, _: &IncomingRequest| {
            *ran.lock().unwrap() = true;
            task.no_content()
        }))
        .intercept(Recorder::new("a", &log))
        .intercept(Recorder::writing("b", &log))
        .intercept(Recorder::new("c", &log));
        let (status, _, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"early");
        assert!(!*handler_ran.lock().unwrap());
        assert_eq!(
            *log.lock().unwrap(),
            ["a.before", "b.before", "c.commit", "b.commit", "a.commit"],
        );
    }

    #[test]
    fn on_error_runs_in_reverse_order() {
        let log = Log::default();
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.write_error(StatusCode::BAD_REQUEST)
        }))
        .intercept(Recorder::new("a", &log))
        .intercept(Recorder::new("b", &log))
        .intercept(Recorder::new("c", &log));
        process_request(config, request(Method::GET));

        assert_eq!(
            *log.lock().unwrap(),
            ["a.before", "b.before", "c.before", "c.on_error", "b.on_error", "a.on_error"],
        );
    }

    #[test]
    fn handler_panic_becomes_500_and_runs_on_error() {
        let log = Log::default();
        let config = HandlerConfig::new(handler_fn(|_: &mut Task, _: &IncomingRequest| -> Outcome {
            panic!("boom");
        }))
        .intercept(Recorder::new("a", &log))
        .intercept(Recorder::new("b", &log));
        let (status, _, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"Internal Server Error\n");
        assert_eq!(
            *log.lock().unwrap(),
            ["a.before", "b.before", "b.on_error", "a.on_error"],
        );
    }

    /// Writing from Commit is forbidden; the attempt aborts the task and
    /// the trap produces the 500.
    struct CommitWriter;

    impl Interceptor for CommitWriter {
        fn before(&self, _task: &mut Task, _req: &IncomingRequest) {}

        fn commit(&self, task: &mut Task, _req: &IncomingRequest, _resp: &Response) {
            task.write(Html::escaped("from commit"));
        }
    }

    #[test]
    fn write_in_commit_is_a_500() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.write(Html::escaped("ok"))
        }))
        .intercept(CommitWriter);
        let (status, _, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"Internal Server Error\n");
    }

    /// Writing from OnError leaves the sink untouched: the fault is
    /// swallowed and no head was ever flushed.
    struct ErrorWriter;

    impl Interceptor for ErrorWriter {
        fn before(&self, _task: &mut Task, _req: &IncomingRequest) {}

        fn on_error(&self, task: &mut Task, _req: &IncomingRequest, _resp: &Response) {
            task.write(Html::escaped("from on_error"));
        }
    }

    #[test]
    fn write_in_on_error_aborts_the_response() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.write_error(StatusCode::BAD_REQUEST)
        }))
        .intercept(ErrorWriter);
        let (status, _, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
    }

    #[test]
    fn redirect_get_writes_anchor_body() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, req: &IncomingRequest| {
            task.redirect(req, "/next?a=1&b=2", StatusCode::FOUND)
        }));
        let (status, headers, body) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers.get(LOCATION).unwrap(), "/next?a=1&b=2");
        assert_eq!(body, b"<a href=\"/next?a=1&amp;b=2\">Found</a>.\n");
    }

    #[test]
    fn redirect_head_sets_content_type_without_body() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, req: &IncomingRequest| {
            task.redirect(req, "/next", StatusCode::FOUND)
        }));
        let (status, headers, body) = process_request(config, request(Method::HEAD)).into_parts();

        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers.get("content-type").unwrap(), "text/html; charset=utf-8");
        assert!(body.is_empty());
    }

    #[test]
    fn redirect_post_has_no_body() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, req: &IncomingRequest| {
            task.redirect(req, "/next", StatusCode::SEE_OTHER)
        }));
        let (status, headers, body) = process_request(config, request(Method::POST)).into_parts();

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert!(headers.get("content-type").is_none());
        assert!(body.is_empty());
    }

    #[test]
    fn redirect_with_non_redirect_code_is_a_500() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, req: &IncomingRequest| {
            task.redirect(req, "/next", StatusCode::OK)
        }));
        let (status, _, _) = process_request(config, request(Method::GET)).into_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cookies_reach_the_response() {
        let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
            task.set_cookie(&Cookie::new("session", "abc")).unwrap();
            task.no_content()
        }));
        let (_, headers, _) = process_request(config, request(Method::GET)).into_parts();

        assert_eq!(
            headers.get(SET_COOKIE).unwrap(),
            "session=abc; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    #[should_panic(expected = "response was already written")]
    fn write_twice_panics() {
        let mut task = bare_task();
        task.write(Html::escaped("one"));
        task.write(Html::escaped("two"));
    }

    #[test]
    #[should_panic(expected = "write_error called twice")]
    fn write_error_twice_panics() {
        let mut task = bare_task();
        task.write_error(StatusCode::BAD_REQUEST);
        task.write_error(StatusCode::BAD_REQUEST);
    }

    #[test]
    fn write_error_after_write_is_allowed() {
        // the trap path: a fault after a successful write still gets to
        // report the error phase once
        let mut task = bare_task();
        task.write(Html::escaped("partial"));
        task.write_error(StatusCode::INTERNAL_SERVER_ERROR);
        let (status, _, _) = task.sink.into_parts();
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    #[should_panic(expected = "dispatcher refused")]
    fn unsafe_response_panics() {
        let mut task = bare_task();
        task.write(Response::custom("<h1>raw</h1>".to_string()));
    }
}
