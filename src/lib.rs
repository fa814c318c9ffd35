#![warn(missing_debug_implementations)]
//! Safe HTTP request-handling kernel.
//!
//! Handlers cannot emit raw bytes. They hand typed [`Response`] values to
//! a per-request [`Task`], which drives the interceptor phases (Before
//! forward, Commit and OnError in reverse) and only lets a
//! [`Dispatcher`] that recognises the payload shape put bytes on the
//! wire. Whole classes of response injection stop being representable at
//! the API boundary: HTML goes out as escape-by-construction [`Html`]
//! values, JSON behind an anti-hijacking sentinel, and anything else is
//! refused before the first body byte.
//!
//! # Quick Start
//!
//! ```ignore
//! use warden::{HandlerConfig, Html, IncomingRequest, Task, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = HandlerConfig::new(handler_fn(|task: &mut Task, _: &IncomingRequest| {
//!         task.write(Html::escaped("Hello World!"))
//!     }));
//!
//!     warden::listen("0.0.0.0:3000", config).await
//! }
//! ```
mod common;

pub mod collector;
pub mod dispatch;
pub mod header;
pub mod html;
pub mod request;
pub mod response;
pub mod sink;
pub mod task;

#[cfg(feature = "tokio")]
pub mod rt;

pub use dispatch::{DefaultDispatcher, DispatchError, Dispatcher};
pub use header::{Claim, Cookie, HeaderError, Headers, SameSite};
pub use html::{Html, Template, TemplateError};
pub use request::IncomingRequest;
pub use response::{
    CustomResponse, ErrorResponse, JsonResponse, Redirect, Response, TemplateResponse,
};
pub use sink::Sink;
pub use task::{
    Handler, HandlerConfig, HandlerFn, Interceptor, Outcome, Task, handler_fn, process_request,
};

#[cfg(feature = "tokio")]
pub use rt::listen;
