//! Server runtime glue using hyper and tokio.
use std::convert::Infallible;
use std::{fmt, io};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as Hyper;
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::common::log_error;
use crate::request::IncomingRequest;
use crate::task::{HandlerConfig, process_request};

/// Start serving `config` on `addr` using hyper and tokio.
///
/// Every request gets its own task: the body is drained up front, the
/// task runs to completion on the connection's executor, and the
/// buffered sink becomes the hyper response. Connection-level errors are
/// logged and never fatal to the accept loop.
pub async fn listen(
    addr: impl ToSocketAddrs + fmt::Display + Clone,
    config: HandlerConfig,
) -> io::Result<()> {
    let tcp = match TcpListener::bind(addr.clone()).await {
        Ok(ok) => ok,
        Err(err) => {
            return Err(io::Error::new(
                err.kind(),
                format!("failed to bind \"{addr}\": {err}"),
            ));
        }
    };

    loop {
        match tcp.accept().await {
            Ok((stream, _)) => {
                let config = config.clone();
                tokio::spawn(async move {
                    let service =
                        service_fn(move |req| serve_request(config.clone(), req));
                    let rt = Hyper::new(TokioExecutor::new());
                    if let Err(err) = rt.serve_connection(TokioIo::new(stream), service).await {
                        log_error!("connection error: {err}");
                    }
                });
            }
            Err(err) => log_error!("failed to accept peer: {err}"),
        }
    }
}

async fn serve_request(
    config: HandlerConfig,
    req: hyper::Request<Incoming>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            log_error!("failed to read request body: {err}");
            let mut resp = hyper::Response::new(Full::new(Bytes::from_static(b"Bad Request\n")));
            *resp.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(resp);
        }
    };

    let incoming = IncomingRequest::new(parts.method, parts.uri, parts.headers, body);
    let (status, headers, body) = process_request(config, incoming).into_parts();

    let mut resp = hyper::Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    *resp.headers_mut() = headers;
    Ok(resp)
}
