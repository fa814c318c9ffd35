//! Violation-report collection endpoint.
//!
//! Browsers deliver security violation reports in two incompatible wire
//! dialects: the deprecated single-object form on
//! `application/csp-report` (with or without a wrapping `csp-report`
//! key, hyphenated field names) and the generic report array on
//! `application/reports+json` (camelCase field names). Both are
//! normalised into one [`CspReport`] record before the user callback
//! sees them.
use serde::Deserialize;
use serde_json::{Map, Value};

use http::{Method, StatusCode};

use crate::request::IncomingRequest;
use crate::task::{Handler, Outcome, Task};

/// Generic report envelope, as serialised by the Reporting API.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Report type; controls how the body was decoded.
    pub type_: String,
    /// Milliseconds since the violation occurred.
    pub age: u64,
    /// Address of the document or worker the report was generated from.
    pub url: String,
    /// `User-Agent` of the delivering request.
    pub user_agent: String,
    pub body: ReportBody,
}

/// Decoded report body.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportBody {
    /// Body of a `csp-violation` report.
    Csp(CspReport),
    /// Any other report type, kept as the raw JSON object.
    Raw(Map<String, Value>),
}

/// CSP violation report normalised across both wire dialects.
///
/// Missing or mistyped string fields decode to the empty string, numeric
/// ones to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspReport {
    /// URL of the resource the policy blocked, possibly truncated to its
    /// origin.
    pub blocked_url: String,
    /// `"enforce"` or `"report"`.
    pub disposition: String,
    /// URL of the document the violation occurred in.
    pub document_url: String,
    /// The directive whose enforcement caused the violation.
    pub effective_directive: String,
    /// The policy as originally specified.
    pub original_policy: String,
    pub referrer: String,
    /// First 40 characters of the offending inline content.
    pub sample: String,
    pub status_code: u64,
    /// Kept as a copy of `effective_directive` in the newer dialect.
    pub violated_directive: String,
    pub source_file: String,
    pub line_number: u64,
    pub column_number: u64,
}

/// POST endpoint decoding violation reports and handing them to user
/// callbacks.
///
/// Responds 405 to other methods, 415 when the content type has no
/// registered callback, 400 on undecodable payloads and 204 on success.
#[derive(Default)]
pub struct Collector {
    on_report: Option<Box<dyn Fn(Report) + Send + Sync>>,
    on_csp: Option<Box<dyn Fn(CspReport) + Send + Sync>>,
}

impl Collector {
    pub fn new() -> Collector {
        Collector::default()
    }

    /// Callback for generic reports (`application/reports+json`).
    pub fn on_report(mut self, f: impl Fn(Report) + Send + Sync + 'static) -> Collector {
        self.on_report = Some(Box::new(f));
        self
    }

    /// Callback for deprecated CSP reports (`application/csp-report`).
    pub fn on_csp(mut self, f: impl Fn(CspReport) + Send + Sync + 'static) -> Collector {
        self.on_csp = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("on_report", &self.on_report.is_some())
            .field("on_csp", &self.on_csp.is_some())
            .finish()
    }
}

impl Handler for Collector {
    fn serve(&self, task: &mut Task, req: &IncomingRequest) -> Outcome {
        if req.method() != &Method::POST {
            return task.write_error(StatusCode::METHOD_NOT_ALLOWED);
        }

        let content_type = req.header("content-type").unwrap_or("");
        if content_type == "application/csp-report" {
            if let Some(on_csp) = &self.on_csp {
                return serve_legacy_csp(on_csp, task, req.body());
            }
        } else if content_type == "application/reports+json" {
            if let Some(on_report) = &self.on_report {
                return serve_reports(on_report, task, req.body());
            }
        }

        task.write_error(StatusCode::UNSUPPORTED_MEDIA_TYPE)
    }
}

// CSP2 serialises the report wrapped in a single `csp-report` key; the
// deprecated CSP3 form drops the wrapper. Both arrive on the same
// content type, so unwrap one level when the key is present.
fn serve_legacy_csp(
    on_csp: &(dyn Fn(CspReport) + Send + Sync),
    task: &mut Task,
    body: &[u8],
) -> Outcome {
    let root: Value = match serde_json::from_slice(body) {
        Ok(root) => root,
        Err(_) => return task.write_error(StatusCode::BAD_REQUEST),
    };
    let Some(mut fields) = root.as_object() else {
        return task.write_error(StatusCode::BAD_REQUEST);
    };
    if let Some(wrapped) = fields.get("csp-report") {
        match wrapped.as_object() {
            Some(inner) => fields = inner,
            None => return task.write_error(StatusCode::BAD_REQUEST),
        }
    }

    on_csp(CspReport::from_legacy(fields));
    task.no_content()
}

fn serve_reports(
    on_report: &(dyn Fn(Report) + Send + Sync),
    task: &mut Task,
    body: &[u8],
) -> Outcome {
    let reports: Vec<WireReport> = match serde_json::from_slice(body) {
        Ok(reports) => reports,
        Err(_) => return task.write_error(StatusCode::BAD_REQUEST),
    };

    // deliver every well-formed report before failing the request over
    // the malformed ones
    let mut bad_request = false;
    for report in reports {
        let Value::Object(fields) = report.body else {
            bad_request = true;
            continue;
        };
        let body = if report.type_ == "csp-violation" {
            ReportBody::Csp(CspReport::from_wire(&fields))
        } else {
            ReportBody::Raw(fields)
        };
        on_report(Report {
            type_: report.type_,
            age: report.age,
            url: report.url,
            user_agent: report.user_agent,
            body,
        });
    }

    if bad_request {
        task.write_error(StatusCode::BAD_REQUEST)
    } else {
        task.no_content()
    }
}

#[derive(Deserialize)]
struct WireReport {
    #[serde(rename = "type", default)]
    type_: String,
    #[serde(default)]
    age: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    user_agent: String,
    #[serde(default)]
    body: Value,
}

impl CspReport {
    // hyphenated keys; line and column prefer the short names
    fn from_legacy(fields: &Map<String, Value>) -> CspReport {
        let mut line_number = uint_or_zero(fields.get("lineno"));
        if line_number == 0 {
            line_number = uint_or_zero(fields.get("line-number"));
        }
        let mut column_number = uint_or_zero(fields.get("colno"));
        if column_number == 0 {
            column_number = uint_or_zero(fields.get("column-number"));
        }

        CspReport {
            blocked_url: string_or_empty(fields.get("blocked-uri")),
            disposition: string_or_empty(fields.get("disposition")),
            document_url: string_or_empty(fields.get("document-uri")),
            effective_directive: string_or_empty(fields.get("effective-directive")),
            original_policy: string_or_empty(fields.get("original-policy")),
            referrer: string_or_empty(fields.get("referrer")),
            sample: string_or_empty(fields.get("script-sample")),
            status_code: uint_or_zero(fields.get("status-code")),
            violated_directive: string_or_empty(fields.get("violated-directive")),
            source_file: string_or_empty(fields.get("source-file")),
            line_number,
            column_number,
        }
    }

    // camelCase keys; the violated directive no longer exists on the
    // wire and is kept as a copy of the effective one
    fn from_wire(fields: &Map<String, Value>) -> CspReport {
        let effective_directive = string_or_empty(fields.get("effectiveDirective"));
        CspReport {
            blocked_url: string_or_empty(fields.get("blockedURL")),
            disposition: string_or_empty(fields.get("disposition")),
            document_url: string_or_empty(fields.get("documentURL")),
            effective_directive: effective_directive.clone(),
            original_policy: string_or_empty(fields.get("originalPolicy")),
            referrer: string_or_empty(fields.get("referrer")),
            sample: string_or_empty(fields.get("sample")),
            status_code: uint_or_zero(fields.get("statusCode")),
            violated_directive: effective_directive,
            source_file: string_or_empty(fields.get("sourceFile")),
            line_number: uint_or_zero(fields.get("lineNumber")),
            column_number: uint_or_zero(fields.get("columnNumber")),
        }
    }
}

fn string_or_empty(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

// JSON numbers are floating point on the wire; negative values and
// non-numbers coerce to zero
fn uint_or_zero(value: Option<&Value>) -> u64 {
    match value.and_then(Value::as_f64) {
        Some(f) if f >= 0.0 => f as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use http::{Method, StatusCode, Uri};

    use crate::request::IncomingRequest;
    use crate::task::{HandlerConfig, process_request};

    use super::{Collector, CspReport, Report, ReportBody};

    fn post(content_type: &'static str, body: &str) -> IncomingRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        IncomingRequest::new(
            Method::POST,
            Uri::from_static("/reports"),
            headers,
            Bytes::from(body.to_string()),
        )
    }

    fn collect_csp(req: IncomingRequest) -> (StatusCode, Vec<CspReport>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let collector = Collector::new().on_csp(move |report| sink.lock().unwrap().push(report));
        let config = HandlerConfig::new(collector);
        let (status, _, _) = process_request(config, req).into_parts();
        let seen = seen.lock().unwrap().clone();
        (status, seen)
    }

    fn collect_reports(req: IncomingRequest) -> (StatusCode, Vec<Report>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let collector =
            Collector::new().on_report(move |report| sink.lock().unwrap().push(report));
        let config = HandlerConfig::new(collector);
        let (status, _, _) = process_request(config, req).into_parts();
        let seen = seen.lock().unwrap().clone();
        (status, seen)
    }

    #[test]
    fn csp2_wrapped_report() {
        let (status, seen) = collect_csp(post(
            "application/csp-report",
            r#"{"csp-report":{"blocked-uri":"http://a","lineno":5}}"#,
        ));

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            seen,
            [CspReport {
                blocked_url: "http://a".to_string(),
                line_number: 5,
                ..CspReport::default()
            }]
        );
    }

    #[test]
    fn csp3_deprecated_unwrapped_report() {
        let (status, seen) = collect_csp(post(
            "application/csp-report",
            r#"{"blocked-uri":"x","violated-directive":"script-src","line-number":7,"colno":3}"#,
        ));

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            seen,
            [CspReport {
                blocked_url: "x".to_string(),
                violated_directive: "script-src".to_string(),
                line_number: 7,
                column_number: 3,
                ..CspReport::default()
            }]
        );
    }

    #[test]
    fn lineno_takes_precedence() {
        let (_, seen) = collect_csp(post(
            "application/csp-report",
            r#"{"lineno":5,"line-number":9}"#,
        ));
        assert_eq!(seen[0].line_number, 5);
    }

    #[test]
    fn numeric_coercion() {
        let (_, seen) = collect_csp(post(
            "application/csp-report",
            r#"{"lineno":-4,"status-code":"200","blocked-uri":17}"#,
        ));
        assert_eq!(
            seen,
            [CspReport::default()],
        );
    }

    #[test]
    fn csp_malformed_json_is_a_400() {
        let (status, seen) = collect_csp(post("application/csp-report", "{not json"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(seen.is_empty());
    }

    #[test]
    fn csp_wrapped_non_object_is_a_400() {
        let (status, seen) = collect_csp(post("application/csp-report", r#"{"csp-report":3}"#));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(seen.is_empty());
    }

    #[test]
    fn generic_csp_violation() {
        let (status, seen) = collect_reports(post(
            "application/reports+json",
            r#"[{"type":"csp-violation","age":12,"url":"https://a","user_agent":"ua",
                "body":{"blockedURL":"x","effectiveDirective":"d"}}]"#,
        ));

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].type_, "csp-violation");
        assert_eq!(seen[0].age, 12);
        assert_eq!(seen[0].url, "https://a");
        assert_eq!(seen[0].user_agent, "ua");
        assert_eq!(
            seen[0].body,
            ReportBody::Csp(CspReport {
                blocked_url: "x".to_string(),
                effective_directive: "d".to_string(),
                violated_directive: "d".to_string(),
                ..CspReport::default()
            })
        );
    }

    #[test]
    fn generic_other_type_keeps_raw_body() {
        let (status, seen) = collect_reports(post(
            "application/reports+json",
            r#"[{"type":"deprecation","body":{"id":"x"}}]"#,
        ));

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(matches!(&seen[0].body, ReportBody::Raw(map) if map["id"] == "x"));
    }

    #[test]
    fn non_object_body_fails_after_delivery() {
        let (status, seen) = collect_reports(post(
            "application/reports+json",
            r#"[{"type":"csp-violation","body":"nope"},
                {"type":"csp-violation","body":{"blockedURL":"x"}}]"#,
        ));

        // the well-formed report is still delivered
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].body,
            ReportBody::Csp(CspReport {
                blocked_url: "x".to_string(),
                ..CspReport::default()
            })
        );
    }

    #[test]
    fn generic_malformed_json_is_a_400() {
        let (status, seen) = collect_reports(post("application/reports+json", "[{"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(seen.is_empty());
    }

    #[test]
    fn get_is_method_not_allowed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let collector = Collector::new().on_csp(move |report| sink.lock().unwrap().push(report));
        let req = IncomingRequest::new(
            Method::GET,
            Uri::from_static("/reports"),
            HeaderMap::new(),
            Bytes::new(),
        );
        let (status, _, _) = process_request(HandlerConfig::new(collector), req).into_parts();

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unregistered_content_type_is_a_415() {
        // a csp handler alone does not accept the generic dialect
        let (status, seen) = collect_csp(post("application/reports+json", "[]"));
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(seen.is_empty());

        let (status, _) = collect_csp(post("text/plain", "hello"));
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
