//! HTTP response building module
//!
//! Provides builders for the status codes the demo service answers with.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};

/// Methods accepted on every route
pub const ALLOWED_METHODS: &str = "GET, HEAD";

/// Build a 200 JSON response. `HEAD` keeps the headers and drops the body.
pub fn build_json_response(body: Vec<u8>, is_head: bool) -> Response<Full<Bytes>> {
    build_response(
        StatusCode::OK,
        "application/json; charset=utf-8",
        Bytes::from(body),
        is_head,
    )
}

/// Build a plain-text response
pub fn build_text_response(
    status: StatusCode,
    text: &'static str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    build_response(
        status,
        "text/plain; charset=utf-8",
        Bytes::from_static(text.as_bytes()),
        is_head,
    )
}

/// Build 404 Not Found response
pub fn build_404_response(is_head: bool) -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, "Not Found", is_head)
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(ALLOW, ALLOWED_METHODS)
        .body(Full::new(Bytes::from_static(b"Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            fallback(StatusCode::METHOD_NOT_ALLOWED)
        })
}

fn build_response(
    status: StatusCode,
    content_type: &str,
    data: Bytes,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, content_length)
        .header(CACHE_CONTROL, "no-store")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            fallback(status)
        })
}

fn fallback(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
