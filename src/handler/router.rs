//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, route
//! matching, dispatch and access logging.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Body as _, Bytes};
use hyper::header::{HeaderName, HeaderValue, REFERER, SERVER, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode};

use super::info::SystemInfo;
use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry, AccessLogFormat};

/// The two routes the service answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Info,
    Health,
}

impl Route {
    /// Exact path match; the query string never takes part
    pub fn match_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Self::Info),
            "/health" => Some(Self::Health),
            _ => None,
        }
    }
}

/// Main entry point for HTTP request handling.
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let logging = &state.config.logging;
    logger::log_headers_count(req.headers().len(), logging.show_headers);

    let mut response = route_request(req.method(), req.uri().path(), &state);

    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if logging.access_log {
        let format = logging
            .access_log_format
            .parse()
            .unwrap_or(AccessLogFormat::Combined);
        let entry = access_entry(&req, &response, peer_addr, started);
        logger::log_access(&entry, format);
    }

    Ok(response)
}

/// Route request based on method and path
pub fn route_request(method: &Method, path: &str, state: &AppState) -> Response<Full<Bytes>> {
    let is_head = *method == Method::HEAD;
    let Some(route) = Route::match_path(path) else {
        return http::build_404_response(is_head);
    };

    if !matches!(*method, Method::GET | Method::HEAD) {
        logger::log_warning(&format!("Method not allowed: {method} {path}"));
        return http::build_405_response();
    }

    match route {
        Route::Health => http::build_text_response(StatusCode::OK, "OK", is_head),
        Route::Info => serve_system_info(state, is_head),
    }
}

fn serve_system_info(state: &AppState, is_head: bool) -> Response<Full<Bytes>> {
    let info = SystemInfo::collect(state.uptime());
    match serde_json::to_vec(&info) {
        Ok(body) => http::build_json_response(body, is_head),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize system info: {e}"));
            http::build_text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                is_head,
            )
        }
    }
}

fn access_entry<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handler::info::SERVICE_NAME;
    use http_body_util::BodyExt;

    fn test_state() -> Arc<AppState> {
        let mut cfg = Config::load_from("this-config-file-does-not-exist", None).unwrap();
        cfg.logging.access_log = false;
        Arc::new(AppState::new(&cfg))
    }

    fn peer() -> SocketAddr {
        "10.0.0.9:41000".parse().unwrap()
    }

    async fn send(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
    ) -> (StatusCode, hyper::HeaderMap, Bytes) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, "ELB-HealthChecker/2.0")
            .body(())
            .unwrap();
        let resp = handle_request(req, Arc::clone(state), peer()).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[test]
    fn test_match_path() {
        assert_eq!(Route::match_path("/"), Some(Route::Info));
        assert_eq!(Route::match_path("/health"), Some(Route::Health));
        assert_eq!(Route::match_path("/health/"), None);
        assert_eq!(Route::match_path("/healthz"), None);
        assert_eq!(Route::match_path("/HEALTH"), None);
    }

    #[tokio::test]
    async fn test_health_ignores_query_and_headers() {
        let state = test_state();
        for uri in ["/health", "/health?verbose=1", "/health?"] {
            let (status, _, body) = send(&state, Method::GET, uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(&body[..], b"OK");
        }
    }

    #[tokio::test]
    async fn test_info_body() {
        let state = test_state();
        let (status, headers, body) = send(&state, Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[SERVER], "fargate-demo");
        let info: SystemInfo = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.service, SERVICE_NAME);
        assert!(info.uptime >= 0.0);
    }

    #[tokio::test]
    async fn test_uptime_non_decreasing() {
        let state = test_state();
        let mut last = 0.0_f64;
        for _ in 0..3 {
            let (_, _, body) = send(&state, Method::GET, "/").await;
            let info: SystemInfo = serde_json::from_slice(&body).unwrap();
            assert!(info.uptime >= last);
            last = info.uptime;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let state = test_state();
        let (status, _, body) = send(&state, Method::HEAD, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let state = test_state();
        let (status, _, _) = send(&state, Method::GET, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, headers, _) = send(&state, Method::POST, "/health").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers[hyper::header::ALLOW], "GET, HEAD");
    }
}
