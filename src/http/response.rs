//! Gateway-generated responses.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

use crate::routing::route::join_host_path;

pub const NOT_FOUND_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Body of the not-found page: `<host>/<path>,404.not.found`.
pub fn not_found_body(host: &str, path: &str) -> String {
    format!("{},404.not.found", join_host_path(host, path))
}

/// 404 page for a request with no routing entry.
pub fn not_found(host: &str, path: &str) -> Response<Body> {
    let body = not_found_body(host, path);
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_FOUND;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(NOT_FOUND_CONTENT_TYPE));

    *response.body_mut() = Body::from(body);
    response
}

/// Response for a backend that could not be reached.
pub fn bad_gateway() -> Response<Body> {
    let mut response = Response::new(Body::from("Upstream request failed"));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
}
