//! Reverse proxy forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI to `http://<target><path?query>`
//! - Set `Host` to the target and `X-Forwarded-Host` to the original host
//! - Stream the request body to the backend and the response body back
//!
//! # Design Decisions
//! - One backend call per request: no retries, no load balancing
//! - Hop-by-hop headers stripped in both directions
//! - Transport failures become 502 Bad Gateway

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::response;
use crate::routing::RouteTarget;

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards requests to routing targets over plain HTTP.
#[derive(Debug, Clone)]
pub struct ReverseProxy {
    client: Client<HttpConnector, Body>,
}

impl ReverseProxy {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// Forward `request` to `target`. `original_host` is the host the client addressed.
    pub async fn forward(
        &self,
        target: &RouteTarget,
        original_host: &str,
        mut request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Response<Body> {
        let uri = match target_uri(target, request.uri()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Invalid proxy target");
                return response::bad_gateway();
            }
        };
        let target_host = match HeaderValue::from_str(target.as_str()) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Invalid proxy target");
                return response::bad_gateway();
            }
        };

        *request.uri_mut() = uri;
        *request.version_mut() = Version::HTTP_11;

        let headers = request.headers_mut();
        strip_hop_by_hop(headers);
        headers.insert(header::HOST, target_host);
        if let Ok(value) = HeaderValue::from_str(original_host) {
            headers.insert(X_FORWARDED_HOST, value);
        }
        if let Some(addr) = client_addr {
            append_forwarded_for(headers, addr);
        }

        match self.client.request(request).await {
            Ok(upstream) => {
                let (mut parts, body) = upstream.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Upstream error");
                response::bad_gateway()
            }
        }
    }
}

impl Default for ReverseProxy {
    fn default() -> Self {
        Self::new()
    }
}

/// `http://<target>` followed by the inbound path and query.
pub fn target_uri(target: &RouteTarget, inbound: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
    let path_and_query = inbound
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("http://{}{}", target, path_and_query).parse()
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let ip = addr.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_uri_keeps_path_and_query() {
        let inbound: Uri = "/app/items?page=2".parse().unwrap();
        let uri = target_uri(&RouteTarget::from("backend1.default:8080"), &inbound).unwrap();
        assert_eq!(uri.to_string(), "http://backend1.default:8080/app/items?page=2");
        assert_eq!(uri.host(), Some("backend1.default"));
        assert_eq!(uri.port_u16(), Some(8080));
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::ACCEPT], "*/*");
    }

    #[test]
    fn test_forwarded_for_appends() {
        let mut headers = HeaderMap::new();
        let addr: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        append_forwarded_for(&mut headers, addr);
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.7");

        append_forwarded_for(&mut headers, "10.0.0.8:1".parse().unwrap());
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.7, 10.0.0.8");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_bad_gateway() {
        // Nothing listens on port 9 locally.
        let proxy = ReverseProxy::new();
        let request = Request::builder().uri("/app").body(Body::empty()).unwrap();
        let response = proxy
            .forward(&RouteTarget::from("127.0.0.1:9"), "example.com", request, None)
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
