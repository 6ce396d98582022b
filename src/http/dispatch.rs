//! Request dispatch: routing table lookup per request.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    response::Response,
};

use crate::http::{proxy::ReverseProxy, request::request_id, response};
use crate::observability::metrics;
use crate::routing::route::decode_path;
use crate::routing::{RouteKey, RoutingTable};

/// Application state injected into the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchState {
    pub table: RoutingTable,
    pub proxy: ReverseProxy,
}

/// Host the client addressed: `Host` header, else the URI authority.
pub fn request_host<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Look up the request's route; proxy on a hit, 404 on a miss.
pub async fn dispatch(State(state): State<DispatchState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().to_string();
    let host = request_host(&request);
    let path = decode_path(request.uri().path()).into_owned();
    let key = RouteKey::from_request(&host, &path);

    let response = match state.table.lookup(&key) {
        Some(target) => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                host = %host,
                path = %path,
                route = %key,
                target = %target,
                "Proxying request"
            );
            let client_addr = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            state.proxy.forward(&target, &host, request, client_addr).await
        }
        None => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                host = %host,
                path = %path,
                route = %key,
                "No route matched"
            );
            response::not_found(&host, &path)
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}
