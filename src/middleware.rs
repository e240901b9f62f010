use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;

/// Logs every request with its session, client address and latency.
/// Server errors are logged at warn so a failing upstream stands out.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let session = session_id(&path).map(|id| id.to_string()).unwrap_or_default();
    let client_ip = client_ip(&request);

    tracing::debug!(
        target: "postgen::middleware",
        method = %method,
        path = %path,
        session = %session,
        client_ip = %client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::warn!(
            target: "postgen::middleware",
            method = %method,
            path = %path,
            session = %session,
            status = status.as_u16(),
            elapsed_ms,
            "Request failed"
        );
    } else {
        tracing::info!(
            target: "postgen::middleware",
            method = %method,
            path = %path,
            session = %session,
            status = status.as_u16(),
            elapsed_ms,
            "Request completed"
        );
    }

    response
}

/// Session id from a `/sessions/{id}/...` path.
fn session_id(path: &str) -> Option<Uuid> {
    let mut segments = path.trim_start_matches('/').split('/');
    if segments.next()? != "sessions" {
        return None;
    }
    segments.next()?.parse().ok()
}

/// First forwarded address, then `x-real-ip`, then the peer address.
fn client_ip(request: &Request) -> String {
    let headers = request.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    if let Some(ip) = forwarded.or(real_ip) {
        return ip.to_string();
    }

    // Set by `into_make_service_with_connect_info`
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
