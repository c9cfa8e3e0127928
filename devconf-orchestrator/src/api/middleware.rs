use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

/// Proxy headers checked in order before falling back to the peer address.
const CLIENT_IP_HEADERS: [&str; 4] = ["true-client-ip", "x-forwarded-for", "x-real-ip", "x-client-ip"];

fn header_ip(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    // x-forwarded-for is "client, proxy1, proxy2"
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    CLIENT_IP_HEADERS
        .iter()
        .find_map(|name| header_ip(headers, name))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Access log line per request with the resolved client address.
pub async fn log_client_ip(request: Request, next: Next) -> Response {
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let ip = client_ip(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    tracing::info!(
        client_ip = %ip,
        user_agent = %user_agent,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "request served"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None), "unknown");
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");

        headers.insert("x-client-ip", HeaderValue::from_static("4.4.4.4"));
        headers.insert("x-real-ip", HeaderValue::from_static("3.3.3.3"));
        assert_eq!(client_ip(&headers, Some(peer)), "3.3.3.3");

        headers.insert("x-forwarded-for", HeaderValue::from_static("2.2.2.2, 172.16.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "2.2.2.2");

        headers.insert("true-client-ip", HeaderValue::from_static("1.1.1.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "1.1.1.1");
    }
}
