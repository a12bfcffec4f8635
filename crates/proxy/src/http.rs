use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Response headers the Python reference proxy never forwards — set by the
/// upstream's own transport and meaningless (or actively wrong) once
/// replayed through a second hop.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &["transfer-encoding", "content-length", "content-encoding"];

fn proxy_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Forward a non-websocket HTTP request to `http://<container>:<port><path>`
/// derived from the `Host` header, preserving method, query string, headers
/// (minus `Host`), and body. Response headers are copied through minus the
/// transport-level ones the upstream hop already resolved.
pub async fn forward_http(client: &reqwest::Client, req: Request<Body>) -> Response {
    let Some(host) = req
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return proxy_error(StatusCode::BAD_REQUEST, "missing host header");
    };

    let Some((container, port)) = crate::route::parse_host(&host) else {
        return proxy_error(
            StatusCode::BAD_REQUEST,
            "host header does not match <container>-<port>.<domain>",
        );
    };

    let mut target = format!("http://{container}:{port}{}", req.uri().path());
    if let Some(query) = req.uri().query() {
        target.push('?');
        target.push_str(query);
    }

    let method = req.method().clone();
    let headers = req.headers().clone();
    let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return proxy_error(StatusCode::BAD_GATEWAY, format!("failed to read request body: {e}")),
    };

    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET);
    let mut builder = client
        .request(reqwest_method, &target)
        .timeout(UPSTREAM_TIMEOUT)
        .body(body.to_vec());
    for (name, value) in headers.iter() {
        if name == axum::http::header::HOST {
            continue;
        }
        if let Ok(v) = value.to_str() {
            builder = builder.header(name.as_str(), v);
        }
    }

    tracing::info!(target = %target, method = %method, "proxying request");

    match builder.send().await {
        Ok(response) => translate_response(response).await,
        Err(e) => classify_failure(&target, &e),
    }
}

async fn translate_response(response: reqwest::Response) -> Response {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers().iter() {
        if STRIPPED_RESPONSE_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.insert(name, value);
        }
    }

    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => return proxy_error(StatusCode::BAD_GATEWAY, format!("failed to read upstream body: {e}")),
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| proxy_error(StatusCode::BAD_GATEWAY, "failed to build response"))
}

/// Turn a `reqwest` transport error into the same 502 diagnostic shapes the
/// Python reference distinguishes: DNS failures and connection refusals get
/// a specific message, everything else gets a generic one.
fn classify_failure(target: &str, err: &reqwest::Error) -> Response {
    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    let diagnostic = if lower.contains("dns") || lower.contains("name resolution") || lower.contains("lookup") {
        format!("DNS resolution failed for {target} - container name may not be resolvable")
    } else if lower.contains("refused") {
        format!("Connection refused for {target} - service may not be running on expected port")
    } else {
        format!("Failed to connect to agent service: {message}")
    };

    tracing::error!(target = %target, error = %message, "proxy upstream request failed");
    proxy_error(StatusCode::BAD_GATEWAY, diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripped_headers_are_lowercase_and_exact() {
        assert!(STRIPPED_RESPONSE_HEADERS.contains(&"transfer-encoding"));
        assert!(STRIPPED_RESPONSE_HEADERS.contains(&"content-length"));
        assert!(STRIPPED_RESPONSE_HEADERS.contains(&"content-encoding"));
    }
}
