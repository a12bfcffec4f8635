use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequest, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::body::Body;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

use crate::ProxyState;

/// Mirrors the Python reference's `is_websocket_upgrade_request`: both the
/// `Connection: ... upgrade ...` and `Upgrade: websocket` headers must be
/// present for this to be a real upgrade, not just any request with stray
/// headers set.
fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_has_upgrade = headers
        .get(axum::http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);
    let upgrade_is_websocket = headers
        .get(axum::http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    connection_has_upgrade && upgrade_is_websocket
}

/// The proxy's single fallback route: every request, regardless of method
/// or path, lands here and is dispatched to the websocket or plain-HTTP
/// forwarder based on its headers — never its path, which is only ever
/// used as the upstream path to forward to.
pub async fn dispatch(State(state): State<ProxyState>, req: Request<Body>) -> Response {
    if !is_websocket_upgrade(req.headers()) {
        return crate::http::forward_http(&state.client, req).await;
    }

    let host = req
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    match WebSocketUpgrade::from_request(req, &state).await {
        Ok(ws) => upgrade_and_proxy(ws, host, path, query),
        Err(rejection) => rejection.into_response(),
    }
}

fn upgrade_and_proxy(ws: WebSocketUpgrade, host: Option<String>, path: String, query: Option<String>) -> Response {
    let Some(host) = host else {
        return (StatusCode::BAD_REQUEST, "missing host header").into_response();
    };
    let Some((container, port)) = crate::route::parse_host(&host) else {
        return (
            StatusCode::BAD_REQUEST,
            "host header does not match <container>-<port>.<domain>",
        )
            .into_response();
    };

    let mut target = format!("ws://{container}:{port}/{}", path.trim_start_matches('/'));
    if let Some(q) = query {
        target.push('?');
        target.push_str(&q);
    }

    ws.on_upgrade(move |socket| proxy_socket(socket, target)).into_response()
}

/// Bidirectionally forward frames between the public websocket and the
/// sandbox-internal one. Either direction closing ends the session — there
/// is nothing left to proxy once one side hangs up.
async fn proxy_socket(client_socket: WebSocket, target: String) {
    let upstream = match tokio_tungstenite::connect_async(&target).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::error!(target = %target, error = %e, "failed to connect to upstream websocket");
            return;
        }
    };

    let (mut client_sink, mut client_stream) = client_socket.split();
    let (mut upstream_sink, mut upstream_stream) = upstream.split();

    let to_upstream = async {
        while let Some(Ok(msg)) = client_stream.next().await {
            let forwarded = match msg {
                AxumMessage::Text(t) => UpstreamMessage::Text(t),
                AxumMessage::Binary(b) => UpstreamMessage::Binary(b),
                AxumMessage::Ping(p) => UpstreamMessage::Ping(p),
                AxumMessage::Pong(p) => UpstreamMessage::Pong(p),
                AxumMessage::Close(_) => break,
            };
            if upstream_sink.send(forwarded).await.is_err() {
                break;
            }
        }
    };

    let to_client = async {
        while let Some(Ok(msg)) = upstream_stream.next().await {
            let forwarded = match msg {
                UpstreamMessage::Text(t) => AxumMessage::Text(t),
                UpstreamMessage::Binary(b) => AxumMessage::Binary(b),
                UpstreamMessage::Ping(p) => AxumMessage::Ping(p),
                UpstreamMessage::Pong(p) => AxumMessage::Pong(p),
                UpstreamMessage::Close(_) | UpstreamMessage::Frame(_) => break,
            };
            if client_sink.send(forwarded).await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = to_upstream => {}
        _ = to_client => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_both_connection_and_upgrade_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::UPGRADE, "websocket".parse().unwrap());
        assert!(!is_websocket_upgrade(&headers));

        headers.insert(axum::http::header::CONNECTION, "Upgrade".parse().unwrap());
        assert!(is_websocket_upgrade(&headers));
    }

    #[test]
    fn non_websocket_upgrade_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::CONNECTION, "upgrade".parse().unwrap());
        headers.insert(axum::http::header::UPGRADE, "h2c".parse().unwrap());
        assert!(!is_websocket_upgrade(&headers));
    }
}
