//! HTTP liveness endpoint.
//!
//! `GET /` answers the literal string "ok" so load balancers and uptime
//! monitors can probe the relay without speaking its peer protocol.

use axum::Router;
use axum::routing::get;
use std::io;
use tokio::net::TcpListener;

/// Serve the liveness endpoint on an already-bound listener
///
/// # Errors
///
/// Returns an error if the HTTP server fails.
pub async fn serve(listener: TcpListener) -> io::Result<()> {
    let app = Router::new().route("/", get(|| async { "ok" }));
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_liveness_answers_ok() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = serve(listener).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));
    }
}
