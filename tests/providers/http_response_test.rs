//! HTTP response sanitization and truncation tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use campaigner::providers::{check_http_response, sanitize_http_error_body, ProviderError};

async fn serve_once(status_line: &str, body: &str) -> String {
    let listener_result = TcpListener::bind("127.0.0.1:0").await;
    assert!(listener_result.is_ok());
    let listener = match listener_result {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };

    let addr_result = listener.local_addr();
    assert!(addr_result.is_ok());
    let addr = match addr_result {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let status_line_owned = status_line.to_owned();
    let body_owned = body.to_owned();
    tokio::spawn(async move {
        let accepted = listener.accept().await;
        if let Ok((mut socket, _)) = accepted {
            let mut read_buf = [0_u8; 1024];
            let _ = socket.read(&mut read_buf).await;

            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{addr}/")
}

#[tokio::test]
async fn non_success_status_redacts_api_keys() {
    let raw_key = format!("AIza{}", "x".repeat(35));
    let body = format!("{{\"error\": \"API key {raw_key} not valid\"}}");
    let url = serve_once("403 Forbidden", &body).await;

    let response_result = reqwest::get(url).await;
    assert!(response_result.is_ok());
    let response = match response_result {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };

    let checked = check_http_response(response).await;
    let err = match checked {
        Ok(_) => panic!("response should fail on non-success status"),
        Err(err) => err,
    };
    match err {
        ProviderError::HttpStatus { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("[REDACTED]"));
            assert!(!body.contains(&raw_key));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn success_returns_body() {
    let url = serve_once("200 OK", "hello").await;
    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };
    let checked = check_http_response(response).await;
    assert!(checked.is_ok());
    assert_eq!(checked.unwrap_or_default(), "hello");
}

#[test]
fn long_bodies_are_truncated() {
    let sanitized = sanitize_http_error_body(&"e".repeat(1000));
    assert!(sanitized.ends_with("...[truncated]"));
    assert_eq!(sanitized.chars().count(), 256 + "...[truncated]".len());
}

#[test]
fn bearer_tokens_are_redacted() {
    let sanitized = sanitize_http_error_body("header was Bearer abcdefghijklmnopqrstuvwxyz");
    assert_eq!(sanitized, "header was [REDACTED]");
}
