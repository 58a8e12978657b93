use super::listener::accept_backoff;
use super::*;
use crate::config::ListenerConfig;
use crate::test_utils::{post_request, read_response, send_raw_request, spawn_test_server, test_config};
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

#[tokio::test]
async fn test_keep_alive_serves_multiple_requests() {
    let dir = tempdir().unwrap();
    let (server_handle, addr, shutdown) =
        spawn_test_server(test_config(dir.path().join("saltResponse.json"))).await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for target in ["/process_queue.php", "/get_server.php/", "/elsewhere"] {
        stream.write_all(&post_request(target, Some("a=1"))).await.unwrap();
        let response = read_response(&mut stream).await.unwrap();
        assert_eq!(response.status, 202);
        assert_eq!(response.header("Connection"), Some("keep-alive"));
    }

    let _ = shutdown.send(());
    server_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connection_close_is_honoured() {
    let dir = tempdir().unwrap();
    let (server_handle, addr, shutdown) =
        spawn_test_server(test_config(dir.path().join("saltResponse.json"))).await.unwrap();

    let mut first = TcpStream::connect(addr).await.unwrap();
    first
        .write_all(b"POST /get_server.php HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let response = read_response(&mut first).await.unwrap();
    assert_eq!(response.body, b"Server info response");

    // The listener only moves on once the first connection is finished
    let second = send_raw_request(addr, &post_request("/process_queue.php", None))
        .await
        .unwrap();
    assert_eq!(second.status, 202);

    let _ = shutdown.send(());
    server_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_request_gets_bad_request() {
    let dir = tempdir().unwrap();
    let (server_handle, addr, shutdown) =
        spawn_test_server(test_config(dir.path().join("saltResponse.json"))).await.unwrap();

    let response = send_raw_request(addr, b"\x01garbage\r\n\r\n").await.unwrap();
    assert_eq!(response.status, 400);
    assert_eq!(response.header("Connection"), Some("close"));

    let _ = shutdown.send(());
    server_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_oversized_body_gets_payload_too_large() {
    let dir = tempdir().unwrap();
    let config = ServerConfig {
        max_body_size: 8,
        ..test_config(dir.path().join("saltResponse.json"))
    };
    let (server_handle, addr, shutdown) = spawn_test_server(config).await.unwrap();

    let response = send_raw_request(addr, &post_request("/process_queue.php", Some("far too long")))
        .await
        .unwrap();
    assert_eq!(response.status, 413);

    let _ = shutdown.send(());
    server_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_default_headers_outside_raw_mode() {
    let dir = tempdir().unwrap();
    let config = ServerConfig {
        raw_headers: false,
        ..test_config(dir.path().join("saltResponse.json"))
    };
    let (server_handle, addr, shutdown) = spawn_test_server(config).await.unwrap();

    let generic = send_raw_request(addr, &post_request("/process_queue.php", None))
        .await
        .unwrap();
    assert!(generic.header("Server").unwrap().starts_with("mocksrv/"));
    assert_eq!(generic.headers.iter().filter(|(n, _)| n == "Date").count(), 1);

    // The spoofed endpoint already carries its own Server header
    let spoofed = send_raw_request(addr, &post_request("/tapservice/api", None))
        .await
        .unwrap();
    assert_eq!(spoofed.header("Server"), Some("nginx/1.24.0 (Ubuntu)"));

    let _ = shutdown.send(());
    server_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_signal_stops_idle_server() {
    let dir = tempdir().unwrap();
    let (server_handle, _addr, shutdown) =
        spawn_test_server(test_config(dir.path().join("saltResponse.json"))).await.unwrap();

    shutdown.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server_handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}

#[tokio::test]
async fn test_run_listeners_requires_an_enabled_listener() {
    let config = ServerConfig {
        listeners: vec![ListenerConfig::new(0, false)],
        ..Default::default()
    };
    assert!(matches!(run_listeners(config).await, Err(MockError::Config(_))));
}

#[tokio::test]
async fn test_run_listeners_reports_bind_failure() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let config = ServerConfig {
        listeners: vec![ListenerConfig::new(port, true)],
        ..test_config("saltResponse.json")
    };
    assert!(matches!(run_listeners(config).await, Err(MockError::Tcp(_))));
}

#[tokio::test]
async fn test_stop_future_interrupts_open_connection() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path().join("saltResponse.json"));
    let dispatcher = Arc::new(Dispatcher::new(FixtureSource::new(&config.fixture_path)));
    let server = MockServer::bind(&config, 0, dispatcher).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_handle = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    // Keep-alive client stays connected while the stop request arrives
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&post_request("/get_server.php", None)).await.unwrap();
    let response = read_response(&mut stream).await.unwrap();
    assert_eq!(response.header("Connection"), Some("keep-alive"));

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server_handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
    drop(stream);
}

#[tokio::test]
async fn test_shutdown_signal_interrupts_open_connection() {
    let dir = tempdir().unwrap();
    let (server_handle, addr, shutdown) =
        spawn_test_server(test_config(dir.path().join("saltResponse.json"))).await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&post_request("/process_queue.php", None)).await.unwrap();
    read_response(&mut stream).await.unwrap();

    shutdown.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server_handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
    drop(stream);
}

#[test]
fn test_accept_backoff_grows_and_is_capped() {
    assert_eq!(accept_backoff(0), Duration::from_millis(10));
    assert_eq!(accept_backoff(1), Duration::from_millis(20));
    assert_eq!(accept_backoff(3), Duration::from_millis(80));
    assert_eq!(accept_backoff(10), Duration::from_secs(1));
    assert_eq!(accept_backoff(u32::MAX), Duration::from_secs(1));
}
