//! Integration tests for zabbix-sender.
//!
//! Each test stands up a real TCP listener acting as the collector (or as
//! a SOCKS proxy in front of it) and drives a full send exchange.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use zabbix_sender::protocol::{frame_payload, HEADER_SIZE};
use zabbix_sender::{Proxy, Sender, SenderError};

/// Read one complete frame (13-byte header plus declared payload).
async fn read_framed(socket: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; HEADER_SIZE];
    socket.read_exact(&mut header).await.unwrap();

    let len = u32::from_le_bytes(header[5..9].try_into().unwrap()) as usize;
    let mut payload = vec![0u8; len];
    socket.read_exact(&mut payload).await.unwrap();

    let mut request = header.to_vec();
    request.extend_from_slice(&payload);
    request
}

/// Accept one connection, capture the framed request, optionally reply,
/// then close. Returns the bound port and a receiver for the request.
async fn mock_collector(reply: Option<Vec<u8>>) -> (u16, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_framed(&mut socket).await;
        let _ = tx.send(request);

        if let Some(reply) = reply {
            socket.write_all(&reply).await.unwrap();
        }
        socket.shutdown().await.unwrap();
    });

    (port, rx)
}

fn success_ack(processed: usize) -> Vec<u8> {
    let payload = format!(
        r#"{{"response":"success","info":"processed: {processed}; failed: 0"}}"#
    );
    frame_payload(payload.as_bytes())
}

#[tokio::test]
async fn test_send_success_drains_queue() {
    let (port, request_rx) = mock_collector(Some(success_ack(2))).await;

    let mut sender = Sender::builder().host("127.0.0.1").port(port).build();
    sender.add_host_item("h1", "k1", 5).add_host_item("h1", "k2", 7);
    assert_eq!(sender.count_items(), 2);

    let ack = sender.send().await.unwrap();
    assert_eq!(ack.response["response"], "success");
    assert_eq!(ack.response["info"], "processed: 2; failed: 0");
    assert_eq!(ack.items.len(), 2);
    assert_eq!(sender.count_items(), 0);

    // Inspect the exact bytes the collector received.
    let request = request_rx.await.unwrap();
    assert_eq!(&request[0..4], b"ZBXD");
    assert_eq!(request[4], 0x01);
    let declared = u32::from_le_bytes(request[5..9].try_into().unwrap()) as usize;
    assert_eq!(declared, request.len() - HEADER_SIZE);
    assert_eq!(&request[9..13], &[0u8; 4]);

    let payload: serde_json::Value = serde_json::from_slice(&request[HEADER_SIZE..]).unwrap();
    assert_eq!(payload["request"], "sender data");
    let data = payload["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["host"], "h1");
    assert_eq!(data[0]["key"], "k1");
    assert_eq!(data[0]["value"], 5);
    assert_eq!(data[1]["key"], "k2");
    assert_eq!(data[1]["value"], 7);
}

#[tokio::test]
async fn test_connection_error_restores_items() {
    // Bind and immediately drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut sender = Sender::builder().host("127.0.0.1").port(port).build();
    sender.add_host_item("h1", "k1", 5).add_host_item("h1", "k2", 7);

    let err = sender.send().await.unwrap_err();
    assert!(matches!(err, SenderError::Connection(_)));
    assert_eq!(sender.count_items(), 2);
}

#[tokio::test]
async fn test_empty_response_restores_items() {
    let (port, _request_rx) = mock_collector(None).await;

    let mut sender = Sender::builder().host("127.0.0.1").port(port).build();
    sender.add_host_item("h1", "k1", 5).add_host_item("h1", "k2", 7);

    let err = sender.send().await.unwrap_err();
    assert!(matches!(err, SenderError::EmptyResponse));
    assert_eq!(sender.count_items(), 2);
}

#[tokio::test]
async fn test_invalid_response_restores_items() {
    let (port, _request_rx) =
        mock_collector(Some(b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec())).await;

    let mut sender = Sender::builder().host("127.0.0.1").port(port).build();
    sender.add_host_item("h1", "k1", 5);

    let err = sender.send().await.unwrap_err();
    assert!(matches!(err, SenderError::InvalidResponse));
    assert_eq!(sender.count_items(), 1);
}

#[tokio::test]
async fn test_timeout_restores_items() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _request = read_framed(&mut socket).await;
        // Hold the connection open without ever replying.
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(socket);
    });

    let mut sender = Sender::builder()
        .host("127.0.0.1")
        .port(port)
        .timeout(Duration::from_millis(200))
        .build();
    sender.add_host_item("h1", "k1", 5);

    let err = sender.send().await.unwrap_err();
    assert!(matches!(err, SenderError::TimedOut(_)));
    assert_eq!(sender.count_items(), 1);
}

#[tokio::test]
async fn test_retry_after_failure_resends_restored_items() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        // First connection: answer garbage.
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_framed(&mut socket).await;
        socket.write_all(b"bogus").await.unwrap();
        socket.shutdown().await.unwrap();

        // Second connection: accept the retry and acknowledge it.
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_framed(&mut socket).await;
        let _ = tx.send(request);
        socket.write_all(&success_ack(3)).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let mut sender = Sender::builder().host("127.0.0.1").port(port).build();
    sender.add_host_item("h1", "k1", 1).add_host_item("h1", "k2", 2);

    let err = sender.send().await.unwrap_err();
    assert!(matches!(err, SenderError::InvalidResponse));
    assert_eq!(sender.count_items(), 2);

    // A new item arrives before the retry.
    sender.add_host_item("h1", "k3", 3);

    let ack = sender.send().await.unwrap();
    assert_eq!(ack.items.len(), 3);
    assert_eq!(sender.count_items(), 0);

    let request = rx.await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&request[HEADER_SIZE..]).unwrap();
    let keys: Vec<&str> = payload["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["k1", "k2", "k3"]);
}

#[tokio::test]
async fn test_send_with_timestamps() {
    let (port, request_rx) = mock_collector(Some(success_ack(1))).await;

    let mut sender = Sender::builder()
        .host("127.0.0.1")
        .port(port)
        .with_ns()
        .build();
    sender.add_host_item("h1", "k1", 5);

    sender.send().await.unwrap();

    let request = request_rx.await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&request[HEADER_SIZE..]).unwrap();
    assert!(payload["clock"].is_i64());
    assert!(payload["ns"].is_i64());
    assert!(payload["data"][0]["clock"].is_i64());
    assert!(payload["data"][0]["ns"].is_i64());
}

#[tokio::test]
async fn test_send_through_socks5_proxy() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut greeting = [0u8; 3];
        socket.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, [0x05, 0x01, 0x00]);
        socket.write_all(&[0x05, 0x00]).await.unwrap();

        let mut head = [0u8; 5];
        socket.read_exact(&mut head).await.unwrap();
        assert_eq!(&head[..4], &[0x05, 0x01, 0x00, 0x03]);
        let name_len = head[4] as usize;
        let mut target = vec![0u8; name_len + 2];
        socket.read_exact(&mut target).await.unwrap();
        assert_eq!(&target[..name_len], b"collector.internal");
        socket
            .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();

        // From here on, behave as the collector at the far end.
        let request = read_framed(&mut socket).await;
        let _ = tx.send(request);
        socket.write_all(&success_ack(1)).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let mut sender = Sender::builder()
        .host("collector.internal")
        .port(10051)
        .proxy(Proxy::new("127.0.0.1", proxy_port))
        .build();
    sender.add_host_item("h1", "k1", 5);

    let ack = sender.send().await.unwrap();
    assert_eq!(ack.response["response"], "success");
    assert_eq!(sender.count_items(), 0);

    let request = rx.await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&request[HEADER_SIZE..]).unwrap();
    assert_eq!(payload["data"][0]["key"], "k1");
}

#[tokio::test]
async fn test_proxy_rejection_restores_items() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut greeting = [0u8; 3];
        socket.read_exact(&mut greeting).await.unwrap();
        socket.write_all(&[0x05, 0x00]).await.unwrap();

        let mut head = [0u8; 5];
        socket.read_exact(&mut head).await.unwrap();
        let mut target = vec![0u8; head[4] as usize + 2];
        socket.read_exact(&mut target).await.unwrap();

        // Host unreachable.
        socket
            .write_all(&[0x05, 0x04, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let mut sender = Sender::builder()
        .host("collector.internal")
        .port(10051)
        .proxy(Proxy::new("127.0.0.1", proxy_port))
        .build();
    sender.add_host_item("h1", "k1", 5);

    let err = sender.send().await.unwrap_err();
    assert!(matches!(err, SenderError::Proxy(_)));
    assert!(err.to_string().contains("host unreachable"));
    assert_eq!(sender.count_items(), 1);
}
