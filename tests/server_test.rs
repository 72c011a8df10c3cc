//! Integration tests for the collector HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use serde_json::json;
    use std::time::Duration;
    use synheart_behavior_pipeline::collector::server::{run, ServerConfig};
    use synheart_behavior_pipeline::collector::{CollectorHandle, CollectorService};
    use synheart_behavior_pipeline::config::QueueConfig;

    async fn start() -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let (handle, _task) =
            CollectorHandle::spawn(CollectorService::in_memory(&QueueConfig::default()));
        let (addr, shutdown_tx) = run(ServerConfig::new(0), handle)
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    async fn post(addr: std::net::SocketAddr, body: String) -> serde_json::Value {
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "POST /message HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let response = raw_roundtrip(stream, request).await;
        let (_, body) = response.split_once("\r\n\r\n").expect("HTTP response");
        serde_json::from_str(body).expect("JSON body")
    }

    async fn raw_roundtrip(mut stream: tokio::net::TcpStream, request: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start().await;

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let response = raw_roundtrip(
            stream,
            format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"),
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"ok\""));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_message_protocol_over_http() {
        let (addr, shutdown_tx) = start().await;

        let pong = post(addr, json!({ "type": "PING" }).to_string()).await;
        assert_eq!(pong["ok"], true);
        assert_eq!(pong["pong"], true);

        let record = json!({
            "tag": "[ClickLogger]",
            "timestamp": "2024-01-22T10:00:01Z",
            "payload": { "clientX": 3, "clientY": 4 }
        });
        let queued = post(addr, json!({ "type": "ENQUEUE", "payload": record }).to_string()).await;
        assert_eq!(queued, json!({ "ok": true, "queued": true }));

        let flushed = post(addr, json!({ "type": "FLUSH_QUEUE" }).to_string()).await;
        assert_eq!(flushed["flushed"], 1);
        assert_eq!(flushed["sample"][0]["tag"], "[ClickLogger]");
        assert!(flushed["sample"][0]["_ts"].is_i64());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_bad_messages_get_structured_errors() {
        let (addr, shutdown_tx) = start().await;

        let unknown = post(addr, json!({ "type": "RESET_EVERYTHING" }).to_string()).await;
        assert_eq!(unknown, json!({ "ok": false, "error": "unknown_type" }));

        let garbage = post(addr, "{not json".to_string()).await;
        assert_eq!(garbage, json!({ "ok": false, "error": "invalid_message" }));

        let _ = shutdown_tx.send(());
    }
}

#[cfg(all(feature = "server", feature = "client"))]
mod client_tests {
    use std::sync::Arc;
    use std::time::Duration;
    use synheart_behavior_pipeline::bridge::{DeliveryBridge, HttpChannel};
    use synheart_behavior_pipeline::collector::server::{run, ServerConfig};
    use synheart_behavior_pipeline::collector::{CollectorHandle, CollectorService};
    use synheart_behavior_pipeline::config::QueueConfig;
    use synheart_behavior_pipeline::{EventRecord, EventTag};

    #[tokio::test]
    async fn test_http_channel_roundtrip() {
        let (handle, _task) =
            CollectorHandle::spawn(CollectorService::in_memory(&QueueConfig::default()));
        let (addr, shutdown_tx) = run(ServerConfig::new(0), handle)
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let channel = HttpChannel::new(format!("http://{addr}")).unwrap();
        assert!(channel.test_connection().await.unwrap());

        let bridge = DeliveryBridge::new(Arc::new(channel));
        for _ in 0..25 {
            bridge.enqueue(EventRecord::new(EventTag::Key)).await.unwrap();
        }
        let summary = bridge.flush_queue().await.unwrap();
        assert_eq!(summary.flushed, 25);
        assert_eq!(summary.sample.len(), 20);

        let _ = shutdown_tx.send(());
    }
}
