//! Monitor client tests
//!
//! Runs the client against an in-process fake monitor that speaks the
//! `EndOfMessage` framed protocol.

use genmon_exporter::config::MonitorConfig;
use genmon_exporter::error::ExporterError;
use genmon_exporter::monitor::{ConnectionManager, MonitorClient};
use genmon_exporter::status::StatusNode;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

/// What the fake monitor does with one command
enum Reply {
    /// Write these chunks, pausing briefly between them
    Chunks(Vec<Vec<u8>>),
    /// Close the connection without answering
    Hangup,
}

fn framed(body: &str) -> Reply {
    Reply::Chunks(vec![format!("{}EndOfMessage", body).into_bytes()])
}

/// Start a fake monitor. `handler` receives the connection number (from 1)
/// and the command text. Returns the listening address and a connection counter.
async fn spawn_monitor<F>(handler: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(usize, &str) -> Reply + Send + Sync + 'static,
{
    spawn_monitor_with_banner(Some(b"OK".as_slice()), handler).await
}

/// Like [`spawn_monitor`], writing `banner` (if any) on every new connection.
async fn spawn_monitor_with_banner<F>(
    banner: Option<&'static [u8]>,
    handler: F,
) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(usize, &str) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(handler);

    let counter = connections.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let connection = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Some(banner) = banner {
                    if socket.write_all(banner).await.is_err() {
                        return;
                    }
                }
                let mut buf = vec![0u8; 4096];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    let command = String::from_utf8_lossy(&buf[..n]).to_string();
                    match handler.as_ref()(connection, &command) {
                        Reply::Chunks(chunks) => {
                            for chunk in chunks {
                                if socket.write_all(&chunk).await.is_err() {
                                    return;
                                }
                                tokio::time::sleep(Duration::from_millis(5)).await;
                            }
                        }
                        Reply::Hangup => return,
                    }
                }
            });
        }
    });

    (addr, connections)
}

fn monitor_config(addr: SocketAddr) -> MonitorConfig {
    MonitorConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_retries: 3,
        retry_delay_ms: 10,
        io_timeout_seconds: 2,
    }
}

/// An address nothing listens on.
async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_send_command_strips_terminator() {
    // Given: A monitor answering "{}" followed by the terminator
    let (addr, _) = spawn_monitor(|_, _| framed("{}")).await;
    let client = MonitorClient::new(monitor_config(addr));
    client.connect().await.unwrap();

    // When: Sending the status command
    let response = client.send_command("generator: status_json").await.unwrap();

    // Then: Exactly the body is returned
    assert_eq!(response, "{}");
}

#[tokio::test]
async fn test_response_split_across_reads() {
    // Given: A monitor that splits the response, terminator included, over three writes
    let (addr, _) = spawn_monitor(|_, _| {
        Reply::Chunks(vec![
            b"{\"Status\": ".to_vec(),
            b"{\"Engine\": {}}}End".to_vec(),
            b"OfMessage".to_vec(),
        ])
    })
    .await;
    let client = MonitorClient::new(monitor_config(addr));

    // When: Sending a command without connecting first
    let response = client.send_command("generator: status_json").await.unwrap();

    // Then: The chunks are reassembled and the connection was opened lazily
    assert_eq!(response, "{\"Status\": {\"Engine\": {}}}");
}

#[tokio::test]
async fn test_bytes_after_terminator_are_discarded() {
    // Given: A monitor that writes trailing garbage after the terminator
    let (addr, _) = spawn_monitor(|_, _| {
        Reply::Chunks(vec![b"hello worldEndOfMessagetrailing".to_vec()])
    })
    .await;
    let client = MonitorClient::new(monitor_config(addr));

    // When: Sending a command
    let response = client.send_command("generator: version").await.unwrap();

    // Then: Only the bytes before the terminator are returned
    assert_eq!(response, "hello world");
}

#[tokio::test]
async fn test_dropped_connection_reconnects_and_reports_error() {
    // Given: A monitor that hangs up on the first connection's first command
    let (addr, connections) = spawn_monitor(|connection, _| {
        if connection == 1 {
            Reply::Hangup
        } else {
            framed("recovered")
        }
    })
    .await;
    let client = MonitorClient::new(monitor_config(addr));
    client.connect().await.unwrap();

    // When: The first command hits the dropped connection
    let first = client.send_command("generator: status_json").await;

    // Then: That call fails but a new connection is already open
    assert!(matches!(first, Err(ExporterError::Connection(_))));
    assert_eq!(connections.load(Ordering::SeqCst), 2);

    // And: The next call succeeds on the new connection
    let second = client.send_command("generator: status_json").await.unwrap();
    assert_eq!(second, "recovered");
}

#[tokio::test]
async fn test_connect_gives_up_after_retry_budget() {
    // Given: No monitor listening and a budget of two attempts
    let addr = closed_port().await;
    let config = MonitorConfig {
        connect_retries: 2,
        ..monitor_config(addr)
    };
    let client = MonitorClient::new(config);

    // When: Connecting
    let result = client.connect().await;

    // Then: A fatal retry-exhaustion error names the address and attempt count
    match result {
        Err(e @ ExporterError::ConnectRetriesExhausted { .. }) => {
            assert!(e.is_fatal());
            let message = e.to_string();
            assert!(message.contains(&addr.to_string()));
            assert!(message.contains("2 attempts"));
        }
        other => panic!("expected ConnectRetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_command_is_rejected_without_io() {
    // Given: A client whose monitor is unreachable
    let addr = closed_port().await;
    let client = MonitorClient::new(monitor_config(addr));

    // When: Sending an empty command
    let result = client.send_command("").await;

    // Then: The command is rejected before any connect attempt
    assert!(matches!(result, Err(ExporterError::InvalidCommand(_))));
}

#[tokio::test]
async fn test_banner_in_reply_keeps_connection() {
    // Given: A monitor that answers a command with a startup banner
    let (addr, connections) = spawn_monitor(|_, command| {
        if command == "generator: status_json" {
            Reply::Chunks(vec![b"WARNING: controller not detected".to_vec()])
        } else {
            framed("fine")
        }
    })
    .await;
    let manager = ConnectionManager::new(Arc::new(monitor_config(addr)));
    manager.connect().await.unwrap();

    // When: The banner arrives instead of a response
    let result = manager.send_command("generator: status_json").await;

    // Then: The call reports it and the same connection stays usable
    match result {
        Err(ExporterError::StartupBanner(text)) => {
            assert_eq!(text, "WARNING: controller not detected")
        }
        other => panic!("expected StartupBanner, got {:?}", other),
    }
    assert!(manager.is_connected().await);
    assert_eq!(manager.send_command("generator: other").await.unwrap(), "fine");
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_commands_are_serialized() {
    // Given: A monitor that echoes each command back
    let (addr, _) = spawn_monitor(|_, command| framed(&format!("echo:{}", command))).await;
    let client = Arc::new(MonitorClient::new(monitor_config(addr)));
    client.connect().await.unwrap();

    // When: Several tasks send different commands at once
    let mut tasks = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let command = format!("generator: cmd{}", i);
            let response = client.send_command(&command).await.unwrap();
            (command, response)
        }));
    }

    // Then: Every caller receives the response to its own command
    for task in tasks {
        let (command, response) = task.await.unwrap();
        assert_eq!(response, format!("echo:{}", command));
    }
}

#[tokio::test]
async fn test_fetch_status_document_merges_sections() {
    // Given: A monitor serving the four documents
    let (addr, _) = spawn_monitor(|_, command| match command {
        "generator: status_json" => {
            framed(r#"{"Status": {"Engine": {"Battery Voltage": "12.6V"}}}"#)
        }
        "generator: maint_json" => framed(r#"{"Maintenance": {"Model": "22KW"}}"#),
        "generator: outage_json" => framed(r#"{"Outage": {"System In Outage": "No"}}"#),
        "generator: monitor_json" => framed(r#"{"Monitor": {"Version": "1.19"}}"#),
        _ => framed("{}"),
    })
    .await;
    let client = MonitorClient::new(monitor_config(addr));

    // When: Fetching the merged document
    let document = client.fetch_status_document(false).await.unwrap();

    // Then: The sections appear in poll order under their own keys
    let StatusNode::Object(sections) = document else {
        panic!("expected an object");
    };
    let keys: Vec<&str> = sections.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, ["Status", "Maintenance", "Outage", "Monitor"]);
}

#[tokio::test]
async fn test_document_without_its_section_is_an_error() {
    // Given: A monitor whose status reply lacks the "Status" key
    let (addr, _) = spawn_monitor(|_, _| framed(r#"{"Something": {}}"#)).await;
    let client = MonitorClient::new(monitor_config(addr));

    // When: Fetching the merged document
    let result = client.fetch_status_document(false).await;

    // Then: The fetch fails with a framing error
    assert!(matches!(result, Err(ExporterError::Framing(_))));
}

#[tokio::test]
async fn test_query_start_info() {
    // Given: A monitor answering the start info command
    let (addr, _) = spawn_monitor(|_, command| {
        if command == "generator: start_info_json" {
            framed(r#"{"Controller": "Generac Evolution 2.0, Liquid Cooled", "fueltype": "Natural Gas"}"#)
        } else {
            framed("{}")
        }
    })
    .await;
    let client = MonitorClient::new(monitor_config(addr));

    // When: Querying start info
    let info = client.query_start_info().await.unwrap();

    // Then: The controller name and optional fields are decoded
    assert_eq!(info.controller, "Generac Evolution 2.0, Liquid Cooled");
    assert_eq!(info.fueltype.as_deref(), Some("Natural Gas"));
    assert!(info.model.is_none());
}

#[tokio::test]
async fn test_command_after_close_opens_new_connection() {
    // Given: A connected client
    let (addr, connections) = spawn_monitor(|connection, _| framed(&connection.to_string())).await;
    let client = MonitorClient::new(monitor_config(addr));
    client.connect().await.unwrap();

    // When: Closing it and sending another command
    client.close().await;
    let response = client.send_command("generator: status_json").await.unwrap();

    // Then: The command went over a second connection
    assert_eq!(response, "2");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_monitor_without_banner_is_usable() {
    // Given: A monitor that never writes a startup banner
    let (addr, connections) = spawn_monitor_with_banner(None, |_, _| framed("{}")).await;
    let config = MonitorConfig {
        connect_retries: 2,
        io_timeout_seconds: 1,
        ..monitor_config(addr)
    };
    let client = MonitorClient::new(config);

    // When: Connecting and sending a command
    client.connect().await.unwrap();
    let response = client.send_command("generator: status_json").await;

    // Then: The first connection is kept and the command is answered
    assert_eq!(response.unwrap(), "{}");
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_banner_mid_response_replaces_partial_data() {
    // Given: A monitor that restarts halfway through a response
    let (addr, _) = spawn_monitor(|_, _| {
        Reply::Chunks(vec![
            b"{\"Status\": {\"Engine\": ".to_vec(),
            b"WARNING: controller reset".to_vec(),
        ])
    })
    .await;
    let manager = ConnectionManager::new(Arc::new(monitor_config(addr)));
    manager.connect().await.unwrap();

    // When: Sending a command
    let started = Instant::now();
    let result = manager.send_command("generator: status_json").await;

    // Then: The banner is reported on its own without waiting for a terminator
    match result {
        Err(ExporterError::StartupBanner(text)) => assert_eq!(text, "WARNING: controller reset"),
        other => panic!("expected StartupBanner, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(manager.is_connected().await);
}
