//! Integration tests for the reconnecting client, run against an in-process
//! fake broker.

use bemfa_bridge::core::client::{BrokerClient, SessionConfig};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn test_config(port: u16, backoff: Duration, keepalive: Duration) -> SessionConfig {
    SessionConfig {
        host: "127.0.0.1".to_string(),
        port,
        api_key: "key123".to_string(),
        topic: "pc42".to_string(),
        keepalive_interval: keepalive,
        reconnect_backoff: backoff,
    }
}

/// Accepts one connection and returns its line reader and write half.
async fn accept_session(
    listener: &TcpListener,
) -> (
    tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    tokio::net::tcp::OwnedWriteHalf,
) {
    let (stream, _) = listener.accept().await.unwrap();
    let (read, write) = stream.into_split();
    (BufReader::new(read).lines(), write)
}

async fn next_line(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
) -> String {
    timeout(TEST_TIMEOUT, lines.next_line())
        .await
        .expect("timed out waiting for a line")
        .unwrap()
        .expect("peer closed unexpectedly")
}

#[tokio::test]
async fn test_handshake_then_commands_with_ping_acks_filtered() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut lines, mut write) = accept_session(&listener).await;
        assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");

        // A ping ack must be swallowed by the session, the command yielded.
        write.write_all(b"cmd=0&other=1\r\n").await.unwrap();
        write.write_all(b"cmd=2&msg=on\r\n").await.unwrap();
        write.write_all(b"cmd=2&msg=off\r\n").await.unwrap();

        // Hold the connection open long enough for the client to drain it.
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let client = BrokerClient::new(test_config(
        port,
        Duration::from_secs(60),
        Duration::from_secs(60),
    ));
    let mut records = client.connect();

    let first = timeout(TEST_TIMEOUT, records.next()).await.unwrap().unwrap();
    assert_eq!(first.first("msg"), Some("on"));
    let second = timeout(TEST_TIMEOUT, records.next()).await.unwrap().unwrap();
    assert_eq!(second.first("msg"), Some("off"));

    server.await.unwrap();
}

#[tokio::test]
async fn test_reconnects_after_drops_and_never_gives_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let backoff = Duration::from_millis(100);

    let server = tokio::spawn(async move {
        let mut accept_times = Vec::new();

        // Three sessions that die right after the handshake.
        for _ in 0..3 {
            let (mut lines, write) = accept_session(&listener).await;
            accept_times.push(Instant::now());
            assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");
            drop(write);
        }

        // The fourth attempt finally gets a command through.
        let (mut lines, mut write) = accept_session(&listener).await;
        accept_times.push(Instant::now());
        assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");
        write.write_all(b"cmd=2&msg=on\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        accept_times
    });

    let client = BrokerClient::new(test_config(port, backoff, Duration::from_secs(60)));
    let mut records = client.connect();

    let record = timeout(TEST_TIMEOUT, records.next()).await.unwrap().unwrap();
    assert_eq!(record.first("msg"), Some("on"));

    let accept_times = server.await.unwrap();
    assert_eq!(accept_times.len(), 4);
    // Every retry waited at least (roughly) the configured backoff.
    for pair in accept_times.windows(2) {
        assert!(
            pair[1] - pair[0] >= backoff.mul_f32(0.8),
            "reconnect happened faster than the backoff"
        );
    }
}

#[tokio::test]
async fn test_garbage_line_fails_session_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        // First session: send an unparseable line and keep the socket open.
        // The client must tear the session down on its own.
        let (mut lines, mut write) = accept_session(&listener).await;
        assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");
        write.write_all(b"garbage===\r\n").await.unwrap();

        // Second session proves the client recovered.
        let (mut lines, mut write2) = accept_session(&listener).await;
        assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");
        write2.write_all(b"cmd=2&msg=on\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(write);
    });

    let client = BrokerClient::new(test_config(
        port,
        Duration::from_millis(50),
        Duration::from_secs(60),
    ));
    let mut records = client.connect();

    // Nothing from the garbage line ever reaches the consumer; the first
    // record is the one sent on the second connection.
    let record = timeout(TEST_TIMEOUT, records.next()).await.unwrap().unwrap();
    assert_eq!(record.first("msg"), Some("on"));

    server.await.unwrap();
}

#[tokio::test]
async fn test_keepalive_pings_arrive_on_the_wire() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let client = BrokerClient::new(test_config(
        port,
        Duration::from_secs(60),
        Duration::from_millis(50),
    ));
    let records = client.connect();

    let (mut lines, _write) = accept_session(&listener).await;
    assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");
    for _ in 0..3 {
        assert_eq!(next_line(&mut lines).await, "ping");
    }

    drop(records);
}

#[tokio::test]
async fn test_no_heartbeat_leaks_into_the_next_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let client = BrokerClient::new(test_config(
        port,
        Duration::from_millis(100),
        Duration::from_millis(25),
    ));
    let records = client.connect();

    // Kill the first session immediately after its handshake.
    let (mut lines, write) = accept_session(&listener).await;
    assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");
    drop(write);
    drop(lines);

    // The first thing on the next connection must be a fresh handshake, not
    // a heartbeat left over from the previous session.
    let (mut lines, _write) = accept_session(&listener).await;
    assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");

    drop(records);
}

// Dropping the record stream must make the whole client wind down instead of
// reconnecting forever against a consumer that is gone.
#[tokio::test]
async fn test_dropping_the_stream_stops_the_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let client = BrokerClient::new(test_config(
        port,
        Duration::from_millis(10),
        Duration::from_secs(60),
    ));
    let records = client.connect();

    let (mut lines, mut write) = accept_session(&listener).await;
    assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");

    drop(records);

    // Feed records until the session notices the consumer is gone and the
    // connection is torn down (observed as EOF on our side).
    let eof = timeout(TEST_TIMEOUT, async {
        loop {
            if write.write_all(b"cmd=2&msg=on\r\n").await.is_err() {
                break;
            }
            match lines.next_line().await {
                Ok(None) | Err(_) => break,
                Ok(Some(_)) => {}
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(eof.is_ok(), "client kept the connection alive after the stream was dropped");

    // No new session should be opened for a dead consumer.
    let second = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(second.is_err(), "client reconnected despite having no consumer");
}

// The port is grabbed and released so nothing is listening when the client
// first connects; the refused attempt must be retried like any other
// transient failure.
#[tokio::test]
async fn test_connection_refused_is_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BrokerClient::new(test_config(
        addr.port(),
        Duration::from_millis(100),
        Duration::from_secs(60),
    ));
    let mut records = client.connect();

    // Give the client time to fail at least once, then start listening.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let listener = TcpListener::bind(addr).await.unwrap();

    let server = tokio::spawn(async move {
        let (mut lines, mut write) = accept_session(&listener).await;
        assert_eq!(next_line(&mut lines).await, "cmd=1&uid=key123&topic=pc42");
        write.write_all(b"cmd=2&msg=off\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let record = timeout(TEST_TIMEOUT, records.next()).await.unwrap().unwrap();
    assert_eq!(record.first("msg"), Some("off"));
    server.await.unwrap();
}
