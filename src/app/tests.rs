//! End-to-end tests: scripted lines in, loopback TCP out

use super::*;
use crate::config::Settings;
use crate::lines::{LineId, ScriptedLines, SysfsLines};
use crate::names::NameTables;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

fn door_window(listen: Option<SocketAddr>) -> Settings {
    let mut settings = Settings::new(NameTables::new().with_line(5, "Door").with_line(6, "Window"));
    settings.sampler.interval = Duration::from_millis(5);
    settings.listen = listen;
    settings.log_changes = listen.is_none();
    settings
}

async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

async fn wait_for_subscribers(monitor: &Monitor, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while monitor.registry().len().await.unwrap() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscriber never registered");
}

#[tokio::test]
async fn test_change_reaches_tcp_subscriber() {
    let lines = Arc::new(ScriptedLines::new().with_line(5, false).with_line(6, false));
    let settings = door_window(Some("127.0.0.1:0".parse().unwrap()));

    let monitor = Monitor::start(&settings, lines.clone()).await.unwrap();
    let addr = monitor.local_addr().expect("listener bound");

    let client = TcpStream::connect(addr).await.unwrap();
    let mut client = BufReader::new(client);
    wait_for_subscribers(&monitor, 1).await;

    // The first sweep only establishes the baseline
    wait_until("baseline sweep", || lines.reads(5) >= 1).await;
    lines.set(5, true);

    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), client.read_line(&mut line))
        .await
        .expect("no notification received")
        .unwrap();
    assert_eq!(line, "Door changed state to on\n");

    // Line 6 never changed; nothing else arrives
    let mut extra = String::new();
    assert!(
        tokio::time::timeout(Duration::from_millis(100), client.read_line(&mut extra))
            .await
            .is_err(),
        "unexpected notification: {:?}",
        extra
    );

    let stats = monitor.stop().await.unwrap();
    assert_eq!(stats.broadcast, 1);
    assert_eq!(stats.sampler.changes, 1);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.closed, 1);

    // Sinks are closed at shutdown
    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut rest))
        .await
        .expect("connection not closed")
        .unwrap();
    assert_eq!(read, 0);
}

#[tokio::test]
async fn test_every_subscriber_gets_every_change() {
    let lines = Arc::new(ScriptedLines::new().with_line(5, false).with_line(6, false));
    let settings = door_window(Some("127.0.0.1:0".parse().unwrap()));

    let monitor = Monitor::start(&settings, lines.clone()).await.unwrap();
    let addr = monitor.local_addr().unwrap();

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(BufReader::new(TcpStream::connect(addr).await.unwrap()));
    }
    wait_for_subscribers(&monitor, 3).await;
    wait_until("baseline sweep", || lines.reads(6) >= 1).await;

    lines.set(6, true);
    for client in &mut clients {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), client.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "Window changed state to on\n");
    }

    // A client that hangs up is evicted once writes to it fail; the rest
    // keep receiving every change
    drop(clients.pop());

    let mut level = true;
    let mut sent = 1;
    while monitor.registry().len().await.unwrap() > 2 {
        assert!(sent < 10, "closed client was never evicted");
        level = !level;
        lines.set(6, level);
        sent += 1;

        let expected = format!("Window changed state to {}\n", if level { "on" } else { "off" });
        for client in &mut clients {
            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(2), client.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(line, expected);
        }
    }

    let stats = monitor.stop().await.unwrap();
    assert_eq!(stats.broadcast, sent);
    assert_eq!(stats.closed, 2);
}

#[tokio::test]
async fn test_half_closed_subscriber_still_receives() {
    let lines = Arc::new(ScriptedLines::new().with_line(5, false).with_line(6, false));
    let settings = door_window(Some("127.0.0.1:0".parse().unwrap()));

    let monitor = Monitor::start(&settings, lines.clone()).await.unwrap();
    let addr = monitor.local_addr().unwrap();

    // Listen-only client: sends nothing and closes its write side
    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_for_subscribers(&monitor, 1).await;
    client.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(monitor.registry().len().await.unwrap(), 1);

    wait_until("baseline sweep", || lines.reads(5) >= 1).await;
    lines.set(5, true);

    let mut client = BufReader::new(client);
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), client.read_line(&mut line))
        .await
        .expect("no notification received")
        .unwrap();
    assert_eq!(line, "Door changed state to on\n");

    let stats = monitor.stop().await.unwrap();
    assert_eq!(stats.closed, 1);
}

#[tokio::test]
async fn test_log_only_mode() {
    let lines = Arc::new(ScriptedLines::new().with_line(5, false).with_line(6, false));
    let settings = door_window(None);

    let monitor = Monitor::start(&settings, lines.clone()).await.unwrap();
    assert_eq!(monitor.local_addr(), None);
    assert_eq!(
        monitor.registry().ids().await.unwrap(),
        vec![SubscriberId::local("log")]
    );

    wait_until("baseline sweep", || lines.reads(5) >= 1).await;
    lines.set(5, true);
    // Two more reads: the change was seen and its sweep has forwarded it
    let seen = lines.reads(5);
    wait_until("sweeps after change", || lines.reads(5) >= seen + 2).await;

    let stats = monitor.stop().await.unwrap();
    assert_eq!(stats.broadcast, 1);
    assert_eq!(stats.accepted, 0);
}

#[tokio::test]
async fn test_shutdown_future_stops_monitor() {
    let lines = Arc::new(ScriptedLines::new().with_line(5, false));
    let settings = door_window(None);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn({
        let settings = settings.clone();
        let lines: Arc<dyn LineReader> = lines.clone();
        async move {
            run(&settings, lines, async {
                let _ = stop_rx.await;
            })
            .await
        }
    });

    wait_until("sampling", || lines.reads(5) >= 2).await;
    stop_tx.send(()).unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();
    assert!(stats.sampler.sweeps >= 2);
    assert_eq!(stats.broadcast, 0);
}

#[tokio::test]
async fn test_line_configuration_failure_is_fatal() {
    let lines = Arc::new(SysfsLines::new("/nonexistent/linewatch/gpio"));
    let settings = door_window(None);

    let err = Monitor::start(&settings, lines).await.err().expect("start should fail");
    assert!(err.to_string().contains("Failed to configure input lines"));
}

#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let lines = Arc::new(ScriptedLines::new().with_line(5, false));
    let settings = door_window(Some(taken.local_addr().unwrap()));

    let err = Monitor::start(&settings, lines).await.err().expect("start should fail");
    assert!(err.to_string().contains("Failed to bind"));
}

#[test]
fn test_sampled_lines_come_from_names() {
    let lines = Arc::new(ScriptedLines::new().with_line(5, false).with_line(9, false));
    let settings = door_window(None);

    let sampler =
        Sampler::configure(lines.clone(), settings.names.line_ids(), settings.sampler).unwrap();
    assert_eq!(sampler.lines(), &[LineId(5), LineId(6)]);

    // A line the backend knows about but no name refers to is left alone
    assert!(lines.is_input(5) && lines.is_input(6));
    assert!(!lines.is_input(9));
}
