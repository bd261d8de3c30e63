//! Tests for the subscriber registry

use super::*;
use crate::error::RegistryError;
use crate::testing::MemorySink;
use std::sync::Arc;
use std::time::Duration;

/// Writes a fixed message, evicting sinks whose write fails
struct WriteAll(&'static str);

#[async_trait]
impl Visitor for WriteAll {
    async fn visit(&self, _id: &SubscriberId, sink: &mut dyn Sink) -> Visit {
        match sink.write(self.0.as_bytes()).await {
            Ok(()) => Visit::Keep,
            Err(_) => Visit::Evict,
        }
    }
}

fn id(n: u16) -> SubscriberId {
    SubscriberId::connection(
        "127.0.0.1:7070".parse().unwrap(),
        format!("127.0.0.1:{}", 40000 + n).parse().unwrap(),
    )
}

#[tokio::test]
async fn test_add_and_remove() {
    let registry = RegistryHandle::spawn();
    let sink = MemorySink::new();

    assert!(!registry.add(id(1), sink.clone()).await.unwrap());
    assert_eq!(registry.len().await.unwrap(), 1);
    assert_eq!(registry.ids().await.unwrap(), vec![id(1)]);

    assert!(registry.remove(&id(1)).await.unwrap());
    assert!(sink.is_closed());
    assert!(registry.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let registry = RegistryHandle::spawn();
    let sink = MemorySink::new();
    registry.add(id(1), sink.clone()).await.unwrap();

    assert!(registry.remove(&id(1)).await.unwrap());
    assert!(!registry.remove(&id(1)).await.unwrap());
    assert!(!registry.remove(&id(2)).await.unwrap());
    assert_eq!(sink.close_calls(), 1);
}

#[tokio::test]
async fn test_duplicate_id_replaces_stale_sink() {
    let registry = RegistryHandle::spawn();
    let stale = MemorySink::new();
    let fresh = MemorySink::new();

    registry.add(id(1), stale.clone()).await.unwrap();
    assert!(registry.add(id(1), fresh.clone()).await.unwrap());
    assert_eq!(registry.len().await.unwrap(), 1);
    assert!(stale.is_closed());

    registry
        .for_each(Arc::new(WriteAll("hello\n")))
        .await
        .unwrap();
    assert!(stale.lines().is_empty());
    assert_eq!(fresh.lines(), vec!["hello\n"]);
}

#[tokio::test]
async fn test_for_each_evicts_failed_sinks() {
    let registry = RegistryHandle::spawn();
    let good = MemorySink::new();
    let bad = MemorySink::failing();
    let other = MemorySink::new();

    registry.add(id(1), good.clone()).await.unwrap();
    registry.add(id(2), bad.clone()).await.unwrap();
    registry.add(id(3), other.clone()).await.unwrap();

    let summary = registry
        .for_each(Arc::new(WriteAll("Door changed state to on\n")))
        .await
        .unwrap();

    assert_eq!(summary.visited, 3);
    assert_eq!(summary.evicted, vec![id(2)]);
    assert_eq!(good.lines(), vec!["Door changed state to on\n"]);
    assert_eq!(other.lines(), vec!["Door changed state to on\n"]);
    assert!(bad.is_closed());

    let mut ids = registry.ids().await.unwrap();
    ids.sort_by_key(|i| i.to_string());
    assert_eq!(ids, vec![id(1), id(3)]);
}

#[tokio::test]
async fn test_close_error_is_not_propagated() {
    let registry = RegistryHandle::spawn();
    let sink = MemorySink::failing();
    sink.set_fail_close(true);
    registry.add(id(1), sink.clone()).await.unwrap();

    let summary = registry.for_each(Arc::new(WriteAll("x\n"))).await.unwrap();
    assert_eq!(summary.evicted.len(), 1);
    assert!(registry.is_empty().await.unwrap());
    assert_eq!(sink.close_calls(), 1);
}

#[tokio::test]
async fn test_close_all_keeps_actor_running() {
    let registry = RegistryHandle::spawn();
    let a = MemorySink::new();
    let b = MemorySink::new();
    registry.add(id(1), a.clone()).await.unwrap();
    registry.add(SubscriberId::local("log"), b.clone()).await.unwrap();

    assert_eq!(registry.close_all().await.unwrap(), 2);
    assert!(a.is_closed() && b.is_closed());
    assert!(registry.is_empty().await.unwrap());
    assert!(registry.is_alive());
}

#[tokio::test]
async fn test_shutdown_closes_sinks_and_rejects_calls() {
    let registry = RegistryHandle::spawn();
    let sink = MemorySink::new();
    registry.add(id(1), sink.clone()).await.unwrap();

    registry.shutdown();
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.is_alive() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry did not stop");

    assert!(sink.is_closed());
    assert_eq!(registry.len().await, Err(RegistryError::Closed));
    assert_eq!(
        registry.add(id(2), MemorySink::new()).await,
        Err(RegistryError::Closed)
    );
}

#[tokio::test]
async fn test_concurrent_adds_during_broadcasts() {
    let registry = RegistryHandle::spawn();

    let broadcaster = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                registry
                    .for_each(Arc::new(WriteAll("tick\n")))
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut adders = Vec::new();
    for n in 0..40u16 {
        let registry = registry.clone();
        adders.push(tokio::spawn(async move {
            let sink = MemorySink::new();
            registry.add(id(n), sink.clone()).await.unwrap();
            sink
        }));
    }

    let mut sinks = Vec::new();
    for adder in adders {
        sinks.push(adder.await.unwrap());
    }
    broadcaster.await.unwrap();

    assert_eq!(registry.len().await.unwrap(), 40);
    for sink in &sinks {
        assert!(!sink.is_closed());
        assert!(!sink.wrote_after_close());
    }
}

#[tokio::test]
async fn test_concurrent_removes_never_write_closed_sinks() {
    let registry = RegistryHandle::spawn();
    let mut sinks = Vec::new();
    for n in 0..20u16 {
        let sink = MemorySink::new();
        registry.add(id(n), sink.clone()).await.unwrap();
        sinks.push(sink);
    }

    let broadcaster = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                registry
                    .for_each(Arc::new(WriteAll("tick\n")))
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut removers = Vec::new();
    for n in (0..20u16).step_by(2) {
        let registry = registry.clone();
        removers.push(tokio::spawn(async move {
            registry.remove(&id(n)).await.unwrap()
        }));
    }
    for remover in removers {
        assert!(remover.await.unwrap());
    }
    broadcaster.await.unwrap();

    assert_eq!(registry.len().await.unwrap(), 10);
    for (n, sink) in sinks.iter().enumerate() {
        assert!(!sink.wrote_after_close());
        assert_eq!(sink.is_closed(), n % 2 == 0);
    }
}
