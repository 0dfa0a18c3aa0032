mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Map};

use pinpool::{
    Broadcaster, CommandRouter, Dispatcher, NotificationSink, NotifyConfig, PoolControl, Threads,
};

use common::{test_config, EngineFactory};

#[derive(Default)]
struct MockControl {
    paused: AtomicBool,
}

#[async_trait]
impl PoolControl for MockControl {
    async fn pause(&self) -> bool {
        !self.paused.swap(true, Ordering::SeqCst)
    }

    async fn resume(&self) -> bool {
        self.paused.swap(false, Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

fn router() -> (CommandRouter, Arc<MockControl>, flume::Receiver<serde_json::Value>) {
    let control = Arc::new(MockControl::default());
    let (tx, rx) = flume::unbounded();
    (CommandRouter::new(control.clone(), tx), control, rx)
}

#[tokio::test]
async fn test_router_applies_pause_and_resume() {
    let (router, control, passthrough) = router();

    assert!(router.handle(r#"{"command": "pause"}"#).await.is_none());
    assert!(control.is_paused());

    assert!(router.handle(r#"{"command": "resume"}"#).await.is_none());
    assert!(!control.is_paused());

    // Control commands are consumed, not forwarded
    assert!(passthrough.try_recv().is_err());
}

#[tokio::test]
async fn test_router_forwards_other_messages_unmodified() {
    let (router, control, passthrough) = router();

    assert!(router.handle(r#"{"action": "foo", "value": 1}"#).await.is_none());
    assert!(router.handle(r#"{"command": "restart"}"#).await.is_none());

    assert_eq!(passthrough.try_recv().unwrap(), json!({ "action": "foo", "value": 1 }));
    assert_eq!(passthrough.try_recv().unwrap(), json!({ "command": "restart" }));
    assert!(!control.is_paused());
}

#[tokio::test]
async fn test_router_rejects_invalid_json() {
    let (router, _, passthrough) = router();

    let reply = router.handle("{not json").await.unwrap();

    assert_eq!(reply.status(), 400);
    assert_eq!(reply.message_text(), Some("Invalid JSON"));
    assert_eq!(reply.to_json(), r#"{"status":400,"message":"Invalid JSON","state":null}"#);
    assert!(passthrough.try_recv().is_err());
}

#[tokio::test]
async fn test_router_survives_a_missing_consumer() {
    let (router, _, passthrough) = router();
    drop(passthrough);

    assert!(router.handle(r#"{"action": "foo"}"#).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_router_controls_a_real_pool() {
    pinpool::logging::init_test();
    let pool = Arc::new(Dispatcher::new(test_config(2), EngineFactory::new()).unwrap());
    let (tx, _rx) = flume::unbounded();
    let router = CommandRouter::new(pool.clone(), tx);

    router.handle(r#"{"command": "pause"}"#).await;
    assert!(pool.is_paused());
    router.handle(r#"{"command": "resume"}"#).await;
    assert!(!pool.is_paused());
}

#[test]
fn test_task_reports_are_broadcast() {
    pinpool::logging::init_test();
    let broadcaster = Arc::new(Broadcaster::new(&NotifyConfig::default()).unwrap());
    let sink: Arc<dyn NotificationSink> = broadcaster.clone();
    let pool = Dispatcher::with_sink(test_config(2), EngineFactory::new(), sink).unwrap();
    let mut subscription = broadcaster.subscribe();

    let reports = pool
        .submit_blocking(Threads::All, |ctx, _| {
            if ctx.worker == 1 {
                Err(anyhow!("diverged"))
            } else {
                Ok(())
            }
        })
        .unwrap();
    let call_id = reports[0].task.call_id;

    assert!(subscription.try_recv().unwrap().state_value().is_some());

    let mut received = vec![subscription.try_recv().unwrap(), subscription.try_recv().unwrap()];
    received.sort_by_key(|n| n.status());

    assert_eq!(received[0].status(), 200);
    assert_eq!(
        received[0].message_text(),
        Some(format!("Worker 0 completed task {}", call_id).as_str())
    );
    assert_eq!(received[1].status(), 500);
    assert_eq!(
        received[1].message_text(),
        Some(format!("Worker 1 failed task {}: Task returned an error: diverged", call_id).as_str())
    );
    assert!(subscription.try_recv().is_none());
}

#[tokio::test]
async fn test_new_subscribers_start_from_the_current_state() {
    let mut seed = Map::new();
    seed.insert("case".to_string(), json!("ieee14"));
    let broadcaster = Broadcaster::with_state(&NotifyConfig::default(), seed).unwrap();

    let mut early = broadcaster.subscribe();
    broadcaster.notify(pinpool::Notification::state(200, json!({ "paused": true })).unwrap());
    let mut late = broadcaster.subscribe();

    assert_eq!(early.recv().await.unwrap().state_value(), Some(&json!({ "case": "ieee14" })));
    assert_eq!(early.recv().await.unwrap().state_value(), Some(&json!({ "paused": true })));

    let snapshot = late.recv().await.unwrap();
    assert_eq!(snapshot.status(), 200);
    assert_eq!(snapshot.state_value(), Some(&json!({ "case": "ieee14", "paused": true })));
    assert!(late.try_recv().is_none());
    assert_eq!(broadcaster.subscriber_count(), 2);
}
