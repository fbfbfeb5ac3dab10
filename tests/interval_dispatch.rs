//! End to end with the default wiring: `MemoryStore` + `IntervalScheduler` on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use slotbus::{
    BackoffPolicy, ChannelEngine, Config, Delivery, DispatchMode, EventKind, ListenerFn,
    MemoryStore, PublishOptions,
};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

fn config(mode: DispatchMode) -> Config {
    Config {
        poll_interval: Duration::from_millis(10),
        idle_backoff: BackoffPolicy::constant(Duration::from_millis(50)),
        dispatch_mode: mode,
        ..Config::default()
    }
}

fn forwarder() -> (slotbus::ListenerRef, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let l = ListenerFn::arc("forward", move |d: &Delivery| {
        tx.send(d.message.clone())
            .map_err(|e| slotbus::ListenerError::new(e.to_string()))
    });
    (l, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("delivery within 5s")
        .expect("listener alive")
}

#[tokio::test(start_paused = true)]
async fn interval_scheduler_drains_in_order() {
    for mode in [DispatchMode::InLock, DispatchMode::AfterCommit] {
        let engine = ChannelEngine::builder(config(mode)).build();
        engine.publish("jobs", "buffered", PublishOptions::new()).await.unwrap();

        let (l, mut rx) = forwarder();
        engine.create_listener("jobs", 1u64, l).await.unwrap();
        for n in 0..3 {
            engine.publish("jobs", n, PublishOptions::new()).await.unwrap();
        }

        assert_eq!(next(&mut rx).await, json!("buffered"));
        for n in 0..3 {
            assert_eq!(next(&mut rx).await, json!(n));
        }
        engine.shutdown().await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn removed_listener_stops_receiving() {
    let engine = ChannelEngine::builder(config(DispatchMode::InLock)).build();
    let (l, mut rx) = forwarder();
    engine.create_listener("jobs", 1u64, l).await.unwrap();

    engine.publish("jobs", "first", PublishOptions::new()).await.unwrap();
    assert_eq!(next(&mut rx).await, json!("first"));

    assert!(engine.remove_listener("jobs", 1u64, false).await.unwrap());
    engine.publish("jobs", "second", PublishOptions::new()).await.unwrap();
    sleep(Duration::from_secs(2)).await;
    assert!(rx.try_recv().is_err());

    let state = engine.get_channel("jobs").await.unwrap();
    assert_eq!(state.worker(&1u64.into()).unwrap().queue.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn two_processes_each_get_every_message() {
    let store = Arc::new(MemoryStore::new());
    let a = ChannelEngine::builder(config(DispatchMode::InLock))
        .with_store(store.clone())
        .build();
    let b = ChannelEngine::builder(config(DispatchMode::InLock))
        .with_store(store.clone())
        .build();

    let (la, mut rx_a) = forwarder();
    let (lb, mut rx_b) = forwarder();
    a.create_listener("news", 1u64, la).await.unwrap();
    b.create_listener("news", 2u64, lb).await.unwrap();

    for n in 0..4 {
        a.publish("news", n, PublishOptions::new()).await.unwrap();
    }
    for n in 0..4 {
        assert_eq!(next(&mut rx_a).await, json!(n));
        assert_eq!(next(&mut rx_b).await, json!(n));
    }
}

#[tokio::test(start_paused = true)]
async fn failing_listener_keeps_polling() {
    let engine = ChannelEngine::builder(config(DispatchMode::InLock)).build();
    let mut events = engine.subscribe();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let l = ListenerFn::arc("flaky", move |d: &Delivery| {
        if d.message == json!("bad") {
            return Err("rejected".into());
        }
        tx.send(d.message.clone())
            .map_err(|e| slotbus::ListenerError::new(e.to_string()))
    });
    engine.create_listener("jobs", 1u64, l).await.unwrap();

    engine.publish("jobs", "bad", PublishOptions::new()).await.unwrap();
    engine.publish("jobs", "good", PublishOptions::new()).await.unwrap();
    assert_eq!(next(&mut rx).await, json!("good"));

    let mut saw_failure = false;
    let mut saw_tick_failed = false;
    while let Ok(ev) = events.try_recv() {
        saw_failure |= ev.kind == EventKind::ListenerFailed;
        saw_tick_failed |= ev.kind == EventKind::TickFailed;
    }
    assert!(saw_failure);
    assert!(saw_tick_failed);
}
