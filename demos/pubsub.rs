//! # Example: pubsub
//!
//! Two simulated worker processes sharing one store. Each attaches a listener to `news`;
//! a publisher task sends a message every 200ms and every worker receives each one.
//! Engine events are written through `tracing` by [`LogWriter`].
//!
//! ## Flow
//! ```text
//! publisher ──► engine_a.publish("news", n)
//!                 └─► slot "1" queue, slot "2" queue
//! IntervalScheduler (per process)
//!   ├─► dispatcher(worker 1) ─► print
//!   └─► dispatcher(worker 2) ─► print
//! Ctrl+C / 3s ─► shutdown_with_grace()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example pubsub --features logging
//! ```

use std::{sync::Arc, time::Duration};

use slotbus::{
    ChannelEngine, Config, Delivery, ListenerFn, LogWriter, MemoryStore, PublishOptions, Subscribe,
};

fn worker(store: &Arc<MemoryStore>) -> Arc<ChannelEngine> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    ChannelEngine::builder(Config::default())
        .with_store(store.clone())
        .with_subscribers(subs)
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let store = Arc::new(MemoryStore::new());
    let a = worker(&store);
    let b = worker(&store);

    for (engine, id) in [(&a, 1u64), (&b, 2u64)] {
        let listener = ListenerFn::arc("print", |d: &Delivery| {
            println!("[worker {}] {} -> {}", d.worker, d.channel, d.message);
            Ok(())
        });
        engine.create_listener("news", id, listener).await?;
    }

    let publisher = Arc::clone(&a);
    let producer = tokio::spawn(async move {
        for n in 0u32.. {
            let msg = serde_json::json!({ "seq": n, "text": format!("headline {n}") });
            if publisher.publish("news", msg, PublishOptions::new()).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });

    tokio::select! {
        res = a.run_until_signal() => res?,
        _ = tokio::time::sleep(Duration::from_secs(3)) => a.shutdown_with_grace().await?,
    }
    producer.abort();
    b.shutdown_with_grace().await?;
    Ok(())
}
