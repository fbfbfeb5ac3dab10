//! # Example: buffered
//!
//! Messages published before any listener exists wait in the default bucket and are handed
//! to the first listener that attaches. Ticks are driven by hand with [`ManualScheduler`].
//!
//! ## Run
//! ```bash
//! cargo run --example buffered
//! ```

use std::sync::Arc;

use slotbus::{
    ChannelEngine, Config, Delivery, ListenerFn, ManualScheduler, PollOutcome, PublishOptions,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let scheduler = Arc::new(ManualScheduler::new());
    let engine = ChannelEngine::builder(Config::default())
        .with_scheduler(scheduler.clone())
        .build();

    for job in ["resize", "thumbnail", "upload"] {
        engine.publish("jobs", job, PublishOptions::new()).await?;
    }
    // Dropped: nobody listens and storing was declined.
    engine
        .publish("jobs", "ephemeral", PublishOptions::new().with_store(false))
        .await?;

    println!("before: {}", serde_json::to_string(&engine.get_channel("jobs").await?)?);

    let handle = engine
        .create_listener(
            "jobs",
            1u64,
            ListenerFn::arc("worker", |d: &Delivery| {
                println!("[worker {}] {}", d.worker, d.message);
                Ok(())
            }),
        )
        .await?;

    println!("after attach: {}", serde_json::to_string(&engine.get_channel("jobs").await?)?);

    while let Some(Ok(PollOutcome::Busy)) = scheduler.tick(&handle).await {}

    engine.remove_listener("jobs", 1u64, true).await?;
    println!("after purge: {}", serde_json::to_string(&engine.get_channel("jobs").await?)?);

    engine.shutdown().await?;
    Ok(())
}
