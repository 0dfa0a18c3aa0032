// Drives a pool of four mock simulation engines.
//
// Each engine can only be used from the thread it was bound on, so it keeps
// its case data behind an `Rc`. The example opens a case on every worker,
// solves it, prints the results and tears the pool down, while an observer
// task prints every notification the pool broadcasts.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::bail;

use pinpool::{
    Broadcaster, CommandRouter, Dispatcher, NotificationSink, NotifyConfig, PoolConfig, ResourceError,
    ResourceFactory, Threads,
};

struct SimEngine {
    id: usize,
    case: Rc<RefCell<Option<String>>>,
}

impl SimEngine {
    fn open_case(&self, name: &str) {
        *self.case.borrow_mut() = Some(name.to_string());
    }

    fn solve(&self) -> anyhow::Result<Vec<f64>> {
        let case = self.case.borrow();
        let Some(case) = case.as_deref() else {
            bail!("engine {} has no case loaded", self.id);
        };
        // Deterministic stand-in for branch flows
        Ok((0..4).map(|branch| (case.len() * (branch + 1) + self.id) as f64 / 10.0).collect())
    }
}

struct SimFactory;

impl ResourceFactory for SimFactory {
    type Resource = SimEngine;
    type Transit = usize;

    fn create(&self, index: usize) -> Result<usize, ResourceError> {
        tracing::info!(index, "starting engine");
        Ok(index)
    }

    fn bind(&self, id: usize) -> Result<SimEngine, ResourceError> {
        Ok(SimEngine {
            id,
            case: Rc::new(RefCell::new(None)),
        })
    }

    fn unbind(&self, engine: SimEngine) -> usize {
        engine.id
    }

    fn release(&self, id: usize) {
        tracing::info!(index = id, "engine closed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pinpool::logging::init_default();

    let broadcaster = Arc::new(Broadcaster::new(&NotifyConfig::default())?);
    let mut observer = broadcaster.subscribe();
    tokio::spawn(async move {
        while let Some(notification) = observer.recv().await {
            println!("observer <- {}", notification);
        }
    });

    let started = Instant::now();
    let sink: Arc<dyn NotificationSink> = broadcaster.clone();
    let pool = Arc::new(Dispatcher::with_sink(PoolConfig::with_workers(4), SimFactory, sink)?);
    println!("pool of {} engines created in {:?}", pool.worker_count(), started.elapsed());

    let (passthrough, inbound) = flume::unbounded();
    let router = CommandRouter::new(pool.clone(), passthrough);
    router.handle(r#"{"command": "pause"}"#).await;
    router.handle(r#"{"command": "resume"}"#).await;
    router.handle(r#"{"action": "solve", "case": "sampleCase"}"#).await;
    if let Ok(request) = inbound.try_recv() {
        println!("application received {}", request);
    }

    let started = Instant::now();
    let reports = pool
        .submit_with(Threads::Spec("0-3"), "sampleCase".to_string(), |ctx, engine, case: &String| {
            println!("worker {} starting call {}", ctx.worker, ctx.call_id);
            engine.open_case(case);
            engine.solve()
        })
        .await?;
    for report in &reports {
        match &report.outcome {
            Ok(flows) => println!("result from worker {}: {:?}", report.worker(), flows),
            Err(failure) => println!("worker {} failed: {}", report.worker(), failure),
        }
    }
    println!("solved on {} workers in {:?}", reports.len(), started.elapsed());

    pool.dismiss(Threads::Spec("0-3"))?;
    pool.reset()?;
    Ok(())
}
