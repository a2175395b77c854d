//! Scheduling behavior over in-process units.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio_test::{assert_pending, task};
use worker_pool::{Error, TransportKind, WorkerPool, program_fn};

use common::{GatedEcho, TIMEOUT, init_tracing, wait_until};

fn echo_pool(units: usize) -> WorkerPool {
    WorkerPool::builder()
        .units(units)
        .unit_source("echo")
        .program("echo", program_fn(|payload| payload))
        .build()
        .expect("pool")
}

fn gated_pool(units: usize, gated: &GatedEcho) -> WorkerPool {
    WorkerPool::builder()
        .units(units)
        .unit_source("gated")
        .program("gated", Arc::new(gated.clone()))
        .build()
        .expect("pool")
}

#[tokio::test]
async fn round_trip_preserves_payload() -> anyhow::Result<()> {
    init_tracing();
    let pool = echo_pool(2);
    assert_eq!(pool.transport_kind(), TransportKind::Native);

    let reply = tokio::time::timeout(TIMEOUT, pool.run(json!({"x": 1}))?).await??;
    assert_eq!(reply, json!({"x": 1}));
    Ok(())
}

#[tokio::test]
async fn jobs_wait_for_handshake_then_drain() -> anyhow::Result<()> {
    init_tracing();
    let gated = GatedEcho::closed();
    let pool = gated_pool(2, &gated);

    let handles = (1..=3)
        .map(|n| pool.run(json!(n)))
        .collect::<Result<Vec<_>, _>>()?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = pool.status();
    assert_eq!(status.ready_units, 0);
    assert_eq!(status.dispatched, 0);
    assert_eq!(status.queued_jobs, 3);

    gated.boot.add_permits(2);
    let status = wait_until(&pool, |s| s.running_units == 2).await;
    assert_eq!(status.queued_jobs, 1);
    assert_eq!(status.dispatched, 2);

    gated.replies.add_permits(1);
    let status = wait_until(&pool, |s| s.completed == 1 && s.dispatched == 3).await;
    assert_eq!(status.queued_jobs, 0);

    gated.replies.add_permits(2);
    let mut replies = Vec::new();
    for handle in handles {
        replies.push(tokio::time::timeout(TIMEOUT, handle).await??);
    }
    assert_eq!(replies, vec![json!(1), json!(2), json!(3)]);
    Ok(())
}

#[tokio::test]
async fn destroy_abandons_queued_and_running_jobs() -> anyhow::Result<()> {
    init_tracing();
    let gated = GatedEcho::booted();
    let pool = gated_pool(2, &gated);

    let fired = Arc::new(AtomicBool::new(false));
    let first = pool.run(json!(1))?;
    let second = pool.run(json!(2))?;
    let flag = Arc::clone(&fired);
    pool.submit(json!(3), move |_| flag.store(true, Ordering::SeqCst))?;

    wait_until(&pool, |s| s.running_units == 2 && s.queued_jobs == 1).await;
    pool.destroy();

    gated.replies.add_permits(3);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!fired.load(Ordering::SeqCst));

    for handle in [first, second] {
        let err = tokio::time::timeout(TIMEOUT, handle).await?.unwrap_err();
        assert!(matches!(err, Error::JobAbandoned { .. }));
    }
    Ok(())
}

#[tokio::test]
async fn submit_after_destroy_is_rejected() {
    init_tracing();
    let pool = echo_pool(1);
    pool.destroy();

    let err = pool.submit(json!(1), |_| {}).unwrap_err();
    assert!(matches!(err, Error::PoolDestroyed));

    let status = pool.status();
    assert!(status.destroyed);
    assert_eq!(status.units, 0);
    assert_eq!(status.submitted, 0);
}

#[tokio::test]
async fn never_more_running_than_units() -> anyhow::Result<()> {
    init_tracing();
    let gated = GatedEcho::booted();
    let pool = gated_pool(3, &gated);

    let handles = (0..20)
        .map(|n| pool.run(json!(n)))
        .collect::<Result<Vec<_>, _>>()?;

    let status = wait_until(&pool, |s| s.running_units == 3).await;
    assert_eq!(status.queued_jobs, 17);

    gated.replies.add_permits(20);
    for handle in handles {
        tokio::time::timeout(TIMEOUT, handle).await??;
    }

    assert!(gated.peak() <= 3);
    let status = pool.status();
    assert_eq!(status.completed, 20);
    assert!(status.is_drained());
    Ok(())
}

#[tokio::test]
async fn single_unit_completes_in_submission_order() -> anyhow::Result<()> {
    init_tracing();
    let pool = echo_pool(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    for n in 0..10 {
        let order = Arc::clone(&order);
        pool.submit(json!(n), move |result| {
            if let Ok(Value::Number(n)) = result {
                order.lock().push(n.as_u64().unwrap_or_default());
            }
        })?;
    }

    wait_until(&pool, |s| s.completed == 10).await;
    assert_eq!(*order.lock(), (0..10).collect::<Vec<u64>>());
    Ok(())
}

#[tokio::test]
async fn callback_may_submit_more_work() -> anyhow::Result<()> {
    init_tracing();
    let pool = Arc::new(echo_pool(1));
    let (tx, rx) = oneshot::channel();

    let inner = Arc::clone(&pool);
    pool.submit(json!("first"), move |result| {
        assert_eq!(result.ok(), Some(json!("first")));
        inner
            .submit(json!("second"), move |result| {
                let _ = tx.send(result);
            })
            .expect("pool alive");
    })?;

    let second = tokio::time::timeout(TIMEOUT, rx).await??;
    assert_eq!(second?, json!("second"));
    Ok(())
}

#[tokio::test]
async fn pending_until_unit_replies() -> anyhow::Result<()> {
    init_tracing();
    let gated = GatedEcho::booted();
    let pool = gated_pool(1, &gated);

    let mut handle = task::spawn(pool.run(json!("later"))?);
    wait_until(&pool, |s| s.running_units == 1).await;
    assert_pending!(handle.poll());

    gated.replies.add_permits(1);
    let reply = tokio::time::timeout(TIMEOUT, handle).await??;
    assert_eq!(reply, json!("later"));
    Ok(())
}

#[tokio::test]
async fn status_counts_every_job() -> anyhow::Result<()> {
    init_tracing();
    let pool = echo_pool(2);

    for n in 0..5 {
        tokio::time::timeout(TIMEOUT, pool.run(json!(n))?).await??;
    }

    let status = pool.status();
    assert_eq!(status.units, 2);
    assert_eq!(status.ready_units, 2);
    assert_eq!(status.submitted, 5);
    assert_eq!(status.dispatched, 5);
    assert_eq!(status.completed, 5);
    assert_eq!(status.faulted_units, 0);
    Ok(())
}
