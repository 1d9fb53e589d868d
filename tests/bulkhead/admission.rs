use futures::future::join_all;
use guardrail::{AttemptContext, Bulkhead, BulkheadError, Pipeline, PolicyError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn bulkhead(max_concurrent: usize, max_queued: usize) -> Bulkhead {
    Bulkhead::builder()
        .name("reports")
        .max_concurrent(max_concurrent)
        .max_queued(max_queued)
        .build()
        .unwrap()
}

async fn wait_for_queue(bulkhead: &Bulkhead, queued: usize) {
    while bulkhead.queued_count() != queued {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn ten_run_five_wait_sixteenth_is_rejected() {
    let bulkhead = bulkhead(10, 5);

    let mut running = Vec::new();
    for _ in 0..10 {
        running.push(bulkhead.admit().await.unwrap());
    }
    assert_eq!(bulkhead.active_count(), 10);

    let waiting: Vec<_> = (0..5)
        .map(|_| {
            let bulkhead = bulkhead.clone();
            tokio::spawn(async move { bulkhead.admit().await.map(drop) })
        })
        .collect();
    wait_for_queue(&bulkhead, 5).await;

    let sixteenth = bulkhead.admit().await;
    assert!(matches!(
        sixteenth,
        Err(BulkheadError::Rejected {
            max_concurrent: 10,
            max_queued: 5,
            ..
        })
    ));
    assert_eq!(bulkhead.active_count(), 10);
    assert_eq!(bulkhead.queued_count(), 5);

    drop(running);
    for handle in waiting {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(bulkhead.active_count(), 0);
    assert_eq!(bulkhead.queued_count(), 0);
}

#[tokio::test]
async fn queued_calls_are_admitted_in_arrival_order() {
    let bulkhead = bulkhead(1, 3);
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = bulkhead.admit().await.unwrap();

    let mut waiting = Vec::new();
    for id in 0..3 {
        let handle = bulkhead.clone();
        let order = Arc::clone(&order);
        waiting.push(tokio::spawn(async move {
            let ticket = handle.admit().await.unwrap();
            order.lock().unwrap().push(id);
            drop(ticket);
        }));
        wait_for_queue(&bulkhead, id + 1).await;
    }

    bulkhead.release(first);
    for handle in waiting {
        handle.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn zero_queue_rejects_as_soon_as_slots_are_full() {
    let bulkhead = bulkhead(2, 0);
    let _a = bulkhead.admit().await.unwrap();
    let _b = bulkhead.admit().await.unwrap();

    let err = bulkhead.admit().await.unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(bulkhead.queued_count(), 0);
}

#[test]
fn zero_concurrency_is_a_config_error() {
    let err = Bulkhead::builder().max_concurrent(0).build().unwrap_err();
    assert!(err.to_string().contains("max_concurrent"));
}

#[tokio::test(start_paused = true)]
async fn pipeline_rejects_the_call_beyond_the_queue() {
    let pipeline = Pipeline::<usize, ()>::builder("reports")
        .bulkhead(Bulkhead::builder().max_concurrent(10).max_queued(5))
        .build()
        .unwrap();

    let peak = Arc::new(AtomicUsize::new(0));
    let running = Arc::new(AtomicUsize::new(0));
    let operation = {
        let peak = Arc::clone(&peak);
        let running = Arc::clone(&running);
        move |ctx: AttemptContext| {
            let peak = Arc::clone(&peak);
            let running = Arc::clone(&running);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(ctx.attempt() as usize)
            }
        }
    };

    let results = join_all((0..16).map(|_| pipeline.execute(&operation))).await;

    let rejected: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(
        rejected[0],
        &PolicyError::BulkheadRejected {
            target: "reports".to_string()
        }
    );
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 15);
    assert_eq!(peak.load(Ordering::SeqCst), 10);
}
