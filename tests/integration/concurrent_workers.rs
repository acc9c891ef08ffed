//! Concurrency tests.
//!
//! Several workers share one dispatcher; every expression must resolve
//! exactly once and to the right value regardless of interleaving.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;

use calcflow::core::{ExpressionId, ExpressionStatus};
use calcflow::orchestration::Dispatcher;
use calcflow::store::UpdateOutcome;
use calcflow::Error;

use crate::fixtures::{approx_eq, compute};

const EXPRESSIONS: [(&str, f64); 8] = [
    ("1+2+3+4+5+6", 21.0),
    ("(1+2)*(3+4)", 21.0),
    ("2*3+4*5", 26.0),
    ("100/4/5", 5.0),
    ("(8-3)*(2+2)-1", 19.0),
    ("9-8-7", -6.0),
    ("1.5*2+0.25*4", 4.0),
    ("((2+3)*(4+5))/(1+2)", 15.0),
];

/// Pull and compute until every submitted expression has finished.
async fn worker(dispatcher: Dispatcher) -> Vec<ExpressionId> {
    let mut resolved = Vec::new();
    loop {
        let Some(task) = dispatcher.pull().await else {
            if dispatcher.expressions().await.iter().all(|e| e.is_finished()) {
                return resolved;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            continue;
        };
        let report = compute(&dispatcher, &task).await;
        match dispatcher.post_result(&report).await.unwrap() {
            UpdateOutcome::ExpressionDone { id, .. } => resolved.push(id),
            UpdateOutcome::ExpressionFailed { id, reason } => {
                panic!("expression {id} failed: {reason}")
            }
            UpdateOutcome::Recorded | UpdateOutcome::AlreadyCompleted => {}
        }
    }
}

/// Test: Many workers
/// Given 8 expressions (several copies each) and 8 workers
/// When workers race over the queue
/// Then each expression resolves exactly once with the right value
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_expression_resolves_once() {
    let dispatcher = Dispatcher::with_capacity(500);
    let mut expected = HashMap::new();
    for _ in 0..5 {
        for (source, value) in EXPRESSIONS {
            let id = dispatcher.submit(source).await.unwrap();
            expected.insert(id, value);
        }
    }

    let handles: Vec<_> = (0..8)
        .map(|_| tokio::spawn(worker(dispatcher.clone())))
        .collect();
    let resolved: Vec<ExpressionId> = tokio::time::timeout(Duration::from_secs(10), join_all(handles))
        .await
        .expect("workers should finish")
        .into_iter()
        .flat_map(|joined| joined.expect("worker panicked"))
        .collect();

    let mut counts: HashMap<ExpressionId, usize> = HashMap::new();
    for id in resolved {
        *counts.entry(id).or_default() += 1;
    }
    assert_eq!(counts.len(), expected.len());
    assert!(counts.values().all(|&n| n == 1), "{counts:?}");

    for (id, value) in expected {
        let expression = dispatcher.expression(id).await.unwrap();
        assert_eq!(expression.status, ExpressionStatus::Done);
        assert!(approx_eq(expression.result.unwrap(), value), "{}", expression.name);
    }
    assert!(dispatcher.pending_tasks().await.is_empty());
}

/// Test: Concurrent submissions get distinct ids
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_unique_ids() {
    let dispatcher = Dispatcher::with_capacity(500);
    let handles: Vec<_> = (0..50)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.submit(&format!("{}+1", i + 1)).await })
        })
        .collect();

    let mut ids: Vec<ExpressionId> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
    assert_eq!(dispatcher.expressions().await.len(), 50);
}

/// Test: Lease redelivery
/// Given a task pulled by a worker that goes silent
/// When its lease is reclaimed and another worker finishes it
/// Then the silent worker's late report changes nothing
#[tokio::test]
async fn test_abandoned_task_redelivered() {
    let dispatcher = Dispatcher::with_capacity(10);
    let id = dispatcher.submit("3*4").await.unwrap();

    let abandoned = dispatcher.pull().await.unwrap();
    assert!(dispatcher.pull().await.is_none());
    assert_eq!(dispatcher.requeue_expired(Duration::ZERO).await, 1);

    let redelivered = dispatcher.pull().await.unwrap();
    assert_eq!(redelivered.id, abandoned.id);
    let report = compute(&dispatcher, &redelivered).await;
    assert!(matches!(
        dispatcher.post_result(&report).await.unwrap(),
        UpdateOutcome::ExpressionDone { .. }
    ));

    let late = compute(&dispatcher, &abandoned).await;
    assert_eq!(
        dispatcher.post_result(&late).await.unwrap(),
        UpdateOutcome::AlreadyCompleted
    );
    assert_eq!(dispatcher.expression(id).await.unwrap().result, Some(12.0));
}

/// Test: Queue backpressure
/// Given a queue bound of three
/// When an expression needs more room than is left
/// Then it is rejected as Error and later submissions fit once drained
#[tokio::test]
async fn test_queue_full_rejects_submission() {
    let dispatcher = Dispatcher::with_capacity(3);
    let first = dispatcher.submit("1+2+3").await.unwrap();

    let err = dispatcher.submit("4+5+6").await.unwrap_err();
    assert!(matches!(err, Error::QueueFull { capacity: 3 }), "{err:?}");
    let rejected = dispatcher
        .expressions()
        .await
        .into_iter()
        .find(|e| e.name == "4+5+6")
        .unwrap();
    assert_eq!(rejected.status, ExpressionStatus::Error);

    while let Some(task) = dispatcher.pull().await {
        let report = compute(&dispatcher, &task).await;
        dispatcher.post_result(&report).await.unwrap();
    }
    assert_eq!(dispatcher.expression(first).await.unwrap().result, Some(6.0));

    let again = dispatcher.submit("4+5+6").await.unwrap();
    assert_eq!(
        dispatcher.expression(again).await.unwrap().status,
        ExpressionStatus::Computing
    );
}
