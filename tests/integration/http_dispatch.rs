//! HTTP dispatch tests.
//!
//! A real orchestrator on loopback plus an agent pool speaking the pull /
//! post-result protocol.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use calcflow::agent::{AgentEvent, AgentPool};
use calcflow::api::types::{CalculateResponse, ExpressionResponse, TaskResponse};
use calcflow::core::{ExpressionId, ExpressionStatus};

use crate::fixtures::{approx_eq, TestServer};

async fn submit(http: &reqwest::Client, server: &TestServer, expression: &str) -> ExpressionId {
    let resp = http
        .post(format!("{}/api/v1/calculate", server.url()))
        .json(&json!({ "expression": expression }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED, "{expression}");
    resp.json::<CalculateResponse>().await.unwrap().id
}

/// Poll the public API until the expression has finished.
async fn await_expression(
    http: &reqwest::Client,
    server: &TestServer,
    id: ExpressionId,
) -> ExpressionResponse {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let body: ExpressionResponse = http
            .get(format!("{}/api/v1/expressions/{}", server.url(), id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let status = body.expression.status;
        if matches!(status, ExpressionStatus::Done | ExpressionStatus::Error) {
            return body;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expression {id} stuck in {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Test: Agents over HTTP
/// Given an orchestrator and a pool of three agents
/// When expressions are submitted through the public API
/// Then every one resolves to its value
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_agent_pool_resolves_expressions() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(256);
    let pool = AgentPool::new(server.worker_config(3)).with_events(tx);
    let agents = tokio::spawn(pool.run(cancel.clone()));

    let cases = [("2+3", 5.0), ("(5+2)+4/5", 7.8), ("2*(3+4)*5", 70.0)];
    let mut ids = Vec::new();
    for (source, value) in cases {
        ids.push((submit(&http, &server, source).await, value));
    }

    for (id, value) in ids {
        let body = await_expression(&http, &server, id).await;
        assert_eq!(body.expression.status, ExpressionStatus::Done);
        assert!(approx_eq(body.expression.result.unwrap(), value));
    }

    cancel.cancel();
    let stats = agents.await.unwrap();
    // 1 + 3 + 3 tasks
    assert_eq!(stats.completed, 7);
    assert_eq!(stats.failed, 0);

    let mut completed = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, AgentEvent::Completed { .. }) {
            completed += 1;
        }
    }
    assert_eq!(completed, 7);

    server.stop().await;
}

/// Test: Runtime failure over HTTP
/// Given an expression whose divisor evaluates to zero
/// Then the agent's error report puts the expression in Error
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_agent_reports_division_by_zero() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let cancel = CancellationToken::new();
    let agents = tokio::spawn(AgentPool::new(server.worker_config(1)).run(cancel.clone()));

    let id = submit(&http, &server, "7/(3-3)").await;
    let body = await_expression(&http, &server, id).await;
    assert_eq!(body.expression.status, ExpressionStatus::Error);
    assert!(body.expression.result.is_none());

    cancel.cancel();
    let stats = agents.await.unwrap();
    assert_eq!(stats.failed, 1);
    server.stop().await;
}

/// Test: Abandoned pull over HTTP
/// Given a task fetched by a client that never reports back
/// When the lease runs out
/// Then the reaper requeues it and an agent finishes the expression
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_pull_is_redelivered() {
    let server = TestServer::start_with_lease(Duration::from_millis(50)).await;
    let http = reqwest::Client::new();

    let id = submit(&http, &server, "6*7").await;
    let resp = http
        .get(format!("{}/internal/task", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let abandoned: TaskResponse = resp.json().await.unwrap();

    let cancel = CancellationToken::new();
    let agents = tokio::spawn(AgentPool::new(server.worker_config(1)).run(cancel.clone()));

    let body = await_expression(&http, &server, id).await;
    assert_eq!(body.expression.status, ExpressionStatus::Done);
    assert_eq!(body.expression.result, Some(42.0));
    assert!(!server
        .dispatcher
        .store()
        .in_flight()
        .await
        .contains(&abandoned.task.id));

    cancel.cancel();
    agents.await.unwrap();
    server.stop().await;
}

/// Test: Unknown task over HTTP
/// Then posting its result is a 404 and the queue is untouched
#[tokio::test]
async fn test_unknown_task_result_is_not_found() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    submit(&http, &server, "1+1").await;

    let resp = http
        .post(format!("{}/internal/task", server.url()))
        .json(&json!({ "task_id": "task-expr-42-0", "value": 3.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.dispatcher.pending_tasks().await.len(), 1);

    let resp = http
        .get(format!("{}/internal/task/result/task-expr-42-0", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

/// Test: Compile failures over HTTP
/// Then the response carries the id and the stored expression is Error
#[tokio::test]
async fn test_rejected_expression_is_queryable() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{}/api/v1/calculate", server.url()))
        .json(&json!({ "expression": "4/0" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: CalculateResponse = resp.json().await.unwrap();
    assert_eq!(body.error.as_deref(), Some("division by zero"));

    let view = await_expression(&http, &server, body.id).await;
    assert_eq!(view.expression.status, ExpressionStatus::Error);
    assert_eq!(view.expression.name, "4/0");

    server.stop().await;
}
