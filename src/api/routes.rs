//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::{ExpressionId, TaskResult};
use crate::error::{Error, Result};
use crate::orchestration::Dispatcher;

use super::types::*;

type ApiError = (StatusCode, String);

/// Shared application state.
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// Build the router for both the public and the agent-facing routes.
pub fn router(dispatcher: Dispatcher) -> Router {
    let state = Arc::new(AppState { dispatcher });

    Router::new()
        .route("/api/v1/calculate", post(calculate))
        .route("/api/v1/expressions", get(list_expressions))
        .route("/api/v1/expressions/:id", get(get_expression))
        .route("/api/v1/pending-tasks", get(pending_tasks))
        // Agent protocol
        .route("/internal/task", get(pull_task).post(post_result))
        .route("/internal/task/result/:id", get(task_result))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Orchestrator listening on {}", addr);

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Orchestrator stopped");
    Ok(())
}

fn api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::MissingTaskId | Error::Compile { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::MalformedTaskId(_)
        | Error::TaskNotFound(_)
        | Error::TaskNotCompleted(_)
        | Error::ExpressionNotFound(_) => StatusCode::NOT_FOUND,
        Error::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (status, err.to_string())
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    (StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
}

async fn calculate(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CalculateRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return invalid_body(rejection).into_response(),
    };
    match state.dispatcher.submit(&req.expression).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(CalculateResponse { id, error: None }),
        )
            .into_response(),
        Err(Error::Compile { id, source }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(CalculateResponse {
                id,
                error: Some(source.to_string()),
            }),
        )
            .into_response(),
        Err(e) => api_error(e).into_response(),
    }
}

async fn list_expressions(State(state): State<Arc<AppState>>) -> Json<ExpressionListResponse> {
    let expressions = state
        .dispatcher
        .expressions()
        .await
        .iter()
        .map(ExpressionView::from)
        .collect();
    Json(ExpressionListResponse { expressions })
}

async fn get_expression(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> std::result::Result<Json<ExpressionResponse>, ApiError> {
    let id: ExpressionId = raw_id.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("Invalid expression id: {}", raw_id),
        )
    })?;
    let expression = state.dispatcher.expression(id).await.map_err(api_error)?;
    Ok(Json(ExpressionResponse {
        expression: ExpressionView::from(&expression),
    }))
}

async fn pending_tasks(State(state): State<Arc<AppState>>) -> Json<TaskListResponse> {
    Json(TaskListResponse {
        tasks: state.dispatcher.pending_tasks().await,
    })
}

async fn pull_task(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<TaskResponse>, ApiError> {
    state
        .dispatcher
        .pull()
        .await
        .map(|task| Json(TaskResponse { task }))
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No task available".to_string()))
}

async fn post_result(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TaskResult>, JsonRejection>,
) -> std::result::Result<StatusCode, ApiError> {
    let Json(report) = payload.map_err(invalid_body)?;
    state
        .dispatcher
        .post_result(&report)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::OK)
}

async fn task_result(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> std::result::Result<Json<TaskResultResponse>, ApiError> {
    let result = state
        .dispatcher
        .task_result(&raw_id)
        .await
        .map_err(api_error)?;
    Ok(Json(TaskResultResponse { result }))
}
