pub mod types;
pub mod upstream;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info};
use serde::Serialize;
use serde_json::json;

use crate::broker::{BrokerChannel, BrokerError};
use crate::shared::state::AppState;
use types::{AuditEvent, NotificationEvent, TaskCreatedResponse, TaskCreationRequest};
use upstream::UpstreamError;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/task", post(handle_task_create))
        .route("/subgroup/{subGroupId}", get(handle_subgroup_get))
}

/// Proxy the subgroup API and reshape its members into assignee fields.
pub async fn handle_subgroup_get(
    State(state): State<Arc<AppState>>,
    Path(sub_group_id): Path<i64>,
) -> Response {
    match state.subgroups.members(sub_group_id).await {
        Ok(members) => Json(members).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Task-creation orchestration. The broker channel is acquired before any
/// remote call and released by the detached side-effect task on every exit
/// path; the caller-visible response covers only the authoritative create
/// and assign calls.
pub async fn handle_task_create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TaskCreationRequest>,
) -> Response {
    let channel = match state.broker.open().await {
        Ok(channel) => channel,
        Err(err) => {
            error!("broker channel unavailable: {}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error" })),
            )
                .into_response();
        }
    };

    match create_and_assign(&state, &request).await {
        Ok(task_id) => {
            let response = (
                StatusCode::CREATED,
                Json(TaskCreatedResponse {
                    message: "Task created successfully".to_string(),
                    task_id,
                }),
            )
                .into_response();
            tokio::spawn(finish_created(state, request, task_id, channel));
            response
        }
        Err((task_id, err)) => {
            let response = err.clone().into_response();
            tokio::spawn(finish_failed(state, request, task_id, err, channel));
            response
        }
    }
}

/// The authoritative sequence: create, then assign with the freshly
/// allocated id stamped into each assignee. The error carries the task id
/// known at the point of failure (0 when create itself failed).
async fn create_and_assign(
    state: &AppState,
    request: &TaskCreationRequest,
) -> Result<i64, (i64, UpstreamError)> {
    let task_id = state.tasks.create(request).await.map_err(|err| (0, err))?;
    let mut assignees = request.assigned_to.clone();
    for assignee in &mut assignees {
        assignee.task_id = task_id;
    }
    state
        .tasks
        .assign(task_id, &assignees, request.user_id, &request.username)
        .await
        .map_err(|err| (task_id, err))?;
    Ok(task_id)
}

async fn publish_json<T: Serialize>(
    channel: &dyn BrokerChannel,
    routing_key: &str,
    payload: &T,
) -> Result<(), BrokerError> {
    let bytes = serde_json::to_vec(payload).map_err(|err| BrokerError::Publish(err.to_string()))?;
    channel.publish(routing_key, bytes).await
}

/// Best-effort side effects after a successful create+assign: audit event,
/// notification event, and the alert email, awaited concurrently. Failures
/// are logged only; the 201 has already gone out.
async fn finish_created(
    state: Arc<AppState>,
    request: TaskCreationRequest,
    task_id: i64,
    mut channel: Box<dyn BrokerChannel>,
) {
    let broker = &state.config.broker;
    let audit = AuditEvent::created(&request, task_id);
    let notification = NotificationEvent::new_task(
        state.notifier.recipient_for(&request.assigned_to),
        &request,
        task_id,
    );

    let (audit_sent, notif_sent, mail_sent) = tokio::join!(
        publish_json(channel.as_ref(), &broker.log_routing_key, &audit),
        publish_json(channel.as_ref(), &broker.notif_routing_key, &notification),
        state.notifier.send_new_task_alert(&request, task_id),
    );
    match audit_sent {
        Ok(()) => info!(
            "audit event published on '{}' for task {}",
            broker.log_routing_key, task_id
        ),
        Err(err) => error!("audit publish failed for task {}: {}", task_id, err),
    }
    match notif_sent {
        Ok(()) => info!(
            "notification event published on '{}' for task {}",
            broker.notif_routing_key, task_id
        ),
        Err(err) => error!("notification publish failed for task {}: {}", task_id, err),
    }
    if let Err(err) = mail_sent {
        error!("alert email failed for task {}: {}", task_id, err);
    }

    channel.close().await;
}

/// Error-path audit: one ErrorInCreateTask event with the classified
/// message and whatever task id the flow got to, then release the channel.
async fn finish_failed(
    state: Arc<AppState>,
    request: TaskCreationRequest,
    task_id: i64,
    err: UpstreamError,
    mut channel: Box<dyn BrokerChannel>,
) {
    let audit = AuditEvent::failed(&request, task_id, err.audit_description());
    if let Err(publish_err) = publish_json(
        channel.as_ref(),
        &state.config.broker.log_routing_key,
        &audit,
    )
    .await
    {
        error!(
            "error audit publish failed for task {}: {}",
            task_id, publish_err
        );
    }
    channel.close().await;
}
