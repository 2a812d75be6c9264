use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::verify_session,
    clock::{today_in, week_of},
    error::{ApiJson, AppError},
    events::wants_json,
    models::{Task, TaskState, TaskSummary},
    pages::{page_context, page_session},
    validation::{parse_state, task_draft, FlexValue, TaskPayload, ValidationError},
    views, AppState,
};

const NOT_FOUND: &str = "Tarea no encontrada";

pub async fn list_tasks(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    let tasks = state.store.list_tasks(auth_state.user_id, None).await?;
    Ok(Json(tasks))
}

pub async fn get_task(
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Task>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;

    let task = state
        .store
        .find_task(auth_state.user_id, task_id)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    Ok(Json(task))
}

pub async fn create_task(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TaskPayload>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    let draft = task_draft(&req)?;

    let task = state.store.insert_task(auth_state.user_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Full replace of the mutable fields; answers with the stored row.
pub async fn update_task(
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TaskPayload>,
) -> Result<Json<Task>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    let draft = task_draft(&req)?;

    let task = state
        .store
        .update_task(auth_state.user_id, task_id, &draft)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    Ok(Json(task))
}

pub async fn delete_task(
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let auth_state = verify_session(&headers, &state).await?;

    let deleted = state.store.delete_task(auth_state.user_id, task_id).await?;
    if !deleted {
        return Err(AppError::NotFound(NOT_FOUND));
    }

    if wants_json(&headers) {
        let resumen = week_summary(&state, auth_state.user_id).await?;
        Ok(Json(serde_json::json!({"success": true, "resumen": resumen})).into_response())
    } else {
        Ok(Redirect::to("/tareas").into_response())
    }
}

async fn week_summary(state: &AppState, owner: Uuid) -> Result<TaskSummary, AppError> {
    let week = week_of(today_in(state.config.timezone));
    Ok(state.store.task_summary(owner, week).await?)
}

/// Completed/total counters for tasks due this week.
pub async fn task_summary(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<TaskSummary>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    Ok(Json(week_summary(&state, auth_state.user_id).await?))
}

#[derive(Deserialize)]
pub struct TaskStateRequest {
    #[serde(default)]
    estado: Option<FlexValue>,
}

#[derive(Serialize)]
pub struct TaskStateResponse {
    success: bool,
    estado: TaskState,
    completada: bool,
    /// Canonical row after the change.
    tarea: Task,
    /// Current week's counters, for the completed-count display.
    resumen: TaskSummary,
}

pub async fn update_task_state(
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TaskStateRequest>,
) -> Result<Json<TaskStateResponse>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    if req.estado.is_none() {
        return Err(ValidationError("Falta estado".to_string()).into());
    }
    let estado = parse_state(req.estado.as_ref())?;

    let task = state
        .store
        .set_task_state(auth_state.user_id, task_id, estado)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;

    let resumen = week_summary(&state, auth_state.user_id).await?;

    Ok(Json(TaskStateResponse {
        success: true,
        estado: task.estado,
        completada: task.estado.is_completed(),
        tarea: task,
        resumen,
    }))
}

pub async fn view_task_fragment(
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;

    let task = state
        .store
        .find_task(auth_state.user_id, task_id)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    Ok(Html(views::task_fragment(&task)))
}

/// Form post from the "new task" page. New tasks always start pending.
pub async fn create_task_form(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(mut req): Form<TaskPayload>,
) -> Result<Response, AppError> {
    let auth_state = match page_session(&headers, &state).await {
        Ok(auth_state) => auth_state,
        Err(redirect) => return Ok(redirect),
    };
    req.estado = None;

    let draft = match task_draft(&req) {
        Ok(draft) => draft,
        Err(err) => {
            let ctx = page_context(&auth_state);
            let page = views::task_form_page(&ctx, &req, Some(&err.to_string()));
            return Ok((StatusCode::BAD_REQUEST, Html(page)).into_response());
        }
    };

    state.store.insert_task(auth_state.user_id, &draft).await?;
    Ok(Redirect::to("/tareas").into_response())
}
