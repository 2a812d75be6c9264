use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use uuid::Uuid;

use crate::{
    auth::verify_session,
    error::{ApiJson, AppError},
    models::Event,
    pages::{page_context, page_session},
    validation::{event_draft, EventPayload},
    views, AppState,
};

const NOT_FOUND: &str = "Evento no encontrado";

/// True when the caller asked for JSON rather than a page.
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

pub async fn get_event(
    headers: HeaderMap,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Event>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;

    let event = state
        .store
        .find_event(auth_state.user_id, event_id)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    Ok(Json(event))
}

pub async fn create_event(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EventPayload>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    let draft = event_draft(&req)?;

    let event = state.store.insert_event(auth_state.user_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Full replace of the mutable fields; answers with the stored row.
pub async fn update_event(
    headers: HeaderMap,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EventPayload>,
) -> Result<Json<Event>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    let draft = event_draft(&req)?;

    let event = state
        .store
        .update_event(auth_state.user_id, event_id, &draft)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    Ok(Json(event))
}

pub async fn delete_event(
    headers: HeaderMap,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let auth_state = verify_session(&headers, &state).await?;

    let deleted = state.store.delete_event(auth_state.user_id, event_id).await?;
    if !deleted {
        return Err(AppError::NotFound(NOT_FOUND));
    }

    if wants_json(&headers) {
        Ok(Json(serde_json::json!({"success": true})).into_response())
    } else {
        Ok(Redirect::to("/eventos").into_response())
    }
}

/// Overlay fragment with details and the edit form.
pub async fn view_event_fragment(
    headers: HeaderMap,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;

    let event = state
        .store
        .find_event(auth_state.user_id, event_id)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    Ok(Html(views::event_fragment(&event)))
}

/// Form post from the "new event" page.
pub async fn create_event_form(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(req): Form<EventPayload>,
) -> Result<Response, AppError> {
    let auth_state = match page_session(&headers, &state).await {
        Ok(auth_state) => auth_state,
        Err(redirect) => return Ok(redirect),
    };

    let draft = match event_draft(&req) {
        Ok(draft) => draft,
        Err(err) => {
            let ctx = page_context(&auth_state);
            let page = views::event_form_page(&ctx, &req, Some(&err.to_string()));
            return Ok((StatusCode::BAD_REQUEST, Html(page)).into_response());
        }
    };

    state.store.insert_event(auth_state.user_id, &draft).await?;
    Ok(Redirect::to("/dashboard").into_response())
}
