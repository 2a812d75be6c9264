use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::{Days, Utc};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::{
    auth::{clear_session_cookie, create_session, session_cookie, verify_session, AuthState},
    clock::{today_in, week_of},
    crypto::{generate_random_password, hash_password, verify_password},
    error::AppError,
    models::DateRange,
    validation::{credentials_well_formed, parse_date, EventPayload, TaskPayload},
    views::{self, DashboardView, PageContext},
    AppState,
};

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

pub fn page_context(auth_state: &AuthState) -> PageContext<'_> {
    PageContext {
        username: &auth_state.username,
        is_admin: auth_state.is_admin,
    }
}

/// Like `verify_session`, but sends anonymous visitors to the login page.
pub async fn page_session(headers: &HeaderMap, state: &AppState) -> Result<AuthState, Response> {
    match verify_session(headers, state).await {
        Ok(auth_state) => Ok(auth_state),
        Err(AppError::Unauthorized) => Err(Redirect::to("/login").into_response()),
        Err(err) => Err(err.into_response()),
    }
}

pub async fn index(headers: HeaderMap, State(state): State<AppState>) -> Response {
    match page_session(&headers, &state).await {
        Ok(_) => Redirect::to("/dashboard").into_response(),
        Err(response) => response,
    }
}

pub async fn login_form() -> Html<String> {
    Html(views::login_page(None))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    usuario: String,
    password: String,
    #[serde(default)]
    recordar: Option<String>,
}

/// Every attempt runs exactly one bcrypt verification, against a dummy hash
/// when the user does not exist.
pub async fn login(State(state): State<AppState>, Form(req): Form<LoginRequest>) -> Result<Response, AppError> {
    let dummy_hash = DUMMY_HASH
        .get_or_try_init(|| async { hash_password(&generate_random_password()).await })
        .await?;

    let user = if credentials_well_formed(&req.usuario, &req.password) {
        state.store.find_user_by_username(&req.usuario).await?
    } else {
        None
    };

    let hash = user.as_ref().map_or(dummy_hash.as_str(), |u| u.password_hash.as_str());
    let password_valid = verify_password(&req.password, hash).await.unwrap_or_else(|err| {
        log::warn!("Password verification failed: {}", err);
        false
    });

    match user {
        Some(user) if password_valid => {
            let max_age = state.config.session_max_age_secs;
            let token = create_session(user.id, &state.session_key, Utc::now().timestamp(), max_age);
            let remember = req.recordar.is_some_and(|v| !v.is_empty());
            let cookie = session_cookie(
                &token,
                remember.then_some(max_age),
                state.config.is_production(),
            );
            log::info!("User {} logged in", user.username);
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/dashboard")).into_response())
        }
        _ => Ok((
            StatusCode::UNAUTHORIZED,
            Html(views::login_page(Some("Credenciales inválidas"))),
        )
            .into_response()),
    }
}

pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = clear_session_cookie(state.config.is_production());
    ([(header::SET_COOKIE, cookie)], Redirect::to("/login")).into_response()
}

pub async fn dashboard(headers: HeaderMap, State(state): State<AppState>) -> Result<Response, AppError> {
    let auth_state = match page_session(&headers, &state).await {
        Ok(auth_state) => auth_state,
        Err(redirect) => return Ok(redirect),
    };
    let owner = auth_state.user_id;
    let today = today_in(state.config.timezone);
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let week = week_of(today);

    let view = DashboardView {
        today,
        events_today: state.store.list_events(owner, Some(DateRange::single_day(today))).await?,
        tasks_today: state.store.list_tasks(owner, Some(DateRange::single_day(today))).await?,
        week_summary: state.store.task_summary(owner, week).await?,
        events_tomorrow: state
            .store
            .count_events_starting(owner, DateRange::single_day(tomorrow))
            .await?,
        events_this_week: state.store.count_events_starting(owner, week).await?,
    };

    let ctx = page_context(&auth_state);
    Ok(Html(views::dashboard_page(&ctx, &view)).into_response())
}

pub async fn calendar(headers: HeaderMap, State(state): State<AppState>) -> Response {
    match page_session(&headers, &state).await {
        Ok(auth_state) => Html(views::calendar_page(&page_context(&auth_state))).into_response(),
        Err(redirect) => redirect,
    }
}

pub async fn event_list(headers: HeaderMap, State(state): State<AppState>) -> Result<Response, AppError> {
    let auth_state = match page_session(&headers, &state).await {
        Ok(auth_state) => auth_state,
        Err(redirect) => return Ok(redirect),
    };
    let events = state.store.list_events(auth_state.user_id, None).await?;
    let ctx = page_context(&auth_state);
    Ok(Html(views::event_list_page(&ctx, &events)).into_response())
}

pub async fn task_list(headers: HeaderMap, State(state): State<AppState>) -> Result<Response, AppError> {
    let auth_state = match page_session(&headers, &state).await {
        Ok(auth_state) => auth_state,
        Err(redirect) => return Ok(redirect),
    };
    let tasks = state.store.list_tasks(auth_state.user_id, None).await?;
    let week = week_of(today_in(state.config.timezone));
    let summary = state.store.task_summary(auth_state.user_id, week).await?;
    let ctx = page_context(&auth_state);
    Ok(Html(views::task_list_page(&ctx, &tasks, &summary)).into_response())
}

#[derive(Deserialize)]
pub struct NewEventQuery {
    fecha: Option<String>,
}

/// `?fecha=YYYY-MM-DD` preselects the date when coming from the calendar.
pub async fn new_event_form(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<NewEventQuery>,
) -> Response {
    let auth_state = match page_session(&headers, &state).await {
        Ok(auth_state) => auth_state,
        Err(redirect) => return redirect,
    };
    let payload = EventPayload {
        fecha_evento: query
            .fecha
            .filter(|f| parse_date("Fecha", f).is_ok()),
        ..EventPayload::default()
    };
    Html(views::event_form_page(&page_context(&auth_state), &payload, None)).into_response()
}

pub async fn new_task_form(headers: HeaderMap, State(state): State<AppState>) -> Response {
    match page_session(&headers, &state).await {
        Ok(auth_state) => Html(views::task_form_page(
            &page_context(&auth_state),
            &TaskPayload::default(),
            None,
        ))
        .into_response(),
        Err(redirect) => redirect,
    }
}
