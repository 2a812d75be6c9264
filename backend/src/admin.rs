use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;

use crate::{
    auth::{require_admin, AuthState},
    clock::today_in,
    crypto::hash_password,
    error::{ApiJson, AppError},
    events::wants_json,
    models::{ADMIN_ROLE, DEFAULT_ROLE},
    pages::page_context,
    retention::{purge_stale, MAX_THRESHOLD_DAYS},
    validation::{check_new_account, FlexValue, ValidationError},
    views, AppState,
};

async fn render_admin(
    state: &AppState,
    auth_state: &AuthState,
    status: StatusCode,
    notice: Option<&str>,
) -> Result<Response, AppError> {
    let users = state.store.list_users().await?;
    let page = views::admin_page(&page_context(auth_state), &users, notice);
    Ok((status, Html(page)).into_response())
}

pub async fn admin_page(headers: HeaderMap, State(state): State<AppState>) -> Result<Response, AppError> {
    let auth_state = require_admin(&headers, &state).await?;
    render_admin(&state, &auth_state, StatusCode::OK, None).await
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    usuario: String,
    password: String,
    #[serde(default)]
    rol: Option<String>,
}

fn parse_role(raw: Option<&str>) -> Result<i16, ValidationError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(DEFAULT_ROLE),
        Some(r) => r
            .parse::<i16>()
            .ok()
            .filter(|level| (DEFAULT_ROLE..=ADMIN_ROLE).contains(level))
            .ok_or_else(|| ValidationError(format!("El rol debe estar entre {DEFAULT_ROLE} y {ADMIN_ROLE}"))),
    }
}

pub async fn create_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(req): Form<CreateUserRequest>,
) -> Result<Response, AppError> {
    let auth_state = require_admin(&headers, &state).await?;

    let checked = check_new_account(&req.usuario, &req.password)
        .and_then(|_| parse_role(req.rol.as_deref()));
    let role = match checked {
        Ok(role) => role,
        Err(err) => {
            return render_admin(&state, &auth_state, StatusCode::BAD_REQUEST, Some(&err.to_string())).await
        }
    };

    let password_hash = hash_password(&req.password).await?;
    match state.store.create_user(&req.usuario, &password_hash, role).await? {
        Some(user) => {
            log::info!("Admin {} created user {} (role {})", auth_state.username, user.username, role);
            let notice = format!("Usuario {} creado", user.username);
            render_admin(&state, &auth_state, StatusCode::CREATED, Some(&notice)).await
        }
        None => render_admin(&state, &auth_state, StatusCode::CONFLICT, Some("El usuario ya existe")).await,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PurgeParams {
    #[serde(default)]
    dias: Option<FlexValue>,
}

/// Optional `dias` carried in a JSON or urlencoded body.
///
/// A body that is present but unreadable is rejected, so the sweep never
/// silently falls back to the default threshold.
pub struct PurgeBody(Option<PurgeParams>);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for PurgeBody {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let ApiJson(params) = ApiJson::<PurgeParams>::from_request(req, state).await?;
            return Ok(Self(Some(params)));
        }
        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(params) = Form::<PurgeParams>::from_request(req, state)
                .await
                .map_err(|rejection| ValidationError(rejection.body_text()))?;
            return Ok(Self(Some(params)));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ValidationError(rejection.body_text()))?;
        if body.is_empty() {
            Ok(Self(None))
        } else {
            Err(ValidationError("Cuerpo no admitido: usa JSON o un formulario".to_string()).into())
        }
    }
}

fn is_blank(value: &FlexValue) -> bool {
    matches!(value, FlexValue::Text(text) if text.trim().is_empty())
}

/// Threshold from the body, else the query string, else the configured default.
fn purge_threshold(query: &PurgeParams, body: Option<&PurgeParams>, default: u32) -> Result<u32, ValidationError> {
    let raw = body
        .and_then(|b| b.dias.as_ref())
        .filter(|d| !is_blank(d))
        .or_else(|| query.dias.as_ref().filter(|d| !is_blank(d)));
    let Some(raw) = raw else {
        return Ok(default);
    };

    let days = match raw {
        FlexValue::Int(n) => u32::try_from(*n).ok(),
        FlexValue::Text(text) => text.trim().parse::<u32>().ok(),
        FlexValue::Bool(_) => None,
    };
    days.filter(|days| *days <= MAX_THRESHOLD_DAYS)
        .ok_or_else(|| ValidationError(format!("dias debe ser un entero entre 0 y {MAX_THRESHOLD_DAYS}")))
}

/// On-demand retention sweep.
pub async fn purge_data(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<PurgeParams>,
    PurgeBody(body): PurgeBody,
) -> Result<Response, AppError> {
    let auth_state = require_admin(&headers, &state).await?;
    let dias = purge_threshold(&query, body.as_ref(), state.config.retention_days)?;

    let report = purge_stale(state.store.as_ref(), today_in(state.config.timezone), dias).await?;
    log::info!(
        "Admin {} purged data older than {} days: {} events, {} tasks",
        auth_state.username,
        dias,
        report.eventos_eliminados,
        report.tareas_eliminadas
    );

    if wants_json(&headers) {
        return Ok(Json(serde_json::json!({
            "success": true,
            "dias": dias,
            "cutoff": report.cutoff,
            "eventos_eliminados": report.eventos_eliminados,
            "tareas_eliminadas": report.tareas_eliminadas,
        }))
        .into_response());
    }

    let notice = format!(
        "Limpieza completada: {} eventos y {} tareas eliminados",
        report.eventos_eliminados, report.tareas_eliminadas
    );
    render_admin(&state, &auth_state, StatusCode::OK, Some(&notice)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(dias: Option<&str>) -> PurgeParams {
        PurgeParams {
            dias: dias.map(|d| FlexValue::Text(d.to_string())),
        }
    }

    #[test]
    fn threshold_prefers_form_then_query_then_default() {
        assert_eq!(purge_threshold(&params(None), None, 3), Ok(3));
        assert_eq!(purge_threshold(&params(Some("7")), None, 3), Ok(7));
        assert_eq!(purge_threshold(&params(Some("7")), Some(&params(Some("10"))), 3), Ok(10));
        assert_eq!(purge_threshold(&params(Some(" ")), Some(&params(None)), 3), Ok(3));
    }

    #[test]
    fn threshold_rejects_negative_and_huge_values() {
        assert!(purge_threshold(&params(Some("-1")), None, 3).is_err());
        assert!(purge_threshold(&params(Some("3651")), None, 3).is_err());
        assert!(purge_threshold(&params(Some("tres")), None, 3).is_err());
    }

    #[test]
    fn threshold_accepts_json_numbers() {
        let body = PurgeParams {
            dias: Some(FlexValue::Int(30)),
        };
        assert_eq!(purge_threshold(&params(None), Some(&body), 3), Ok(30));

        let negative = PurgeParams {
            dias: Some(FlexValue::Int(-5)),
        };
        assert!(purge_threshold(&params(None), Some(&negative), 3).is_err());

        let flag = PurgeParams {
            dias: Some(FlexValue::Bool(true)),
        };
        assert!(purge_threshold(&params(None), Some(&flag), 3).is_err());
    }

    #[test]
    fn role_defaults_and_bounds() {
        assert_eq!(parse_role(None), Ok(DEFAULT_ROLE));
        assert_eq!(parse_role(Some("3")), Ok(ADMIN_ROLE));
        assert!(parse_role(Some("0")).is_err());
        assert!(parse_role(Some("4")).is_err());
    }
}
