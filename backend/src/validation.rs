use chrono::{NaiveDate, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::models::{event_bounds, EventDraft, Priority, TaskDraft, TaskState};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 100;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-@.]+$").unwrap());
static SCRIPT_MARKERS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<script|javascript:|onerror\s*=|onclick\s*=").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A loosely typed scalar, as sent by checkboxes, selects and JSON clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlexValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub fecha_evento: Option<String>,
    #[serde(default)]
    pub hora_evento: Option<String>,
    #[serde(default)]
    pub fecha_fin: Option<String>,
    #[serde(default)]
    pub hora_fin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    // The shared overlay form posts the due date under the event field name.
    #[serde(default, alias = "fecha_evento")]
    pub fecha_limite: Option<String>,
    #[serde(default)]
    pub hora_evento: Option<String>,
    #[serde(default)]
    pub prioridad: Option<FlexValue>,
    #[serde(default)]
    pub estado: Option<FlexValue>,
}

/// Treats `""`, whitespace and the literal `"null"` as absent.
pub fn clean_optional(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "null")
}

/// Checks a free-text field and returns its trimmed value.
pub fn check_text(
    label: &str,
    value: Option<&str>,
    max_len: usize,
    required: bool,
) -> Result<Option<String>, ValidationError> {
    let Some(text) = clean_optional(value) else {
        return if required {
            Err(ValidationError::new(format!("{label} es obligatorio")))
        } else {
            Ok(None)
        };
    };

    if text.chars().count() > max_len {
        return Err(ValidationError::new(format!(
            "{label} supera el máximo de {max_len} caracteres"
        )));
    }
    if text
        .chars()
        .any(|ch| ch.is_control() && ch != '\n' && ch != '\r' && ch != '\t')
    {
        return Err(ValidationError::new(format!(
            "{label} contiene caracteres de control no válidos"
        )));
    }
    if SCRIPT_MARKERS_RE.is_match(text) {
        return Err(ValidationError::new(format!("{label} contiene contenido no permitido")));
    }
    Ok(Some(text.to_string()))
}

pub fn parse_date(label: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::new(format!("{label} inválida (formato AAAA-MM-DD)")))
}

/// Parses `HH:MM` or `HH:MM:SS`; the result is truncated to whole minutes.
pub fn parse_time(label: &str, value: &str) -> Result<NaiveTime, ValidationError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
        .and_then(|t| NaiveTime::from_hms_opt(t.hour(), t.minute(), 0))
        .ok_or_else(|| ValidationError::new(format!("{label} inválida (formato HH:MM)")))
}

fn optional_date(label: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    clean_optional(value).map(|v| parse_date(label, v)).transpose()
}

fn optional_time(label: &str, value: Option<&str>) -> Result<Option<NaiveTime>, ValidationError> {
    clean_optional(value).map(|v| parse_time(label, v)).transpose()
}

pub fn event_draft(payload: &EventPayload) -> Result<EventDraft, ValidationError> {
    let nombre = check_text("El nombre", payload.nombre.as_deref(), MAX_NAME_LEN, true)?
        .unwrap_or_default();
    let descripcion = check_text(
        "La descripción",
        payload.descripcion.as_deref(),
        MAX_DESCRIPTION_LEN,
        false,
    )?;
    let fecha_evento = clean_optional(payload.fecha_evento.as_deref())
        .ok_or_else(|| ValidationError::new("Falta fecha_evento"))
        .and_then(|v| parse_date("Fecha de evento", v))?;
    let hora_evento = optional_time("Hora de evento", payload.hora_evento.as_deref())?;
    let fecha_fin = optional_date("Fecha fin", payload.fecha_fin.as_deref())?;
    let hora_fin = optional_time("Hora fin", payload.hora_fin.as_deref())?;

    let (start, end) = event_bounds(fecha_evento, hora_evento, fecha_fin, hora_fin);
    if let Some(end) = end {
        if end <= start {
            return Err(ValidationError::new(
                "El fin del evento debe ser posterior al inicio",
            ));
        }
    }

    Ok(EventDraft {
        nombre,
        descripcion,
        fecha_evento,
        hora_evento,
        fecha_fin,
        hora_fin,
    })
}

pub fn parse_priority(value: Option<&FlexValue>) -> Result<Priority, ValidationError> {
    let invalid = || ValidationError::new("Prioridad inválida (debe ser 1, 2 o 3)");
    match value {
        None => Ok(Priority::Low),
        Some(FlexValue::Int(level)) => Priority::from_level(*level).ok_or_else(invalid),
        Some(FlexValue::Bool(_)) => Err(invalid()),
        Some(FlexValue::Text(text)) => match text.trim().to_lowercase().as_str() {
            "" => Ok(Priority::Low),
            "baja" | "low" => Ok(Priority::Low),
            "media" | "medium" => Ok(Priority::Medium),
            "alta" | "high" => Ok(Priority::High),
            other => other
                .parse::<i64>()
                .ok()
                .and_then(Priority::from_level)
                .ok_or_else(invalid),
        },
    }
}

/// Accepts booleans, numeric codes and the Spanish state names.
pub fn parse_state(value: Option<&FlexValue>) -> Result<TaskState, ValidationError> {
    let invalid = || ValidationError::new("Estado inválido");
    match value {
        None => Ok(TaskState::Pending),
        Some(FlexValue::Bool(true)) => Ok(TaskState::Completed),
        Some(FlexValue::Bool(false)) => Ok(TaskState::Pending),
        Some(FlexValue::Int(code)) => TaskState::from_code(*code).ok_or_else(invalid),
        Some(FlexValue::Text(text)) => {
            let text = text.trim().to_lowercase();
            match text.as_str() {
                "" | "pendiente" | "pending" | "false" | "off" => Ok(TaskState::Pending),
                "true" | "on" => Ok(TaskState::Completed),
                "en_progreso" | "en progreso" | "in_progress" => Ok(TaskState::InProgress),
                other if other.starts_with('c') => Ok(TaskState::Completed),
                other => other
                    .parse::<i64>()
                    .ok()
                    .and_then(TaskState::from_code)
                    .ok_or_else(invalid),
            }
        }
    }
}

pub fn task_draft(payload: &TaskPayload) -> Result<TaskDraft, ValidationError> {
    let nombre = check_text("El nombre", payload.nombre.as_deref(), MAX_NAME_LEN, true)?
        .unwrap_or_default();
    let descripcion = check_text(
        "La descripción",
        payload.descripcion.as_deref(),
        MAX_DESCRIPTION_LEN,
        false,
    )?;
    let fecha_limite = clean_optional(payload.fecha_limite.as_deref())
        .ok_or_else(|| ValidationError::new("Falta fecha_limite"))
        .and_then(|v| parse_date("Fecha límite", v))?;
    let hora_evento = optional_time("Hora", payload.hora_evento.as_deref())?;

    Ok(TaskDraft {
        nombre,
        descripcion,
        fecha_limite,
        hora_evento,
        prioridad: parse_priority(payload.prioridad.as_ref())?,
        estado: parse_state(payload.estado.as_ref())?,
    })
}

/// Shape check run before any credential lookup.
pub fn credentials_well_formed(username: &str, password: &str) -> bool {
    !username.is_empty()
        && !password.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && password.len() <= MAX_PASSWORD_LEN
        && USERNAME_RE.is_match(username)
}

pub fn check_new_account(username: &str, password: &str) -> Result<(), ValidationError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN || !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            "El usuario debe tener 1-50 caracteres: letras, números, _ - @ .",
        ));
    }
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ValidationError::new(format!(
            "La contraseña debe tener entre {MIN_PASSWORD_LEN} y {MAX_PASSWORD_LEN} caracteres"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(fields: &[(&str, &str)]) -> EventPayload {
        let mut payload = EventPayload::default();
        for (k, v) in fields {
            let v = Some(v.to_string());
            match *k {
                "nombre" => payload.nombre = v,
                "descripcion" => payload.descripcion = v,
                "fecha_evento" => payload.fecha_evento = v,
                "hora_evento" => payload.hora_evento = v,
                "fecha_fin" => payload.fecha_fin = v,
                "hora_fin" => payload.hora_fin = v,
                _ => unreachable!(),
            }
        }
        payload
    }

    #[test]
    fn event_requires_name_and_date() {
        assert!(event_draft(&event(&[("fecha_evento", "2025-06-01")])).is_err());
        assert!(event_draft(&event(&[("nombre", "Standup")])).is_err());
        let draft =
            event_draft(&event(&[("nombre", " Standup "), ("fecha_evento", "2025-06-01")])).unwrap();
        assert_eq!(draft.nombre, "Standup");
        assert_eq!(draft.hora_evento, None);
        assert_eq!(draft.descripcion, None);
    }

    #[test]
    fn event_end_must_be_strictly_after_start() {
        let same_instant = event(&[
            ("nombre", "a"),
            ("fecha_evento", "2025-06-01"),
            ("hora_evento", "09:00"),
            ("hora_fin", "09:00"),
        ]);
        assert!(event_draft(&same_instant).is_err());

        let earlier_day = event(&[
            ("nombre", "a"),
            ("fecha_evento", "2025-06-02"),
            ("fecha_fin", "2025-06-01"),
            ("hora_fin", "23:00"),
        ]);
        assert!(event_draft(&earlier_day).is_err());

        let ok = event(&[
            ("nombre", "a"),
            ("fecha_evento", "2025-06-01"),
            ("hora_evento", "09:00"),
            ("fecha_fin", "2025-06-01"),
            ("hora_fin", "09:15"),
        ]);
        assert!(event_draft(&ok).is_ok());
    }

    #[test]
    fn empty_and_null_optionals_are_absent() {
        let draft = event_draft(&event(&[
            ("nombre", "a"),
            ("fecha_evento", "2025-06-01"),
            ("fecha_fin", "null"),
            ("hora_fin", ""),
        ]))
        .unwrap();
        assert_eq!(draft.fecha_fin, None);
        assert_eq!(draft.hora_fin, None);
    }

    #[test]
    fn times_are_truncated_to_minutes() {
        let t = parse_time("Hora", "09:30:45").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(parse_time("Hora", "25:00").is_err());
        assert!(parse_time("Hora", "9h").is_err());
    }

    #[test]
    fn text_rejects_script_markers_and_control_chars() {
        assert!(check_text("x", Some("<SCRIPT>alert(1)"), 100, true).is_err());
        assert!(check_text("x", Some("a onclick = b"), 100, true).is_err());
        assert!(check_text("x", Some("bad\0byte"), 100, true).is_err());
        assert!(check_text("x", Some(&"a".repeat(101)), 100, true).is_err());
        assert_eq!(
            check_text("x", Some("línea 1\nlínea 2"), 100, true).unwrap().as_deref(),
            Some("línea 1\nlínea 2")
        );
    }

    #[test]
    fn state_accepts_boolean_like_values() {
        assert_eq!(parse_state(Some(&FlexValue::Bool(true))).unwrap(), TaskState::Completed);
        assert_eq!(parse_state(Some(&FlexValue::Int(0))).unwrap(), TaskState::Pending);
        assert_eq!(
            parse_state(Some(&FlexValue::Text("Completada".into()))).unwrap(),
            TaskState::Completed
        );
        assert_eq!(
            parse_state(Some(&FlexValue::Text("en_progreso".into()))).unwrap(),
            TaskState::InProgress
        );
        assert!(parse_state(Some(&FlexValue::Int(7))).is_err());
    }

    #[test]
    fn priority_accepts_levels_and_names() {
        assert_eq!(parse_priority(None).unwrap(), Priority::Low);
        assert_eq!(parse_priority(Some(&FlexValue::Text("2".into()))).unwrap(), Priority::Medium);
        assert_eq!(parse_priority(Some(&FlexValue::Text("alta".into()))).unwrap(), Priority::High);
        assert!(parse_priority(Some(&FlexValue::Int(0))).is_err());
    }

    #[test]
    fn task_due_date_accepts_overlay_alias() {
        let payload: TaskPayload = serde_json::from_value(serde_json::json!({
            "nombre": "Informe",
            "fecha_evento": "2025-06-09",
            "prioridad": 3,
            "estado": 1
        }))
        .unwrap();
        let draft = task_draft(&payload).unwrap();
        assert_eq!(draft.fecha_limite, NaiveDate::from_ymd_opt(2025, 6, 9).unwrap());
        assert_eq!(draft.prioridad, Priority::High);
        assert_eq!(draft.estado, TaskState::Completed);
    }

    #[test]
    fn account_rules() {
        assert!(credentials_well_formed("ana.perez@x", "pw"));
        assert!(!credentials_well_formed("ana perez", "pw"));
        assert!(check_new_account("ana", "short").is_err());
        assert!(check_new_account("ana", "long enough").is_ok());
        assert!(check_new_account(&"a".repeat(51), "long enough").is_err());
    }
}
