//! Combined calendar feed of events and tasks.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::verify_session,
    clock::render_local,
    error::AppError,
    models::{DateRange, Event, Priority, Task},
    AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemKind {
    #[serde(rename = "evento")]
    Event,
    #[serde(rename = "tarea")]
    Task,
}

/// One calendar entry. `kind` + `id` identify the underlying row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub kind: ItemKind,
    pub id: Uuid,
    pub title: String,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(rename = "allDay")]
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl FeedItem {
    pub fn from_event(event: &Event, tz: Tz) -> Self {
        let all_day = event.hora_evento.is_none() && event.hora_fin.is_none();
        let (start, end) = if all_day {
            // All-day ends are exclusive, so a last day of June 3 ends on June 4.
            let end = event
                .fecha_fin
                .and_then(|last| last.checked_add_days(Days::new(1)))
                .map(|d| d.to_string());
            (event.fecha_evento.to_string(), end)
        } else {
            let (start, end) = event.bounds();
            (render_local(tz, start), end.map(|e| render_local(tz, e)))
        };

        Self {
            kind: ItemKind::Event,
            id: event.id,
            title: event.nombre.clone(),
            start,
            end,
            all_day,
            description: event.descripcion.clone(),
            completed: None,
            priority: None,
        }
    }

    pub fn from_task(task: &Task, tz: Tz) -> Self {
        let start = match task.hora_evento {
            Some(time) => render_local(tz, task.fecha_limite.and_time(time)),
            None => task.fecha_limite.to_string(),
        };

        Self {
            kind: ItemKind::Task,
            id: task.id,
            title: task.nombre.clone(),
            start,
            end: None,
            all_day: task.hora_evento.is_none(),
            description: task.descripcion.clone(),
            completed: Some(task.estado.is_completed()),
            priority: Some(task.prioridad),
        }
    }
}

pub fn build_feed(events: &[Event], tasks: &[Task], tz: Tz) -> Vec<FeedItem> {
    events
        .iter()
        .map(|e| FeedItem::from_event(e, tz))
        .chain(tasks.iter().map(|t| FeedItem::from_task(t, tz)))
        .collect()
}

/// Range parameters as sent by the calendar widget; only the date part is used.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl FeedQuery {
    pub fn range(&self) -> Option<DateRange> {
        let parse = |raw: &Option<String>| {
            raw.as_deref()
                .and_then(|s| s.get(..10))
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        DateRange::new(parse(&self.start)?, parse(&self.end)?)
    }
}

pub async fn calendar_feed(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedItem>>, AppError> {
    let auth_state = verify_session(&headers, &state).await?;
    let range = query.range();

    let events = state.store.list_events(auth_state.user_id, range).await?;
    let tasks = state.store.list_tasks(auth_state.user_id, range).await?;

    Ok(Json(build_feed(&events, &tasks, state.config.timezone)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskState;
    use chrono::{NaiveTime, Utc};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn hm(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn event(hora: Option<NaiveTime>, fecha_fin: Option<NaiveDate>, hora_fin: Option<NaiveTime>) -> Event {
        Event {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            nombre: "Standup".into(),
            descripcion: None,
            fecha_evento: date("2025-06-01"),
            hora_evento: hora,
            fecha_fin,
            hora_fin,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn timed_event_renders_zone_offsets() {
        let item = FeedItem::from_event(&event(hm(9, 0), None, hm(9, 30)), chrono_tz::Europe::Madrid);
        assert_eq!(item.kind, ItemKind::Event);
        assert_eq!(item.start, "2025-06-01T09:00:00+02:00");
        assert_eq!(item.end.as_deref(), Some("2025-06-01T09:30:00+02:00"));
        assert!(!item.all_day);
    }

    #[test]
    fn all_day_event_end_is_exclusive() {
        let item = FeedItem::from_event(
            &event(None, Some(date("2025-06-03")), None),
            chrono_tz::UTC,
        );
        assert!(item.all_day);
        assert_eq!(item.start, "2025-06-01");
        assert_eq!(item.end.as_deref(), Some("2025-06-04"));
    }

    #[test]
    fn tasks_are_tagged_separately_from_events() {
        let task = Task {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            nombre: "Informe".into(),
            descripcion: None,
            fecha_limite: date("2025-06-09"),
            hora_evento: None,
            prioridad: Priority::High,
            estado: TaskState::Completed,
            created_at: Utc::now(),
        };
        let feed = build_feed(&[event(hm(9, 0), None, None)], &[task.clone()], chrono_tz::UTC);
        assert_eq!(feed.len(), 2);

        let json = serde_json::to_value(&feed[1]).unwrap();
        assert_eq!(json["kind"], "tarea");
        assert_eq!(json["id"], task.id.to_string());
        assert_eq!(json["completed"], true);
        assert_eq!(json["priority"], 3);
        assert_eq!(json["allDay"], true);

        let json = serde_json::to_value(&feed[0]).unwrap();
        assert_eq!(json["kind"], "evento");
        assert!(json.get("completed").is_none());
    }

    #[test]
    fn query_range_uses_date_prefix() {
        let query = FeedQuery {
            start: Some("2025-06-01T00:00:00+02:00".into()),
            end: Some("2025-07-13T00:00:00+02:00".into()),
        };
        let range = query.range().unwrap();
        assert_eq!(range.start, date("2025-06-01"));
        assert_eq!(range.end, date("2025-07-13"));
        assert!(FeedQuery::default().range().is_none());
    }
}
