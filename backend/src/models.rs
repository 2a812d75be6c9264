use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Role level of a regular account.
pub const DEFAULT_ROLE: i16 = 1;
/// Highest tier; grants the admin pages and the retention endpoint.
pub const ADMIN_ROLE: i16 = 3;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: i16,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role >= ADMIN_ROLE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub fecha_evento: NaiveDate,
    #[serde(serialize_with = "serialize_hhmm")]
    pub hora_evento: Option<NaiveTime>,
    pub fecha_fin: Option<NaiveDate>,
    #[serde(serialize_with = "serialize_hhmm")]
    pub hora_fin: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn bounds(&self) -> (NaiveDateTime, Option<NaiveDateTime>) {
        event_bounds(self.fecha_evento, self.hora_evento, self.fecha_fin, self.hora_fin)
    }

    /// Last calendar day the event touches.
    #[cfg(test)]
    pub fn last_day(&self) -> NaiveDate {
        self.fecha_fin.unwrap_or(self.fecha_evento)
    }
}

/// Validated, normalized field set for creating or replacing an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub fecha_evento: NaiveDate,
    pub hora_evento: Option<NaiveTime>,
    pub fecha_fin: Option<NaiveDate>,
    pub hora_fin: Option<NaiveTime>,
}

/// Combines the split date/time columns into start and optional end instants.
///
/// A missing start time means midnight. An end with only a time ends on the
/// start date; an end with only a date reuses the start time.
pub fn event_bounds(
    fecha_evento: NaiveDate,
    hora_evento: Option<NaiveTime>,
    fecha_fin: Option<NaiveDate>,
    hora_fin: Option<NaiveTime>,
) -> (NaiveDateTime, Option<NaiveDateTime>) {
    let start_time = hora_evento.unwrap_or(NaiveTime::MIN);
    let start = fecha_evento.and_time(start_time);
    let end = match (fecha_fin, hora_fin) {
        (None, None) => None,
        (Some(date), None) => Some(date.and_time(start_time)),
        (None, Some(time)) => Some(fecha_evento.and_time(time)),
        (Some(date), Some(time)) => Some(date.and_time(time)),
    };
    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(i16)]
pub enum Priority {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Priority {
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Baja",
            Self::Medium => "Media",
            Self::High => "Alta",
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(*self as i16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(i16)]
pub enum TaskState {
    Pending = 0,
    Completed = 1,
    InProgress = 2,
}

impl TaskState {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Completed),
            2 => Some(Self::InProgress),
            _ => None,
        }
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Completed => "Completada",
            Self::InProgress => "En progreso",
        }
    }
}

impl Serialize for TaskState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(*self as i16)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub fecha_limite: NaiveDate,
    #[serde(serialize_with = "serialize_hhmm")]
    pub hora_evento: Option<NaiveTime>,
    pub prioridad: Priority,
    pub estado: TaskState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub fecha_limite: NaiveDate,
    pub hora_evento: Option<NaiveTime>,
    pub prioridad: Priority,
    pub estado: TaskState,
}

/// Completed versus total tasks due in a date window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub completadas: i64,
    pub total: i64,
}

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day.succ_opt().unwrap_or(NaiveDate::MAX),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    #[cfg(test)]
    pub fn overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        first < self.end && last >= self.start
    }
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn serialize_hhmm<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.serialize_str(&format_hhmm(*t)),
        None => serializer.serialize_none(),
    }
}
