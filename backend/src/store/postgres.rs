use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use super::{PlannerStore, StoreError};
use crate::models::{DateRange, Event, EventDraft, Task, TaskDraft, TaskState, TaskSummary, User};

const EVENT_COLUMNS: &str =
    "id, owner_id, nombre, descripcion, fecha_evento, hora_evento, fecha_fin, hora_fin, created_at";
const TASK_COLUMNS: &str =
    "id, owner_id, nombre, descripcion, fecha_limite, hora_evento, prioridad, estado, created_at";
const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl PlannerStore for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: i16,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, password_hash, role) VALUES ($1, $2, $3, $4)
             ON CONFLICT (username) DO NOTHING
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn count_users_with_role(&self, min_role: i16) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role >= $1")
            .bind(min_role)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn list_events(&self, owner: Uuid, range: Option<DateRange>) -> Result<Vec<Event>, StoreError> {
        let events = match range {
            None => {
                sqlx::query_as::<_, Event>(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE owner_id = $1
                     ORDER BY fecha_evento ASC, hora_evento ASC NULLS FIRST"
                ))
                .bind(owner)
                .fetch_all(&self.db)
                .await?
            }
            Some(range) => {
                sqlx::query_as::<_, Event>(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE owner_id = $1 AND fecha_evento < $3 AND COALESCE(fecha_fin, fecha_evento) >= $2
                     ORDER BY fecha_evento ASC, hora_evento ASC NULLS FIRST"
                ))
                .bind(owner)
                .bind(range.start)
                .bind(range.end)
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(events)
    }

    async fn find_event(&self, owner: Uuid, id: Uuid) -> Result<Option<Event>, StoreError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        Ok(event)
    }

    async fn insert_event(&self, owner: Uuid, draft: &EventDraft) -> Result<Event, StoreError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events (id, owner_id, nombre, descripcion, fecha_evento, hora_evento, fecha_fin, hora_fin)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&draft.nombre)
        .bind(&draft.descripcion)
        .bind(draft.fecha_evento)
        .bind(draft.hora_evento)
        .bind(draft.fecha_fin)
        .bind(draft.hora_fin)
        .fetch_one(&self.db)
        .await?;
        Ok(event)
    }

    async fn update_event(&self, owner: Uuid, id: Uuid, draft: &EventDraft) -> Result<Option<Event>, StoreError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "UPDATE events
             SET nombre = $3, descripcion = $4, fecha_evento = $5, hora_evento = $6, fecha_fin = $7, hora_fin = $8
             WHERE id = $1 AND owner_id = $2
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .bind(&draft.nombre)
        .bind(&draft.descripcion)
        .bind(draft.fecha_evento)
        .bind(draft.hora_evento)
        .bind(draft.fecha_fin)
        .bind(draft.hora_fin)
        .fetch_optional(&self.db)
        .await?;
        Ok(event)
    }

    async fn delete_event(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM events WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn count_events_starting(&self, owner: Uuid, range: DateRange) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM events WHERE owner_id = $1 AND fecha_evento >= $2 AND fecha_evento < $3",
        )
        .bind(owner)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn list_tasks(&self, owner: Uuid, range: Option<DateRange>) -> Result<Vec<Task>, StoreError> {
        let tasks = match range {
            None => {
                sqlx::query_as::<_, Task>(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = $1
                     ORDER BY fecha_limite ASC, hora_evento ASC NULLS FIRST, prioridad DESC"
                ))
                .bind(owner)
                .fetch_all(&self.db)
                .await?
            }
            Some(range) => {
                sqlx::query_as::<_, Task>(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE owner_id = $1 AND fecha_limite >= $2 AND fecha_limite < $3
                     ORDER BY fecha_limite ASC, hora_evento ASC NULLS FIRST, prioridad DESC"
                ))
                .bind(owner)
                .bind(range.start)
                .bind(range.end)
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(tasks)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }

    async fn insert_task(&self, owner: Uuid, draft: &TaskDraft) -> Result<Task, StoreError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, owner_id, nombre, descripcion, fecha_limite, hora_evento, prioridad, estado)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&draft.nombre)
        .bind(&draft.descripcion)
        .bind(draft.fecha_limite)
        .bind(draft.hora_evento)
        .bind(draft.prioridad)
        .bind(draft.estado)
        .fetch_one(&self.db)
        .await?;
        Ok(task)
    }

    async fn update_task(&self, owner: Uuid, id: Uuid, draft: &TaskDraft) -> Result<Option<Task>, StoreError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks
             SET nombre = $3, descripcion = $4, fecha_limite = $5, hora_evento = $6, prioridad = $7, estado = $8
             WHERE id = $1 AND owner_id = $2
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .bind(&draft.nombre)
        .bind(&draft.descripcion)
        .bind(draft.fecha_limite)
        .bind(draft.hora_evento)
        .bind(draft.prioridad)
        .bind(draft.estado)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }

    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM tasks WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn set_task_state(&self, owner: Uuid, id: Uuid, state: TaskState) -> Result<Option<Task>, StoreError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET estado = $3 WHERE id = $1 AND owner_id = $2 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .bind(state)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }

    async fn task_summary(&self, owner: Uuid, range: DateRange) -> Result<TaskSummary, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) FILTER (WHERE estado = 1) AS completadas, COUNT(*) AS total
             FROM tasks WHERE owner_id = $1 AND fecha_limite >= $2 AND fecha_limite < $3",
        )
        .bind(owner)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.db)
        .await?;

        Ok(TaskSummary {
            completadas: row.try_get("completadas")?,
            total: row.try_get("total")?,
        })
    }

    async fn delete_events_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        let deleted = sqlx::query("DELETE FROM events WHERE fecha_evento < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;
        Ok(deleted.rows_affected())
    }

    async fn delete_tasks_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        let deleted = sqlx::query("DELETE FROM tasks WHERE fecha_limite < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;
        Ok(deleted.rows_affected())
    }
}
