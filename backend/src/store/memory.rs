//! In-process store used by the handler tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PlannerStore, StoreError};
use crate::models::{DateRange, Event, EventDraft, Task, TaskDraft, TaskState, TaskSummary, User};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    events: RwLock<Vec<Event>>,
    tasks: RwLock<Vec<Task>>,
    fail_task_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every task mutation fail as if the database were unreachable.
    pub fn fail_task_writes(&self, fail: bool) {
        self.fail_task_writes.store(fail, Ordering::SeqCst);
    }

    fn check_task_writes(&self) -> Result<(), StoreError> {
        if self.fail_task_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("task table offline".into()));
        }
        Ok(())
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

fn event_from(id: Uuid, owner: Uuid, draft: &EventDraft) -> Event {
    Event {
        id,
        owner_id: owner,
        nombre: draft.nombre.clone(),
        descripcion: draft.descripcion.clone(),
        fecha_evento: draft.fecha_evento,
        hora_evento: draft.hora_evento,
        fecha_fin: draft.fecha_fin,
        hora_fin: draft.hora_fin,
        created_at: Utc::now(),
    }
}

fn task_from(id: Uuid, owner: Uuid, draft: &TaskDraft) -> Task {
    Task {
        id,
        owner_id: owner,
        nombre: draft.nombre.clone(),
        descripcion: draft.descripcion.clone(),
        fecha_limite: draft.fecha_limite,
        hora_evento: draft.hora_evento,
        prioridad: draft.prioridad,
        estado: draft.estado,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl PlannerStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: i16,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == username) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users = self.users.read().await.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn count_users_with_role(&self, min_role: i16) -> Result<i64, StoreError> {
        Ok(self.users.read().await.iter().filter(|u| u.role >= min_role).count() as i64)
    }

    async fn list_events(&self, owner: Uuid, range: Option<DateRange>) -> Result<Vec<Event>, StoreError> {
        let mut events: Vec<Event> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.owner_id == owner)
            .filter(|e| range.map_or(true, |r| r.overlaps(e.fecha_evento, e.last_day())))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.fecha_evento, e.hora_evento));
        Ok(events)
    }

    async fn find_event(&self, owner: Uuid, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .find(|e| e.id == id && e.owner_id == owner)
            .cloned())
    }

    async fn insert_event(&self, owner: Uuid, draft: &EventDraft) -> Result<Event, StoreError> {
        let event = event_from(Uuid::new_v4(), owner, draft);
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, owner: Uuid, id: Uuid, draft: &EventDraft) -> Result<Option<Event>, StoreError> {
        let mut events = self.events.write().await;
        let Some(slot) = events.iter_mut().find(|e| e.id == id && e.owner_id == owner) else {
            return Ok(None);
        };
        let created_at = slot.created_at;
        *slot = Event {
            created_at,
            ..event_from(id, owner, draft)
        };
        Ok(Some(slot.clone()))
    }

    async fn delete_event(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| !(e.id == id && e.owner_id == owner));
        Ok(events.len() < before)
    }

    async fn count_events_starting(&self, owner: Uuid, range: DateRange) -> Result<i64, StoreError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.owner_id == owner && range.contains(e.fecha_evento))
            .count() as i64)
    }

    async fn list_tasks(&self, owner: Uuid, range: Option<DateRange>) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.owner_id == owner)
            .filter(|t| range.map_or(true, |r| r.contains(t.fecha_limite)))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.fecha_limite, t.hora_evento));
        Ok(tasks)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == id && t.owner_id == owner)
            .cloned())
    }

    async fn insert_task(&self, owner: Uuid, draft: &TaskDraft) -> Result<Task, StoreError> {
        self.check_task_writes()?;
        let task = task_from(Uuid::new_v4(), owner, draft);
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, owner: Uuid, id: Uuid, draft: &TaskDraft) -> Result<Option<Task>, StoreError> {
        self.check_task_writes()?;
        let mut tasks = self.tasks.write().await;
        let Some(slot) = tasks.iter_mut().find(|t| t.id == id && t.owner_id == owner) else {
            return Ok(None);
        };
        let created_at = slot.created_at;
        *slot = Task {
            created_at,
            ..task_from(id, owner, draft)
        };
        Ok(Some(slot.clone()))
    }

    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        self.check_task_writes()?;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| !(t.id == id && t.owner_id == owner));
        Ok(tasks.len() < before)
    }

    async fn set_task_state(&self, owner: Uuid, id: Uuid, state: TaskState) -> Result<Option<Task>, StoreError> {
        self.check_task_writes()?;
        let mut tasks = self.tasks.write().await;
        Ok(tasks
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner)
            .map(|t| {
                t.estado = state;
                t.clone()
            }))
    }

    async fn task_summary(&self, owner: Uuid, range: DateRange) -> Result<TaskSummary, StoreError> {
        let tasks = self.tasks.read().await;
        let in_range = tasks
            .iter()
            .filter(|t| t.owner_id == owner && range.contains(t.fecha_limite));
        let mut summary = TaskSummary::default();
        for task in in_range {
            summary.total += 1;
            if task.estado.is_completed() {
                summary.completadas += 1;
            }
        }
        Ok(summary)
    }

    async fn delete_events_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| e.fecha_evento >= cutoff);
        Ok((before - events.len()) as u64)
    }

    async fn delete_tasks_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        self.check_task_writes()?;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| t.fecha_limite >= cutoff);
        Ok((before - tasks.len()) as u64)
    }
}
