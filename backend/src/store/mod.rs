//! Persistence boundary.
//!
//! Every event and task method is scoped by owner: a row that belongs to
//! another user behaves exactly like a missing row.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{DateRange, Event, EventDraft, Task, TaskDraft, TaskState, TaskSummary, User};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PlannerStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Returns `None` when the username is already taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: i16,
    ) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn count_users_with_role(&self, min_role: i16) -> Result<i64, StoreError>;

    /// Events ordered by start; with a range, only those overlapping it.
    async fn list_events(&self, owner: Uuid, range: Option<DateRange>) -> Result<Vec<Event>, StoreError>;
    async fn find_event(&self, owner: Uuid, id: Uuid) -> Result<Option<Event>, StoreError>;
    async fn insert_event(&self, owner: Uuid, draft: &EventDraft) -> Result<Event, StoreError>;
    async fn update_event(&self, owner: Uuid, id: Uuid, draft: &EventDraft) -> Result<Option<Event>, StoreError>;
    async fn delete_event(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;
    /// Events starting inside the range.
    async fn count_events_starting(&self, owner: Uuid, range: DateRange) -> Result<i64, StoreError>;

    /// Tasks ordered by due date; with a range, only those due inside it.
    async fn list_tasks(&self, owner: Uuid, range: Option<DateRange>) -> Result<Vec<Task>, StoreError>;
    async fn find_task(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError>;
    async fn insert_task(&self, owner: Uuid, draft: &TaskDraft) -> Result<Task, StoreError>;
    async fn update_task(&self, owner: Uuid, id: Uuid, draft: &TaskDraft) -> Result<Option<Task>, StoreError>;
    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;
    async fn set_task_state(&self, owner: Uuid, id: Uuid, state: TaskState) -> Result<Option<Task>, StoreError>;
    async fn task_summary(&self, owner: Uuid, range: DateRange) -> Result<TaskSummary, StoreError>;

    /// Bulk delete across all owners of events starting before `cutoff`.
    async fn delete_events_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError>;
    /// Bulk delete across all owners of tasks due before `cutoff`.
    async fn delete_tasks_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError>;
}
