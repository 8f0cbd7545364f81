use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Category, Frequency, NewTaskData, Task};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Series identity used to find the future siblings of an anchor.
///
/// Built from the anchor's pre-edit snapshot, so after an edit the lookup
/// still matches tasks carrying the old identity. Generated occurrences are
/// siblings, not children: there is no persisted parent link, membership is
/// this value match plus a strictly later due date.
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingQuery {
    pub title: String,
    pub frequency: Frequency,
    pub recurrence_end: DateTime<Utc>,
    pub category: Category,
    pub user_id: Option<Uuid>,
    /// Matches tasks with `due_at` strictly greater than this.
    pub due_after: DateTime<Utc>,
}

impl SiblingQuery {
    /// Identity of `anchor`'s series as the given snapshot records it.
    pub fn for_series_of(anchor: &Task) -> Self {
        Self {
            title: anchor.title.clone(),
            frequency: anchor.frequency,
            recurrence_end: anchor.recurrence_end,
            category: anchor.category,
            user_id: anchor.user_id,
            due_after: anchor.due_at,
        }
    }
}

/// Abstract task store consumed by the engine.
///
/// Implementations hand out transactional sessions; every engine entry
/// point runs inside exactly one session, committing on success and rolling
/// back on every error path.
#[async_trait]
pub trait TaskStore: Send + Sync {
    type Tx: TaskTx;

    /// Opens a transaction. Dropping the session without committing rolls
    /// it back.
    async fn begin(&self) -> Result<Self::Tx, CoreError>;
}

/// One transactional session against the store.
#[async_trait]
pub trait TaskTx: Send {
    /// Persists a new task and returns the stored row.
    async fn create(&mut self, data: NewTaskData) -> Result<Task, CoreError>;

    /// Fetches a task by id.
    async fn get(&mut self, id: Uuid) -> Result<Option<Task>, CoreError>;

    /// Returns the tasks matching `query`, ordered by ascending due date.
    async fn find(&mut self, query: &SiblingQuery) -> Result<Vec<Task>, CoreError>;

    /// Writes every mutable field of `task` back to the store.
    async fn save(&mut self, task: &Task) -> Result<(), CoreError>;

    /// Deletes a task, reporting whether a row existed.
    async fn delete(&mut self, id: Uuid) -> Result<bool, CoreError>;

    /// Commits the session.
    async fn commit(self) -> Result<(), CoreError>;
}
