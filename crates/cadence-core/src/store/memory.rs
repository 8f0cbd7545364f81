use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{SiblingQuery, TaskStore, TaskTx};
use crate::error::CoreError;
use crate::models::{NewTaskData, Task};

/// In-memory store for tests and lightweight embedding.
///
/// Transactions work on a snapshot copy of the map and commit by swapping
/// the copy in wholesale, so concurrent sessions are last-commit-wins
/// rather than isolated. Good enough for its intended single-session use.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tasks: Arc<Mutex<HashMap<Uuid, Task>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed contents ordered by due date, for assertions.
    pub fn snapshot(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
        all
    }
}

pub struct MemoryTx {
    shared: Arc<Mutex<HashMap<Uuid, Task>>>,
    working: HashMap<Uuid, Task>,
}

#[async_trait]
impl TaskStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, CoreError> {
        let working = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(MemoryTx {
            shared: Arc::clone(&self.tasks),
            working,
        })
    }
}

#[async_trait]
impl TaskTx for MemoryTx {
    async fn create(&mut self, data: NewTaskData) -> Result<Task, CoreError> {
        let task = Task::from_new(data);
        self.working.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Task>, CoreError> {
        Ok(self.working.get(&id).cloned())
    }

    async fn find(&mut self, query: &SiblingQuery) -> Result<Vec<Task>, CoreError> {
        let mut matches: Vec<Task> = self
            .working
            .values()
            .filter(|task| {
                task.title == query.title
                    && task.frequency == query.frequency
                    && task.recurrence_end == query.recurrence_end
                    && task.category == query.category
                    && task.user_id == query.user_id
                    && task.due_at > query.due_after
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn save(&mut self, task: &Task) -> Result<(), CoreError> {
        self.working.insert(task.id, task.clone());
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> Result<bool, CoreError> {
        Ok(self.working.remove(&id).is_some())
    }

    async fn commit(self) -> Result<(), CoreError> {
        *self.shared.lock().unwrap_or_else(PoisonError::into_inner) = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use crate::models::{Category, Frequency};

    fn new_task(title: &str, offset_days: i64) -> NewTaskData {
        NewTaskData {
            title: title.to_string(),
            due_at: Utc.with_ymd_and_hms(2020, 3, 16, 5, 0, 0).unwrap()
                + Duration::days(offset_days),
            frequency: Frequency::Weekly,
            recurrence_end: Utc.with_ymd_and_hms(2020, 4, 6, 5, 0, 0).unwrap(),
            category: Category::Academics,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn commit_publishes_and_drop_rolls_back() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create(new_task("kept", 0)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.snapshot().len(), 1);

        let mut tx = store.begin().await.unwrap();
        tx.create(new_task("discarded", 1)).await.unwrap();
        drop(tx);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn find_matches_identity_and_orders_by_due_date() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let anchor = tx.create(new_task("seminar", 0)).await.unwrap();
        tx.create(new_task("seminar", 14)).await.unwrap();
        tx.create(new_task("seminar", 7)).await.unwrap();
        tx.create(new_task("unrelated", 7)).await.unwrap();

        let siblings = tx
            .find(&SiblingQuery::for_series_of(&anchor))
            .await
            .unwrap();
        assert_eq!(siblings.len(), 2);
        assert!(siblings[0].due_at < siblings[1].due_at);
        assert!(siblings.iter().all(|t| t.title == "seminar"));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let task = tx.create(new_task("once", 0)).await.unwrap();
        assert!(tx.delete(task.id).await.unwrap());
        assert!(!tx.delete(task.id).await.unwrap());
    }
}
