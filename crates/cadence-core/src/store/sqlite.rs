use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{SiblingQuery, TaskStore, TaskTx};
use crate::error::CoreError;
use crate::models::{NewTaskData, Task};

/// Production store backed by SQLite through sqlx. Cheap to clone; all
/// clones share the underlying pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub struct SqliteTx {
    inner: Transaction<'static, Sqlite>,
}

#[async_trait]
impl TaskStore for SqliteStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<SqliteTx, CoreError> {
        Ok(SqliteTx {
            inner: self.pool.begin().await?,
        })
    }
}

#[async_trait]
impl TaskTx for SqliteTx {
    async fn create(&mut self, data: NewTaskData) -> Result<Task, CoreError> {
        let task = Task::from_new(data);
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, title, description, location, due_at, frequency,
                recurrence_end, priority, category, course_id, activity_id,
                user_id, completed, progress, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.location)
        .bind(task.due_at)
        .bind(task.frequency)
        .bind(task.recurrence_end)
        .bind(task.priority)
        .bind(task.category)
        .bind(task.course_id)
        .bind(task.activity_id)
        .bind(task.user_id)
        .bind(task.completed)
        .bind(task.progress)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *self.inner)
        .await?;
        Ok(task)
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await?;
        Ok(task)
    }

    async fn find(&mut self, query: &SiblingQuery) -> Result<Vec<Task>, CoreError> {
        // `IS` instead of `=` so a NULL owner matches other NULL owners.
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT * FROM tasks
            WHERE title = $1
              AND frequency = $2
              AND recurrence_end = $3
              AND category = $4
              AND user_id IS $5
              AND due_at > $6
            ORDER BY due_at, id
            "#,
        )
        .bind(&query.title)
        .bind(query.frequency)
        .bind(query.recurrence_end)
        .bind(query.category)
        .bind(query.user_id)
        .bind(query.due_after)
        .fetch_all(&mut *self.inner)
        .await?;
        Ok(tasks)
    }

    async fn save(&mut self, task: &Task) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE tasks SET
                title = $1, description = $2, location = $3, due_at = $4,
                frequency = $5, recurrence_end = $6, priority = $7,
                category = $8, course_id = $9, activity_id = $10,
                user_id = $11, completed = $12, progress = $13,
                updated_at = $14
            WHERE id = $15
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.location)
        .bind(task.due_at)
        .bind(task.frequency)
        .bind(task.recurrence_end)
        .bind(task.priority)
        .bind(task.category)
        .bind(task.course_id)
        .bind(task.activity_id)
        .bind(task.user_id)
        .bind(task.completed)
        .bind(task.progress)
        .bind(task.updated_at)
        .bind(task.id)
        .execute(&mut *self.inner)
        .await?;
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *self.inner)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<(), CoreError> {
        self.inner.commit().await?;
        Ok(())
    }
}
