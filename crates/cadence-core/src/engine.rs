use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::diff::EditDiff;
use crate::error::CoreError;
use crate::models::{EditOutcome, NewTaskData, PropagationMode, Priority, Task, TaskEdit};
use crate::notify::{NoopNotifier, Notifier};
use crate::recurrence;
use crate::store::{SiblingQuery, TaskStore, TaskTx};

/// Engine-level knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long before an occurrence's due time its notification goes out.
    pub notification_lead: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notification_lead: Duration::hours(1),
        }
    }
}

/// The recurrence engine: expands an anchor task into its series and keeps
/// that series consistent through edits and resets.
///
/// Every entry point acquires one store transaction and holds it for the
/// whole read-compute-mutate sequence; an error rolls the session back, so
/// no partial series or half-propagated edit survives.
pub struct RecurrenceEngine<S> {
    store: S,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<S: TaskStore> RecurrenceEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            notifier: Arc::new(NoopNotifier),
            config,
        }
    }

    /// Replaces the notification collaborator.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a new task; for a recurring one the whole series is
    /// materialized inside the same transaction.
    ///
    /// # Behavior
    /// - `progress` outside 0..=100 is rejected up front.
    /// - A missing priority is derived from due-date proximity.
    /// - An end boundary earlier than the due date creates the anchor with
    ///   zero siblings: a valid "recurs but already past its end" state.
    /// - The anchor and each sibling get a notification scheduled at
    ///   `due_at` minus the configured lead.
    pub async fn create_task(&self, mut data: NewTaskData) -> Result<Task, CoreError> {
        validate_progress(data.progress)?;
        if data.priority.is_none() {
            data.priority = Some(Priority::for_due_proximity(data.due_at, Utc::now()));
        }

        let mut tx = self.store.begin().await?;
        let anchor = tx.create(data).await?;
        self.notifier
            .schedule(anchor.id, anchor.due_at - self.config.notification_lead);

        let siblings = if anchor.is_recurring() {
            self.materialize_into(&mut tx, &anchor).await?.len()
        } else {
            0
        };
        tx.commit().await?;

        debug!(task = %anchor.id, frequency = %anchor.frequency, siblings, "task created");
        Ok(anchor)
    }

    /// Materializes the series of an existing anchor: one new record per
    /// computed offset, created in increasing due-date order.
    ///
    /// Not idempotent by design: calling it twice duplicates the series.
    /// The create and edit flows invoke it exactly once per transition into
    /// a recurring state; external callers carry the same responsibility.
    pub async fn materialize_series(&self, anchor_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let mut tx = self.store.begin().await?;
        let anchor = Self::fetch_anchor(&mut tx, anchor_id).await?;
        let siblings = self.materialize_into(&mut tx, &anchor).await?;
        tx.commit().await?;
        Ok(siblings)
    }

    /// Applies a submitted edit to an anchor.
    ///
    /// # Behavior
    /// - `ThisOccurrence` persists the edit and leaves the series alone.
    /// - `WholeSeries` diffs the submitted fields against the stored state,
    ///   finds the future siblings still matching the pre-edit series
    ///   identity, and copies each changed non-date field onto them. When
    ///   the due date, frequency, or end boundary changed, those siblings
    ///   are discarded and the series regenerated from the anchor's new
    ///   values.
    /// - Siblings keep their own staggered due dates; date-affecting
    ///   changes never fan out by direct copy.
    /// - A sibling that disappeared since the candidate lookup is skipped;
    ///   a missing anchor aborts with `NotFound` before any mutation.
    pub async fn apply_edit(
        &self,
        anchor_id: Uuid,
        edit: TaskEdit,
        mode: PropagationMode,
    ) -> Result<EditOutcome, CoreError> {
        if let Some(progress) = edit.progress {
            validate_progress(progress)?;
        }

        let mut tx = self.store.begin().await?;
        let snapshot = Self::fetch_anchor(&mut tx, anchor_id).await?;
        let mut anchor = snapshot.clone();
        edit.apply_to(&mut anchor);
        let diff = EditDiff::between(&snapshot, &anchor);

        if mode == PropagationMode::ThisOccurrence {
            tx.save(&anchor).await?;
            tx.commit().await?;
            return Ok(EditOutcome::Single(anchor));
        }

        if diff.is_empty() {
            tx.save(&anchor).await?;
            tx.commit().await?;
            return Ok(EditOutcome::Unchanged(anchor));
        }

        // The candidate set is matched against the pre-edit snapshot:
        // siblings still carry the old identity values at this point.
        let candidates = tx.find(&SiblingQuery::for_series_of(&snapshot)).await?;
        tx.save(&anchor).await?;

        debug!(
            anchor = %anchor.id,
            changed = ?diff.changed_fields(),
            candidates = candidates.len(),
            "propagating series edit"
        );

        let mut siblings_updated = 0;
        if diff.affects_content() {
            for candidate in &candidates {
                match tx.get(candidate.id).await? {
                    Some(mut sibling) => {
                        diff.apply_content_to(&anchor, &mut sibling);
                        tx.save(&sibling).await?;
                        siblings_updated += 1;
                    }
                    // Deleted since the lookup: already gone, skip.
                    None => continue,
                }
            }
        }

        let mut siblings_regenerated = 0;
        if diff.affects_schedule() {
            for candidate in &candidates {
                tx.delete(candidate.id).await?;
            }
            siblings_regenerated = self.materialize_into(&mut tx, &anchor).await?.len();
        }

        tx.commit().await?;
        Ok(EditOutcome::Series {
            anchor,
            siblings_updated,
            siblings_regenerated,
        })
    }

    /// Discards the future siblings of an anchor's series and materializes
    /// them afresh from the anchor's current field values, so the series is
    /// always regenerated from one authoritative state instead of patched
    /// incrementally. Returns the new siblings.
    ///
    /// A non-recurring anchor is a no-op: it owns no derived instances.
    pub async fn reset_recurrence(&self, anchor_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let mut tx = self.store.begin().await?;
        let anchor = Self::fetch_anchor(&mut tx, anchor_id).await?;
        if !anchor.is_recurring() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let stale = tx.find(&SiblingQuery::for_series_of(&anchor)).await?;
        for task in &stale {
            tx.delete(task.id).await?;
        }
        let fresh = self.materialize_into(&mut tx, &anchor).await?;
        tx.commit().await?;

        debug!(anchor = %anchor_id, deleted = stale.len(), created = fresh.len(), "series reset");
        Ok(fresh)
    }

    async fn fetch_anchor(tx: &mut S::Tx, anchor_id: Uuid) -> Result<Task, CoreError> {
        tx.get(anchor_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", anchor_id)))
    }

    /// Creates the occurrence records for `anchor` inside `tx` and
    /// schedules a notification for each.
    async fn materialize_into(&self, tx: &mut S::Tx, anchor: &Task) -> Result<Vec<Task>, CoreError> {
        let dates =
            recurrence::occurrence_dates(anchor.due_at, anchor.recurrence_end, anchor.frequency)?;
        let mut created = Vec::with_capacity(dates.len());
        for due_at in dates {
            let sibling = tx.create(NewTaskData::occurrence_of(anchor, due_at)).await?;
            self.notifier
                .schedule(sibling.id, sibling.due_at - self.config.notification_lead);
            created.push(sibling);
        }
        debug!(
            anchor = %anchor.id,
            frequency = %anchor.frequency,
            created = created.len(),
            "series materialized"
        );
        Ok(created)
    }
}

fn validate_progress(progress: i32) -> Result<(), CoreError> {
    if !(0..=100).contains(&progress) {
        return Err(CoreError::InvalidInput(format!(
            "progress must be between 0 and 100, got {}",
            progress
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Frequency};
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone};
    use std::sync::Mutex;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn weekly_anchor() -> NewTaskData {
        NewTaskData {
            title: "Lab report".to_string(),
            description: "Writeup for the week's experiment".to_string(),
            location: "Thornton Hall".to_string(),
            due_at: dt(2020, 3, 16, 5, 0),
            frequency: Frequency::Weekly,
            recurrence_end: dt(2020, 4, 6, 5, 0),
            category: Category::Academics,
            ..Default::default()
        }
    }

    fn engine_on(store: &MemoryStore) -> RecurrenceEngine<MemoryStore> {
        RecurrenceEngine::new(store.clone())
    }

    #[derive(Default)]
    struct RecordingNotifier {
        scheduled: Mutex<Vec<(Uuid, DateTime<Utc>)>>,
    }

    impl Notifier for RecordingNotifier {
        fn schedule(&self, task_id: Uuid, send_at: DateTime<Utc>) {
            self.scheduled.lock().unwrap().push((task_id, send_at));
        }
    }

    #[tokio::test]
    async fn non_recurring_task_creates_no_siblings() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);

        let data = NewTaskData {
            frequency: Frequency::Never,
            ..weekly_anchor()
        };
        engine.create_task(data).await.unwrap();
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn recurring_task_materializes_its_series_on_creation() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);

        let anchor = engine.create_task(weekly_anchor()).await.unwrap();
        let all = store.snapshot();
        assert_eq!(all.len(), 4);

        let siblings: Vec<&Task> = all.iter().filter(|t| t.id != anchor.id).collect();
        for (i, sibling) in siblings.iter().enumerate() {
            assert_eq!(sibling.title, anchor.title);
            assert_eq!(sibling.description, anchor.description);
            assert_eq!(sibling.location, anchor.location);
            assert_eq!(sibling.frequency, anchor.frequency);
            assert_eq!(sibling.recurrence_end, anchor.recurrence_end);
            assert_eq!(sibling.category, anchor.category);
            assert_eq!(sibling.due_at, anchor.due_at + Duration::weeks(i as i64 + 1));
            assert!(!sibling.completed);
            assert_eq!(sibling.progress, 0);
        }
    }

    #[tokio::test]
    async fn creation_past_the_end_boundary_yields_bare_anchor() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);

        let data = NewTaskData {
            recurrence_end: dt(2020, 3, 1, 5, 0),
            ..weekly_anchor()
        };
        let anchor = engine.create_task(data).await.unwrap();
        assert!(anchor.is_recurring());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn notifications_are_scheduled_one_hour_before_due() {
        let store = MemoryStore::new();
        let recorder = Arc::new(RecordingNotifier::default());
        let engine = engine_on(&store).with_notifier(recorder.clone());

        engine.create_task(weekly_anchor()).await.unwrap();

        let scheduled = recorder.scheduled.lock().unwrap();
        assert_eq!(scheduled.len(), 4);
        let by_id: std::collections::HashMap<Uuid, DateTime<Utc>> =
            scheduled.iter().cloned().collect();
        for task in store.snapshot() {
            assert_eq!(by_id[&task.id], task.due_at - Duration::hours(1));
        }
    }

    #[tokio::test]
    async fn single_occurrence_edit_leaves_the_series_untouched() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let anchor = engine.create_task(weekly_anchor()).await.unwrap();

        let edit = TaskEdit {
            title: Some("Lab report (final)".to_string()),
            ..Default::default()
        };
        let outcome = engine
            .apply_edit(anchor.id, edit, PropagationMode::ThisOccurrence)
            .await
            .unwrap();

        assert!(matches!(outcome, EditOutcome::Single(_)));
        let renamed: Vec<Task> = store
            .snapshot()
            .into_iter()
            .filter(|t| t.title == "Lab report (final)")
            .collect();
        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed[0].id, anchor.id);
    }

    #[tokio::test]
    async fn series_edit_without_changes_is_a_noop() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let anchor = engine.create_task(weekly_anchor()).await.unwrap();
        let before = store.snapshot();

        let edit = TaskEdit {
            title: Some(anchor.title.clone()),
            location: Some(anchor.location.clone()),
            ..Default::default()
        };
        let outcome = engine
            .apply_edit(anchor.id, edit, PropagationMode::WholeSeries)
            .await
            .unwrap();

        assert!(matches!(outcome, EditOutcome::Unchanged(_)));
        let after = store.snapshot();
        assert_eq!(after.len(), before.len());
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.due_at, b.due_at);
            assert_eq!(a.updated_at, b.updated_at);
        }
    }

    #[tokio::test]
    async fn series_content_edit_updates_every_future_sibling() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let anchor = engine.create_task(weekly_anchor()).await.unwrap();
        let dues_before: Vec<DateTime<Utc>> =
            store.snapshot().iter().map(|t| t.due_at).collect();

        let edit = TaskEdit {
            title: Some("Lab report v2".to_string()),
            priority: Some(Priority::High),
            ..Default::default()
        };
        let outcome = engine
            .apply_edit(anchor.id, edit, PropagationMode::WholeSeries)
            .await
            .unwrap();

        match outcome {
            EditOutcome::Series {
                siblings_updated,
                siblings_regenerated,
                ..
            } => {
                assert_eq!(siblings_updated, 3);
                assert_eq!(siblings_regenerated, 0);
            }
            other => panic!("expected series outcome, got {:?}", other),
        }

        let after = store.snapshot();
        assert!(after.iter().all(|t| t.title == "Lab report v2"));
        assert!(after.iter().all(|t| t.priority == Priority::High));
        let dues_after: Vec<DateTime<Utc>> = after.iter().map(|t| t.due_at).collect();
        assert_eq!(dues_after, dues_before);
    }

    #[tokio::test]
    async fn series_date_edit_discards_and_regenerates_siblings() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let anchor = engine.create_task(weekly_anchor()).await.unwrap();

        let new_due = dt(2020, 3, 17, 5, 0);
        let edit = TaskEdit {
            due_at: Some(new_due),
            ..Default::default()
        };
        let outcome = engine
            .apply_edit(anchor.id, edit, PropagationMode::WholeSeries)
            .await
            .unwrap();

        match outcome {
            EditOutcome::Series {
                siblings_regenerated,
                ..
            } => assert_eq!(siblings_regenerated, 2),
            other => panic!("expected series outcome, got {:?}", other),
        }

        let all = store.snapshot();
        assert_eq!(all.len(), 3);
        let dues: Vec<DateTime<Utc>> = all.iter().map(|t| t.due_at).collect();
        assert_eq!(
            dues,
            vec![new_due, new_due + Duration::weeks(1), new_due + Duration::weeks(2)]
        );
    }

    #[tokio::test]
    async fn converting_to_non_recurring_clears_the_series() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let anchor = engine.create_task(weekly_anchor()).await.unwrap();
        assert_eq!(store.snapshot().len(), 4);

        let edit = TaskEdit {
            frequency: Some(Frequency::Never),
            ..Default::default()
        };
        let outcome = engine
            .apply_edit(anchor.id, edit, PropagationMode::WholeSeries)
            .await
            .unwrap();

        match outcome {
            EditOutcome::Series {
                siblings_regenerated,
                ..
            } => assert_eq!(siblings_regenerated, 0),
            other => panic!("expected series outcome, got {:?}", other),
        }
        let all = store.snapshot();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].frequency, Frequency::Never);
    }

    #[tokio::test]
    async fn converting_to_recurring_materializes_the_series() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let data = NewTaskData {
            frequency: Frequency::Never,
            ..weekly_anchor()
        };
        let anchor = engine.create_task(data).await.unwrap();
        assert_eq!(store.snapshot().len(), 1);

        let edit = TaskEdit {
            frequency: Some(Frequency::Weekly),
            ..Default::default()
        };
        engine
            .apply_edit(anchor.id, edit, PropagationMode::WholeSeries)
            .await
            .unwrap();
        assert_eq!(store.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn missing_anchor_aborts_without_mutation() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        engine.create_task(weekly_anchor()).await.unwrap();
        let before = store.snapshot().len();

        let err = engine
            .apply_edit(
                Uuid::now_v7(),
                TaskEdit::default(),
                PropagationMode::WholeSeries,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(store.snapshot().len(), before);

        let err = engine.materialize_series(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        let err = engine.reset_recurrence(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn vanished_sibling_is_skipped_during_fan_out() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let anchor = engine.create_task(weekly_anchor()).await.unwrap();

        let victim = store
            .snapshot()
            .into_iter()
            .find(|t| t.id != anchor.id)
            .unwrap();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete(victim.id).await.unwrap());
        tx.commit().await.unwrap();

        let edit = TaskEdit {
            description: Some("Updated handout".to_string()),
            ..Default::default()
        };
        let outcome = engine
            .apply_edit(anchor.id, edit, PropagationMode::WholeSeries)
            .await
            .unwrap();
        match outcome {
            EditOutcome::Series {
                siblings_updated, ..
            } => assert_eq!(siblings_updated, 2),
            other => panic!("expected series outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reset_regenerates_an_identical_schedule() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let anchor = engine.create_task(weekly_anchor()).await.unwrap();

        let before: Vec<Task> = store
            .snapshot()
            .into_iter()
            .filter(|t| t.id != anchor.id)
            .collect();
        let fresh = engine.reset_recurrence(anchor.id).await.unwrap();

        assert_eq!(fresh.len(), before.len());
        for (old, new) in before.iter().zip(&fresh) {
            assert_eq!(old.due_at, new.due_at);
            assert_ne!(old.id, new.id);
        }
        assert_eq!(store.snapshot().len(), before.len() + 1);
    }

    #[tokio::test]
    async fn reset_on_a_non_recurring_anchor_is_a_noop() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);
        let data = NewTaskData {
            frequency: Frequency::Never,
            ..weekly_anchor()
        };
        let anchor = engine.create_task(data).await.unwrap();

        let fresh = engine.reset_recurrence(anchor.id).await.unwrap();
        assert!(fresh.is_empty());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn progress_is_validated_at_the_boundary() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);

        let data = NewTaskData {
            progress: 150,
            ..weekly_anchor()
        };
        let err = engine.create_task(data).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(store.snapshot().is_empty());

        let anchor = engine.create_task(weekly_anchor()).await.unwrap();
        let edit = TaskEdit {
            progress: Some(-5),
            ..Default::default()
        };
        let err = engine
            .apply_edit(anchor.id, edit, PropagationMode::ThisOccurrence)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_priority_is_derived_from_proximity() {
        let store = MemoryStore::new();
        let engine = engine_on(&store);

        let soon = NewTaskData {
            title: "Turn in form".to_string(),
            due_at: Utc::now() + Duration::hours(2),
            frequency: Frequency::Never,
            ..Default::default()
        };
        let anchor = engine.create_task(soon).await.unwrap();
        assert_eq!(anchor.priority, Priority::High);

        let explicit = NewTaskData {
            title: "Turn in form".to_string(),
            due_at: Utc::now() + Duration::hours(2),
            frequency: Frequency::Never,
            priority: Some(Priority::Low),
            ..Default::default()
        };
        let anchor = engine.create_task(explicit).await.unwrap();
        assert_eq!(anchor.priority, Priority::Low);
    }
}
