use chrono::{DateTime, Utc};

use crate::models::{Category, Frequency, Priority, Task};

/// Old and new value of one tracked field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange<T> {
    pub old: T,
    pub new: T,
}

fn change<T: Clone + PartialEq>(old: &T, new: &T) -> Option<FieldChange<T>> {
    if old == new {
        None
    } else {
        Some(FieldChange {
            old: old.clone(),
            new: new.clone(),
        })
    }
}

/// Field-level difference between an anchor's stored state and its state
/// after an edit. Computed once inside the propagation transaction and
/// passed through the call chain by value; nothing is persisted on the task
/// and nothing needs clearing afterwards.
///
/// Only the trackable fields participate. Completion state and the
/// course/activity references apply to the edited occurrence alone and are
/// never propagated.
#[derive(Debug, Clone, Default)]
pub struct EditDiff {
    pub title: Option<FieldChange<String>>,
    pub description: Option<FieldChange<String>>,
    pub location: Option<FieldChange<String>>,
    pub due_at: Option<FieldChange<DateTime<Utc>>>,
    pub frequency: Option<FieldChange<Frequency>>,
    pub recurrence_end: Option<FieldChange<DateTime<Utc>>>,
    pub category: Option<FieldChange<Category>>,
    pub priority: Option<FieldChange<Priority>>,
}

impl EditDiff {
    pub fn between(before: &Task, after: &Task) -> Self {
        Self {
            title: change(&before.title, &after.title),
            description: change(&before.description, &after.description),
            location: change(&before.location, &after.location),
            due_at: change(&before.due_at, &after.due_at),
            frequency: change(&before.frequency, &after.frequency),
            recurrence_end: change(&before.recurrence_end, &after.recurrence_end),
            category: change(&before.category, &after.category),
            priority: change(&before.priority, &after.priority),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Whether the change invalidates the spacing or count of an existing
    /// series. These fields are never copied onto siblings directly; they
    /// trigger deletion and regeneration instead.
    pub fn affects_schedule(&self) -> bool {
        self.due_at.is_some() || self.frequency.is_some() || self.recurrence_end.is_some()
    }

    /// Whether any field eligible for direct fan-out changed.
    pub fn affects_content(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.location.is_some()
            || self.category.is_some()
            || self.priority.is_some()
    }

    /// Copies the anchor's current value onto `sibling` for every changed
    /// non-date field. The sibling keeps its own due date.
    pub fn apply_content_to(&self, anchor: &Task, sibling: &mut Task) {
        if self.title.is_some() {
            sibling.title = anchor.title.clone();
        }
        if self.description.is_some() {
            sibling.description = anchor.description.clone();
        }
        if self.location.is_some() {
            sibling.location = anchor.location.clone();
        }
        if self.category.is_some() {
            sibling.category = anchor.category;
        }
        if self.priority.is_some() {
            sibling.priority = anchor.priority;
        }
        sibling.updated_at = Utc::now();
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.location.is_some() {
            fields.push("location");
        }
        if self.due_at.is_some() {
            fields.push("due_at");
        }
        if self.frequency.is_some() {
            fields.push("frequency");
        }
        if self.recurrence_end.is_some() {
            fields.push("recurrence_end");
        }
        if self.category.is_some() {
            fields.push("category");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        fields
    }
}
