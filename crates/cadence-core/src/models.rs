use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Fixed recurrence interval of a task. `Never` marks a one-off task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Frequency {
    Never,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence frequency: {0}")]
pub struct ParseFrequencyError(pub String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never" => Ok(Frequency::Never),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Never => write!(f, "never"),
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl Priority {
    /// Derives a priority from how close `due_at` is to `now`: overdue or
    /// due within a day is high, within three days medium, otherwise low.
    /// Callers that carry explicit user intent skip this.
    pub fn for_due_proximity(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = due_at - now;
        if remaining <= Duration::hours(24) {
            Priority::High
        } else if remaining <= Duration::days(3) {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Category {
    None,
    Academics,
    Extracurriculars,
    Job,
    Social,
    Personal,
    Other,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Category::None),
            "academics" => Ok(Category::Academics),
            "extracurriculars" => Ok(Category::Extracurriculars),
            "job" => Ok(Category::Job),
            "social" => Ok(Category::Social),
            "personal" => Ok(Category::Personal),
            "other" => Ok(Category::Other),
            _ => Err(ParseCategoryError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::None => write!(f, "none"),
            Category::Academics => write!(f, "academics"),
            Category::Extracurriculars => write!(f, "extracurriculars"),
            Category::Job => write!(f, "job"),
            Category::Social => write!(f, "social"),
            Category::Personal => write!(f, "personal"),
            Category::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    /// Nominal occurrence instant.
    pub due_at: DateTime<Utc>,
    pub frequency: Frequency,
    /// Last instant at or before which new occurrences may be generated.
    /// Carries no meaning when `frequency` is `Never`.
    pub recurrence_end: DateTime<Utc>,
    pub priority: Priority,
    pub category: Category,
    pub course_id: Option<Uuid>,
    pub activity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub completed: bool,
    /// Completion percentage, 0..=100.
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Task {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: "".to_string(),
            description: "".to_string(),
            location: "".to_string(),
            due_at: now,
            frequency: Frequency::Never,
            recurrence_end: now,
            priority: Priority::Low,
            category: Category::None,
            course_id: None,
            activity_id: None,
            user_id: None,
            completed: false,
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Task {
    /// Builds a fresh `Task` row from creation data. Stores call this so
    /// id and timestamp assignment stay in one place.
    pub fn from_new(data: NewTaskData) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            location: data.location,
            due_at: data.due_at,
            frequency: data.frequency,
            recurrence_end: data.recurrence_end,
            priority: data.priority.unwrap_or(Priority::Low),
            category: data.category,
            course_id: data.course_id,
            activity_id: data.activity_id,
            user_id: data.user_id,
            completed: data.completed,
            progress: data.progress,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.frequency != Frequency::Never
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_at < now
    }

    pub fn is_due_today(&self, now: DateTime<Utc>) -> bool {
        self.due_at.date_naive() == now.date_naive()
    }
}

#[derive(Debug, Clone)]
pub struct NewTaskData {
    pub title: String,
    pub description: String,
    pub location: String,
    pub due_at: DateTime<Utc>,
    pub frequency: Frequency,
    pub recurrence_end: DateTime<Utc>,
    /// When absent the engine derives one from due-date proximity.
    pub priority: Option<Priority>,
    pub category: Category,
    pub course_id: Option<Uuid>,
    pub activity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub completed: bool,
    pub progress: i32,
}

impl Default for NewTaskData {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            title: "".to_string(),
            description: "".to_string(),
            location: "".to_string(),
            due_at: now,
            frequency: Frequency::Never,
            recurrence_end: now,
            priority: None,
            category: Category::None,
            course_id: None,
            activity_id: None,
            user_id: None,
            completed: false,
            progress: 0,
        }
    }
}

impl NewTaskData {
    /// Creation data for one generated occurrence of `anchor`: identifying
    /// and classification fields copied verbatim, due date replaced by the
    /// computed offset, completion state reset.
    pub fn occurrence_of(anchor: &Task, due_at: DateTime<Utc>) -> Self {
        Self {
            title: anchor.title.clone(),
            description: anchor.description.clone(),
            location: anchor.location.clone(),
            due_at,
            frequency: anchor.frequency,
            recurrence_end: anchor.recurrence_end,
            priority: Some(anchor.priority),
            category: anchor.category,
            course_id: anchor.course_id,
            activity_id: anchor.activity_id,
            user_id: anchor.user_id,
            completed: false,
            progress: 0,
        }
    }
}

/// A submitted edit. Absent fields are left unchanged; `course_id` and
/// `activity_id` use nested options so references can be cleared.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub frequency: Option<Frequency>,
    pub recurrence_end: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub course_id: Option<Option<Uuid>>,
    pub activity_id: Option<Option<Uuid>>,
    pub completed: Option<bool>,
    pub progress: Option<i32>,
}

impl TaskEdit {
    /// Applies the submitted fields to `task`. Returns whether any stored
    /// value actually changed; `updated_at` is bumped only in that case.
    pub fn apply_to(&self, task: &mut Task) -> bool {
        let mut changed = false;
        if let Some(title) = &self.title {
            if task.title != *title {
                task.title = title.clone();
                changed = true;
            }
        }
        if let Some(description) = &self.description {
            if task.description != *description {
                task.description = description.clone();
                changed = true;
            }
        }
        if let Some(location) = &self.location {
            if task.location != *location {
                task.location = location.clone();
                changed = true;
            }
        }
        if let Some(due_at) = self.due_at {
            if task.due_at != due_at {
                task.due_at = due_at;
                changed = true;
            }
        }
        if let Some(frequency) = self.frequency {
            if task.frequency != frequency {
                task.frequency = frequency;
                changed = true;
            }
        }
        if let Some(recurrence_end) = self.recurrence_end {
            if task.recurrence_end != recurrence_end {
                task.recurrence_end = recurrence_end;
                changed = true;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                task.priority = priority;
                changed = true;
            }
        }
        if let Some(category) = self.category {
            if task.category != category {
                task.category = category;
                changed = true;
            }
        }
        if let Some(course_id) = self.course_id {
            if task.course_id != course_id {
                task.course_id = course_id;
                changed = true;
            }
        }
        if let Some(activity_id) = self.activity_id {
            if task.activity_id != activity_id {
                task.activity_id = activity_id;
                changed = true;
            }
        }
        if let Some(completed) = self.completed {
            if task.completed != completed {
                task.completed = completed;
                changed = true;
            }
        }
        if let Some(progress) = self.progress {
            if task.progress != progress {
                task.progress = progress;
                changed = true;
            }
        }
        if changed {
            task.updated_at = Utc::now();
        }
        changed
    }
}

/// Scope for applying an edit to a task that belongs to a recurring series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationMode {
    /// Affect only the selected occurrence
    ThisOccurrence,
    /// Apply to the anchor and every future sibling of the series
    WholeSeries,
}

impl std::fmt::Display for PropagationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropagationMode::ThisOccurrence => write!(f, "single"),
            PropagationMode::WholeSeries => write!(f, "all"),
        }
    }
}

impl FromStr for PropagationMode {
    type Err = ParsePropagationModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" | "this" | "occurrence" => Ok(PropagationMode::ThisOccurrence),
            "all" | "series" | "entire" => Ok(PropagationMode::WholeSeries),
            _ => Err(ParsePropagationModeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid propagation mode: {0}")]
pub struct ParsePropagationModeError(pub String);

#[derive(Debug)]
pub enum EditOutcome {
    /// Edit applied to one occurrence; the series is untouched.
    Single(Task),
    /// Series edit where no tracked field actually changed.
    Unchanged(Task),
    /// Series edit propagated across the future siblings.
    Series {
        anchor: Task,
        siblings_updated: usize,
        siblings_regenerated: usize,
    },
}
