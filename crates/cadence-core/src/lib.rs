//! # Cadence Core Library
//!
//! A task management library built around fixed-interval recurrence: an
//! anchor task is expanded into a series of sibling occurrences, and edits
//! to the anchor can propagate across that series.
//!
//! ## Features
//!
//! - **Series Materialization**: One stored row per occurrence, generated
//!   eagerly from the anchor's due date, frequency, and end boundary
//! - **Calendar-Correct Stepping**: Monthly and yearly intervals follow the
//!   calendar, with month-end clamping instead of day arithmetic
//! - **Edit Propagation**: Apply an edit to one occurrence or fan it out to
//!   every future sibling, regenerating the series when its dates change
//! - **Pluggable Storage**: Transactional store trait with SQLite and
//!   in-memory implementations
//! - **Notification Scheduling**: Hook point for reminding ahead of each
//!   occurrence's due time
//! - **Type Safety**: Typed frequencies, priorities, and categories checked
//!   at the storage boundary
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`engine`]: Series materialization, edit propagation, and resets
//! - [`recurrence`]: Occurrence counting and date stepping
//! - [`store`]: Transactional storage trait and its implementations
//! - [`diff`]: Field-level change detection for edit propagation
//! - [`notify`]: Notification scheduling seam
//! - [`timezone`]: Timezone utilities and validation
//! - [`error`]: Error types shared across the crate
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     engine::RecurrenceEngine,
//!     error::CoreError,
//!     models::{Frequency, NewTaskData},
//!     store::SqliteStore,
//! };
//! use chrono::{Duration, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CoreError> {
//!     // Initialize database
//!     let pool = db::establish_connection("tasks.db").await?;
//!     let engine = RecurrenceEngine::new(SqliteStore::new(pool));
//!
//!     // Add a recurring task; its series is materialized on creation
//!     let task = engine
//!         .create_task(NewTaskData {
//!             title: "Weekly lab report".to_string(),
//!             due_at: Utc::now() + Duration::days(1),
//!             frequency: Frequency::Weekly,
//!             recurrence_end: Utc::now() + Duration::weeks(4),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("Created task: {}", task.title);
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod diff;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod recurrence;
pub mod store;
pub mod timezone;
