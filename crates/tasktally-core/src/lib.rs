//! # Tasktally Core Library
//!
//! Core logic for tasktally, a points-based task tracker. Tasks carry a point
//! value; completing a task appends an entry to a completion log that
//! snapshots the points at that moment.
//!
//! The `tasktally` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Domain**: [`Task`], [`Completion`] and their validation rules
//! - **Storage**: SQLite through a pooled [`Database`], versioned migrations,
//!   and TOML-based [`Config`]
//! - **Repositories**: [`TaskRepository`] and [`CompletionRepository`], async
//!   and cancellable through an [`OpContext`]
//!
//! ## Key Components
//!
//! - [`Database`]: Connection pool and cancellable operation runner
//! - [`TaskRepository`]: Task CRUD with soft delete
//! - [`CompletionRepository`]: Completion log with point snapshots
//! - [`Config`]: Application configuration management

pub mod completion;
pub mod context;
pub mod error;
pub mod repo;
pub mod storage;
pub mod task;

pub use completion::{Completion, CompletionSummary};
pub use context::OpContext;
pub use error::{ConfigError, CoreError, DatabaseError, SchemaError, ValidationError};
pub use repo::{CompletionRepository, DeletedTaskPolicy, TaskRepository};
pub use storage::{Config, Database, TaskSort};
pub use task::{NewTask, Task, TaskStatus};
