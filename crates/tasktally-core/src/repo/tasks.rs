//! Task repository: create, list, update and soft-delete tasks.

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::context::OpContext;
use crate::error::{CoreError, Result};
use crate::storage::{format_timestamp, parse_timestamp_or_epoch, storage_now, Database};
use crate::task::{validate_points, NewTask, Task, TaskStatus};

const TASK_COLUMNS: &str = "id, name, points, notes, created_at, deleted";

/// Build a Task from a row selected with [`TASK_COLUMNS`].
fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let created_at_str: String = row.get(4)?;
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        points: row.get(2)?,
        notes: row.get(3)?,
        created_at: parse_timestamp_or_epoch(&created_at_str),
        status: TaskStatus::from_deleted_flag(row.get(5)?),
    })
}

/// Persistence for tasks.
#[derive(Debug, Clone)]
pub struct TaskRepository {
    db: Database,
}

impl TaskRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validate and insert a new task.
    ///
    /// # Errors
    /// `Validation` for an empty name or negative points, before storage is touched.
    pub async fn add_task(&self, ctx: &OpContext, new_task: NewTask) -> Result<Task> {
        let (name, points) = new_task.validate()?;
        let notes = new_task.notes;
        let created_at = storage_now();

        self.db
            .run(ctx, "add_task", move |conn, ctx| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute(
                    "INSERT INTO tasks (name, points, notes, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![name, points, notes, format_timestamp(created_at)],
                )?;
                let id = tx.last_insert_rowid();
                ctx.check()?;
                tx.commit()?;

                tracing::debug!(task_id = id, points, "task added");
                Ok(Task {
                    id,
                    name,
                    points,
                    notes,
                    created_at,
                    status: TaskStatus::Active,
                })
            })
            .await
    }

    /// All active tasks, by id. Display order is the caller's concern.
    pub async fn get_tasks(&self, ctx: &OpContext) -> Result<Vec<Task>> {
        self.db
            .run(ctx, "get_tasks", |conn, _| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE deleted = 0 ORDER BY id"
                ))?;
                let tasks = stmt.query_map([], row_to_task)?;
                Ok(tasks.collect::<Result<Vec<_>, _>>()?)
            })
            .await
    }

    /// An active task.
    ///
    /// # Errors
    /// `NotFound` if the task does not exist or has been deleted.
    pub async fn get_task(&self, ctx: &OpContext, id: i64) -> Result<Task> {
        self.db
            .run(ctx, "get_task", move |conn, _| {
                conn.query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND deleted = 0"),
                    [id],
                    row_to_task,
                )
                .optional()?
                .ok_or_else(|| CoreError::task_not_found(id))
            })
            .await
    }

    /// A task in any status, for resolving history entries.
    pub async fn get_task_including_deleted(&self, ctx: &OpContext, id: i64) -> Result<Task> {
        self.db
            .run(ctx, "get_task_including_deleted", move |conn, _| {
                conn.query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    [id],
                    row_to_task,
                )
                .optional()?
                .ok_or_else(|| CoreError::task_not_found(id))
            })
            .await
    }

    /// Replace an active task's notes. `None` clears them.
    pub async fn update_task_notes(
        &self,
        ctx: &OpContext,
        id: i64,
        notes: Option<String>,
    ) -> Result<()> {
        self.db
            .run(ctx, "update_task_notes", move |conn, _| {
                let changed = conn.execute(
                    "UPDATE tasks SET notes = ?1 WHERE id = ?2 AND deleted = 0",
                    params![notes, id],
                )?;
                if changed == 0 {
                    return Err(CoreError::task_not_found(id));
                }
                Ok(())
            })
            .await
    }

    /// Change an active task's point value. Past completions keep their snapshot.
    ///
    /// # Errors
    /// `Validation` if `points` is negative, checked before any write.
    pub async fn update_task_points(&self, ctx: &OpContext, id: i64, points: i64) -> Result<()> {
        validate_points(points)?;

        self.db
            .run(ctx, "update_task_points", move |conn, _| {
                let changed = conn.execute(
                    "UPDATE tasks SET points = ?1 WHERE id = ?2 AND deleted = 0",
                    params![points, id],
                )?;
                if changed == 0 {
                    return Err(CoreError::task_not_found(id));
                }
                tracing::debug!(task_id = id, points, "task points updated");
                Ok(())
            })
            .await
    }

    /// Soft-delete an active task. Its completions are kept.
    ///
    /// # Errors
    /// `NotFound` if the task does not exist or is already deleted.
    pub async fn delete_task(&self, ctx: &OpContext, id: i64) -> Result<()> {
        self.db
            .run(ctx, "delete_task", move |conn, _| {
                let changed = conn.execute(
                    "UPDATE tasks SET deleted = 1 WHERE id = ?1 AND deleted = 0",
                    [id],
                )?;
                if changed == 0 {
                    return Err(CoreError::task_not_found(id));
                }
                tracing::debug!(task_id = id, "task soft-deleted");
                Ok(())
            })
            .await
    }
}
