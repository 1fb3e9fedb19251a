//! Completion repository: the append-only log of task completions.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::completion::{display_task_name, Completion, CompletionSummary};
use crate::context::OpContext;
use crate::error::{CoreError, Result};
use crate::storage::{format_timestamp, parse_timestamp_or_epoch, storage_now, Database};
use crate::task::TaskStatus;

/// How `complete_task` treats a soft-deleted task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletedTaskPolicy {
    /// Record the completion anyway.
    #[default]
    Allow,
    /// Report the task as not found.
    Reject,
}

impl DeletedTaskPolicy {
    pub fn from_allow_flag(allow: bool) -> Self {
        if allow {
            Self::Allow
        } else {
            Self::Reject
        }
    }
}

/// Persistence for completions.
#[derive(Debug, Clone)]
pub struct CompletionRepository {
    db: Database,
    policy: DeletedTaskPolicy,
}

impl CompletionRepository {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            policy: DeletedTaskPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DeletedTaskPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record a completion of `task_id` now, snapshotting its current points.
    pub async fn complete_task(&self, ctx: &OpContext, task_id: i64) -> Result<Completion> {
        self.complete_task_at(ctx, task_id, storage_now()).await
    }

    /// Record a completion with an explicit timestamp.
    ///
    /// The task read and the insert share one IMMEDIATE transaction, so the
    /// snapshot is the task's points at the moment this writer holds the lock.
    ///
    /// # Errors
    /// `NotFound` if the task row does not exist, or if it is soft-deleted and
    /// the policy is [`DeletedTaskPolicy::Reject`].
    pub async fn complete_task_at(
        &self,
        ctx: &OpContext,
        task_id: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<Completion> {
        let completed_at = completed_at.trunc_subsecs(6);
        let policy = self.policy;

        self.db
            .run(ctx, "complete_task", move |conn, ctx| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let (name, points, deleted): (String, i64, bool) = tx
                    .query_row(
                        "SELECT name, points, deleted FROM tasks WHERE id = ?1",
                        [task_id],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?
                    .ok_or_else(|| CoreError::task_not_found(task_id))?;

                let status = TaskStatus::from_deleted_flag(deleted);
                if status.is_deleted() && policy == DeletedTaskPolicy::Reject {
                    return Err(CoreError::task_not_found(task_id));
                }

                tx.execute(
                    "INSERT INTO completions (task_id, completed_at, points) VALUES (?1, ?2, ?3)",
                    params![task_id, format_timestamp(completed_at), points],
                )?;
                let id = tx.last_insert_rowid();
                ctx.check()?;
                tx.commit()?;

                tracing::debug!(completion_id = id, task_id, points, "task completed");
                Ok(Completion {
                    id,
                    task_id,
                    completed_at,
                    points,
                    task_name: display_task_name(task_id, Some(&name), Some(status)),
                    task_status: Some(status),
                })
            })
            .await
    }

    /// The whole log, newest first. Ties on `completed_at` go to the higher id.
    pub async fn get_completions(&self, ctx: &OpContext) -> Result<Vec<Completion>> {
        self.db
            .run(ctx, "get_completions", |conn, _| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.task_id, c.completed_at, c.points, t.name, t.deleted
                     FROM completions c
                     LEFT JOIN tasks t ON t.id = c.task_id
                     ORDER BY c.completed_at DESC, c.id DESC",
                )?;
                let rows = stmt.query_map([], |row| {
                    let task_id: i64 = row.get(1)?;
                    let completed_at: String = row.get(2)?;
                    let name: Option<String> = row.get(4)?;
                    let deleted: Option<bool> = row.get(5)?;
                    let status = deleted.map(TaskStatus::from_deleted_flag);
                    Ok(Completion {
                        id: row.get(0)?,
                        task_id,
                        completed_at: parse_timestamp_or_epoch(&completed_at),
                        points: row.get(3)?,
                        task_name: display_task_name(task_id, name.as_deref(), status),
                        task_status: status,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
    }

    /// Remove one completion. Missing ids are not an error.
    pub async fn delete_completion(&self, ctx: &OpContext, id: i64) -> Result<()> {
        self.db
            .run(ctx, "delete_completion", move |conn, _| {
                let removed = conn.execute("DELETE FROM completions WHERE id = ?1", [id])?;
                tracing::debug!(completion_id = id, removed, "completion deleted");
                Ok(())
            })
            .await
    }

    /// Empty the log. Returns how many completions were removed.
    pub async fn clear_completions(&self, ctx: &OpContext) -> Result<usize> {
        self.db
            .run(ctx, "clear_completions", |conn, ctx| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let removed = tx.execute("DELETE FROM completions", [])?;
                ctx.check()?;
                tx.commit()?;

                tracing::debug!(removed, "completion log cleared");
                Ok(removed)
            })
            .await
    }

    /// Totals over the log. "Today" starts at 00:00 UTC.
    pub async fn summary(&self, ctx: &OpContext) -> Result<CompletionSummary> {
        let today_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let cutoff = format_timestamp(today_start);

        self.db
            .run(ctx, "completion_summary", move |conn, _| {
                let summary = conn.query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(points), 0),
                            COALESCE(SUM(CASE WHEN completed_at >= ?1 THEN 1 ELSE 0 END), 0),
                            COALESCE(SUM(CASE WHEN completed_at >= ?1 THEN points ELSE 0 END), 0)
                     FROM completions",
                    [cutoff],
                    |row| {
                        let total: i64 = row.get(0)?;
                        let today: i64 = row.get(2)?;
                        Ok(CompletionSummary {
                            total_completions: total as u64,
                            total_points: row.get(1)?,
                            today_completions: today as u64,
                            today_points: row.get(3)?,
                        })
                    },
                )?;
                Ok(summary)
            })
            .await
    }
}
