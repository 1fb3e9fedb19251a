//! Task management commands for CLI.

use clap::{Subcommand, ValueEnum};
use tasktally_core::completion::DELETED_SUFFIX;
use tasktally_core::{NewTask, Task, TaskSort};

use super::Session;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task name
        name: String,
        /// Point value (default: 0)
        #[arg(long)]
        points: Option<i64>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// List active tasks
    List {
        /// Sort order (default from display.task_sort)
        #[arg(long, value_enum)]
        sort: Option<SortKey>,
    },
    /// Get task details
    Get {
        /// Task ID
        id: i64,
        /// Also resolve deleted tasks
        #[arg(long)]
        include_deleted: bool,
    },
    /// Set or clear a task's notes
    Notes {
        /// Task ID
        id: i64,
        /// New notes; omit to clear
        text: Option<String>,
    },
    /// Change a task's point value
    Points {
        /// Task ID
        id: i64,
        /// New point value
        #[arg(allow_negative_numbers = true)]
        points: i64,
    },
    /// Delete a task (completion history is kept)
    Delete {
        /// Task ID
        id: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortKey {
    /// Points, highest first
    Points,
    /// Name, alphabetical
    Name,
    /// Creation time, oldest first
    Created,
}

impl From<SortKey> for TaskSort {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Points => TaskSort::Points,
            SortKey::Name => TaskSort::Name,
            SortKey::Created => TaskSort::Created,
        }
    }
}

/// Order tasks for display. Ties fall back to id.
pub(crate) fn sort_tasks(tasks: &mut [Task], sort: TaskSort) {
    match sort {
        TaskSort::Points => tasks.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.cmp(&b.id))),
        TaskSort::Name => tasks.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        }),
        TaskSort::Created => {
            tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        }
    }
}

fn task_line(task: &Task) -> String {
    let deleted = if task.status.is_deleted() { DELETED_SUFFIX } else { "" };
    format!("#{:<4} {:>5} pts  {}{deleted}", task.id, task.points, task.name)
}

fn task_details(task: &Task) -> String {
    let mut out = format!(
        "Task #{}\n  name:    {}\n  points:  {}\n  created: {}\n  status:  {}",
        task.id,
        task.name,
        task.points,
        task.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if task.status.is_deleted() { "deleted" } else { "active" },
    );
    if let Some(notes) = &task.notes {
        out.push_str(&format!("\n  notes:   {notes}"));
    }
    out
}

pub async fn run(action: TaskAction, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let repo = &session.tasks;

    match action {
        TaskAction::Add {
            name,
            points,
            notes,
        } => {
            let new_task = NewTask {
                name,
                points,
                notes,
            };
            let task = repo.add_task(&session.ctx(), new_task).await?;
            session.emit(&task, || format!("Task created: {}", task_line(&task)))?;
        }
        TaskAction::List { sort } => {
            let mut tasks = repo.get_tasks(&session.ctx()).await?;
            let sort = sort.map(TaskSort::from).unwrap_or(session.config.display.task_sort);
            sort_tasks(&mut tasks, sort);
            session.emit(&tasks, || {
                if tasks.is_empty() {
                    "No tasks".to_string()
                } else {
                    tasks.iter().map(task_line).collect::<Vec<_>>().join("\n")
                }
            })?;
        }
        TaskAction::Get {
            id,
            include_deleted,
        } => {
            let ctx = session.ctx();
            let task = if include_deleted {
                repo.get_task_including_deleted(&ctx, id).await?
            } else {
                repo.get_task(&ctx, id).await?
            };
            session.emit(&task, || task_details(&task))?;
        }
        TaskAction::Notes { id, text } => {
            let cleared = text.is_none();
            repo.update_task_notes(&session.ctx(), id, text).await?;
            let task = repo.get_task(&session.ctx(), id).await?;
            session.emit(&task, || {
                if cleared {
                    format!("Notes cleared for task #{id}")
                } else {
                    format!("Notes updated for task #{id}")
                }
            })?;
        }
        TaskAction::Points { id, points } => {
            repo.update_task_points(&session.ctx(), id, points).await?;
            let task = repo.get_task(&session.ctx(), id).await?;
            session.emit(&task, || format!("Task updated: {}", task_line(&task)))?;
        }
        TaskAction::Delete { id } => {
            repo.delete_task(&session.ctx(), id).await?;
            session.emit(&serde_json::json!({ "deleted": id }), || {
                format!("Task #{id} deleted")
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tasktally_core::TaskStatus;

    fn task(id: i64, name: &str, points: i64, hour: u32) -> Task {
        Task {
            id,
            name: name.to_string(),
            points,
            notes: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            status: TaskStatus::Active,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn sort_by_points_is_descending_with_id_ties() {
        let mut tasks = vec![task(1, "a", 5, 0), task(2, "b", 9, 0), task(3, "c", 5, 0)];
        sort_tasks(&mut tasks, TaskSort::Points);
        assert_eq!(ids(&tasks), vec![2, 1, 3]);
    }

    #[test]
    fn sort_by_name_ignores_case() {
        let mut tasks = vec![task(1, "beta", 0, 0), task(2, "Alpha", 0, 0), task(3, "gamma", 0, 0)];
        sort_tasks(&mut tasks, TaskSort::Name);
        assert_eq!(ids(&tasks), vec![2, 1, 3]);
    }

    #[test]
    fn sort_by_created_is_oldest_first() {
        let mut tasks = vec![task(1, "a", 0, 5), task(2, "b", 0, 1), task(3, "c", 0, 3)];
        sort_tasks(&mut tasks, TaskSort::Created);
        assert_eq!(ids(&tasks), vec![2, 3, 1]);
    }

    #[test]
    fn deleted_tasks_are_marked_in_lines() {
        let mut t = task(4, "Old", 2, 0);
        t.status = TaskStatus::Deleted;
        assert!(task_line(&t).ends_with("Old (deleted)"));
        assert!(!task_line(&task(5, "New", 1, 0)).contains(DELETED_SUFFIX));
    }
}
