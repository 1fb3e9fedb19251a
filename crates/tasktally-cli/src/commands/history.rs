//! Completion and history commands.

use clap::Subcommand;
use tasktally_core::Completion;

use super::Session;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List completions, newest first
    List,
    /// Delete one completion
    Delete {
        /// Completion ID
        id: i64,
    },
    /// Delete every completion
    Clear,
    /// Show completion and point totals
    Summary,
}

fn completion_line(c: &Completion) -> String {
    format!(
        "{}  #{:<4} +{:<4} {}",
        c.completed_at.format("%Y-%m-%d %H:%M"),
        c.id,
        c.points,
        c.task_name
    )
}

pub async fn complete(task_id: i64, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let completion = session
        .completions
        .complete_task(&session.ctx(), task_id)
        .await?;
    session.emit(&completion, || {
        format!(
            "Completed {} (+{} points)",
            completion.task_name, completion.points
        )
    })
}

pub async fn run(
    action: HistoryAction,
    session: &Session,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = &session.completions;

    match action {
        HistoryAction::List => {
            let log = repo.get_completions(&session.ctx()).await?;
            session.emit(&log, || {
                if log.is_empty() {
                    "No completions".to_string()
                } else {
                    log.iter().map(completion_line).collect::<Vec<_>>().join("\n")
                }
            })?;
        }
        HistoryAction::Delete { id } => {
            repo.delete_completion(&session.ctx(), id).await?;
            session.emit(&serde_json::json!({ "deleted": id }), || "ok".to_string())?;
        }
        HistoryAction::Clear => {
            let removed = repo.clear_completions(&session.ctx()).await?;
            session.emit(&serde_json::json!({ "removed": removed }), || {
                format!("Removed {removed} completions")
            })?;
        }
        HistoryAction::Summary => {
            let summary = repo.summary(&session.ctx()).await?;
            session.emit(&summary, || {
                format!(
                    "Today: {} completions, {} points\nTotal: {} completions, {} points",
                    summary.today_completions,
                    summary.today_points,
                    summary.total_completions,
                    summary.total_points
                )
            })?;
        }
    }
    Ok(())
}
