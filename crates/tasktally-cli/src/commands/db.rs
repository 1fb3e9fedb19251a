use clap::Subcommand;
use serde::Serialize;

use super::Session;

#[derive(Subcommand)]
pub enum DbAction {
    /// Show database path and schema version
    Info,
}

#[derive(Serialize)]
struct DbInfo {
    path: Option<String>,
    schema_version: u32,
}

pub fn run(action: DbAction, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DbAction::Info => {
            let info = DbInfo {
                path: session.db.path().map(|p| p.display().to_string()),
                schema_version: session.db.schema_version()?,
            };
            session.emit(&info, || {
                format!(
                    "path: {}\nschema version: {}",
                    info.path.as_deref().unwrap_or(":memory:"),
                    info.schema_version
                )
            })?;
        }
    }
    Ok(())
}
