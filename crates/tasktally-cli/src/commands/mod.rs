//! Subcommand implementations.
//!
//! Commands that touch the database share a [`Session`]: the loaded config,
//! the opened database and both repositories.

pub mod config;
pub mod db;
pub mod history;
pub mod task;

use std::time::Duration;

use serde::Serialize;
use tasktally_core::{
    CompletionRepository, Config, CoreError, Database, DeletedTaskPolicy, OpContext,
    TaskRepository,
};

/// Flags accepted by every subcommand.
pub struct GlobalOpts {
    pub json: bool,
    pub timeout_ms: Option<u64>,
}

pub struct Session {
    pub config: Config,
    pub db: Database,
    pub tasks: TaskRepository,
    pub completions: CompletionRepository,
    root: OpContext,
    timeout: Option<Duration>,
    json: bool,
}

impl Session {
    /// Load config, open (and migrate) the database, and build repositories.
    pub fn open(opts: &GlobalOpts, root: OpContext) -> Result<Self, CoreError> {
        let config = Config::load()?;
        let db = Database::open(&config.database)?;

        let timeout = match opts.timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => config.operations.timeout(),
        };
        let policy = DeletedTaskPolicy::from_allow_flag(config.completions.allow_deleted_tasks);

        Ok(Self {
            tasks: TaskRepository::new(db.clone()),
            completions: CompletionRepository::new(db.clone()).with_policy(policy),
            db,
            config,
            root,
            timeout,
            json: opts.json,
        })
    }

    /// Context for one repository call: cancelled by Ctrl-C, bounded by the timeout.
    pub fn ctx(&self) -> OpContext {
        match self.timeout {
            Some(timeout) => self.root.child_with_timeout(timeout),
            None => self.root.clone(),
        }
    }

    /// Print `value` as JSON under `--json`, otherwise the text rendering.
    pub fn emit<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> Result<(), Box<dyn std::error::Error>> {
        print_output(self.json, value, text)
    }
}

pub(crate) fn print_output<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
