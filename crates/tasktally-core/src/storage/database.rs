//! SQLite connection pool and the cancellable call runner.
//!
//! Every repository call goes through [`Database::run`], which executes the
//! blocking SQLite work on tokio's blocking pool and races it against the
//! caller's [`OpContext`]. An abort fires the connection's interrupt handle so
//! the running statement stops and any open transaction rolls back.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, InterruptHandle};

use super::config::DatabaseConfig;
use super::migrations;
use crate::context::OpContext;
use crate::error::{CoreError, DatabaseError, Result, SchemaError};

/// Pool limits. Defaults: 10 open, 5 idle, 1 hour lifetime.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_open: u32,
    pub max_idle: u32,
    pub max_lifetime: Option<Duration>,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(cfg: &DatabaseConfig) -> Self {
        let max_open = cfg.max_open_connections.max(1);
        Self {
            max_open,
            max_idle: cfg.max_idle_connections.min(max_open),
            max_lifetime: (cfg.connection_lifetime_secs > 0)
                .then(|| Duration::from_secs(cfg.connection_lifetime_secs)),
            acquire_timeout: Duration::from_secs(cfg.acquire_timeout_secs.max(1)),
            busy_timeout: Duration::from_millis(cfg.busy_timeout_ms),
        }
    }
}

/// Shared handle to the tasktally database.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    path: Option<Arc<PathBuf>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

/// Interrupt access to the connection a single `run` call is using.
enum Lease {
    Waiting,
    Active(InterruptHandle),
    /// The work is over; the connection may already serve another caller.
    Released,
}

fn lock_lease(lease: &Mutex<Lease>) -> MutexGuard<'_, Lease> {
    lease.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LeaseGuard(Arc<Mutex<Lease>>);

impl LeaseGuard {
    fn activate(lease: Arc<Mutex<Lease>>, handle: InterruptHandle) -> Self {
        *lock_lease(&lease) = Lease::Active(handle);
        Self(lease)
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        *lock_lease(&self.0) = Lease::Released;
    }
}

impl Database {
    /// Open the database described by the configuration.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(cfg: &DatabaseConfig) -> Result<Self> {
        let path = cfg.resolved_path()?;
        Self::open_at(&path, &PoolSettings::from(cfg))
    }

    /// Open (creating if needed) the database file at `path` and migrate it.
    pub fn open_at(path: &Path, settings: &PoolSettings) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::OpenFailed {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }

        let busy_timeout = settings.busy_timeout;
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(settings.max_open)
            .min_idle(Some(settings.max_idle))
            .max_lifetime(settings.max_lifetime)
            .connection_timeout(settings.acquire_timeout)
            .build(manager)
            .map_err(|e| SchemaError::Unreachable(format!("{}: {e}", path.display())))?;

        let db = Self {
            pool,
            path: Some(Arc::new(path.to_path_buf())),
        };
        db.migrate()?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open a private in-memory database.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// every SQLite memory connection is its own database.
    pub fn open_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| DatabaseError::OpenFailed {
                path: PathBuf::from(":memory:"),
                message: e.to_string(),
            })?;
        let db = Self { pool, path: None };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<u32> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| SchemaError::Unreachable(e.to_string()))?;
        Ok(migrations::migrate(&mut conn)?)
    }

    /// Database file path; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    /// Schema version recorded by the last migration.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.pool.get()?;
        Ok(migrations::get_schema_version(&conn)?)
    }

    /// Run blocking SQLite work under `ctx`.
    ///
    /// `work` receives a pooled connection and a clone of the context; it
    /// must call [`OpContext::check`] before committing a transaction. The
    /// result is `Canceled`/`Timeout` when the context ends first, unless the
    /// work had already completed, in which case its result is returned.
    pub async fn run<T, F>(&self, ctx: &OpContext, op: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &OpContext) -> Result<T> + Send + 'static,
    {
        ctx.check()?;

        let pool = self.pool.clone();
        let worker_ctx = ctx.clone();
        let lease = Arc::new(Mutex::new(Lease::Waiting));
        let worker_lease = Arc::clone(&lease);
        let started = Instant::now();

        let mut job = tokio::task::spawn_blocking(move || -> Result<T> {
            let mut conn = pool.get()?;
            // Declared after `conn`, so the lease is released before the
            // connection goes back to the pool.
            let _release = LeaseGuard::activate(worker_lease, conn.get_interrupt_handle());
            worker_ctx.check()?;
            work(&mut conn, &worker_ctx)
        });

        let joined = tokio::select! {
            biased;
            joined = &mut job => joined,
            reason = ctx.done() => {
                let work_started = {
                    let lease = lock_lease(&lease);
                    match &*lease {
                        Lease::Waiting => false,
                        Lease::Active(handle) => {
                            handle.interrupt();
                            tracing::debug!(op, "interrupted in-flight statement");
                            true
                        }
                        Lease::Released => true,
                    }
                };
                if !work_started {
                    // The worker re-checks the context once it holds a
                    // connection and never starts the work.
                    tracing::debug!(op, "aborted before acquiring a connection");
                    return Err(reason);
                }
                match job.await {
                    Ok(Err(err)) if err.is_abort() => return Err(reason),
                    other => other,
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match joined {
            Ok(Ok(value)) => {
                tracing::debug!(op, elapsed_ms, "storage call finished");
                Ok(value)
            }
            Ok(Err(err)) => {
                tracing::debug!(op, elapsed_ms, error = %err, "storage call failed");
                Err(err)
            }
            Err(join_err) => Err(CoreError::Database(DatabaseError::QueryFailed(format!(
                "{op} worker failed: {join_err}"
            )))),
        }
    }
}
