//! Repositories over the shared [`Database`](crate::storage::Database).
//!
//! Each repository is a cheap handle; clone freely. All calls take an
//! [`OpContext`](crate::context::OpContext) and honour its cancellation.

mod completions;
mod tasks;

pub use completions::{CompletionRepository, DeletedTaskPolicy};
pub use tasks::TaskRepository;
