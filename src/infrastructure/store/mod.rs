//! Persistence: task store, index, progress log, verification artifacts.

pub mod markdown;
pub mod migration;
pub mod paths;
pub mod progress_log;
pub mod retry;
pub mod task_store;
pub mod verification_store;

pub use migration::{migrate_if_needed, MigrationReport};
pub use paths::StateLayout;
pub use progress_log::ProgressLog;
pub use retry::with_optimistic_retry;
pub use task_store::{synthesize_task, TaskStore};
pub use verification_store::VerificationStore;
