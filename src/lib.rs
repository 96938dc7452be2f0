// src/lib.rs
pub mod config;
pub mod db;
pub mod models;
pub mod pool;
pub mod provider;
pub mod results;
pub mod run;
pub mod storage;

// Re-export common types for easier access
pub use config::RunConfig;
pub use models::{merge, AttributeDescriptor, AttributeValue, ProjectId, RawResults};
pub use provider::{AttributeProvider, ManifestProvider};
pub use results::{RunReport, TaskOutcome};
pub use run::Run;
pub use storage::{PgStorage, Storage};

// Re-export important functionality
pub use db::PgPool;
