//! CLI command handlers.

pub mod config;
pub mod env;
pub mod jobs;
pub mod parse;
pub mod scenario;
pub mod tools;

pub use config::{run_config_check, run_config_schema, run_config_show};
pub use env::run_env;
pub use jobs::{run_jobs_cancel, run_jobs_resume, run_jobs_status, run_jobs_wait_restore};
pub use parse::{ParseCommandInput, run_parse};
pub use scenario::run_scenario;
pub use tools::{
    BackupCommandInput, RestoreCommandInput, run_backup, run_estimate, run_restore, run_validate,
};
