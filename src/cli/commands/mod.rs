//! CLI command implementations.

mod config;
mod doctor;
mod init;
mod run;

pub use config::run_config;
pub use doctor::run_doctor;
pub use init::run_init;
pub use run::run_pipeline;
