//! CLI command implementations.

mod chat;
mod config;
mod doctor;
mod serve;
mod summarize;

pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use serve::{router, run_serve, AppState};
pub use summarize::run_summarize;
