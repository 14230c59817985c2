pub mod cli;
pub mod config;

pub use crate::cli::{run, App, Cli};
pub use crate::config::AppConfig;
