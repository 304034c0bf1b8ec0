pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod options;
pub mod outcome;
pub mod output;
pub mod target;
pub mod task;

pub use dispatcher::Dispatcher;
pub use error::ConfigError;
pub use options::Options;
pub use outcome::{DispatchResult, TaskOutcome, TaskStatus};
pub use task::TaskKind;

#[cfg(test)]
mod tests;
