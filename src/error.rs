use thiserror::Error;

/// Errors that abort a dispatch before any task runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("if 'all' is specified it must be the only task (got: {requested})")]
    AggregateNotAlone { requested: String },

    #[error("no tasks requested")]
    NoTasks,

    #[error("unknown task '{name}'")]
    UnknownTask { name: String },

    #[error("invalid {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("project path '{path}' is not an existing directory")]
    ProjectDirMissing { path: String },

    #[error("config file not found '{path}'")]
    ConfigNotFound { path: String },

    #[error("failed to read config '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write config '{path}': {source}")]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
