//! Error types for configuration rendering.

use std::path::PathBuf;

/// Template syntax errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("line {line}: unclosed action")]
    Unclosed { line: usize },

    #[error("line {line}: unknown action {action:?}")]
    UnknownAction { action: String, line: usize },

    #[error("line {line}: if without matching end")]
    UnterminatedIf { line: usize },

    #[error("line {line}: unexpected {action:?}")]
    Unexpected { action: String, line: usize },
}

/// Configuration generation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to locate nginx.conf template: {}: {source}", path.display())]
    TemplateNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },

    #[error("failed to create {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
