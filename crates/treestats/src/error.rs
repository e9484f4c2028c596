// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

// Error types for statistics operations

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Tree node error at {path}: {message}")]
    Node { path: String, message: String },

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn node<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Error::Node {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found<P: Into<String>>(path: P) -> Self {
        Error::NotFound(path.into())
    }
}
