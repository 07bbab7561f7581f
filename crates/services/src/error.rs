//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use companion_core::model::{CatalogError, ChapterId, UserIdError};
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ChapterService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChapterError {
    #[error("unknown chapter {0}")]
    UnknownChapter(ChapterId),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("unknown chapter {0}")]
    UnknownChapter(ChapterId),
    #[error("chapter {0} has no answer key")]
    NoAnswerKey(ChapterId),
    #[error("score {score} exceeds the {max} questions of chapter {chapter}")]
    ScoreOutOfRange {
        chapter: ChapterId,
        score: u32,
        max: u32,
    },
}

/// Errors emitted by `ExportService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading session configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("a signed-in user requires both a remote URL and a remote API key")]
    MissingRemoteCredentials,
    #[error("invalid remote URL: {0}")]
    InvalidRemoteUrl(String),
    #[error(transparent)]
    UserId(#[from] UserIdError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("cannot read catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
