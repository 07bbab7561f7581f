#![forbid(unsafe_code)]

pub mod app_services;
pub mod chapter_service;
pub mod config;
pub mod error;
pub mod export_service;
pub mod progress_store;
pub mod quiz_service;
pub mod tool_service;

pub use companion_core::Clock;

pub use app_services::AppServices;
pub use chapter_service::{ChapterOverview, ChapterService};
pub use config::{BackendSelection, CompanionConfig};
pub use error::{AppServicesError, ChapterError, ConfigError, ExportError, QuizError};
pub use export_service::ExportService;
pub use progress_store::{ProgressStore, SaveStatus};
pub use quiz_service::QuizService;
pub use tool_service::ToolService;
