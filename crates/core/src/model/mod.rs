mod catalog;
mod export;
mod ids;
mod progress;
mod quiz;

pub use catalog::{CatalogError, ChapterCatalog, ChapterInfo, ProgressConfig};
pub use export::ToolExport;
pub use ids::{ChapterId, ToolId, ToolIdError, UserId, UserIdError};
pub use progress::{ChapterProgress, ProgressPatch, ProgressSummary};
pub use quiz::{QuizKey, QuizOutcome};
