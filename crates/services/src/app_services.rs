use std::sync::Arc;

use companion_core::model::{ChapterCatalog, ProgressSummary};
use storage::repository::Storage;

use crate::Clock;
use crate::chapter_service::ChapterService;
use crate::config::{BackendSelection, CompanionConfig};
use crate::error::AppServicesError;
use crate::export_service::ExportService;
use crate::progress_store::ProgressStore;
use crate::quiz_service::QuizService;
use crate::tool_service::ToolService;

/// Assembles app-facing services around one session's progress store.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<ChapterCatalog>,
    store: Arc<ProgressStore>,
    chapters: Arc<ChapterService>,
    quizzes: Arc<QuizService>,
    tools: Arc<ToolService>,
    exports: Arc<ExportService>,
}

impl AppServices {
    /// Resolve the backend from `config`, open storage, and load progress.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for invalid configuration (for
    /// example a signed-in user without remote credentials) and
    /// `AppServicesError::Sqlite` if the local database cannot be opened.
    pub async fn bootstrap(config: &CompanionConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let catalog = config.load_catalog()?;
        let storage = match config.backend_selection()? {
            BackendSelection::Local { database_url } => Storage::sqlite(&database_url).await?,
            BackendSelection::Remote {
                config: remote,
                user_id,
                access_token,
            } => Storage::remote(remote, user_id, access_token),
        };
        Ok(Self::with_storage(storage, catalog, clock).await)
    }

    /// Build services over an already-selected storage backend.
    pub async fn with_storage(storage: Storage, catalog: ChapterCatalog, clock: Clock) -> Self {
        let catalog = Arc::new(catalog);
        let store = Arc::new(ProgressStore::open(storage.progress, catalog.progress_config()).await);

        let chapters = Arc::new(ChapterService::new(Arc::clone(&catalog), Arc::clone(&store)));
        let quizzes = Arc::new(QuizService::new(Arc::clone(&catalog), Arc::clone(&store)));
        let tools = Arc::new(ToolService::new(Arc::clone(&store)));
        let exports = Arc::new(ExportService::new(clock));

        Self {
            catalog,
            store,
            chapters,
            quizzes,
            tools,
            exports,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<ChapterCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn chapters(&self) -> Arc<ChapterService> {
        Arc::clone(&self.chapters)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn tools(&self) -> Arc<ToolService> {
        Arc::clone(&self.tools)
    }

    #[must_use]
    pub fn exports(&self) -> Arc<ExportService> {
        Arc::clone(&self.exports)
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        self.store.total_progress()
    }
}
