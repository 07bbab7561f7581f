use std::sync::Arc;

use companion_core::model::{ChapterId, ChapterProgress, ProgressPatch, ToolId};

use crate::progress_store::ProgressStore;

/// Records planning-tool completions against a chapter.
#[derive(Clone)]
pub struct ToolService {
    store: Arc<ProgressStore>,
}

impl ToolService {
    #[must_use]
    pub fn new(store: Arc<ProgressStore>) -> Self {
        Self { store }
    }

    /// Add `tool` to the chapter's used tools. A tool already listed for
    /// this chapter leaves the record as it is.
    pub async fn record_tool_use(&self, chapter_id: ChapterId, tool: ToolId) -> ChapterProgress {
        self.store
            .update_with(chapter_id, move |current| {
                if current.has_used_tool(&tool) {
                    return None;
                }
                let mut tools = current.tools_used.clone();
                tools.push(tool);
                Some(ProgressPatch::new().tools_used(tools))
            })
            .await
    }
}
