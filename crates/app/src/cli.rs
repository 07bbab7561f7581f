use std::path::PathBuf;

use clap::{Parser, Subcommand};
use companion_core::model::{ChapterId, ToolId};

#[derive(Parser)]
#[command(name = "companion")]
#[command(version)]
#[command(about = "Track reading, quiz and tool progress for the book")]
pub struct Cli {
    /// SQLite database for anonymous sessions (overrides COMPANION_DB_URL)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Chapter catalog JSON (overrides COMPANION_CATALOG)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Signed-in user id; switches to the remote store (overrides COMPANION_USER_ID)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show overall progress and every chapter
    Status,

    /// Show one chapter's progress record as JSON
    Show { chapter: ChapterId },

    /// Mark a chapter as read
    Complete { chapter: ChapterId },

    /// Submit quiz answers (option indices, in question order)
    Quiz {
        chapter: ChapterId,
        #[arg(required = true)]
        answers: Vec<u8>,
    },

    /// Record an externally graded quiz score
    Score { chapter: ChapterId, score: u32 },

    /// Record that a planning tool was completed for a chapter
    Tool { chapter: ChapterId, tool: ToolId },

    /// Replace a chapter's notes
    Notes { chapter: ChapterId, text: String },

    /// Export a tool's form state as a JSON file
    Export {
        /// Tool name; also used to derive the file name
        tool: String,
        /// Form state as a JSON document
        state: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}
