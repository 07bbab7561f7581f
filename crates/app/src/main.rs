mod cli;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Commands};
use services::{AppServices, Clock, CompanionConfig};

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:"
        || trimmed.starts_with("sqlite://")
        || trimmed.contains("mode=memory")
    {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

// SQLite creates the database file but not its parent directories.
fn prepare_sqlite_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(format!("invalid database url: {db_url}").into());
    }

    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn config_from(cli: &Cli) -> CompanionConfig {
    let mut config = CompanionConfig::from_env();
    if let Some(db) = &cli.db {
        config.database_url = Some(db.clone());
    }
    if let Some(catalog) = &cli.catalog {
        config.catalog_path = Some(catalog.clone());
    }
    if let Some(user) = &cli.user {
        config.user_id = Some(user.clone());
    }
    let normalized = normalize_sqlite_url(config.database_url());
    config.database_url = Some(normalized);
    config
}

fn print_status(app: &AppServices) {
    let summary = app.summary();
    println!(
        "Overall progress: {}%  |  chapters completed: {}/{}  |  time: {:.0} min  |  tools used: {}",
        summary.overall_progress,
        summary.completed_chapters,
        app.catalog().len(),
        summary.total_time_spent,
        summary.tools_used,
    );
    for entry in app.chapters().overview() {
        let mark = if entry.progress.completed { "x" } else { " " };
        let quiz = if entry.progress.quiz_completed {
            format!("{}/{}", entry.progress.quiz_score, entry.info.question_count)
        } else {
            "-".to_owned()
        };
        println!(
            "[{mark}] {:>2}. {:<32} quiz {quiz:<5} tools {}",
            entry.info.id,
            entry.info.title,
            entry.progress.tools_used.len(),
        );
    }

    let status = app.progress().save_status();
    if app.progress().load_failed() {
        println!("warning: saved progress could not be loaded; showing an empty session");
    }
    if let Some(err) = status.last_error {
        println!("warning: latest changes were not saved ({err})");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config_from(&cli);
    if config.user_id.is_none() {
        prepare_sqlite_dir(config.database_url())?;
    }

    let app = AppServices::bootstrap(&config, Clock::default()).await?;

    match cli.command {
        Commands::Status => print_status(&app),
        Commands::Show { chapter } => {
            let record = app.progress().chapter_progress(chapter);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Complete { chapter } => {
            let record = app.chapters().mark_complete(chapter).await?;
            println!("Chapter {chapter} complete ({:.0} min)", record.time_spent);
        }
        Commands::Quiz { chapter, answers } => {
            let outcome = app.quizzes().submit_answers(chapter, &answers).await?;
            println!(
                "Chapter {chapter} quiz: {}/{} ({}%)",
                outcome.correct,
                outcome.total,
                outcome.percent()
            );
        }
        Commands::Score { chapter, score } => {
            app.quizzes().submit_score(chapter, score).await?;
            println!("Chapter {chapter} quiz score set to {score}");
        }
        Commands::Tool { chapter, tool } => {
            let record = app.tools().record_tool_use(chapter, tool).await;
            println!(
                "Chapter {chapter}: {} tool(s) used",
                record.tools_used.len()
            );
        }
        Commands::Notes { chapter, text } => {
            app.chapters().save_notes(chapter, text).await?;
            println!("Chapter {chapter} notes saved");
        }
        Commands::Export { tool, state, dir } => {
            let state: serde_json::Value = serde_json::from_str(&state)?;
            let path = app.exports().export(&tool, state, &dir)?;
            println!("Exported {}", path.display());
        }
    }

    app.progress().flush().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
