use std::sync::Arc;

use companion_core::model::{ChapterCatalog, ChapterId, ChapterProgress, ProgressPatch, ToolId};
use companion_core::time::fixed_clock;
use services::{AppServices, CompanionConfig, ProgressStore};
use storage::local::{LocalProgressBackend, decode_progress_map, encode_progress_map};
use storage::repository::{BackendKind, InMemoryBlobStore, InMemoryProgressBackend, Storage};

fn local_config(database_url: &str) -> CompanionConfig {
    CompanionConfig {
        database_url: Some(database_url.to_owned()),
        ..CompanionConfig::default()
    }
}

#[tokio::test]
async fn reading_flow_updates_summary() {
    let app = AppServices::with_storage(
        Storage::in_memory(BackendKind::Local),
        ChapterCatalog::builtin(),
        fixed_clock(),
    )
    .await;

    app.chapters().mark_complete(ChapterId::new(1)).await.unwrap();
    app.quizzes()
        .submit_answers(ChapterId::new(1), &[1, 0, 2, 3, 1])
        .await
        .unwrap();
    app.chapters().mark_complete(ChapterId::new(3)).await.unwrap();
    app.quizzes().submit_score(ChapterId::new(2), 3).await.unwrap();
    app.quizzes().submit_score(ChapterId::new(3), 5).await.unwrap();
    app.tools()
        .record_tool_use(ChapterId::new(2), ToolId::new("audit").unwrap())
        .await;
    app.tools()
        .record_tool_use(ChapterId::new(3), ToolId::new("audit").unwrap())
        .await;

    let summary = app.summary();
    assert_eq!(summary.completed_chapters, 2);
    assert_eq!(summary.overall_progress, 52);
    assert_eq!(summary.tools_used, 1);
    assert!((summary.total_time_spent - 33.0).abs() < f64::EPSILON);

    // untouched chapters still read as defaults
    assert_eq!(
        app.progress().chapter_progress(ChapterId::new(5)),
        ChapterProgress::new_default(ChapterId::new(5))
    );
}

#[tokio::test]
async fn anonymous_session_survives_reload_through_sqlite() {
    let url = "sqlite:file:memdb_flow_reload?mode=memory&cache=shared";
    let config = local_config(url);

    let first = AppServices::bootstrap(&config, fixed_clock()).await.unwrap();
    assert_eq!(first.progress().backend_kind(), BackendKind::Local);
    first.chapters().mark_complete(ChapterId::new(2)).await.unwrap();
    first.quizzes().submit_score(ChapterId::new(2), 4).await.unwrap();
    first
        .chapters()
        .save_notes(ChapterId::new(4), "try the launch worksheet")
        .await
        .unwrap();

    // `first` stays alive so the shared in-memory database is kept
    let second = AppServices::bootstrap(&config, fixed_clock()).await.unwrap();
    assert!(!second.progress().load_failed());
    assert_eq!(second.progress().records(), first.progress().records());
    assert_eq!(second.summary(), first.summary());
}

#[tokio::test]
async fn local_blob_round_trip_matches_memory() {
    let blobs = InMemoryBlobStore::new();
    let backend = Arc::new(LocalProgressBackend::new(blobs.clone()));
    let store = ProgressStore::open(backend, Default::default()).await;

    store
        .update_progress(ChapterId::new(1), ProgressPatch::new().completed(true))
        .await;
    store
        .update_progress(ChapterId::new(1), ProgressPatch::new().quiz_score(2))
        .await;
    store
        .update_progress(ChapterId::new(3), ProgressPatch::new().time_spent(18.0))
        .await;

    let encoded = encode_progress_map(&store.records()).unwrap();
    assert_eq!(decode_progress_map(&encoded).unwrap(), store.records());

    let reopened = ProgressStore::open(
        Arc::new(LocalProgressBackend::new(blobs)),
        Default::default(),
    )
    .await;
    assert_eq!(reopened.records(), store.records());
}

#[tokio::test]
async fn signed_in_session_without_credentials_fails_fast() {
    let config = CompanionConfig {
        user_id: Some("6f1c2d7e-8a43-4b9e-9a51-0c2f7d7f1e11".into()),
        ..CompanionConfig::default()
    };
    let err = AppServices::bootstrap(&config, fixed_clock())
        .await
        .err()
        .expect("bootstrap should fail");
    assert!(matches!(
        err,
        services::AppServicesError::Config(services::ConfigError::MissingRemoteCredentials)
    ));
}

#[tokio::test]
async fn remote_session_keeps_working_when_writes_fail() {
    let backend = InMemoryProgressBackend::new(BackendKind::Remote);
    let storage = Storage {
        progress: Arc::new(backend.clone()),
    };
    let app = AppServices::with_storage(storage, ChapterCatalog::builtin(), fixed_clock()).await;

    app.quizzes().submit_score(ChapterId::new(1), 2).await.unwrap();
    app.progress().flush().await;
    backend.fail_saves(true);
    app.quizzes().submit_score(ChapterId::new(1), 5).await.unwrap();
    app.progress().flush().await;

    assert_eq!(app.progress().chapter_progress(ChapterId::new(1)).quiz_score, 5);
    assert_eq!(backend.stored()[&ChapterId::new(1)].quiz_score, 2);

    let status = app.progress().save_status();
    assert_eq!(status.failed_writes, 1);
    assert!(!status.is_clean());
}
