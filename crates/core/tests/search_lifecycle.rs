//! Search lifecycle integration tests.
//!
//! These tests drive `search_and_maybe_select` end to end in auto mode:
//! query -> poll -> filter -> rank -> select -> enqueue, including retries.

mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{fast_search_config, fixtures, TestFixture};
use digger_core::{
    network::NetworkError, search::FailureReason, AcquisitionOutcome, CandidateResponse,
    EngineError, SearchConfig, SearchContext,
};

fn context() -> SearchContext {
    SearchContext::album("Artist", "Album")
}

#[tokio::test]
async fn test_auto_mode_enqueues_best_candidate() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![
            fixtures::album_response(
                "mp3user",
                "Music\\Artist\\Album",
                &["01.mp3", "02.mp3", "03.mp3"],
                Some(128),
            ),
            fixtures::flac_album("flacuser", "Share\\Artist - Album", 10),
        ])
        .await;

    let mut config = fast_search_config();
    config.quality = Some(digger_core::quality::QualityPreferences {
        enabled: true,
        ..Default::default()
    });

    let outcome = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &config, &CancellationToken::new())
        .await
        .unwrap();

    let AcquisitionOutcome::Enqueued { download, attempts } = outcome else {
        panic!("expected an enqueued download, got {:?}", outcome);
    };
    assert_eq!(attempts, 1);
    assert_eq!(download.job.username, "flacuser");
    assert_eq!(download.selection.directory, "Share/Artist - Album");
    assert_eq!(download.selection.files.len(), 10);

    let enqueued = fixture.downloads.enqueued().await;
    assert_eq!(enqueued.len(), 1);
    assert_eq!(enqueued[0].filenames.len(), 10);
    assert_eq!(fixture.engine.monitor().active_count().await, 1);
    assert_eq!(
        fixture.network.recorded_queries().await,
        vec!["Artist Album".to_string()]
    );
}

#[tokio::test]
async fn test_events_follow_lifecycle() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("u", "A", 4)])
        .await;
    let mut rx = fixture.engine.subscribe();

    fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &context(),
            &fast_search_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        kinds.push(envelope.event.kind());
    }
    assert_eq!(
        kinds,
        vec!["search_started", "search_finished", "download_enqueued"]
    );
}

#[tokio::test]
async fn test_retry_simplifies_query() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("u", "Artist\\Album", 5)])
        .await;
    fixture
        .network
        .set_query_handler(|query| {
            if query.contains("Deluxe") {
                Some(Vec::new())
            } else {
                None
            }
        })
        .await;

    let context = SearchContext::album("Artist", "Album (Deluxe Edition)").with_year(2001);
    let outcome = fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &context,
            &fast_search_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.attempts(), 2);
    assert!(matches!(outcome, AcquisitionOutcome::Enqueued { .. }));
    assert_eq!(
        fixture.network.recorded_queries().await,
        vec![
            "Artist Album (Deluxe Edition)".to_string(),
            "Artist Album".to_string()
        ]
    );
}

#[tokio::test]
async fn test_fallback_templates_used_on_retry() {
    let fixture = TestFixture::new();
    let mut config = fast_search_config();
    config.query.fallbacks = vec!["{album}".to_string()];
    config.retry.simplify_on_retry = false;
    config.retry.max_attempts = 2;

    let outcome = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Failed {
            reason: FailureReason::NoCandidates,
            attempts: 2
        }
    ));
    assert_eq!(
        fixture.network.recorded_queries().await,
        vec!["Artist Album".to_string(), "Album".to_string()]
    );
}

#[tokio::test]
async fn test_all_attempts_exhausted() {
    let fixture = TestFixture::new();

    let outcome = fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &context(),
            &fast_search_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Failed {
            reason: FailureReason::NoCandidates,
            attempts: 3
        }
    ));
    assert_eq!(fixture.network.recorded_queries().await.len(), 3);
    assert!(fixture.downloads.enqueued().await.is_empty());
}

#[tokio::test]
async fn test_retry_disabled_single_attempt() {
    let fixture = TestFixture::new();
    let mut config = fast_search_config();
    config.retry.enabled = false;

    let outcome = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.attempts(), 1);
    assert_eq!(fixture.network.recorded_queries().await.len(), 1);
}

#[tokio::test]
async fn test_submit_failure_is_retried() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("u", "A", 3)])
        .await;
    fixture
        .network
        .set_next_submit_error(NetworkError::ConnectionFailed("refused".into()))
        .await;

    let outcome = fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &context(),
            &fast_search_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Enqueued { attempts: 2, .. }
    ));
}

#[tokio::test]
async fn test_submit_failure_on_last_attempt_fails() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_next_submit_error(NetworkError::ConnectionFailed("refused".into()))
        .await;
    let mut config = fast_search_config();
    config.retry.enabled = false;

    let outcome = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Failed {
            reason: FailureReason::SubmitFailed(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_no_valid_selection_is_final() {
    let fixture = TestFixture::new();
    // Only two files, album needs three.
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("u", "A", 2)])
        .await;

    let outcome = fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &context(),
            &fast_search_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Failed {
            reason: FailureReason::NoValidSelection,
            attempts: 1
        }
    ));
}

#[tokio::test]
async fn test_track_search_selects_single_file() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![fixtures::album_response(
            "u",
            "Artist\\Album",
            &["01 - Intro.flac", "02 - The Song.flac", "03 - Outro.flac"],
            None,
        )])
        .await;

    let outcome = fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &SearchContext::track("Artist", "The Song"),
            &fast_search_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let AcquisitionOutcome::Enqueued { download, .. } = outcome else {
        panic!("expected an enqueued download");
    };
    assert_eq!(download.selection.files.len(), 1);
    assert_eq!(
        download.selection.files[0].filename,
        "Artist\\Album\\02 - The Song.flac"
    );
    assert_eq!(
        fixture.network.recorded_queries().await,
        vec!["Artist The Song".to_string()]
    );
}

#[tokio::test]
async fn test_invalid_input_rejected_before_searching() {
    let fixture = TestFixture::new();
    let cancel = CancellationToken::new();

    let result = fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &SearchContext::album("  ", "Album"),
            &fast_search_config(),
            &cancel,
        )
        .await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));

    let bad_config = SearchConfig {
        poll_interval_ms: 0,
        ..fast_search_config()
    };
    let result = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &bad_config, &cancel)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));

    assert!(fixture.network.recorded_queries().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_delay() {
    let fixture = TestFixture::new();
    let config = SearchConfig {
        retry: digger_core::search::RetryPolicy {
            delay_ms: 60_000,
            ..Default::default()
        },
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let result = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &config, &cancel)
        .await;

    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(11));
    assert_eq!(fixture.network.recorded_queries().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_never_completing_search_bounded_by_ceiling() {
    let fixture = TestFixture::new();
    fixture.network.never_complete().await;
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("slow", "A", 3)])
        .await;

    let config = SearchConfig {
        search_timeout_ms: 20_000,
        max_wait_ms: 20_000,
        poll_interval_ms: 1_000,
        ..Default::default()
    };

    let started = tokio::time::Instant::now();
    let outcome = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &config, &CancellationToken::new())
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed <= Duration::from_millis(21_000), "took {:?}", elapsed);
    // Responses collected before the ceiling are still used.
    assert!(matches!(outcome, AcquisitionOutcome::Enqueued { .. }));
    assert_eq!(fixture.network.cancelled_searches().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_poll_cut_off_at_ceiling() {
    let fixture = TestFixture::new();
    fixture.network.never_complete().await;
    fixture.network.set_poll_delay(Duration::from_secs(30)).await;

    let config = SearchConfig {
        search_timeout_ms: 5_000,
        max_wait_ms: 5_000,
        poll_interval_ms: 1_000,
        retry: digger_core::search::RetryPolicy {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };

    let started = tokio::time::Instant::now();
    let outcome = fixture
        .engine
        .search_and_maybe_select("task-1", &context(), &config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() <= Duration::from_secs(5));
    assert!(matches!(outcome, AcquisitionOutcome::Failed { .. }));
    assert_eq!(fixture.network.poll_count().await, 1);
}

#[tokio::test]
async fn test_responses_without_audio_ignored() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![
            CandidateResponse {
                has_free_slot: true,
                upload_speed: 5_000_000,
                ..fixtures::album_response("pics", "Scans", &["front.jpg", "back.jpg", "cd.png"], None)
            },
            fixtures::flac_album("music", "Album", 3),
        ])
        .await;

    let outcome = fixture
        .engine
        .search_and_maybe_select(
            "task-1",
            &context(),
            &fast_search_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let AcquisitionOutcome::Enqueued { download, .. } = outcome else {
        panic!("expected an enqueued download");
    };
    assert_eq!(download.job.username, "music");
}
