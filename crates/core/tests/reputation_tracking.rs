//! Reputation integration tests.
//!
//! Outcomes reach the tracker either directly through `record_outcome` or
//! via the download monitor, and feed back into filtering and ranking.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{fast_search_config, fixtures, TestConfig, TestFixture};
use digger_core::{
    monitor::JobOutcome,
    reputation::{ReputationSettings, UserImport, TRUSTED_SCORE_BONUS},
    AcquisitionOutcome, CandidateResponse, EngineError, JobStatus, Outcome, ReputationTracker,
    SearchContext, SelectionMode, SqliteReputationStore, SuccessOutcome, UserStatus,
};

fn success() -> Outcome {
    Outcome::Success(SuccessOutcome {
        bytes: 100 * 1024 * 1024,
        speed: 500_000,
        quality_score: 100,
    })
}

fn context() -> SearchContext {
    SearchContext::album("Artist", "Album")
}

#[tokio::test]
async fn test_usernames_are_case_insensitive() {
    let fixture = TestFixture::new();

    fixture.engine.record_outcome("Alice", success()).unwrap();
    fixture.engine.record_outcome("ALICE ", success()).unwrap();
    fixture.engine.record_outcome("alice", Outcome::Failure).unwrap();

    let record = fixture.engine.get_uploader_reputation("aLiCe").unwrap();
    assert_eq!(record.username, "alice");
    assert_eq!(record.success_count, 2);
    assert_eq!(record.failure_count, 1);
    assert_eq!(record.total_bytes, 200 * 1024 * 1024);
    assert_eq!(record.average_speed, 500_000);
    assert_eq!(fixture.reputation.stats().unwrap().total, 1);
}

#[tokio::test]
async fn test_get_uploader_reputation_creates_neutral_record() {
    let fixture = TestFixture::new();

    let record = fixture.engine.get_uploader_reputation("Newcomer").unwrap();
    assert_eq!(record.status, UserStatus::Neutral);
    assert_eq!(record.success_count, 0);

    let again = fixture.engine.get_uploader_reputation("newcomer").unwrap();
    assert_eq!(again.id, record.id);

    let result = fixture.engine.get_uploader_reputation("  ");
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
}

#[tokio::test]
async fn test_auto_trust_at_threshold() {
    let fixture = TestFixture::new();

    for _ in 0..4 {
        fixture.engine.record_outcome("alice", success()).unwrap();
    }
    let record = fixture.engine.get_uploader_reputation("alice").unwrap();
    assert_eq!(record.status, UserStatus::Neutral);

    fixture.engine.record_outcome("alice", success()).unwrap();
    let record = fixture.engine.get_uploader_reputation("alice").unwrap();
    assert_eq!(record.status, UserStatus::Trusted);
    assert_eq!(record.success_count, 5);

    // Failures never demote a trusted uploader.
    for _ in 0..5 {
        fixture.engine.record_outcome("alice", Outcome::Failure).unwrap();
    }
    let record = fixture.engine.get_uploader_reputation("alice").unwrap();
    assert_eq!(record.status, UserStatus::Trusted);
}

#[tokio::test]
async fn test_auto_flag_never_blocks() {
    let fixture = TestFixture::new();

    for _ in 0..2 {
        fixture.engine.record_outcome("bob", Outcome::Failure).unwrap();
    }
    assert_eq!(
        fixture.engine.get_uploader_reputation("bob").unwrap().status,
        UserStatus::Neutral
    );

    fixture.engine.record_outcome("bob", Outcome::Failure).unwrap();
    assert_eq!(
        fixture.engine.get_uploader_reputation("bob").unwrap().status,
        UserStatus::Flagged
    );

    for _ in 0..20 {
        fixture.engine.record_outcome("bob", Outcome::Failure).unwrap();
    }
    let record = fixture.engine.get_uploader_reputation("bob").unwrap();
    assert_eq!(record.status, UserStatus::Flagged);
    assert_eq!(record.failure_count, 23);
    assert!(!fixture.reputation.is_blocked("bob").unwrap());
}

#[tokio::test]
async fn test_blocked_uploader_filtered_from_search() {
    let fixture = TestFixture::new();
    // B outranks A on availability but is blocked.
    let b = CandidateResponse {
        has_free_slot: true,
        upload_speed: 5_000_000,
        ..fixtures::flac_album("B", "Music\\Album", 10)
    };
    let a = fixtures::flac_album("A", "Share\\Album", 10);
    fixture.network.set_responses(vec![b, a]).await;

    let record = fixture.engine.get_uploader_reputation("b").unwrap();
    fixture
        .reputation
        .update_status(&record.id, UserStatus::Blocked, Some("fake files"))
        .unwrap();

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
    assert_eq!(download.job.username, "A");
}

#[tokio::test]
async fn test_blocked_uploader_kept_when_disabled() {
    let fixture = TestFixture::with_config(TestConfig {
        reputation: ReputationSettings::default(),
        ..Default::default()
    });
    let b = CandidateResponse {
        has_free_slot: true,
        ..fixtures::flac_album("B", "Music\\Album", 10)
    };
    fixture.network.set_responses(vec![b]).await;

    let record = fixture.engine.get_uploader_reputation("B").unwrap();
    fixture
        .reputation
        .update_status(&record.id, UserStatus::Blocked, None)
        .unwrap();

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
    assert!(matches!(outcome, AcquisitionOutcome::Enqueued { .. }));

    // Outcomes are ignored while disabled.
    fixture.engine.record_outcome("B", success()).unwrap();
    assert_eq!(
        fixture.engine.get_uploader_reputation("B").unwrap().success_count,
        0
    );
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let fixture = TestFixture::new();
    for _ in 0..5 {
        fixture.engine.record_outcome("Trusty", success()).unwrap();
    }
    for _ in 0..3 {
        fixture.engine.record_outcome("flaky", Outcome::Failure).unwrap();
    }
    let record = fixture.engine.get_uploader_reputation("spammer").unwrap();
    fixture
        .reputation
        .update_status(&record.id, UserStatus::Blocked, None)
        .unwrap();
    fixture.engine.get_uploader_reputation("plain").unwrap();

    let export = fixture.reputation.export_users().unwrap();
    assert_eq!(export.trusted, vec!["trusty".to_string()]);
    assert_eq!(export.flagged, vec!["flaky".to_string()]);
    assert_eq!(export.blocked, vec!["spammer".to_string()]);

    let summary = fixture
        .reputation
        .import_users(&UserImport::from(export.clone()))
        .unwrap();
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.updated, 0);

    let other = ReputationTracker::new(
        Arc::new(SqliteReputationStore::in_memory().unwrap()),
        ReputationSettings {
            enabled: true,
            ..Default::default()
        },
    );
    let summary = other.import_users(&UserImport::from(export.clone())).unwrap();
    assert_eq!(summary.imported, 3);
    assert_eq!(other.export_users().unwrap(), export);
}

#[tokio::test]
async fn test_monitor_outcomes_build_trust() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("Friend", "Album", 4)])
        .await;
    fixture
        .downloads
        .set_user_status(
            "Friend",
            JobStatus::Succeeded {
                bytes: 4 * fixtures::FILE_SIZE,
                average_speed: 1_000_000,
            },
        )
        .await;

    for i in 0..5 {
        fixture
            .engine
            .search_and_maybe_select(
                &format!("task-{}", i),
                &context(),
                &fast_search_config(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let settled = fixture.engine.monitor().check_once().await;
        assert_eq!(settled.len(), 1);
        assert!(matches!(settled[0].1, JobOutcome::Succeeded { .. }));
    }

    let record = fixture.engine.get_uploader_reputation("friend").unwrap();
    assert_eq!(record.status, UserStatus::Trusted);
    assert_eq!(record.success_count, 5);
    assert_eq!(record.quality_score, 100);
    assert_eq!(record.average_speed, 1_000_000);
    assert_eq!(fixture.engine.monitor().active_count().await, 0);
}

#[tokio::test]
async fn test_trusted_uploader_ranks_first() {
    let fixture = TestFixture::with_config(TestConfig {
        mode: SelectionMode::Interactive,
        ..Default::default()
    });
    for _ in 0..5 {
        fixture.engine.record_outcome("friend", success()).unwrap();
    }
    fixture
        .network
        .set_responses(vec![
            fixtures::flac_album("stranger", "Album", 4),
            fixtures::flac_album("Friend", "Album", 4),
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

    let AcquisitionOutcome::AwaitingSelection { pending, .. } = outcome else {
        panic!("expected a staged selection");
    };
    assert_eq!(pending.candidates[0].username(), "Friend");
    assert_eq!(pending.candidates[0].reputation_bonus, TRUSTED_SCORE_BONUS);
    assert_eq!(pending.candidates[1].reputation_bonus, 0);
}

#[tokio::test]
async fn test_failed_download_recorded() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("bob", "Album", 3)])
        .await;
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

    assert!(fixture.engine.monitor().check_once().await.is_empty());

    let job = fixture.downloads.enqueued().await.remove(0);
    fixture
        .downloads
        .set_job_status(
            &job.id,
            JobStatus::Failed {
                reason: "Rejected".to_string(),
            },
        )
        .await;
    let settled = fixture.engine.monitor().check_once().await;
    assert_eq!(
        settled,
        vec![(
            job.id.clone(),
            JobOutcome::Failed {
                reason: "Rejected".to_string()
            }
        )]
    );

    let record = fixture.engine.get_uploader_reputation("bob").unwrap();
    assert_eq!(record.failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_download_abandoned() {
    let fixture = TestFixture::new();
    fixture
        .network
        .set_responses(vec![fixtures::flac_album("slowpoke", "Album", 3)])
        .await;
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

    tokio::time::advance(Duration::from_secs(3600)).await;
    assert!(fixture.engine.monitor().check_once().await.is_empty());

    tokio::time::advance(Duration::from_secs(6 * 3600)).await;
    let settled = fixture.engine.monitor().check_once().await;
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].1, JobOutcome::Abandoned);

    let record = fixture.engine.get_uploader_reputation("slowpoke").unwrap();
    assert_eq!(record.failure_count, 1);
}

#[tokio::test]
async fn test_reputation_persists_across_reopen() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("reputation.db");
    let settings = ReputationSettings {
        enabled: true,
        ..Default::default()
    };

    {
        let tracker = ReputationTracker::new(
            Arc::new(SqliteReputationStore::new(&path).unwrap()),
            settings.clone(),
        );
        for _ in 0..5 {
            tracker
                .record_success(
                    "Keeper",
                    SuccessOutcome {
                        bytes: 10,
                        speed: 10,
                        quality_score: 80,
                    },
                )
                .unwrap();
        }
    }

    let reopened = ReputationTracker::new(
        Arc::new(SqliteReputationStore::new(&path).unwrap()),
        settings,
    );
    let record = reopened.get_by_username("keeper").unwrap().unwrap();
    assert_eq!(record.status, UserStatus::Trusted);
    assert_eq!(record.success_count, 5);
    assert_eq!(record.total_bytes, 50);
    assert_eq!(record.quality_score, 80);
}
