//! Orchestrator lifecycle integration tests.
//!
//! These tests drive the task queue end to end with a scripted encoder:
//! pending -> running -> completed | failed

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use mediatask_core::{
    testing::{fixtures, MockFileRegistry, MockSpawner},
    EncoderSelection, EngineAvailability, EnqueueError, OrchestratorConfig, OrchestratorError,
    Platform, ProcessError, ProcessingRequest, StaticCapabilityProvider, TaskEvent,
    TaskOrchestrator, TaskRecord, TaskStatus, VideoCodec,
};

/// Test helper owning the mocks and working directories.
struct TestHarness {
    spawner: MockSpawner,
    registry: MockFileRegistry,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            spawner: MockSpawner::new(),
            registry: MockFileRegistry::new(),
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            cache_dir: self.temp_dir.path().join("cache"),
            output_dir: self.temp_dir.path().join("out"),
            ..Default::default()
        }
    }

    fn create_orchestrator(&self) -> TaskOrchestrator {
        self.create_orchestrator_with(self.config(), Platform::Desktop, &["libx264", "mpeg4"])
    }

    fn create_orchestrator_with(
        &self,
        config: OrchestratorConfig,
        platform: Platform,
        encoders: &[&str],
    ) -> TaskOrchestrator {
        TaskOrchestrator::new(
            config,
            EngineAvailability::enabled(),
            Arc::new(StaticCapabilityProvider::new(platform, encoders.iter().copied())),
            Arc::new(self.spawner.clone()),
            Arc::new(self.registry.clone()),
        )
    }

    async fn wait_for_spawns(&self, count: usize) {
        let start = std::time::Instant::now();
        while self.spawner.spawn_count().await < count {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "timed out waiting for {} spawns",
                count
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn wait_for<F>(orchestrator: &TaskOrchestrator, id: &str, predicate: F) -> TaskRecord
where
    F: Fn(&TaskRecord) -> bool,
{
    let start = std::time::Instant::now();
    loop {
        if let Some(task) = orchestrator.task(id).await {
            if predicate(&task) {
                return task;
            }
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "timed out waiting on task {}: {:?}",
                id,
                task.status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_status(
    orchestrator: &TaskOrchestrator,
    id: &str,
    status: TaskStatus,
) -> TaskRecord {
    wait_for(orchestrator, id, |t| t.status == status).await
}

#[tokio::test]
async fn test_enqueue_when_idle_starts_immediately() {
    let harness = TestHarness::new();
    harness.spawner.set_hold_until_killed(true).await;
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();

    let task = orchestrator.task(&id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Running);
    assert!(task.started_at.is_some());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_disabled_engine_refuses_enqueue() {
    let harness = TestHarness::new();
    let orchestrator = TaskOrchestrator::new(
        harness.config(),
        EngineAvailability::disabled("engine switched off"),
        Arc::new(StaticCapabilityProvider::new(Platform::Desktop, ["libx264"])),
        Arc::new(harness.spawner.clone()),
        Arc::new(harness.registry.clone()),
    );

    let err = orchestrator
        .enqueue(fixtures::mute_request())
        .await
        .unwrap_err();
    assert!(matches!(err, EnqueueError::EngineUnavailable(ref reason) if reason == "engine switched off"));
    assert!(orchestrator.tasks().await.is_empty());
    assert_eq!(harness.spawner.spawn_count().await, 0);
}

#[tokio::test]
async fn test_invalid_request_creates_no_task() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator();

    let err = orchestrator
        .enqueue(fixtures::trim_request(5000, 1000))
        .await
        .unwrap_err();
    assert!(matches!(err, EnqueueError::Validation(_)));
    assert!(orchestrator.tasks().await.is_empty());
}

#[tokio::test]
async fn test_no_encoder_refuses_video_work() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator_with(harness.config(), Platform::Desktop, &[]);

    let err = orchestrator
        .enqueue(fixtures::compress_request(mediatask_core::Preset::P720))
        .await
        .unwrap_err();
    assert!(matches!(err, EnqueueError::EngineUnavailable(_)));
    assert!(orchestrator.tasks().await.is_empty());

    // Stream-copy work needs no encoder.
    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    wait_for_status(&orchestrator, &id, TaskStatus::Completed).await;
}

#[tokio::test]
async fn test_completion_registers_output() {
    let harness = TestHarness::new();
    harness
        .spawner
        .set_lines(["size=1kB time=00:00:10.000 bitrate=1.0kbits/s"])
        .await;
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Completed).await;

    assert_eq!(task.progress, 1.0);
    assert_eq!(task.output_file_ids, vec!["file-1"]);
    assert!(task.finished_at.is_some());
    assert!(task.error.is_none());

    let registered = harness.registry.registered().await;
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].source_id, "source-1");
    assert!(registered[0]
        .output_path
        .starts_with(harness.temp_dir.path().join("out")));
    let name = registered[0].output_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("holiday_clip_mute_"), "{}", name);
    assert!(name.ends_with(".mp4"), "{}", name);
}

#[tokio::test]
async fn test_trim_scenario() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator
        .enqueue(fixtures::trim_request(1200, 6400))
        .await
        .unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Completed).await;
    assert_eq!(task.duration_ms, Some(5200));
    assert!(task.encoder.is_none());

    let args = harness.spawner.spawned_args().await;
    let argv = &args[0];
    let ss = argv.iter().position(|a| a == "-ss").unwrap();
    assert_eq!(argv[ss + 1], "1.200");
    let to = argv.iter().position(|a| a == "-to").unwrap();
    assert_eq!(argv[to + 1], "6.400");
    assert!(argv.windows(2).any(|w| w == ["-c", "copy"]));

    let registered = harness.registry.registered().await;
    assert_eq!(
        argv.last().unwrap(),
        &registered[0].output_path.to_string_lossy().to_string()
    );

    assert!(task.log_lines[0].starts_with("command: ffmpeg "));
}

#[tokio::test]
async fn test_progress_from_encoder_output() {
    let harness = TestHarness::new();
    harness
        .spawner
        .set_lines([
            "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':",
            "frame=  120 fps= 60 q=-1.0 size=     512kB time=00:00:05.000 bitrate= 838.9kbits/s speed=2.0x",
        ])
        .await;
    harness.spawner.set_hold_until_killed(true).await;
    let orchestrator = harness.create_orchestrator();
    let mut events = orchestrator.subscribe();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for(&orchestrator, &id, |t| t.processed_ms == 5000).await;

    assert_eq!(task.status, TaskStatus::Running);
    assert!((task.progress - 0.25).abs() < 1e-9);
    assert!(task.log_lines.iter().any(|l| l.starts_with("Input #0")));

    let mut saw_progress = false;
    while let Ok(event) = events.try_recv() {
        if let TaskEvent::Updated(record) = event {
            if record.processed_ms == 5000 {
                saw_progress = true;
            }
        }
    }
    assert!(saw_progress);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_events_follow_lifecycle() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator();
    let mut events = orchestrator.subscribe();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    wait_for_status(&orchestrator, &id, TaskStatus::Completed).await;

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TaskEvent::Updated(record) = event {
            if statuses.last() != Some(&record.status) {
                statuses.push(record.status);
            }
        }
    }
    assert_eq!(
        statuses,
        vec![TaskStatus::Pending, TaskStatus::Running, TaskStatus::Completed]
    );

    orchestrator.remove_task(&id).await.unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(event, TaskEvent::Removed { id: id.clone() });
}

#[tokio::test]
async fn test_nonzero_exit_fails_task() {
    let harness = TestHarness::new();
    harness.spawner.set_lines(["Invalid data found when processing input"]).await;
    harness.spawner.set_exit_code(1).await;
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;

    assert_eq!(task.engine_error_code.as_deref(), Some("ffmpeg_exit_1"));
    assert_eq!(task.error.as_deref(), Some("ffmpeg exited with code 1"));
    assert!(task.log_lines.iter().any(|l| l.contains("Invalid data")));
    assert!(harness.registry.registered().await.is_empty());
}

#[tokio::test]
async fn test_missing_binary_fails_task() {
    let harness = TestHarness::new();
    harness
        .spawner
        .set_next_error(ProcessError::NotFound {
            path: "/opt/ffmpeg".into(),
        })
        .await;
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;
    assert_eq!(
        task.engine_error_code.as_deref(),
        Some("ffmpeg_executor_unavailable")
    );
}

#[tokio::test]
async fn test_spawn_failure_fails_task() {
    let harness = TestHarness::new();
    harness
        .spawner
        .set_next_error(ProcessError::Spawn {
            path: "ffmpeg".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
        .await;
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;
    assert_eq!(task.engine_error_code.as_deref(), Some("spawn_failed"));
}

#[tokio::test]
async fn test_registration_failure_fails_task() {
    let harness = TestHarness::new();
    harness.registry.set_next_error("storage full").await;
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;
    assert_eq!(
        task.engine_error_code.as_deref(),
        Some("output_registration_failed")
    );
    assert!(task.error.unwrap().contains("storage full"));
}

#[tokio::test]
async fn test_cancel_running_promotes_next() {
    let harness = TestHarness::new();
    harness.spawner.set_hold_until_killed(true).await;
    let orchestrator = harness.create_orchestrator();

    let first = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let second = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    assert_eq!(
        orchestrator.task(&second).await.unwrap().status,
        TaskStatus::Pending
    );

    orchestrator.cancel_task(&first).await.unwrap();

    let task = orchestrator.task(&first).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.engine_error_code.as_deref(), Some("cancelled"));
    assert_eq!(
        orchestrator.task(&second).await.unwrap().status,
        TaskStatus::Running
    );

    // Settled tasks cannot be cancelled again.
    let err = orchestrator.cancel_task(&first).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState { .. }));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_timeout_kills_task() {
    let harness = TestHarness::new();
    harness.spawner.set_hold_until_killed(true).await;
    let config = OrchestratorConfig {
        max_task_duration: Some(Duration::from_millis(100)),
        ..harness.config()
    };
    let orchestrator = harness.create_orchestrator_with(config, Platform::Desktop, &["libx264"]);

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;
    assert_eq!(task.engine_error_code.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_retry_failed_task() {
    let harness = TestHarness::new();
    harness.spawner.set_exit_code(1).await;
    let orchestrator = harness.create_orchestrator();

    let failed = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    wait_for_status(&orchestrator, &failed, TaskStatus::Failed).await;

    // Keep the queue busy so the retried task stays pending.
    harness.spawner.set_exit_code(0).await;
    harness.spawner.set_hold_until_killed(true).await;
    let blocker = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    assert_eq!(
        orchestrator.task(&blocker).await.unwrap().status,
        TaskStatus::Running
    );

    orchestrator.retry_task(&failed).await.unwrap();
    let task = orchestrator.task(&failed).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.retries, 1);
    assert_eq!(task.progress, 0.0);
    assert_eq!(task.processed_ms, 0);
    assert!(task.engine_error_code.is_none());

    // Only failed tasks can be retried.
    let err = orchestrator.retry_task(&blocker).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState { .. }));

    harness.spawner.set_hold_until_killed(false).await;
    orchestrator.cancel_task(&blocker).await.unwrap();
    let task = wait_for_status(&orchestrator, &failed, TaskStatus::Completed).await;
    assert_eq!(task.retries, 1);
}

#[tokio::test]
async fn test_retry_policies() {
    let harness = TestHarness::new();
    harness.spawner.set_exit_code(1).await;
    let config = OrchestratorConfig {
        max_retries: Some(1),
        ..harness.config()
    };
    let orchestrator = harness.create_orchestrator_with(config, Platform::Desktop, &["libx264"]);

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;
    orchestrator.retry_task(&id).await.unwrap();
    wait_for(&orchestrator, &id, |t| t.status == TaskStatus::Failed && t.retries == 1).await;

    let err = orchestrator.retry_task(&id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::RetryLimitReached { max: 1, .. }));

    let config = OrchestratorConfig {
        retry_cooldown: Duration::from_secs(60),
        ..harness.config()
    };
    let orchestrator = harness.create_orchestrator_with(config, Platform::Desktop, &["libx264"]);
    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;

    let err = orchestrator.retry_task(&id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::RetryTooSoon { remaining_ms, .. } if remaining_ms > 0));
}

#[tokio::test]
async fn test_remove_task() {
    let harness = TestHarness::new();
    harness.spawner.set_hold_until_killed(true).await;
    let orchestrator = harness.create_orchestrator();

    let running = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let pending = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();

    let err = orchestrator.remove_task(&running).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState { .. }));
    assert!(orchestrator.task(&running).await.is_some());

    orchestrator.remove_task(&pending).await.unwrap();
    assert!(orchestrator.task(&pending).await.is_none());

    // The removed task never runs.
    harness.wait_for_spawns(1).await;
    orchestrator.cancel_task(&running).await.unwrap();
    let status = orchestrator.status().await;
    assert_eq!(status.running_count, 0);
    assert_eq!(harness.spawner.spawn_count().await, 1);
}

#[tokio::test]
async fn test_clear_finished_keeps_active_tasks() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator();

    let completed = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    wait_for_status(&orchestrator, &completed, TaskStatus::Completed).await;

    harness.spawner.set_exit_code(1).await;
    let failed = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    wait_for_status(&orchestrator, &failed, TaskStatus::Failed).await;

    harness.spawner.set_hold_until_killed(true).await;
    let running = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let pending = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();

    assert_eq!(orchestrator.clear_finished().await, 2);

    let ids: Vec<String> = orchestrator.tasks().await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![running, pending]);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_fallback_encoder_used_in_command() {
    let harness = TestHarness::new();
    let orchestrator =
        harness.create_orchestrator_with(harness.config(), Platform::Apple, &["libx264", "mpeg4"]);

    let id = orchestrator
        .enqueue(fixtures::transcode_request(VideoCodec::Hevc))
        .await
        .unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Completed).await;

    let selection: EncoderSelection = task.encoder.clone().unwrap();
    assert_eq!(selection.requested_codec, VideoCodec::Hevc);
    assert_eq!(selection.effective_codec, VideoCodec::Mpeg4);
    assert!(!selection.fallback_reason.clone().unwrap().is_empty());
    assert!(task
        .log_lines
        .iter()
        .any(|l| l.starts_with("encoder fallback: ")));

    let argv = &harness.spawner.spawned_args().await[0];
    assert!(argv.windows(2).any(|w| w == ["-c:v", "mpeg4"]));
    assert!(argv.iter().any(|a| a == "-q:v"));
    assert!(!argv.iter().any(|a| a == "-crf"));
}

#[tokio::test]
async fn test_merge_writes_and_removes_manifest() {
    let harness = TestHarness::new();
    harness.spawner.set_hold_until_killed(true).await;
    let orchestrator = harness.create_orchestrator();

    let request: ProcessingRequest = fixtures::merge_request(&["/media/a.mp4", "/media/b's.mp4"]);
    let id = orchestrator.enqueue(request).await.unwrap();
    harness.wait_for_spawns(1).await;

    let argv = harness.spawner.spawned_args().await[0].clone();
    let i = argv.iter().position(|a| a == "concat").unwrap();
    assert_eq!(argv[i - 1], "-f");
    assert_eq!(&argv[i + 1..i + 4], ["-safe", "0", "-i"]);
    let manifest = std::path::PathBuf::from(&argv[i + 4]);
    assert!(manifest.starts_with(harness.temp_dir.path().join("cache")));

    let contents = std::fs::read_to_string(&manifest).unwrap();
    assert_eq!(
        contents,
        "file '/media/a.mp4'\nfile '/media/b'\\''s.mp4'\n"
    );

    harness.spawner.set_hold_until_killed(false).await;
    orchestrator.cancel_task(&id).await.unwrap();
    // Removed before the task settles.
    assert!(!manifest.exists());
}

fn terminal_updates(events: &mut tokio::sync::broadcast::Receiver<TaskEvent>, id: &str) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if let TaskEvent::Updated(record) = event {
            if record.id == id && record.status.is_terminal() {
                count += 1;
            }
        }
    }
    count
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_merges_leave_no_manifest() {
    let harness = TestHarness::new();
    harness.spawner.set_hold_until_killed(true).await;
    let orchestrator = harness.create_orchestrator();
    let cache_dir = harness.temp_dir.path().join("cache");

    for _ in 0..50 {
        let request = fixtures::merge_request(&["/media/a.mp4", "/media/b.mp4"]);
        let id = orchestrator.enqueue(request).await.unwrap();
        orchestrator.cancel_task(&id).await.unwrap();

        let task = orchestrator.task(&id).await.unwrap();
        assert_eq!(task.engine_error_code.as_deref(), Some("cancelled"));
    }

    let leftovers = match std::fs::read_dir(&cache_dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    assert_eq!(leftovers, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancels_settle_once() {
    let harness = TestHarness::new();
    harness.spawner.set_hold_until_killed(true).await;
    let orchestrator = harness.create_orchestrator();
    let mut events = orchestrator.subscribe();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    harness.wait_for_spawns(1).await;

    let (a, b) = tokio::join!(orchestrator.cancel_task(&id), orchestrator.cancel_task(&id));
    a.unwrap();
    b.unwrap();

    // Both callers return only after the task has settled.
    let task = orchestrator.task(&id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.engine_error_code.as_deref(), Some("cancelled"));
    assert_eq!(terminal_updates(&mut events, &id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_exit_settles_once() {
    let harness = TestHarness::new();
    harness
        .spawner
        .set_lines(["frame=1 time=00:00:05.000", "frame=2 time=00:00:10.000"])
        .await;
    let orchestrator = harness.create_orchestrator();

    for _ in 0..20 {
        let mut events = orchestrator.subscribe();
        let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();

        match orchestrator.cancel_task(&id).await {
            Ok(()) | Err(OrchestratorError::InvalidState { .. }) => {}
            Err(e) => panic!("unexpected cancel error: {}", e),
        }

        let task = wait_for(&orchestrator, &id, |t| t.status.is_terminal()).await;
        match task.status {
            TaskStatus::Completed => assert_eq!(task.output_file_ids.len(), 1),
            _ => assert_eq!(task.engine_error_code.as_deref(), Some("cancelled")),
        }
        assert_eq!(terminal_updates(&mut events, &id), 1);
    }
}

#[tokio::test]
async fn test_cancel_after_stderr_closes() {
    let harness = TestHarness::new();
    harness.spawner.set_stuck_exit(true).await;
    let orchestrator = harness.create_orchestrator();

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    harness.wait_for_spawns(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    tokio::time::timeout(Duration::from_secs(5), orchestrator.cancel_task(&id))
        .await
        .expect("cancel did not return")
        .unwrap();
    let task = orchestrator.task(&id).await.unwrap();
    assert_eq!(task.engine_error_code.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn test_timeout_after_stderr_closes() {
    let harness = TestHarness::new();
    harness.spawner.set_stuck_exit(true).await;
    let config = OrchestratorConfig {
        max_task_duration: Some(Duration::from_millis(100)),
        ..harness.config()
    };
    let orchestrator = harness.create_orchestrator_with(config, Platform::Desktop, &["libx264"]);

    let id = orchestrator.enqueue(fixtures::mute_request()).await.unwrap();
    let task = wait_for_status(&orchestrator, &id, TaskStatus::Failed).await;
    assert_eq!(task.engine_error_code.as_deref(), Some("timeout"));
}
