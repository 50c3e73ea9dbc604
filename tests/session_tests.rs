// Integration tests for the session controller
//
// These tests walk whole sessions through the controller on a manual clock,
// covering progression, skip rules, completion and device ownership.

mod common;

use common::{config_with_budget, harness, recordings, HangingJournal, MemoryJournal};
use reflection_session::{
    AttemptState, BreathingState, RecordingEvent, SaveOutcome, SessionConfig, SessionError,
    SessionEvent, SessionState, StepKind, StopReason,
};
use std::sync::Arc;

#[tokio::test]
async fn test_record_retry_timeout_save_walkthrough() {
    let journal = Arc::new(MemoryJournal::default());
    let mut h = harness(recordings(3), config_with_budget(30, 2), journal.clone());

    // Record and stop early with 20s left
    h.session.begin_recording().await.unwrap();
    h.clock.advance(10);
    h.session.poll().await;
    assert_eq!(h.session.recording().remaining_secs, 20);
    assert!(h.session.stop_recording().await.unwrap());
    assert_eq!(h.session.recording().state, AttemptState::PendingReview);

    // Retry once
    assert!(h.session.retry_recording().await.unwrap());
    assert_eq!(h.session.recording().retries_remaining, 1);
    assert_eq!(h.session.recording().state, AttemptState::Idle);

    // Record again and let the budget run out
    h.session.begin_recording().await.unwrap();
    assert_eq!(h.session.recording().remaining_secs, 30);
    h.clock.advance(30);
    let events = h.session.poll().await;
    assert!(events.contains(&SessionEvent::Recording {
        index: 0,
        event: RecordingEvent::Stopped {
            reason: StopReason::TimedOut,
            has_artifact: true,
        },
    }));
    assert_eq!(h.session.recording().state, AttemptState::PendingReview);
    assert_eq!(h.session.recording().stop_reason, Some(StopReason::TimedOut));

    // Save
    let outcome = h.session.complete_and_save().await.unwrap();
    assert_eq!(outcome, SaveOutcome::Dispatched);
    assert!(h.session.steps()[0].is_complete());
    assert_eq!(h.session.current_index(), Some(1));

    // Fresh attempt with a full retry budget on the next step
    assert_eq!(h.session.recording().state, AttemptState::Idle);
    assert_eq!(h.session.recording().retries_remaining, 2);

    let outcome = h.monitor.next().await.expect("handoff outcome");
    assert!(outcome.is_success());
    assert_eq!(outcome.step_index, 0);
    assert_eq!(journal.request_count(), 1);
    assert_eq!(journal.requests.lock().unwrap()[0].prompt_text, "Prompt 0");
}

#[tokio::test]
async fn test_skip_running_breathing_stops_the_cycle() {
    let plan = vec![StepKind::Breathing, StepKind::recording("After breathing")];
    let mut h = harness(plan, SessionConfig::default(), Arc::new(MemoryJournal::default()));

    h.session.start_breathing().unwrap();
    h.clock.advance(9);
    h.session.poll().await;
    assert_eq!(h.session.breathing().state(), BreathingState::Running);

    h.session.skip(0).await.unwrap();

    assert_eq!(h.session.current_index(), Some(1));
    assert_eq!(h.session.breathing().state(), BreathingState::NotStarted);
    assert!(!h.session.steps()[0].is_complete());

    // No phase events leak out after leaving the step
    h.clock.advance(60);
    let events = h.session.poll().await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::Breathing { .. })));
}

#[tokio::test]
async fn test_hung_handoff_does_not_block_progression() {
    let mut h = harness(recordings(2), config_with_budget(30, 1), Arc::new(HangingJournal));

    h.session.begin_recording().await.unwrap();
    h.clock.advance(5);
    h.session.stop_recording().await.unwrap();
    h.session.complete_and_save().await.unwrap();

    assert!(h.session.steps()[0].is_complete());
    assert_eq!(h.session.current_index(), Some(1));
    assert!(h.monitor.try_next().is_none());
}

#[tokio::test]
async fn test_finishing_before_completed_steps_dismisses() {
    let mut h = harness(recordings(3), config_with_budget(30, 0), Arc::new(MemoryJournal::default()));

    // Skip step 0, complete 1 and 2
    h.session.skip(0).await.unwrap();
    for _ in 1..3 {
        h.session.begin_recording().await.unwrap();
        h.clock.advance(3);
        h.session.stop_recording().await.unwrap();
        h.session.complete_and_save().await.unwrap();
    }
    assert_eq!(h.session.state(), SessionState::Finished);

    // Go back to the skipped step and finish it
    h.session.rewind(0).await.unwrap();
    assert_eq!(h.session.current_index(), Some(0));
    assert!(h.session.is_fully_done(1));
    h.session.poll().await;

    h.session.begin_recording().await.unwrap();
    h.clock.advance(3);
    h.session.stop_recording().await.unwrap();
    h.session.complete_and_save().await.unwrap();

    assert_eq!(h.session.state(), SessionState::Finished);
    let events = h.session.poll().await;
    assert!(!events.contains(&SessionEvent::StepEntered {
        index: 1,
        kind: "recording"
    }));
    assert_eq!(events.last(), Some(&SessionEvent::Finished));
}

#[tokio::test]
async fn test_finishing_advances_when_later_steps_remain() {
    let mut h = harness(recordings(3), config_with_budget(30, 0), Arc::new(MemoryJournal::default()));

    h.session.skip(0).await.unwrap();
    h.session.begin_recording().await.unwrap();
    h.clock.advance(3);
    h.session.stop_recording().await.unwrap();
    h.session.complete_and_save().await.unwrap();
    assert_eq!(h.session.current_index(), Some(2));

    // Back to 0 while 2 is still open: finishing 0 steps forward to 1
    h.session.rewind(0).await.unwrap();
    h.session.begin_recording().await.unwrap();
    h.clock.advance(3);
    h.session.stop_recording().await.unwrap();
    h.session.complete_and_save().await.unwrap();
    assert_eq!(h.session.current_index(), Some(1));
}

#[tokio::test]
async fn test_skip_rejected_while_recording() {
    let mut h = harness(recordings(2), config_with_budget(30, 1), Arc::new(MemoryJournal::default()));

    h.session.begin_recording().await.unwrap();
    assert!(!h.session.can_skip());

    let err = h.session.skip(0).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidTransition { operation: "skip", .. }));
    assert_eq!(h.session.current_index(), Some(0));
    assert_eq!(h.session.recording().state, AttemptState::Recording);
}

#[tokio::test]
async fn test_skip_pending_review_discards_take() {
    let mut h = harness(recordings(2), config_with_budget(30, 1), Arc::new(MemoryJournal::default()));

    h.session.begin_recording().await.unwrap();
    h.clock.advance(4);
    h.session.stop_recording().await.unwrap();
    h.session.skip(0).await.unwrap();

    assert_eq!(h.session.current_index(), Some(1));
    assert_eq!(h.probe.lock().unwrap().count("reset"), 1);
    assert!(h.session.recording().artifact().is_none());
}

#[tokio::test]
async fn test_skip_rules_for_index_and_kind() {
    let plan = vec![StepKind::sleep_check_in(), StepKind::recording("p")];
    let mut h = harness(plan, SessionConfig::default(), Arc::new(MemoryJournal::default()));

    assert!(matches!(
        h.session.skip(0).await,
        Err(SessionError::InvalidTransition { .. })
    ));
    assert!(matches!(
        h.session.skip(1).await,
        Err(SessionError::InvalidTransition { .. })
    ));
    assert_eq!(
        h.session.skip(5).await,
        Err(SessionError::StepOutOfRange { index: 5, len: 2 })
    );
    assert_eq!(h.session.current_index(), Some(0));
}

#[tokio::test]
async fn test_sleep_check_in_commits_any_value() {
    let journal = Arc::new(MemoryJournal::default());
    let plan = vec![StepKind::sleep_check_in(), StepKind::Breathing];
    let mut h = harness(plan, SessionConfig::default(), journal.clone());

    h.session.commit_sleep_hours(-3.5).await.unwrap();

    assert!(h.session.steps()[0].is_complete());
    assert_eq!(h.session.steps()[0].hours_slept(), Some(-3.5));
    assert_eq!(h.session.current_index(), Some(1));
    assert_eq!(h.probe.lock().unwrap().calls.len(), 0);

    let outcome = h.monitor.next().await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(*journal.sleeps.lock().unwrap(), vec![(0, -3.5)]);
}

#[tokio::test]
async fn test_sleep_commit_rejected_on_other_kinds() {
    let mut h = harness(recordings(1), SessionConfig::default(), Arc::new(MemoryJournal::default()));
    assert!(matches!(
        h.session.commit_sleep_hours(8.0).await,
        Err(SessionError::InvalidTransition { .. })
    ));
    assert!(!h.session.steps()[0].is_complete());
}

#[tokio::test]
async fn test_breathing_step_completes_only_after_exercise() {
    let config = SessionConfig {
        breathing_cycles: 2,
        ..SessionConfig::default()
    };
    let plan = vec![StepKind::Breathing, StepKind::recording("p")];
    let mut h = harness(plan, config, Arc::new(MemoryJournal::default()));

    assert_eq!(
        h.session.complete_current_step().await,
        Err(SessionError::NotEligible {
            index: 0,
            kind: "breathing"
        })
    );

    h.session.start_breathing().unwrap();
    h.clock.advance(31);
    h.session.poll().await;
    assert!(h.session.complete_current_step().await.is_err());

    h.clock.advance(1);
    h.session.poll().await;
    assert_eq!(h.session.breathing().state(), BreathingState::Complete);

    h.session.complete_current_step().await.unwrap();
    assert!(h.session.steps()[0].is_complete());
    assert_eq!(h.session.current_index(), Some(1));
}

#[tokio::test]
async fn test_recording_step_not_completable_by_recording_alone() {
    let mut h = harness(recordings(2), config_with_budget(30, 1), Arc::new(MemoryJournal::default()));

    h.session.begin_recording().await.unwrap();
    h.clock.advance(5);
    h.session.stop_recording().await.unwrap();

    assert!(matches!(
        h.session.mark_complete(0),
        Err(SessionError::NotEligible { index: 0, .. })
    ));
    assert!(!h.session.steps()[0].is_complete());
}

#[tokio::test]
async fn test_save_without_artifact_still_completes() {
    let journal = Arc::new(MemoryJournal::default());
    let mut h = harness(recordings(2), config_with_budget(30, 1), journal.clone());
    h.probe.lock().unwrap().no_artifact = true;

    h.session.begin_recording().await.unwrap();
    h.clock.advance(5);
    h.session.stop_recording().await.unwrap();

    let outcome = h.session.complete_and_save().await.unwrap();
    assert_eq!(outcome, SaveOutcome::NothingToSave);
    assert!(h.session.steps()[0].is_complete());
    assert_eq!(h.session.current_index(), Some(1));

    tokio::task::yield_now().await;
    assert_eq!(journal.request_count(), 0);
}

#[tokio::test]
async fn test_handoff_failure_keeps_local_completion() {
    let journal = Arc::new(MemoryJournal::failing(10));
    let mut h = harness(recordings(2), config_with_budget(30, 1), journal.clone());

    h.session.begin_recording().await.unwrap();
    h.clock.advance(5);
    h.session.stop_recording().await.unwrap();
    h.session.complete_and_save().await.unwrap();

    let outcome = h.monitor.next().await.unwrap();
    assert!(!outcome.is_success());
    assert!(h.session.steps()[0].is_complete());
    assert_eq!(h.session.current_index(), Some(1));
}

#[tokio::test]
async fn test_capture_unavailable_leaves_attempt_idle() {
    let mut h = harness(recordings(1), config_with_budget(30, 1), Arc::new(MemoryJournal::default()));
    h.probe.lock().unwrap().fail_prepare = true;

    let err = h.session.begin_recording().await.unwrap_err();
    assert!(matches!(err, SessionError::CaptureUnavailable(_)));
    assert!(err.is_recoverable());
    assert_eq!(h.session.recording().state, AttemptState::Idle);

    h.probe.lock().unwrap().fail_prepare = false;
    h.session.begin_recording().await.unwrap();
    assert_eq!(h.session.recording().state, AttemptState::Recording);
}

#[tokio::test]
async fn test_rewind_while_recording_releases_device() {
    let mut h = harness(recordings(3), config_with_budget(30, 1), Arc::new(MemoryJournal::default()));

    h.session.advance().await.unwrap();
    h.session.begin_recording().await.unwrap();
    h.session.rewind(0).await.unwrap();

    let probe = h.probe.lock().unwrap();
    assert!(!probe.holding);
    assert_eq!(probe.count("stop"), 1);
    assert_eq!(probe.count("reset"), 1);
    drop(probe);
    h.session.poll().await;

    // The abandoned budget never auto-stops anything
    h.clock.advance(60);
    let events = h.session.poll().await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::Recording { .. })));
}

#[tokio::test]
async fn test_rewind_must_move_backwards() {
    let mut h = harness(recordings(3), SessionConfig::default(), Arc::new(MemoryJournal::default()));
    h.session.advance().await.unwrap();

    assert!(h.session.rewind(1).await.is_err());
    assert!(h.session.rewind(2).await.is_err());
    assert_eq!(h.session.current_index(), Some(1));
}

#[tokio::test]
async fn test_operations_rejected_after_finish() {
    let mut h = harness(recordings(1), SessionConfig::default(), Arc::new(MemoryJournal::default()));
    h.session.advance().await.unwrap();
    assert!(h.session.is_finished());

    assert!(h.session.advance().await.is_err());
    assert!(h.session.begin_recording().await.is_err());
    assert!(h.session.start_breathing().is_err());
    assert!(!h.session.can_retry());
    assert!(!h.session.can_skip());
}

#[tokio::test]
async fn test_restart_clears_progress() {
    let plan = vec![StepKind::sleep_check_in(), StepKind::recording("p")];
    let mut h = harness(plan, SessionConfig::default(), Arc::new(MemoryJournal::default()));

    h.session.commit_sleep_hours(6.0).await.unwrap();
    h.session.restart().await;

    assert_eq!(h.session.current_index(), Some(0));
    assert!(!h.session.steps()[0].is_complete());
    assert_eq!(h.session.steps()[0].hours_slept(), None);
    assert_eq!(h.session.progress(), 0.0);
}

#[tokio::test]
async fn test_cursor_only_moves_forward_without_reset() {
    let mut h = harness(recordings(4), config_with_budget(10, 1), Arc::new(MemoryJournal::default()));
    let mut last = 0;

    // A mix of every forward operation
    h.session.begin_recording().await.unwrap();
    h.clock.advance(10);
    h.session.poll().await;
    h.session.complete_and_save().await.unwrap();
    for _ in 0..3 {
        let current = h.session.current_index().unwrap_or(usize::MAX);
        assert!(current >= last);
        last = current;
        let _ = h.session.skip(current).await;
    }
    assert!(h.session.is_finished());
}

#[tokio::test]
async fn test_single_active_recording_across_transitions() {
    let mut h = harness(recordings(3), config_with_budget(20, 2), Arc::new(MemoryJournal::default()));

    h.session.begin_recording().await.unwrap();
    assert!(h.session.begin_recording().await.is_err());
    h.clock.advance(20);
    h.session.poll().await;
    h.session.retry_recording().await.unwrap();
    h.session.begin_recording().await.unwrap();
    h.session.advance().await.unwrap();
    h.session.begin_recording().await.unwrap();
    h.session.rewind(0).await.unwrap();
    h.session.begin_recording().await.unwrap();
    h.session.dismiss().await;

    let probe = h.probe.lock().unwrap();
    assert_eq!(probe.violations, 0);
    assert!(!probe.holding);
}

#[tokio::test]
async fn test_completion_events_fire_once() {
    let plan = vec![StepKind::sleep_check_in(), StepKind::sleep_check_in()];
    let mut h = harness(plan, SessionConfig::default(), Arc::new(MemoryJournal::default()));

    h.session.commit_sleep_hours(7.0).await.unwrap();
    h.session.mark_complete(0).unwrap();
    h.session.mark_complete(0).unwrap();

    let events = h.session.poll().await;
    let completions = events
        .iter()
        .filter(|e| **e == SessionEvent::StepCompleted { index: 0 })
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn test_affirmation_uses_affirmation_budget() {
    let config = SessionConfig {
        recording_budget_secs: 60,
        affirmation_budget_secs: 30,
        ..SessionConfig::default()
    };
    let plan = vec![
        StepKind::affirmation("I am calm"),
        StepKind::Recording {
            prompt: "Custom".into(),
            description: None,
            budget_secs: Some(45),
        },
    ];
    let mut h = harness(plan, config, Arc::new(MemoryJournal::default()));

    h.session.begin_recording().await.unwrap();
    assert_eq!(h.session.recording().budget_secs, 30);
    h.clock.advance(30);
    h.session.poll().await;
    h.session.complete_and_save().await.unwrap();

    h.session.begin_recording().await.unwrap();
    assert_eq!(h.session.recording().budget_secs, 45);
}

#[tokio::test]
async fn test_snapshot_reports_progress() {
    let plan = vec![StepKind::sleep_check_in(), StepKind::recording("p")];
    let mut h = harness(plan, SessionConfig::default(), Arc::new(MemoryJournal::default()));
    h.session.commit_sleep_hours(8.0).await.unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.state, SessionState::Active(1));
    assert_eq!(snapshot.completed_steps(), 1);
    assert!((snapshot.progress - 0.5).abs() < f64::EPSILON);
    assert_eq!(snapshot.steps[1].prompt.as_deref(), Some("p"));

    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"sleep_check_in\""));
}

#[test]
fn test_empty_plan_rejected() {
    let clock: Arc<dyn reflection_session::Clock> =
        Arc::new(reflection_session::ManualClock::new());
    let (capture, _probe) = common::FakeCapture::new();
    let (dispatcher, _monitor) = reflection_session::HandoffDispatcher::new(
        Arc::new(MemoryJournal::default()),
        Arc::new(common::MemoryAnalysis::default()),
        common::fast_handoff(),
    );

    let result = reflection_session::SessionController::new(
        Vec::new(),
        SessionConfig::default(),
        Box::new(capture),
        dispatcher,
        clock,
    );
    assert!(matches!(result, Err(SessionError::EmptyPlan)));
}
