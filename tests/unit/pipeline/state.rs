use super::*;

#[test]
fn happy_path_is_accepted() {
    let mut job = JobLifecycle::new();
    for next in [
        JobState::Initializing,
        JobState::RenderingLoop,
        JobState::Skipping,
        JobState::RenderingLoop,
        JobState::ProcessingFrame,
        JobState::Saving,
        JobState::RenderingLoop,
        JobState::Completed,
    ] {
        job.advance(next).unwrap();
    }
    assert_eq!(job.state(), JobState::Completed);
}

#[test]
fn error_and_cancel_are_reachable_from_any_live_state() {
    for from in [
        JobState::Idle,
        JobState::Initializing,
        JobState::RenderingLoop,
        JobState::Skipping,
        JobState::ProcessingFrame,
        JobState::Saving,
    ] {
        assert!(from.can_transition_to(JobState::Error));
        assert!(from.can_transition_to(JobState::Cancelled));
    }
}

#[test]
fn terminal_states_are_final() {
    for from in [JobState::Completed, JobState::Cancelled, JobState::Error] {
        assert!(from.is_terminal());
        assert!(!from.can_transition_to(JobState::Error));
        assert!(!from.can_transition_to(JobState::RenderingLoop));
    }
}

#[test]
fn skipping_steps_are_rejected() {
    let mut job = JobLifecycle::new();
    assert!(job.advance(JobState::RenderingLoop).is_err());
    assert_eq!(job.state(), JobState::Idle);
    job.advance(JobState::Initializing).unwrap();
    assert!(job.advance(JobState::Saving).is_err());
}

#[test]
fn states_serialize_in_snake_case() {
    assert_eq!(
        serde_json::to_string(&JobState::ProcessingFrame).unwrap(),
        "\"processing_frame\""
    );
    assert_eq!(JobState::RenderingLoop.to_string(), "rendering_loop");
}
