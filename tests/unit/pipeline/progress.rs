use std::sync::Mutex;

use super::*;

fn event(frame: u64) -> ProgressEvent {
    ProgressEvent {
        state: JobState::Saving,
        current_frame: frame,
        total_frames: 4,
        message: format!("frame {frame}"),
    }
}

#[test]
fn fraction_is_bounded() {
    assert_eq!(event(2).fraction(), 0.5);
    assert_eq!(event(9).fraction(), 1.0);
    let mut e = event(1);
    e.total_frames = 0;
    assert_eq!(e.fraction(), 0.0);
}

#[test]
fn closure_sink_sees_every_event() {
    let seen = Mutex::new(Vec::new());
    let sink = FnProgress(|e: &ProgressEvent| seen.lock().unwrap().push(e.current_frame));
    sink.report(&event(0));
    sink.report(&event(1));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
}

#[test]
fn channel_sink_never_blocks() {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let sink = ChannelProgress::new(tx);
    sink.report(&event(0));
    sink.report(&event(1));
    assert_eq!(rx.try_recv().unwrap().current_frame, 0);
    assert!(rx.try_recv().is_err());

    drop(rx);
    sink.report(&event(2));
}
