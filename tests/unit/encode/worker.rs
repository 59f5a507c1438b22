use super::*;
use crate::encode::encoder::{EncodeConfig, InMemoryEncoder, VideoEncoder};
use crate::foundation::core::Fps;

fn open(enc: &InMemoryEncoder) -> Box<dyn EncoderSession> {
    enc.open(&EncodeConfig::new("mem.mp4", 2, 2, Fps::new(24, 1).unwrap()))
        .unwrap()
}

fn frame() -> Arc<Raster> {
    Arc::new(Raster::transparent(2, 2))
}

#[test]
fn frames_reach_the_session_in_order() {
    let enc = InMemoryEncoder::new();
    let mut worker = EncoderWorker::spawn(open(&enc), 4, Duration::from_secs(5)).unwrap();
    for i in 0..6 {
        worker.submit(FrameIndex(i), frame()).unwrap();
    }
    assert_eq!(worker.submitted(), 6);
    let path = worker.finish().unwrap();
    assert_eq!(path, PathBuf::from("mem.mp4"));
    let rec = enc.snapshot();
    assert_eq!(rec.indices(), vec![0, 1, 2, 3, 4, 5]);
    assert!(rec.completed);
}

#[test]
fn out_of_order_submission_is_rejected_up_front() {
    let enc = InMemoryEncoder::new();
    let mut worker = EncoderWorker::spawn(open(&enc), 4, Duration::from_secs(5)).unwrap();
    worker.submit(FrameIndex(5), frame()).unwrap();
    assert!(worker.submit(FrameIndex(4), frame()).is_err());
    worker.abort();
}

#[test]
fn finishing_without_frames_reports_the_encoder_failure() {
    let enc = InMemoryEncoder::new();
    let worker = EncoderWorker::spawn(open(&enc), 4, Duration::from_secs(5)).unwrap();
    let err = worker.finish().unwrap_err();
    assert_eq!(err.kind(), "encoder");
    assert!(!enc.snapshot().completed);
}

#[test]
fn write_failure_surfaces_on_a_later_call() {
    let enc = InMemoryEncoder::new().failing_at(FrameIndex(1));
    let mut worker = EncoderWorker::spawn(open(&enc), 1, Duration::from_secs(5)).unwrap();
    worker.submit(FrameIndex(0), frame()).unwrap();
    worker.submit(FrameIndex(1), frame()).unwrap();
    // Depending on timing the failure shows up on the next submit or at finish.
    let err = match worker.submit(FrameIndex(2), frame()) {
        Err(e) => e,
        Ok(()) => worker.finish().unwrap_err(),
    };
    assert_eq!(err.kind(), "encoder");
    let rec = enc.snapshot();
    assert!(rec.aborted);
    assert!(!rec.completed);
}

#[test]
fn stuck_encoder_times_out_instead_of_hanging() {
    let enc = InMemoryEncoder::new().with_write_delay(Duration::from_millis(400));
    let mut worker = EncoderWorker::spawn(open(&enc), 1, Duration::from_millis(20)).unwrap();
    let err = (0..4)
        .find_map(|i| worker.submit(FrameIndex(i), frame()).err())
        .expect("a submission should time out");
    assert_eq!(err.kind(), "timeout");
    worker.abort();
}

#[test]
fn abort_drops_queued_frames() {
    let enc = InMemoryEncoder::new();
    let mut worker = EncoderWorker::spawn(open(&enc), 8, Duration::from_secs(5)).unwrap();
    worker.submit(FrameIndex(0), frame()).unwrap();
    worker.abort();
    let rec = enc.snapshot();
    assert!(rec.aborted);
    assert!(!rec.completed);
}

fn wait_for_abort(enc: &InMemoryEncoder) -> bool {
    for _ in 0..200 {
        if enc.snapshot().aborted {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn finish_timeout_discards_the_output() {
    let enc = InMemoryEncoder::new().with_write_delay(Duration::from_millis(200));
    let mut worker = EncoderWorker::spawn(open(&enc), 8, Duration::from_millis(50)).unwrap();
    for i in 0..4 {
        worker.submit(FrameIndex(i), frame()).unwrap();
    }
    let err = worker.finish().unwrap_err();
    assert_eq!(err.kind(), "timeout");

    assert!(wait_for_abort(&enc), "writer never discarded the output");
    let rec = enc.snapshot();
    assert!(!rec.completed);
    assert!(rec.frames.len() < 4);
}
