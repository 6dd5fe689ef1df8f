//! Drive a capture session from a recorded trace in real time.

use crate::config::Config;
use crate::trace::Trace;
use anyhow::Result;
use headframe_capture::{CaptureSession, CapturedImages, SessionError, Submission};
use std::time::Duration;
use tokio::time::Instant;

/// What a replay produced.
pub struct ReplayOutcome {
    /// Both photos, if the trace led to a complete capture.
    pub pair: Option<CapturedImages>,
    /// Last status line shown.
    pub status: String,
    pub frames_submitted: usize,
    pub frames_dropped: usize,
}

/// Feed every trace frame at its recorded offset, then wait up to the
/// configured grace period for the capture to complete.
///
/// Status changes are passed to `on_status` as they happen.
pub async fn replay(
    trace: &Trace,
    config: &Config,
    on_status: impl Fn(&str) + Send + 'static,
) -> Result<ReplayOutcome> {
    let (session, completion) = CaptureSession::start(config.session());

    let mut progress = session.progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let status = progress.borrow_and_update().status.clone();
            on_status(&status);
        }
    });

    let mut detector = trace.detector();
    let start = Instant::now();
    let mut frames_submitted = 0;
    let mut frames_dropped = 0;

    for (index, entry) in trace.frames.iter().enumerate() {
        tokio::time::sleep_until(start + Duration::from_millis(entry.t_ms)).await;
        let frame = trace.render(index)?;
        match session.submit_detected(&mut detector, frame) {
            Ok(Submission::Queued) => frames_submitted += 1,
            Ok(Submission::Dropped) => frames_dropped += 1,
            Err(SessionError::Closed) => {
                tracing::debug!(index, "session closed; remaining frames skipped");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let grace = Duration::from_secs(config.finish_timeout_secs);
    let pair = match tokio::time::timeout(grace, completion.wait()).await {
        Ok(Ok(pair)) => Some(pair),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "capture did not complete");
            None
        }
        Err(_) => {
            tracing::warn!(
                grace_secs = config.finish_timeout_secs,
                "capture incomplete at end of trace"
            );
            None
        }
    };

    let status = session.status();
    session.cancel().await;
    let _ = printer.await;

    tracing::info!(
        complete = pair.is_some(),
        frames_submitted,
        frames_dropped,
        "replay finished"
    );

    Ok(ReplayOutcome {
        pair,
        status,
        frames_submitted,
        frames_dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const FACE: &str = r#"{ "forehead": [0.5, 0.2292], "chin": [0.5, 0.8542],
                           "left_cheek": [0.3125, 0.5417], "right_cheek": [0.6875, 0.5417] }"#;

    fn trace(frames: u64, every_ms: u64, face: bool) -> Trace {
        let entries: Vec<String> = (0..frames)
            .map(|i| {
                if face {
                    format!(r#"{{ "t_ms": {}, "face": {FACE} }}"#, i * every_ms)
                } else {
                    format!(r#"{{ "t_ms": {} }}"#, i * every_ms)
                }
            })
            .collect();
        Trace::from_json(&format!(r#"{{ "frames": [{}] }}"#, entries.join(","))).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_completes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        // 40ms spacing keeps frames off the 2300ms settle expiry.
        let outcome = replay(&trace(220, 40, true), &Config::default(), move |s| {
            sink.lock().unwrap().push(s.to_string())
        })
        .await
        .unwrap();

        let pair = outcome.pair.expect("capture should complete");
        assert_eq!(pair.front.dimensions(), (640, 480));
        assert_eq!(outcome.status, headframe_core::status::ALL_CAPTURED);
        // Frames after completion are not submitted.
        assert!(outcome.frames_submitted < 220);

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|s| s == "✅ Face ready - Capturing in 2 seconds..."));
        assert!(seen.iter().any(|s| s == headframe_core::status::TILT_HEAD_BACK));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_without_face_is_incomplete() {
        let outcome = replay(&trace(20, 50, false), &Config::default(), |_| {}).await.unwrap();
        assert!(outcome.pair.is_none());
        assert_eq!(outcome.status, headframe_core::status::NO_FACE);
        assert_eq!(outcome.frames_submitted + outcome.frames_dropped, 20);
    }
}
