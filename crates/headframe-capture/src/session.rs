//! Capture session: owns a sequencer and drives it from one event queue.
//!
//! Frames, countdown ticks, stability expiry and settle expiry all arrive on
//! the same channel and are handled strictly in order by a single task.
//! Dropping or cancelling the session tears down every outstanding timer
//! before the state goes away.

use crate::sequencer::{
    CapturedPair, Effect, Event, Sequencer, SequencerPhase, TimerKind, TimerToken,
};
use crate::timers::TimerRegistry;
use headframe_core::{
    evaluate_frame, render_surface, CaptureStep, Frame, Landmark, LandmarkDetector, SurfaceSize,
    ValidationVerdict,
};
use image::RgbaImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Front and top shots as rendered (mirrored) surfaces.
pub type CapturedImages = CapturedPair<RgbaImage>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("capture session has shut down")]
    Closed,
    #[error("capture session was cancelled before completion")]
    Cancelled,
}

/// Session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Surface frames are rendered onto before evaluation.
    pub surface: SurfaceSize,
    /// Frames allowed to wait in the queue before new ones are dropped.
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceSize::default(),
            queue_depth: 4,
        }
    }
}

/// Outcome of offering a frame to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// The queue was full; the next frame supersedes this one.
    Dropped,
}

/// Snapshot of the session published after every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub step: CaptureStep,
    pub phase: SequencerPhase,
    pub status: String,
}

/// Messages handled by the session task.
pub(crate) enum SessionMessage {
    Frame {
        frame: Frame,
        landmarks: Option<Vec<Landmark>>,
    },
    Timer {
        token: TimerToken,
        kind: TimerKind,
    },
    Cancel {
        reply: oneshot::Sender<()>,
    },
}

/// Resolves once both photos are committed.
pub struct Completion {
    rx: oneshot::Receiver<CapturedImages>,
}

impl Completion {
    pub async fn wait(self) -> Result<CapturedImages, SessionError> {
        self.rx.await.map_err(|_| SessionError::Cancelled)
    }
}

/// Caller-owned handle to a running capture session.
pub struct CaptureSession {
    tx: mpsc::Sender<SessionMessage>,
    progress: watch::Receiver<Progress>,
    task: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Spawn the session task on the current tokio runtime.
    pub fn start(config: SessionConfig) -> (Self, Completion) {
        let (tx, rx) = mpsc::channel::<SessionMessage>(config.queue_depth.max(1));
        let (completion_tx, completion_rx) = oneshot::channel();

        let sequencer = Sequencer::new();
        let (progress_tx, progress) = watch::channel(Progress {
            step: sequencer.step(),
            phase: sequencer.phase(),
            status: sequencer.status().to_string(),
        });

        let session_loop = SessionLoop {
            surface_size: config.surface,
            sequencer,
            timers: TimerRegistry::new(tx.downgrade()),
            surface: None,
            progress_tx,
            completion_tx: Some(completion_tx),
        };
        let task = tokio::spawn(session_loop.run(rx));

        tracing::info!(
            width = config.surface.width,
            height = config.surface.height,
            queue_depth = config.queue_depth,
            "capture session started"
        );

        (
            Self {
                tx,
                progress,
                task: Some(task),
            },
            Completion { rx: completion_rx },
        )
    }

    /// Offer a frame with its detection result. Never waits: when the queue
    /// is full the frame is dropped.
    pub fn submit(
        &self,
        frame: Frame,
        landmarks: Option<Vec<Landmark>>,
    ) -> Result<Submission, SessionError> {
        let sequence = frame.sequence;
        match self.tx.try_send(SessionMessage::Frame { frame, landmarks }) {
            Ok(()) => Ok(Submission::Queued),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(sequence, "frame dropped; session busy");
                Ok(Submission::Dropped)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SessionError::Closed),
        }
    }

    /// Run `detector` on the frame and submit the result.
    ///
    /// A detector failure counts as a frame without a face.
    pub fn submit_detected<D: LandmarkDetector>(
        &self,
        detector: &mut D,
        frame: Frame,
    ) -> Result<Submission, SessionError> {
        let landmarks = match detector.detect(&frame.image) {
            Ok(landmarks) => landmarks,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    sequence = frame.sequence,
                    "landmark detection failed"
                );
                None
            }
        };
        self.submit(frame, landmarks)
    }

    /// Watch the step, phase and status line.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    /// Current status line.
    pub fn status(&self) -> String {
        self.progress.borrow().status.clone()
    }

    /// Stop the session, cancelling every outstanding timer, and wait for
    /// the task to finish.
    pub async fn cancel(mut self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.tx.send(SessionMessage::Cancel { reply: reply_tx }).await;
        if sent.is_ok() {
            let _ = reply_rx.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!("capture session cancelled");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Aborting drops the loop, and with it the timer registry.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct SessionLoop {
    surface_size: SurfaceSize,
    sequencer: Sequencer<RgbaImage>,
    timers: TimerRegistry,
    /// Last successfully rendered surface; committed photos come from here.
    surface: Option<RgbaImage>,
    progress_tx: watch::Sender<Progress>,
    completion_tx: Option<oneshot::Sender<CapturedImages>>,
}

impl SessionLoop {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionMessage>) {
        while let Some(message) = rx.recv().await {
            let effects = match message {
                SessionMessage::Frame { frame, landmarks } => self.on_frame(frame, landmarks),
                SessionMessage::Timer { token, kind } => self.on_timer(token, kind),
                SessionMessage::Cancel { reply } => {
                    self.teardown("cancelled");
                    let _ = reply.send(());
                    return;
                }
            };
            self.apply(effects);
            self.publish();

            if self.sequencer.is_complete() {
                self.teardown("complete");
                return;
            }
        }
        self.teardown("handle dropped");
    }

    fn on_frame(
        &mut self,
        frame: Frame,
        landmarks: Option<Vec<Landmark>>,
    ) -> Vec<Effect<RgbaImage>> {
        let now = Instant::now().into_std();
        let verdict = match render_surface(&frame, self.surface_size) {
            Ok(surface) => {
                let evaluation =
                    evaluate_frame(self.sequencer.step(), &surface, landmarks.as_deref());
                self.surface = Some(surface);
                evaluation.verdict
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    sequence = frame.sequence,
                    "surface unavailable; frame treated as faceless"
                );
                ValidationVerdict::no_face()
            }
        };
        self.sequencer.handle(Event::Frame { verdict, now })
    }

    fn on_timer(&mut self, token: TimerToken, kind: TimerKind) -> Vec<Effect<RgbaImage>> {
        self.timers.fired(token);
        let now = Instant::now().into_std();
        match kind {
            TimerKind::Countdown => self.sequencer.handle(Event::Tick { token }),
            TimerKind::Stability => self.sequencer.handle(Event::Stabilized { token, now }),
            TimerKind::Settle => match self.surface.clone() {
                Some(photo) => self.sequencer.handle(Event::Settled { token, photo }),
                None => {
                    tracing::warn!("no rendered surface to commit; aborting capture");
                    self.sequencer.cancel_all()
                }
            },
        }
    }

    fn apply(&mut self, effects: Vec<Effect<RgbaImage>>) {
        for effect in effects {
            match effect {
                Effect::Schedule { token, kind, after } => self.timers.schedule(token, kind, after),
                Effect::Cancel(token) => self.timers.cancel(token),
                Effect::Complete(pair) => {
                    if let Some(tx) = self.completion_tx.take() {
                        let _ = tx.send(pair);
                    }
                }
            }
        }
        debug_assert!(self.timers.len() <= 2, "more timers live than one capture needs");
    }

    fn publish(&self) {
        let next = Progress {
            step: self.sequencer.step(),
            phase: self.sequencer.phase(),
            status: self.sequencer.status().to_string(),
        };
        self.progress_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn teardown(&mut self, reason: &'static str) {
        let effects = self.sequencer.cancel_all();
        self.apply(effects);
        self.timers.cancel_all();
        tracing::debug!(reason, "capture session loop exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headframe_core::detector::FixedDetector;
    use headframe_core::landmarks::sparse_landmarks;
    use headframe_core::status;
    use image::Rgba;
    use std::time::Duration;

    const MARKER: Rgba<u8> = Rgba([250, 0, 0, 255]);

    /// Face centered in the Face oval at 640×480, exactly oval-wide, with the
    /// chin far enough below the forehead to also satisfy the Top step.
    fn centered_face() -> Vec<Landmark> {
        sparse_landmarks(
            Landmark::new(0.5, 110.0 / 480.0),
            Landmark::new(0.5, 410.0 / 480.0),
            Landmark::new(0.5 - 120.0 / 640.0, 260.0 / 480.0),
            Landmark::new(0.5 + 120.0 / 640.0, 260.0 / 480.0),
        )
    }

    /// Evenly lit frame with a marker in the top-left camera pixel.
    fn lit_frame(sequence: u32) -> Frame {
        let mut image = RgbaImage::from_pixel(640, 480, Rgba([128, 128, 128, 255]));
        image.put_pixel(0, 0, MARKER);
        Frame::new(image, sequence)
    }

    async fn feed(
        session: &CaptureSession,
        frames: u32,
        every_ms: u64,
        landmarks: Option<Vec<Landmark>>,
    ) {
        for i in 0..frames {
            // The session closes itself once complete; later frames are refused.
            let _ = session.submit(lit_frame(i), landmarks.clone());
            tokio::time::sleep(Duration::from_millis(every_ms)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_face_step_commits_once() {
        let (session, _completion) = CaptureSession::start(SessionConfig::default());
        feed(&session, 60, 50, Some(centered_face())).await;

        let progress = session.progress().borrow().clone();
        assert_eq!(progress.step, CaptureStep::Top);
        // Cooldown from the 2000ms stability expiry still holds at ~3000ms.
        assert_eq!(progress.phase, SequencerPhase::AwaitingTop);
        assert!(progress.status.starts_with("⏳ Please wait"), "status = {}", progress.status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_capture_delivers_mirrored_pair() {
        let (session, completion) = CaptureSession::start(SessionConfig::default());
        feed(&session, 170, 50, Some(centered_face())).await;

        let pair = completion.wait().await.unwrap();
        assert_eq!(pair.front.dimensions(), (640, 480));
        assert_eq!(pair.top.dimensions(), (640, 480));
        // Camera pixel (0, 0) lands on the right edge of the surface.
        assert_eq!(pair.front.get_pixel(639, 0), &MARKER);
        assert_eq!(pair.top.get_pixel(639, 0), &MARKER);

        // The loop has exited; further frames are refused.
        assert!(matches!(session.submit(lit_frame(999), None), Err(SessionError::Closed)));
        assert_eq!(session.status(), status::ALL_CAPTURED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_losing_face_mid_countdown() {
        let (session, _completion) = CaptureSession::start(SessionConfig::default());
        feed(&session, 10, 100, Some(centered_face())).await;
        assert_eq!(session.progress().borrow().phase, SequencerPhase::PendingFaceCapture);

        feed(&session, 1, 100, None).await;
        let progress = session.progress().borrow().clone();
        assert_eq!(progress.phase, SequencerPhase::AwaitingFace);
        assert_eq!(progress.status, status::NO_FACE);

        // The cancelled stability timer never commits.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.progress().borrow().step, CaptureStep::Face);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_tears_down() {
        let (session, completion) = CaptureSession::start(SessionConfig::default());
        let mut progress = session.progress();
        feed(&session, 5, 100, Some(centered_face())).await;

        session.cancel().await;
        assert!(matches!(completion.wait().await, Err(SessionError::Cancelled)));

        // Publisher is gone; nothing fires after teardown.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(progress.borrow_and_update().phase, SequencerPhase::PendingFaceCapture);
        assert!(progress.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_settling() {
        let (session, completion) = CaptureSession::start(SessionConfig::default());
        let mut progress = session.progress();
        // Last frame at 2050ms; stability fired at 2000, settle is due at 2300.
        feed(&session, 42, 50, Some(centered_face())).await;
        assert_eq!(progress.borrow_and_update().status, "📸 Capturing face photo...");

        session.cancel().await;
        assert!(matches!(completion.wait().await, Err(SessionError::Cancelled)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(progress.borrow_and_update().step, CaptureStep::Face);
        assert!(progress.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_while_settling() {
        let (session, completion) = CaptureSession::start(SessionConfig::default());
        let mut progress = session.progress();
        feed(&session, 42, 50, Some(centered_face())).await;
        assert_eq!(progress.borrow_and_update().phase, SequencerPhase::PendingFaceCapture);

        drop(session);
        assert!(matches!(completion.wait().await, Err(SessionError::Cancelled)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(progress.changed().await.is_err());
        assert_eq!(progress.borrow().step, CaptureStep::Face);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_completion() {
        let (session, completion) = CaptureSession::start(SessionConfig::default());
        feed(&session, 5, 100, Some(centered_face())).await;
        drop(session);
        assert!(matches!(completion.wait().await, Err(SessionError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_surface_counts_as_no_face() {
        let config = SessionConfig {
            surface: SurfaceSize::new(0, 0),
            ..SessionConfig::default()
        };
        let (session, _completion) = CaptureSession::start(config);
        feed(&session, 3, 50, Some(centered_face())).await;
        assert_eq!(session.status(), status::NO_FACE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_detected_uses_detector() {
        let (session, _completion) = CaptureSession::start(SessionConfig::default());
        let mut detector = FixedDetector::new(Some(centered_face()));
        session.submit_detected(&mut detector, lit_frame(0)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.progress().borrow().phase, SequencerPhase::PendingFaceCapture);
        assert_eq!(session.status(), "✅ Face ready - Capturing in 2 seconds...");
    }
}
