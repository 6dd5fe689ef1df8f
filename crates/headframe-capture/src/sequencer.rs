//! The two-shot capture state machine, as a pure reducer.
//!
//! `Sequencer::handle` takes one event and returns the timer and completion
//! effects it implies. It never sleeps or spawns; whoever drives it owns the
//! clock and delivers timer events back in arrival order.
//!
//! ```text
//! AwaitingFace ─ready─▶ PendingFaceCapture ─commit─▶ AwaitingTop
//!      ▲                      │ invalid                  │ ready (after cooldown)
//!      └──────────────────────┘                          ▼
//!                            Complete ◀─commit─ PendingTopCapture
//! ```

use headframe_core::status;
use headframe_core::{CaptureStep, ValidationVerdict};
use std::time::{Duration, Instant};

// --- Timing (design constants) ---
pub const STABILITY_DELAY: Duration = Duration::from_millis(2000);
pub const COUNTDOWN_TICK: Duration = Duration::from_millis(1000);
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);
pub const MIN_TIME_BETWEEN_CAPTURES: Duration = Duration::from_millis(3000);

/// Whole seconds shown when a countdown starts.
const COUNTDOWN_START_SECS: u32 = (STABILITY_DELAY.as_millis() / COUNTDOWN_TICK.as_millis()) as u32;

/// Opaque handle for one scheduled timer. Never reused within a sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// What a scheduled timer means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// One-second countdown update while stabilizing.
    Countdown,
    /// Position and lighting held for the full dwell time.
    Stability,
    /// Short settle delay before the pixels are taken.
    Settle,
}

/// Inputs to the reducer.
#[derive(Debug)]
pub enum Event<P> {
    Frame { verdict: ValidationVerdict, now: Instant },
    Tick { token: TimerToken },
    Stabilized { token: TimerToken, now: Instant },
    /// Settle delay elapsed; `photo` is the surface current at that moment.
    Settled { token: TimerToken, photo: P },
}

/// The two committed shots, handed over once on completion.
#[derive(Debug, Clone)]
pub struct CapturedPair<P> {
    pub front: P,
    pub top: P,
}

/// Outputs of the reducer, to be carried out in order.
#[derive(Debug)]
pub enum Effect<P> {
    Schedule { token: TimerToken, kind: TimerKind, after: Duration },
    Cancel(TimerToken),
    Complete(CapturedPair<P>),
}

/// Coarse state, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerPhase {
    AwaitingFace,
    PendingFaceCapture,
    AwaitingTop,
    PendingTopCapture,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingPhase {
    Stabilizing {
        stability: TimerToken,
        countdown: Option<TimerToken>,
        remaining_secs: u32,
    },
    Settling {
        settle: TimerToken,
    },
}

/// The single in-flight capture. Always belongs to the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCapture {
    step: CaptureStep,
    phase: PendingPhase,
}

impl PendingCapture {
    fn tokens(&self) -> impl Iterator<Item = TimerToken> {
        let (a, b) = match self.phase {
            PendingPhase::Stabilizing { stability, countdown, .. } => (Some(stability), countdown),
            PendingPhase::Settling { settle } => (Some(settle), None),
        };
        a.into_iter().chain(b)
    }
}

/// Owned state of one capture session.
#[derive(Debug)]
pub struct Sequencer<P> {
    step: CaptureStep,
    face_photo: Option<P>,
    top_photo: Option<P>,
    pending: Option<PendingCapture>,
    last_capture_at: Option<Instant>,
    status: String,
    complete: bool,
    next_token: u64,
}

impl<P> Default for Sequencer<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Sequencer<P> {
    pub fn new() -> Self {
        Self {
            step: CaptureStep::Face,
            face_photo: None,
            top_photo: None,
            pending: None,
            last_capture_at: None,
            status: status::transition_message(CaptureStep::Face).to_string(),
            complete: false,
            next_token: 0,
        }
    }

    pub fn step(&self) -> CaptureStep {
        self.step
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn face_photo(&self) -> Option<&P> {
        self.face_photo.as_ref()
    }

    pub fn top_photo(&self) -> Option<&P> {
        self.top_photo.as_ref()
    }

    pub fn last_capture_at(&self) -> Option<Instant> {
        self.last_capture_at
    }

    /// True while a stability or settle timer is outstanding.
    pub fn has_pending_timer(&self) -> bool {
        self.pending.is_some()
    }

    /// True once the dwell time has elapsed and the commit is settling.
    pub fn is_capturing(&self) -> bool {
        matches!(
            self.pending,
            Some(PendingCapture { phase: PendingPhase::Settling { .. }, .. })
        )
    }

    pub fn phase(&self) -> SequencerPhase {
        match (self.complete, self.step, self.pending.is_some()) {
            (true, _, _) => SequencerPhase::Complete,
            (false, CaptureStep::Face, false) => SequencerPhase::AwaitingFace,
            (false, CaptureStep::Face, true) => SequencerPhase::PendingFaceCapture,
            (false, CaptureStep::Top, false) => SequencerPhase::AwaitingTop,
            (false, CaptureStep::Top, true) => SequencerPhase::PendingTopCapture,
        }
    }

    /// Cancel every outstanding timer and drop the in-flight capture, even
    /// one that is settling. Used on teardown.
    pub fn cancel_all(&mut self) -> Vec<Effect<P>> {
        self.cancel_pending("teardown")
    }

    fn issue_token(&mut self) -> TimerToken {
        self.next_token += 1;
        TimerToken(self.next_token)
    }

    fn cancel_pending(&mut self, reason: &'static str) -> Vec<Effect<P>> {
        let Some(pending) = self.pending.take() else {
            return Vec::new();
        };
        tracing::debug!(step = %pending.step, reason, "capture timer cancelled");
        pending.tokens().map(Effect::Cancel).collect()
    }
}

impl<P: Clone> Sequencer<P> {
    /// Apply one event and return the effects it implies.
    pub fn handle(&mut self, event: Event<P>) -> Vec<Effect<P>> {
        if self.complete {
            tracing::trace!("sequencer complete; event ignored");
            return Vec::new();
        }
        match event {
            Event::Frame { verdict, now } => self.on_frame(verdict, now),
            Event::Tick { token } => self.on_tick(token),
            Event::Stabilized { token, now } => self.on_stabilized(token, now),
            Event::Settled { token, photo } => self.on_settled(token, photo),
        }
    }

    fn on_frame(&mut self, verdict: ValidationVerdict, now: Instant) -> Vec<Effect<P>> {
        if self.is_capturing() {
            // The dwell time was met; the settle commits whatever is current.
            tracing::trace!(
                step = %self.step,
                has_face = verdict.has_face,
                "frame ignored while settling"
            );
            return Vec::new();
        }

        if !verdict.has_face {
            let effects = self.cancel_pending("no face");
            self.status = status::NO_FACE.to_string();
            return effects;
        }

        if !(verdict.valid_position && verdict.lighting_good) {
            let reason = if verdict.lighting_good { "position" } else { "lighting" };
            let effects = self.cancel_pending(reason);
            self.status = status::status_message(
                self.step,
                verdict.valid_position,
                verdict.lighting_good,
                true,
                false,
                None,
            );
            return effects;
        }

        if self.pending.is_some() {
            // A running timer is neither restarted nor duplicated.
            return Vec::new();
        }

        if let Some(remaining) = self.cooldown_remaining(now) {
            let secs = remaining.as_millis().div_ceil(1000) as u32;
            self.status = status::cooldown_message(secs);
            return Vec::new();
        }

        self.start_stability()
    }

    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        if self.step != CaptureStep::Top {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.last_capture_at?);
        MIN_TIME_BETWEEN_CAPTURES
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    fn start_stability(&mut self) -> Vec<Effect<P>> {
        debug_assert!(self.pending.is_none(), "capture timer started while one is pending");
        debug_assert!(
            self.photo_for(self.step).is_none(),
            "capture timer started for an already committed step"
        );

        let stability = self.issue_token();
        let mut effects = vec![Effect::Schedule {
            token: stability,
            kind: TimerKind::Stability,
            after: STABILITY_DELAY,
        }];

        let countdown = if COUNTDOWN_START_SECS > 1 {
            let token = self.issue_token();
            effects.push(Effect::Schedule {
                token,
                kind: TimerKind::Countdown,
                after: COUNTDOWN_TICK,
            });
            Some(token)
        } else {
            None
        };

        self.pending = Some(PendingCapture {
            step: self.step,
            phase: PendingPhase::Stabilizing {
                stability,
                countdown,
                remaining_secs: COUNTDOWN_START_SECS,
            },
        });
        self.status = status::status_message(
            self.step,
            true,
            true,
            true,
            false,
            Some(COUNTDOWN_START_SECS),
        );
        tracing::info!(step = %self.step, "stability timer started");
        effects
    }

    fn on_tick(&mut self, token: TimerToken) -> Vec<Effect<P>> {
        let Some(PendingCapture {
            step,
            phase: PendingPhase::Stabilizing { stability, countdown, remaining_secs },
        }) = self.pending
        else {
            return Vec::new();
        };
        if countdown != Some(token) {
            return Vec::new();
        }

        let remaining_secs = remaining_secs.saturating_sub(1);
        let mut effects = Vec::new();
        let next = if remaining_secs > 1 {
            let next = self.issue_token();
            effects.push(Effect::Schedule {
                token: next,
                kind: TimerKind::Countdown,
                after: COUNTDOWN_TICK,
            });
            Some(next)
        } else {
            None
        };

        if remaining_secs > 0 {
            self.status =
                status::status_message(step, true, true, true, false, Some(remaining_secs));
        }
        self.pending = Some(PendingCapture {
            step,
            phase: PendingPhase::Stabilizing {
                stability,
                countdown: next,
                remaining_secs,
            },
        });
        effects
    }

    fn on_stabilized(&mut self, token: TimerToken, now: Instant) -> Vec<Effect<P>> {
        let Some(PendingCapture {
            step,
            phase: PendingPhase::Stabilizing { stability, countdown, .. },
        }) = self.pending
        else {
            return Vec::new();
        };
        if stability != token {
            return Vec::new();
        }

        let mut effects: Vec<Effect<P>> = countdown.into_iter().map(Effect::Cancel).collect();
        self.last_capture_at = Some(now);

        let settle = self.issue_token();
        effects.push(Effect::Schedule {
            token: settle,
            kind: TimerKind::Settle,
            after: SETTLE_DELAY,
        });
        self.pending = Some(PendingCapture {
            step,
            phase: PendingPhase::Settling { settle },
        });
        self.status = status::status_message(step, true, true, true, true, None);
        tracing::info!(step = %step, "stability held; settling before capture");
        effects
    }

    fn on_settled(&mut self, token: TimerToken, photo: P) -> Vec<Effect<P>> {
        match self.pending {
            Some(PendingCapture {
                phase: PendingPhase::Settling { settle },
                ..
            }) if settle == token => {}
            _ => return Vec::new(),
        }
        self.pending = None;

        match self.step {
            CaptureStep::Face => {
                debug_assert!(self.face_photo.is_none(), "face photo committed twice");
                self.face_photo = Some(photo);
                self.step = CaptureStep::Top;
                self.status = status::transition_message(CaptureStep::Top).to_string();
                tracing::info!("face photo committed; awaiting top of head");
                Vec::new()
            }
            CaptureStep::Top => {
                debug_assert!(self.top_photo.is_none(), "top photo committed twice");
                let Some(front) = self.face_photo.clone() else {
                    debug_assert!(false, "top photo committed without a face photo");
                    return Vec::new();
                };
                self.top_photo = Some(photo.clone());
                self.complete = true;
                self.status = status::ALL_CAPTURED.to_string();
                tracing::info!("top photo committed; capture complete");
                vec![Effect::Complete(CapturedPair { front, top: photo })]
            }
        }
    }

    fn photo_for(&self, step: CaptureStep) -> Option<&P> {
        match step {
            CaptureStep::Face => self.face_photo.as_ref(),
            CaptureStep::Top => self.top_photo.as_ref(),
        }
    }
}
