//! User-facing status lines. Pure functions, safe to call every frame.

use crate::types::CaptureStep;

pub const NO_FACE: &str = "❌ No face detected";
pub const IMPROVE_LIGHTING: &str = "💡 Please improve lighting";
pub const MOVE_FACE_INTO_OVAL: &str = "⬜ Please move your face into the oval";
pub const TILT_HEAD_INTO_OVAL: &str =
    "⬜ Tilt your head back and position the top of your head (hair/scalp) in the oval";
pub const TILT_HEAD_BACK: &str =
    "Tilt your head back and position the top of your head (hair/scalp) in the oval";
pub const CAPTURING: &str = "📸 Capturing...";
pub const ALL_CAPTURED: &str = "All photos captured ✅";
pub const STARTING: &str = "Position your face in the oval";

fn step_name(step: CaptureStep) -> &'static str {
    match step {
        CaptureStep::Face => "Face",
        CaptureStep::Top => "Top of head",
    }
}

fn plural(n: u32) -> &'static str {
    if n > 1 { "s" } else { "" }
}

/// Status line for the current frame.
///
/// Precedence, first match wins: capturing, no face, lighting, position,
/// countdown, ready.
pub fn status_message(
    step: CaptureStep,
    valid_position: bool,
    lighting_good: bool,
    has_face: bool,
    is_capturing: bool,
    countdown: Option<u32>,
) -> String {
    if is_capturing {
        return match step {
            CaptureStep::Face => "📸 Capturing face photo...".to_string(),
            CaptureStep::Top => "📸 Capturing top photo...".to_string(),
        };
    }

    if !has_face {
        return NO_FACE.to_string();
    }

    if !lighting_good {
        return IMPROVE_LIGHTING.to_string();
    }

    if !valid_position {
        return match step {
            CaptureStep::Face => MOVE_FACE_INTO_OVAL.to_string(),
            CaptureStep::Top => TILT_HEAD_INTO_OVAL.to_string(),
        };
    }

    match countdown {
        Some(secs) if secs > 0 => format!(
            "✅ {} ready - Capturing in {secs} second{}...",
            step_name(step),
            plural(secs)
        ),
        _ => format!("✅ {} ready", step_name(step)),
    }
}

/// Instruction shown right after moving into `step`.
pub fn transition_message(step: CaptureStep) -> &'static str {
    match step {
        CaptureStep::Face => STARTING,
        CaptureStep::Top => TILT_HEAD_BACK,
    }
}

/// Shown while the cooldown between captures is still running.
pub fn cooldown_message(remaining_secs: u32) -> String {
    format!(
        "⏳ Please wait {remaining_secs} second{} and position your head...",
        plural(remaining_secs)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capturing_wins() {
        let msg = status_message(CaptureStep::Top, false, false, false, true, Some(2));
        assert_eq!(msg, "📸 Capturing top photo...");
    }

    #[test]
    fn test_no_face_before_lighting() {
        assert_eq!(status_message(CaptureStep::Face, false, false, false, false, None), NO_FACE);
    }

    #[test]
    fn test_lighting_before_position() {
        assert_eq!(
            status_message(CaptureStep::Face, false, false, true, false, None),
            IMPROVE_LIGHTING
        );
    }

    #[test]
    fn test_position_text_per_step() {
        assert_eq!(
            status_message(CaptureStep::Face, false, true, true, false, None),
            MOVE_FACE_INTO_OVAL
        );
        assert_eq!(
            status_message(CaptureStep::Top, false, true, true, false, None),
            TILT_HEAD_INTO_OVAL
        );
    }

    #[test]
    fn test_countdown_pluralization() {
        assert_eq!(
            status_message(CaptureStep::Face, true, true, true, false, Some(2)),
            "✅ Face ready - Capturing in 2 seconds..."
        );
        assert_eq!(
            status_message(CaptureStep::Top, true, true, true, false, Some(1)),
            "✅ Top of head ready - Capturing in 1 second..."
        );
    }

    #[test]
    fn test_ready_without_countdown() {
        assert_eq!(
            status_message(CaptureStep::Face, true, true, true, false, None),
            "✅ Face ready"
        );
        assert_eq!(
            status_message(CaptureStep::Top, true, true, true, false, Some(0)),
            "✅ Top of head ready"
        );
    }

    #[test]
    fn test_cooldown_message() {
        assert_eq!(cooldown_message(3), "⏳ Please wait 3 seconds and position your head...");
        assert_eq!(cooldown_message(1), "⏳ Please wait 1 second and position your head...");
    }

    #[test]
    fn test_transition_message() {
        assert_eq!(transition_message(CaptureStep::Top), TILT_HEAD_BACK);
    }
}
