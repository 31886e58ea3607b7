//! Turns a raw regression output into a bounded, user-facing prediction

use crate::config::*;
use crate::pipeline::RejectReason;

/// A sanitized regression output, before it is mapped onto the cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sanitized {
    /// The prediction clamped to [0, CYCLE_LENGTH], not yet rounded
    pub clamped: f64,
    pub days_until_hatch: i64,
    pub confidence: f64,
}

/// Reject implausible raw predictions, clamp, round (half up) and derive a
/// confidence score from the distance to the nearest whole day.
pub fn sanitize(predicted_days: f64) -> Result<Sanitized, RejectReason> {
    // NaN slips past every comparison below
    if !predicted_days.is_finite() || predicted_days < MIN_RAW_PREDICTION {
        return Err(RejectReason::InvalidPrediction);
    }
    if predicted_days > MAX_RAW_PREDICTION {
        return Err(RejectReason::UnrealisticPrediction);
    }

    let clamped = predicted_days.clamp(0., CYCLE_LENGTH as f64);
    // non-negative after the clamp, so round() is round-half-up
    let days_until_hatch = clamped.round() as i64;

    let confidence = confidence(clamped, days_until_hatch);
    check_confidence(confidence)?;

    Ok(Sanitized {
        clamped,
        days_until_hatch,
        confidence,
    })
}

/// 100 minus a penalty per day away from the rounded value, kept in
/// [MIN_CONFIDENCE, MAX_CONFIDENCE]
pub fn confidence(clamped: f64, days_until_hatch: i64) -> f64 {
    let raw = 100. - (clamped - days_until_hatch as f64).abs() * CONFIDENCE_PENALTY;
    raw.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Enforce the low-confidence floor. Under the current constants no value
/// produced by `confidence` can trip it.
pub fn check_confidence(confidence: f64) -> Result<(), RejectReason> {
    if confidence < REJECT_CONFIDENCE {
        Err(RejectReason::LowConfidence)
    } else {
        Ok(())
    }
}

/// Position within the maturation cycle given the days left
pub fn current_day(days_until_hatch: i64) -> i64 {
    (CYCLE_LENGTH - days_until_hatch).max(0)
}
