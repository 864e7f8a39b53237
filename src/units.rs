//! Millimetre / step conversion.
//!
//! The controller firmware counts whole motor steps. Everything above the wire
//! speaks millimetres. Conversion truncates toward zero, so a request smaller
//! than one step commands zero steps and the sub-step remainder is dropped.

use crate::axis::AxisSign;

/// Travel per motor step for a lead screw, in millimetres.
pub fn mm_per_step(step_angle_deg: f64, lead_mm_per_turn: f64) -> f64 {
    step_angle_deg * lead_mm_per_turn / 360.0
}

/// Convert a displacement to a signed step count, truncating toward zero.
pub fn to_steps(mm: f64, mm_per_step: f64, sign: AxisSign) -> i64 {
    let quotient = mm / mm_per_step;
    // `n * m / m` is not always exactly `n` in binary floating point. Only a
    // value that is exactly a whole number of steps is snapped; anything else
    // truncates, however close it lies to the next step.
    let nearest = quotient.round();
    let steps = if nearest * mm_per_step == mm {
        nearest
    } else {
        quotient.trunc()
    };
    // `as` saturates on overflow; bounds checks upstream keep us far from it.
    steps as i64 * sign.factor()
}

/// Convert a signed step count back to millimetres.
pub fn to_mm(steps: i64, mm_per_step: f64, sign: AxisSign) -> f64 {
    steps as f64 * mm_per_step * sign.factor() as f64
}
