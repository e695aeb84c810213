//! Exponential smoothing helpers.
//!
//! The motion core never snaps to a target.  Each tick moves the current value
//! a fixed fraction of the remaining distance:
//!
//! ```text
//! current += (target - current) * factor
//! ```
//!
//! With `0 < factor < 1` this decays geometrically toward the target and never
//! reaches it in a finite number of steps.  [`factor_for`] rescales a per-tick
//! factor for an arbitrary elapsed time so that the decay depends on wall
//! time, not on how often the renderer happens to tick.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use voxa_motion::smoothing::{approach, factor_for};
//!
//! let f = factor_for(0.08, Duration::from_secs_f32(1.0 / 60.0), 60.0);
//! assert!((f - 0.08).abs() < 1e-4);
//!
//! let next = approach(0.0, 10.0, 0.5);
//! assert!((next - 5.0).abs() < 1e-6);
//! ```

use std::time::Duration;

/// Move `current` toward `target` by `factor` of the remaining distance.
pub fn approach(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

/// Most reference ticks a single call may catch up on.  A longer gap (stalled
/// runtime, suspended process) is smoothed as if only this many ticks passed.
pub const MAX_CATCH_UP_TICKS: f32 = 60.0;

/// Largest factor [`factor_for`] returns; one call never lands on the target.
pub const MAX_FACTOR: f32 = 1.0 - f32::EPSILON;

/// Per-call factor equivalent to applying `per_tick` once per
/// `1 / reference_hz` seconds for `dt`.
///
/// `1 - (1 - per_tick)^(dt * reference_hz)` with the tick count capped at
/// [`MAX_CATCH_UP_TICKS`], clamped into `[0, MAX_FACTOR]`.  Returns `0.0` for a
/// zero or non-finite elapsed time, or a non-positive reference rate.
pub fn factor_for(per_tick: f32, dt: Duration, reference_hz: f32) -> f32 {
    let ticks = dt.as_secs_f32() * reference_hz;
    if !ticks.is_finite() || ticks <= 0.0 || reference_hz <= 0.0 {
        return 0.0;
    }
    let ticks = ticks.min(MAX_CATCH_UP_TICKS);
    let retained = (1.0 - per_tick.clamp(0.0, 1.0)).powf(ticks);
    (1.0 - retained).clamp(0.0, MAX_FACTOR)
}

/// Euclidean modulo: always in `[0, period)` for a positive period.
///
/// Presentation layers view the scroll axis through two of these "rings" with
/// different periods to drive independent tiled motion.
pub fn wrap(value: f32, period: f32) -> f32 {
    if period <= 0.0 {
        return 0.0;
    }
    let wrapped = value.rem_euclid(period);
    // rem_euclid can round up to exactly `period` for tiny negative inputs.
    if wrapped >= period { 0.0 } else { wrapped }
}
