//! [`MotionState`] – target/current position of the simulated vehicle.
//!
//! Commands only nudge the *target*.  A steady rendering or timer loop calls
//! [`MotionState::advance`] (or [`advance_for`][MotionState::advance_for])
//! which eases the *current* values toward the target.
//!
//! Axes:
//!
//! | Command | Field | Step | Bounds |
//! |---|---|---|---|
//! | `Left` / `Right` | `target_position.x` | `move_step` | `[-max_x, max_x]` |
//! | `Up` / `Down` | `target_position.y` | `move_step` | `[min_y, max_y]` |
//! | `Forward` / `Backward` | `target_scroll` | `grid_speed` | unbounded |
//!
//! The scroll axis stands in for "infinite" forward travel and is decoupled
//! from the bounded X/Y axes, so forward motion never saturates.

use std::time::Duration;

use tracing::trace;
use voxa_types::{CanonicalCommand, MotionSnapshot, Vec3};

use crate::smoothing::{approach, factor_for, wrap};

/// World units per lateral/vertical command.
pub const MOVE_STEP: f32 = 0.28;
/// Scroll units per forward/back command.
pub const GRID_SPEED: f32 = 0.4;
/// Fraction of the remaining distance covered per reference tick.
pub const LERP_FACTOR: f32 = 0.08;
pub const MAX_X: f32 = 14.0;
pub const MIN_Y: f32 = 0.4;
pub const MAX_Y: f32 = 12.0;
/// Period of the fine scroll ring.
pub const NEAR_RING_PERIOD: f32 = 1.0;
/// Period of the coarse scroll ring.
pub const FAR_RING_PERIOD: f32 = 5.0;

/// Tunables for [`MotionState`].  `Default` yields the reference values.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
    pub move_step: f32,
    pub grid_speed: f32,
    pub lerp_factor: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    /// Position at session start.
    pub origin: Vec3,
    /// Tick rate `lerp_factor` is expressed against.
    pub reference_hz: f32,
    /// Radians of tilt per world unit of remaining distance.
    pub tilt_gain: f32,
    /// Per-tick smoothing applied to the tilt angles.
    pub tilt_smoothing: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            move_step: MOVE_STEP,
            grid_speed: GRID_SPEED,
            lerp_factor: LERP_FACTOR,
            max_x: MAX_X,
            min_y: MIN_Y,
            max_y: MAX_Y,
            origin: Vec3::new(0.0, 1.4, 0.0),
            reference_hz: 60.0,
            tilt_gain: 1.4,
            tilt_smoothing: 0.1,
        }
    }
}

/// Owned, mutable motion state for one session.
///
/// Invariant: `target_position.x ∈ [-max_x, max_x]` and
/// `target_position.y ∈ [min_y, max_y]` after every mutation.
#[derive(Debug, Clone)]
pub struct MotionState {
    config: MotionConfig,
    target_position: Vec3,
    current_position: Vec3,
    target_scroll: f32,
    current_scroll: f32,
    roll: f32,
    pitch: f32,
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionState {
    /// Create a state resting at `config.origin` (clamped into bounds).
    pub fn new(config: MotionConfig) -> Self {
        let mut state = Self {
            target_position: config.origin,
            current_position: config.origin,
            target_scroll: 0.0,
            current_scroll: 0.0,
            roll: 0.0,
            pitch: 0.0,
            config,
        };
        state.clamp_target();
        state.current_position = state.target_position;
        state
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    pub fn current_position(&self) -> Vec3 {
        self.current_position
    }

    pub fn target_scroll(&self) -> f32 {
        self.target_scroll
    }

    pub fn current_scroll(&self) -> f32 {
        self.current_scroll
    }

    /// Step the target for `cmd`, then clamp.
    ///
    /// Returns `true` when the target actually moved.  `Stop` and commands
    /// pushing against a bound return `false`.
    pub fn apply_command(&mut self, cmd: CanonicalCommand) -> bool {
        let before = (self.target_position, self.target_scroll);
        let step = self.config.move_step;
        match cmd {
            CanonicalCommand::Forward => self.target_scroll += self.config.grid_speed,
            CanonicalCommand::Backward => self.target_scroll -= self.config.grid_speed,
            CanonicalCommand::Left => self.target_position.x -= step,
            CanonicalCommand::Right => self.target_position.x += step,
            CanonicalCommand::Up => self.target_position.y += step,
            CanonicalCommand::Down => self.target_position.y -= step,
            CanonicalCommand::Stop => {}
        }
        self.clamp_target();
        let changed = before != (self.target_position, self.target_scroll);
        trace!(?cmd, changed, x = self.target_position.x, y = self.target_position.y,
            scroll = self.target_scroll, "target updated");
        changed
    }

    /// One fixed smoothing tick at the reference rate.
    pub fn advance(&mut self) {
        self.step(self.config.lerp_factor, self.config.tilt_smoothing);
    }

    /// Smooth for `dt` of wall time, independent of the caller's tick rate.
    pub fn advance_for(&mut self, dt: Duration) {
        let hz = self.config.reference_hz;
        let pos = factor_for(self.config.lerp_factor, dt, hz);
        let tilt = factor_for(self.config.tilt_smoothing, dt, hz);
        self.step(pos, tilt);
    }

    /// Read-only view for presentation layers.
    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            current_position: self.current_position,
            target_position: self.target_position,
            current_scroll: self.current_scroll,
            target_scroll: self.target_scroll,
            near_ring: wrap(self.current_scroll, NEAR_RING_PERIOD),
            far_ring: wrap(self.current_scroll, FAR_RING_PERIOD),
            roll: self.roll,
            pitch: self.pitch,
        }
    }

    fn step(&mut self, factor: f32, tilt_factor: f32) {
        let t = self.target_position;
        let c = &mut self.current_position;
        c.x = approach(c.x, t.x, factor);
        c.y = approach(c.y, t.y, factor);
        c.z = approach(c.z, t.z, factor);
        self.current_scroll = approach(self.current_scroll, self.target_scroll, factor);

        // Bank into lateral motion, pitch into forward travel.
        let gain = self.config.tilt_gain;
        let vx = self.target_position.x - self.current_position.x;
        let vs = self.target_scroll - self.current_scroll;
        self.roll = approach(self.roll, -vx * gain, tilt_factor);
        self.pitch = approach(self.pitch, vs * gain, tilt_factor);
    }

    fn clamp_target(&mut self) {
        let cfg = &self.config;
        self.target_position.x = self.target_position.x.clamp(-cfg.max_x, cfg.max_x);
        self.target_position.y = self.target_position.y.clamp(cfg.min_y, cfg.max_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MotionState {
        MotionState::default()
    }

    #[test]
    fn starts_at_origin_with_current_equal_target() {
        let s = state();
        assert_eq!(s.target_position(), Vec3::new(0.0, 1.4, 0.0));
        assert_eq!(s.current_position(), s.target_position());
        assert_eq!(s.target_scroll(), 0.0);
    }

    #[test]
    fn each_motion_command_moves_one_step_on_its_axis() {
        let cases = [
            (CanonicalCommand::Left, Vec3::new(-MOVE_STEP, 1.4, 0.0), 0.0),
            (CanonicalCommand::Right, Vec3::new(MOVE_STEP, 1.4, 0.0), 0.0),
            (CanonicalCommand::Up, Vec3::new(0.0, 1.4 + MOVE_STEP, 0.0), 0.0),
            (CanonicalCommand::Down, Vec3::new(0.0, 1.4 - MOVE_STEP, 0.0), 0.0),
            (CanonicalCommand::Forward, Vec3::new(0.0, 1.4, 0.0), GRID_SPEED),
            (CanonicalCommand::Backward, Vec3::new(0.0, 1.4, 0.0), -GRID_SPEED),
        ];
        for (cmd, pos, scroll) in cases {
            let mut s = state();
            assert!(s.apply_command(cmd), "{cmd:?} must change target");
            let t = s.target_position();
            assert!((t.x - pos.x).abs() < 1e-6, "{cmd:?} x");
            assert!((t.y - pos.y).abs() < 1e-6, "{cmd:?} y");
            assert_eq!(t.z, 0.0);
            assert!((s.target_scroll() - scroll).abs() < 1e-6, "{cmd:?} scroll");
        }
    }

    #[test]
    fn stop_is_a_no_op_on_target() {
        let mut s = state();
        s.apply_command(CanonicalCommand::Right);
        let before = s.target_position();
        assert!(!s.apply_command(CanonicalCommand::Stop));
        assert_eq!(s.target_position(), before);
    }

    #[test]
    fn right_a_thousand_times_lands_exactly_on_max_x() {
        let mut s = state();
        for _ in 0..1000 {
            s.apply_command(CanonicalCommand::Right);
        }
        assert_eq!(s.target_position().x, MAX_X);
        assert!(!s.apply_command(CanonicalCommand::Right));
    }

    #[test]
    fn left_clamps_at_negative_max_x() {
        let mut s = state();
        for _ in 0..1000 {
            s.apply_command(CanonicalCommand::Left);
        }
        assert_eq!(s.target_position().x, -MAX_X);
    }

    #[test]
    fn up_fifty_times_clamps_at_max_y() {
        let mut s = state();
        for _ in 0..50 {
            s.apply_command(CanonicalCommand::Up);
        }
        // 1.4 + 50 * 0.28 = 15.4 without the clamp.
        assert_eq!(s.target_position().y, MAX_Y);
    }

    #[test]
    fn down_clamps_at_min_y() {
        let mut s = state();
        for _ in 0..20 {
            s.apply_command(CanonicalCommand::Down);
        }
        assert_eq!(s.target_position().y, MIN_Y);
    }

    #[test]
    fn forward_travel_never_saturates() {
        let mut s = state();
        for _ in 0..10_000 {
            assert!(s.apply_command(CanonicalCommand::Forward));
        }
        assert!(s.target_scroll() > 3_000.0);
    }

    #[test]
    fn scenario_right_then_left_returns_to_origin() {
        let mut s = state();
        s.apply_command(CanonicalCommand::Right);
        assert_eq!(s.target_position(), Vec3::new(0.28, 1.4, 0.0));
        s.apply_command(CanonicalCommand::Left);
        assert_eq!(s.target_position(), Vec3::new(0.0, 1.4, 0.0));
    }

    #[test]
    fn advance_converges_strictly_but_never_arrives() {
        let mut s = state();
        for _ in 0..50 {
            s.apply_command(CanonicalCommand::Right);
        }
        let target = s.target_position().x;
        let mut last = (target - s.current_position().x).abs();
        for _ in 0..100 {
            s.advance();
            let gap = (target - s.current_position().x).abs();
            assert!(gap < last, "gap must strictly decrease");
            assert!(gap > 0.0, "exponential smoothing never arrives");
            last = gap;
        }
        assert!(last < 0.01);
    }

    #[test]
    fn advance_moves_lerp_factor_of_the_gap() {
        let mut s = state();
        s.apply_command(CanonicalCommand::Right);
        s.advance();
        assert!((s.current_position().x - MOVE_STEP * LERP_FACTOR).abs() < 1e-6);
    }

    #[test]
    fn scroll_converges_with_same_law() {
        let mut s = state();
        s.apply_command(CanonicalCommand::Forward);
        s.advance();
        assert!((s.current_scroll() - GRID_SPEED * LERP_FACTOR).abs() < 1e-6);
    }

    #[test]
    fn advance_for_matches_fixed_ticks() {
        let mut fixed = state();
        let mut timed = state();
        fixed.apply_command(CanonicalCommand::Up);
        timed.apply_command(CanonicalCommand::Up);
        for _ in 0..60 {
            fixed.advance();
        }
        timed.advance_for(Duration::from_secs(1));
        let a = fixed.current_position().y;
        let b = timed.current_position().y;
        assert!((a - b).abs() < 1e-4, "fixed {a} vs timed {b}");
    }

    #[test]
    fn advance_for_long_gap_does_not_teleport() {
        let mut s = state();
        s.apply_command(CanonicalCommand::Right);
        s.advance_for(Duration::from_secs(5));
        let gap = s.target_position().x - s.current_position().x;
        assert!(gap > 0.0, "current landed on target after a 5s gap");
        assert!(s.current_position().x > 0.0);
    }

    #[test]
    fn advance_for_zero_is_a_no_op() {
        let mut s = state();
        s.apply_command(CanonicalCommand::Right);
        s.advance_for(Duration::ZERO);
        assert_eq!(s.current_position().x, 0.0);
    }

    #[test]
    fn roll_banks_against_lateral_motion() {
        let mut s = state();
        s.apply_command(CanonicalCommand::Right);
        s.advance();
        assert!(s.snapshot().roll < 0.0);
        let mut s = state();
        s.apply_command(CanonicalCommand::Forward);
        s.advance();
        assert!(s.snapshot().pitch > 0.0);
    }

    #[test]
    fn snapshot_rings_wrap_current_scroll() {
        let mut s = state();
        for _ in 0..20 {
            s.apply_command(CanonicalCommand::Backward);
        }
        for _ in 0..200 {
            s.advance();
        }
        let snap = s.snapshot();
        assert!(snap.current_scroll < 0.0);
        assert!((0.0..NEAR_RING_PERIOD).contains(&snap.near_ring));
        assert!((0.0..FAR_RING_PERIOD).contains(&snap.far_ring));
    }

    #[test]
    fn out_of_bounds_origin_is_clamped() {
        let cfg = MotionConfig {
            origin: Vec3::new(50.0, -3.0, 0.0),
            ..MotionConfig::default()
        };
        let s = MotionState::new(cfg);
        assert_eq!(s.target_position(), Vec3::new(MAX_X, MIN_Y, 0.0));
        assert_eq!(s.current_position(), s.target_position());
    }
}
