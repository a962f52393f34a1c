//! Half-step commutation and the per-axis state machine.
//!
//! This module is the `no_std` core of the stepper engine. The runtime
//! side (`services::stepper`) owns one [`AxisState`] per axis, calls
//! [`AxisState::tick`] from that axis's periodic timer, and writes the
//! returned pattern to the driver.
//!
//! # State Machine
//!
//! ```text
//!            set_setpoint(steps > 0)
//!   IDLE ───────────────────────────────▶ ACTIVE
//!    ▲                                     │ tick: advance phase, pending -= 1
//!    │          tick with pending == 0     │
//!    └─────────────────────────────────────┘
//! ```
//!
//! Re-issuing a setpoint while ACTIVE overwrites the in-flight target.
//!
//! # Commutation Table
//!
//! | Phase | L1 | L2 | L3 | L4 |
//! |-------|----|----|----|----|
//! | 0 | 1 | 1 | 0 | 0 |
//! | 1 | 0 | 1 | 0 | 0 |
//! | 2 | 0 | 1 | 1 | 0 |
//! | 3 | 0 | 0 | 1 | 0 |
//! | 4 | 0 | 0 | 1 | 1 |
//! | 5 | 0 | 0 | 0 | 1 |
//! | 6 | 1 | 0 | 0 | 1 |
//! | 7 | 1 | 0 | 0 | 0 |

use crate::traits::Direction;

/// Levels of the four coil lines (`true` = energized).
pub type CoilPattern = [bool; 4];

/// Number of phases in the half-step sequence.
pub const PHASE_COUNT: u8 = 8;

/// Coil pattern for every phase, shared by all axes.
pub const COMMUTATION: [CoilPattern; PHASE_COUNT as usize] = [
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
    [true, false, false, true],
    [true, false, false, false],
];

/// All coils off.
pub const RELEASED: CoilPattern = [false; 4];

/// Converts degrees of shaft travel to half-steps (integer division).
///
/// ```
/// use stepper_servo_ctl::stepper::angle_to_steps;
///
/// assert_eq!(angle_to_steps(90, 4096), 1024);
/// assert_eq!(angle_to_steps(15, 4096), 170);
/// ```
pub const fn angle_to_steps(angle_deg: u32, steps_per_revolution: u32) -> u32 {
    (angle_deg as u64 * steps_per_revolution as u64 / 360) as u32
}

/// Converts half-steps back to whole degrees (integer division).
pub const fn steps_to_angle(steps: u32, steps_per_revolution: u32) -> u32 {
    if steps_per_revolution == 0 {
        return 0;
    }
    (steps as u64 * 360 / steps_per_revolution as u64) as u32
}

// ============================================================================
// Phase
// ============================================================================

/// Commutation phase, always in `0..8`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Phase(u8);

impl Phase {
    /// Phase `index`, or `None` outside `0..8`.
    pub const fn new(index: u8) -> Option<Self> {
        if index < PHASE_COUNT {
            Some(Phase(index))
        } else {
            None
        }
    }

    /// Index into [`COMMUTATION`].
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The next phase in `direction`, wrapping 7→0 and 0→7.
    #[inline]
    pub const fn advance(self, direction: Direction) -> Self {
        match direction {
            Direction::Forward => Phase((self.0 + 1) % PHASE_COUNT),
            Direction::Backward => Phase((self.0 + PHASE_COUNT - 1) % PHASE_COUNT),
        }
    }

    /// Coil pattern for this phase.
    #[inline]
    pub const fn pattern(self) -> CoilPattern {
        COMMUTATION[self.0 as usize]
    }
}

// ============================================================================
// Axis State
// ============================================================================

/// What one timer callback did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Advanced one half-step; write this pattern to the driver.
    Stepped(CoilPattern),
    /// No steps were left: stop the timer and set the completion bit.
    Completed,
    /// The axis was already idle.
    Idle,
}

/// Motion state of one stepper axis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AxisState {
    phase: Phase,
    pending_steps: u32,
    direction: Direction,
    active: bool,
}

impl AxisState {
    /// An idle axis at phase 0.
    pub const fn new() -> Self {
        Self {
            phase: Phase(0),
            pending_steps: 0,
            direction: Direction::Forward,
            active: false,
        }
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Half-steps left in the current move.
    #[inline]
    pub fn pending_steps(&self) -> u32 {
        self.pending_steps
    }

    /// Direction of the current (or last) move.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the axis timer should be running.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Loads a new relative target.
    ///
    /// A zero-step request leaves the axis untouched and returns `false`.
    /// Otherwise the in-flight target (if any) is replaced, the axis
    /// becomes ACTIVE, and `true` is returned.
    pub fn set_setpoint(&mut self, steps: u32, direction: Direction) -> bool {
        if steps == 0 {
            return false;
        }
        self.pending_steps = steps;
        self.direction = direction;
        self.active = true;
        true
    }

    /// One timer callback.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.active {
            return TickOutcome::Idle;
        }
        if self.pending_steps == 0 {
            self.active = false;
            return TickOutcome::Completed;
        }
        self.phase = self.phase.advance(self.direction);
        self.pending_steps -= 1;
        TickOutcome::Stepped(self.phase.pattern())
    }

    /// Remaining travel in whole degrees.
    pub fn pending_angle(&self, steps_per_revolution: u32) -> u32 {
        steps_to_angle(self.pending_steps, steps_per_revolution)
    }
}

// ============================================================================
// Tests
// ============================================================================
