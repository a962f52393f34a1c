//! Motion commands, validation flags, and status lines.
//!
//! A [`Command`] is produced either by the frame parser
//! ([`crate::parsing::parse_frame`]) or built directly by the encoder
//! decoder. It is moved into the command queue once and consumed once by
//! the coordinator.
//!
//! # Status Lines
//!
//! | Line | Meaning |
//! |------|---------|
//! | `SCT:BGN` | Stepper motion dispatched |
//! | `SCT:END` | Every addressed axis finished |
//! | `AST:ERR:<CODE>` | One validation or runtime error (see [`ErrorFlags`]) |
//! | `<text> - error` | Malformed frame echoed back |
//! | `MNU:STP<n>` / `MNU:SRV` | Encoder menu moved to a new actuator |
//!
//! # Example
//!
//! ```rust
//! use stepper_servo_ctl::commands::{ErrorFlags, StatusLine};
//!
//! let flags = ErrorFlags::STP_ID | ErrorFlags::STP_ANG;
//! let lines: Vec<String> = flags.diagnostics().map(|l| l.to_string()).collect();
//! assert_eq!(lines, ["AST:ERR:STPID", "AST:ERR:STPANG"]);
//!
//! assert_eq!(StatusLine::MotionBegin.to_string(), "SCT:BGN");
//! ```

use alloc::string::String;
use core::fmt;

use bitflags::bitflags;
use heapless::Vec;

use crate::encoder::MenuTarget;
use crate::traits::Direction;

/// Upper bound on stepper axes (one completion bit each).
pub const MAX_AXES: usize = 8;

// ============================================================================
// Axis Handle
// ============================================================================

/// Stable index of a stepper axis inside the engine's axis arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisId(pub u8);

impl AxisId {
    /// Arena index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit this axis sets in the completion group.
    ///
    /// Indices past the 32-bit group have no bit and return 0.
    #[inline]
    pub const fn completion_bit(self) -> u32 {
        match 1u32.checked_shl(self.0 as u32) {
            Some(bit) => bit,
            None => 0,
        }
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Commands
// ============================================================================

/// One relative move of a single axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisMove {
    /// Target axis.
    pub axis: AxisId,
    /// Rotation direction.
    pub direction: Direction,
    /// Half-steps to travel.
    pub steps: u32,
}

/// Moves issued together and waited on jointly.
pub type MoveSet = Vec<AxisMove, MAX_AXES>;

/// A command for one of the motion engines.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Relative move of one axis.
    StepperRelativeMove {
        /// Target axis.
        axis: AxisId,
        /// Rotation direction.
        direction: Direction,
        /// Half-steps to travel.
        steps: u32,
    },
    /// Relative moves of several axes, completing together.
    StepperGroupMove(MoveSet),
    /// New timer period for one axis.
    StepperSpeedChange {
        /// Target axis.
        axis: AxisId,
        /// Milliseconds per half-step.
        period_ms: u32,
    },
    /// Absolute servo angle in degrees (may be out of range).
    ServoAbsoluteSetpoint {
        /// Requested angle.
        angle: i32,
    },
}

impl Command {
    /// Builds a single-axis move.
    pub const fn relative_move(axis: AxisId, direction: Direction, steps: u32) -> Self {
        Command::StepperRelativeMove {
            axis,
            direction,
            steps,
        }
    }

    /// Every axis move this command carries (empty for non-move commands).
    pub fn moves(&self) -> MoveSet {
        match self {
            Command::StepperRelativeMove {
                axis,
                direction,
                steps,
            } => {
                let mut set = MoveSet::new();
                // Capacity is at least one
                let _ = set.push(AxisMove {
                    axis: *axis,
                    direction: *direction,
                    steps: *steps,
                });
                set
            }
            Command::StepperGroupMove(set) => set.clone(),
            _ => MoveSet::new(),
        }
    }

    /// Whether the coordinator waits for completion after dispatching this.
    #[inline]
    pub fn is_move(&self) -> bool {
        matches!(
            self,
            Command::StepperRelativeMove { .. } | Command::StepperGroupMove(_)
        )
    }
}

// ============================================================================
// Error Flags
// ============================================================================

bitflags! {
    /// Aggregated error bits reported once per command cycle.
    ///
    /// Iteration order (and therefore diagnostic line order) is bit order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorFlags: u8 {
        /// Axis index outside the configured axes.
        const STP_ID = 0x01;
        /// Direction digit not `0`/`1`.
        const STP_DIR = 0x02;
        /// Period outside the accepted range.
        const STP_VEL = 0x04;
        /// Negative or non-numeric angle, or unexpected field letter.
        const STP_ANG = 0x08;
        /// Servo angle was clamped.
        const SRV_ANG = 0x10;
        /// Move did not complete within the configured bound.
        const STP_TMO = 0x20;
    }
}

impl Default for ErrorFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl ErrorFlags {
    /// Wire code of a single flag, `None` for empty or combined values.
    pub fn code(self) -> Option<&'static str> {
        let code = match self {
            f if f == Self::STP_ID => "STPID",
            f if f == Self::STP_DIR => "STPDIR",
            f if f == Self::STP_VEL => "STPVEL",
            f if f == Self::STP_ANG => "STPANG",
            f if f == Self::SRV_ANG => "SRVANG",
            f if f == Self::STP_TMO => "STPTMO",
            _ => return None,
        };
        Some(code)
    }

    /// One `AST:ERR:<CODE>` line per set flag, in bit order.
    pub fn diagnostics(self) -> impl Iterator<Item = StatusLine> {
        self.iter().map(StatusLine::Error)
    }
}

// ============================================================================
// Status Lines
// ============================================================================

/// A line sent back over the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusLine {
    /// `SCT:BGN`
    MotionBegin,
    /// `SCT:END`
    MotionEnd,
    /// `AST:ERR:<CODE>` for a single flag.
    Error(ErrorFlags),
    /// Malformed input echoed with ` - error`.
    Rejected(String),
    /// `MNU:STP<n>` or `MNU:SRV`.
    Menu(MenuTarget),
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::MotionBegin => f.write_str("SCT:BGN"),
            StatusLine::MotionEnd => f.write_str("SCT:END"),
            StatusLine::Error(flag) => write!(f, "AST:ERR:{}", flag.code().unwrap_or("UNK")),
            StatusLine::Rejected(text) => write!(f, "{text} - error"),
            StatusLine::Menu(MenuTarget::Stepper(axis)) => write!(f, "MNU:STP{axis}"),
            StatusLine::Menu(MenuTarget::Servo) => f.write_str("MNU:SRV"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec as StdVec;

    // === Error Flag Tests ===

    #[test]
    fn each_flag_has_a_code() {
        let codes: StdVec<_> = ErrorFlags::all().iter().map(|f| f.code()).collect();
        assert_eq!(
            codes,
            [
                Some("STPID"),
                Some("STPDIR"),
                Some("STPVEL"),
                Some("STPANG"),
                Some("SRVANG"),
                Some("STPTMO"),
            ]
        );
    }

    #[test]
    fn combined_flags_have_no_single_code() {
        assert_eq!((ErrorFlags::STP_ID | ErrorFlags::STP_DIR).code(), None);
        assert_eq!(ErrorFlags::empty().code(), None);
    }

    #[test]
    fn diagnostics_follow_bit_order() {
        let flags = ErrorFlags::SRV_ANG | ErrorFlags::STP_DIR | ErrorFlags::STP_VEL;
        let lines: StdVec<_> = flags.diagnostics().map(|l| l.to_string()).collect();
        assert_eq!(lines, ["AST:ERR:STPDIR", "AST:ERR:STPVEL", "AST:ERR:SRVANG"]);
    }

    #[test]
    fn no_flags_no_diagnostics() {
        assert_eq!(ErrorFlags::default().diagnostics().count(), 0);
    }

    // === Status Line Tests ===

    #[test]
    fn status_line_wire_text() {
        assert_eq!(StatusLine::MotionBegin.to_string(), "SCT:BGN");
        assert_eq!(StatusLine::MotionEnd.to_string(), "SCT:END");
        assert_eq!(
            StatusLine::Rejected("XYZ".to_string()).to_string(),
            "XYZ - error"
        );
        assert_eq!(
            StatusLine::Menu(MenuTarget::Stepper(AxisId(1))).to_string(),
            "MNU:STP1"
        );
        assert_eq!(StatusLine::Menu(MenuTarget::Servo).to_string(), "MNU:SRV");
    }

    // === Command Tests ===

    #[test]
    fn single_move_lists_itself() {
        let cmd = Command::relative_move(AxisId(0), Direction::Forward, 1024);
        let moves = cmd.moves();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].steps, 1024);
        assert!(cmd.is_move());
    }

    #[test]
    fn non_move_commands_list_nothing() {
        let speed = Command::StepperSpeedChange {
            axis: AxisId(0),
            period_ms: 5,
        };
        assert!(speed.moves().is_empty());
        assert!(!speed.is_move());
        assert!(!Command::ServoAbsoluteSetpoint { angle: 90 }.is_move());
    }

    #[test]
    fn completion_bits_are_distinct() {
        assert_eq!(AxisId(0).completion_bit(), 0b001);
        assert_eq!(AxisId(2).completion_bit(), 0b100);
    }

    #[test]
    fn out_of_group_axis_has_no_completion_bit() {
        assert_eq!(AxisId(31).completion_bit(), 1 << 31);
        assert_eq!(AxisId(32).completion_bit(), 0);
        assert_eq!(AxisId(u8::MAX).completion_bit(), 0);
    }
}
