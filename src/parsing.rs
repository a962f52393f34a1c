//! Command frame parser.
//!
//! Frames are short ASCII lines, case-sensitive, with fixed-width decimal
//! fields:
//!
//! | Frame | Command |
//! |-------|---------|
//! | `:X<angle>` | Absolute servo angle (may be negative or above range) |
//! | `:S<axis>D<dir>A<angle>` | Relative stepper move |
//! | `:S<axis>D<dir>A<angle>S<axis>D<dir>A<angle>...` | Joint move of several axes |
//! | `:S<axis>V<period>` | Stepper timer period in ms |
//!
//! `<axis>` and `<dir>` are one digit. `<angle>` and `<period>` are one to
//! three digits with an optional leading `-` (so a negative value can be
//! reported rather than treated as malformed).
//!
//! A frame without the leading `:`, with an empty body, or with an unknown
//! command letter is *malformed*: the caller echoes it back. Every other
//! problem is a field error reported as [`ErrorFlags`]; all field errors in
//! a frame are collected before returning.
//!
//! # Example
//!
//! ```rust
//! use stepper_servo_ctl::parsing::{parse_frame, FrameError, FrameLimits};
//! use stepper_servo_ctl::{AxisId, Command, Direction, ErrorFlags};
//!
//! let limits = FrameLimits::new(2);
//!
//! let cmd = parse_frame(":S0D1A090", &limits).unwrap();
//! assert_eq!(cmd, Command::relative_move(AxisId(0), Direction::Forward, 1024));
//!
//! assert_eq!(parse_frame("XYZ", &limits), Err(FrameError::MissingSentinel));
//! assert_eq!(
//!     parse_frame(":S9D1A010", &limits),
//!     Err(FrameError::Invalid(ErrorFlags::STP_ID))
//! );
//! ```

use thiserror::Error;

use crate::commands::{AxisId, AxisMove, Command, ErrorFlags, MoveSet};
use crate::config::StepperConfig;
use crate::stepper::angle_to_steps;
use crate::traits::Direction;

/// Digits allowed in an angle or period field.
const MAX_FIELD_DIGITS: usize = 3;

// ============================================================================
// Limits
// ============================================================================

/// Board facts the parser validates against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameLimits {
    /// Number of stepper axes.
    pub axis_count: usize,
    /// Smallest accepted period (ms).
    pub min_period_ms: u32,
    /// Largest accepted period (ms).
    pub max_period_ms: u32,
    /// Half-steps per revolution for angle conversion.
    pub steps_per_revolution: u32,
}

impl FrameLimits {
    /// Limits for `axis_count` axes with the default stepper configuration.
    pub fn new(axis_count: usize) -> Self {
        Self::from_config(axis_count, &StepperConfig::default())
    }

    /// Limits for `axis_count` axes with the given stepper configuration.
    pub fn from_config(axis_count: usize, stepper: &StepperConfig) -> Self {
        Self {
            axis_count,
            min_period_ms: stepper.min_period_ms,
            max_period_ms: stepper.max_period_ms,
            steps_per_revolution: stepper.steps_per_revolution,
        }
    }

    fn axis(&self, index: u8) -> Option<AxisId> {
        ((index as usize) < self.axis_count).then_some(AxisId(index))
    }

    fn period_ok(&self, period_ms: i32) -> bool {
        period_ms >= 0 && (self.min_period_ms..=self.max_period_ms).contains(&(period_ms as u32))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a frame produced no command.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The frame does not start with `:`.
    #[error("frame does not start with ':'")]
    MissingSentinel,
    /// Nothing follows the `:`.
    #[error("empty frame")]
    Empty,
    /// The command letter is neither `X` nor `S`.
    #[error("unknown command letter '{0}'")]
    UnknownCommand(char),
    /// Well-formed frame with invalid fields.
    #[error("invalid fields: {0:?}")]
    Invalid(ErrorFlags),
}

impl FrameError {
    /// Malformed frames are echoed back instead of reported as flags.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, FrameError::Invalid(_))
    }
}

// ============================================================================
// Cursor
// ============================================================================

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn next_digit(&mut self) -> Option<u8> {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {
                self.pos += 1;
                Some(b)
            }
            _ => None,
        }
    }

    /// Optional `-` then 1..=3 digits. Longer runs are consumed and rejected.
    fn number(&mut self) -> Option<i32> {
        let negative = self.eat(b'-');
        let mut value = 0i32;
        let mut digits = 0;
        while let Some(d) = self.next_digit() {
            digits += 1;
            value = value * 10 + (d - b'0') as i32;
            if digits > MAX_FIELD_DIGITS {
                while self.next_digit().is_some() {}
                return None;
            }
        }
        if digits == 0 {
            return None;
        }
        Some(if negative { -value } else { value })
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Parses one frame into a [`Command`].
///
/// Trailing `\r`, `\n` and NUL bytes are ignored.
pub fn parse_frame(frame: &str, limits: &FrameLimits) -> Result<Command, FrameError> {
    let frame = frame.trim_end_matches(|c: char| matches!(c, '\r' | '\n' | '\0'));
    let body = frame.strip_prefix(':').ok_or(FrameError::MissingSentinel)?;
    let mut cursor = Cursor::new(body);

    match cursor.next() {
        None => Err(FrameError::Empty),
        Some(b'X') => parse_servo(&mut cursor),
        Some(b'S') => parse_stepper(&mut cursor, limits),
        Some(other) => Err(FrameError::UnknownCommand(other as char)),
    }
}

/// `SRV_ANG` is kept for clamping; an unreadable angle is an `STP_ANG` field error.
fn parse_servo(cursor: &mut Cursor<'_>) -> Result<Command, FrameError> {
    match cursor.number() {
        Some(angle) if cursor.at_end() => Ok(Command::ServoAbsoluteSetpoint { angle }),
        _ => Err(FrameError::Invalid(ErrorFlags::STP_ANG)),
    }
}

fn parse_stepper(cursor: &mut Cursor<'_>, limits: &FrameLimits) -> Result<Command, FrameError> {
    let mut flags = ErrorFlags::empty();
    let mut moves = MoveSet::new();
    let mut first = true;

    // Leading 'S' already consumed
    loop {
        let axis = match cursor.next_digit() {
            Some(d) => limits.axis(d - b'0'),
            None => None,
        };
        if axis.is_none() {
            flags |= ErrorFlags::STP_ID;
        }

        match cursor.next() {
            Some(b'V') if first => {
                let period = cursor.number();
                match period {
                    Some(p) if limits.period_ok(p) && cursor.at_end() => {}
                    _ => flags |= ErrorFlags::STP_VEL,
                }
                return match (axis, period) {
                    (Some(axis), Some(period_ms)) if flags.is_empty() => {
                        Ok(Command::StepperSpeedChange {
                            axis,
                            period_ms: period_ms as u32,
                        })
                    }
                    _ => Err(FrameError::Invalid(flags)),
                };
            }
            Some(b'V') => {
                // Speed changes cannot join a multi-axis move
                return Err(FrameError::Invalid(flags | ErrorFlags::STP_VEL));
            }
            Some(b'D') => {}
            _ => return Err(FrameError::Invalid(flags | ErrorFlags::STP_ANG)),
        }

        let direction = cursor.next_digit().and_then(Direction::from_digit);
        if direction.is_none() {
            flags |= ErrorFlags::STP_DIR;
        }

        if !cursor.eat(b'A') {
            return Err(FrameError::Invalid(flags | ErrorFlags::STP_ANG));
        }
        let angle = match cursor.number() {
            Some(a) if a >= 0 => Some(a as u32),
            _ => {
                flags |= ErrorFlags::STP_ANG;
                None
            }
        };

        if let (Some(axis), Some(direction), Some(angle)) = (axis, direction, angle) {
            let duplicate = moves.iter().any(|m| m.axis == axis);
            let step = AxisMove {
                axis,
                direction,
                steps: angle_to_steps(angle, limits.steps_per_revolution),
            };
            if duplicate || moves.push(step).is_err() {
                flags |= ErrorFlags::STP_ID;
            }
        }

        match cursor.next() {
            None => break,
            Some(b'S') => first = false,
            Some(_) => {
                flags |= ErrorFlags::STP_ANG;
                break;
            }
        }
    }

    if !flags.is_empty() {
        return Err(FrameError::Invalid(flags));
    }
    if moves.len() == 1 {
        let m = moves[0];
        Ok(Command::relative_move(m.axis, m.direction, m.steps))
    } else {
        Ok(Command::StepperGroupMove(moves))
    }
}

// ============================================================================
// Validation of built commands
// ============================================================================

/// Field checks for commands that did not come through [`parse_frame`].
///
/// Returns the flags that would have been raised had the command been
/// written as a frame. Servo angles are not checked here: the servo engine
/// clamps them and raises `SRV_ANG` itself.
pub fn validate(command: &Command, limits: &FrameLimits) -> ErrorFlags {
    let mut flags = ErrorFlags::empty();
    match command {
        Command::StepperRelativeMove { axis, .. } => {
            if limits.axis(axis.0).is_none() {
                flags |= ErrorFlags::STP_ID;
            }
        }
        Command::StepperGroupMove(moves) => {
            for (i, m) in moves.iter().enumerate() {
                let duplicate = moves[..i].iter().any(|other| other.axis == m.axis);
                if duplicate || limits.axis(m.axis.0).is_none() {
                    flags |= ErrorFlags::STP_ID;
                }
            }
        }
        Command::StepperSpeedChange { axis, period_ms } => {
            if limits.axis(axis.0).is_none() {
                flags |= ErrorFlags::STP_ID;
            }
            if !(limits.min_period_ms..=limits.max_period_ms).contains(period_ms) {
                flags |= ErrorFlags::STP_VEL;
            }
        }
        Command::ServoAbsoluteSetpoint { .. } => {}
    }
    flags
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> FrameLimits {
        FrameLimits::new(2)
    }

    fn invalid(frame: &str) -> ErrorFlags {
        match parse_frame(frame, &limits()) {
            Err(FrameError::Invalid(flags)) => flags,
            other => panic!("{frame}: expected field errors, got {other:?}"),
        }
    }

    // =========================================================================
    // Malformed frames
    // =========================================================================

    #[test]
    fn missing_sentinel_is_malformed() {
        let err = parse_frame("XYZ", &limits()).unwrap_err();
        assert_eq!(err, FrameError::MissingSentinel);
        assert!(err.is_malformed());
    }

    #[test]
    fn empty_body_is_malformed() {
        assert_eq!(parse_frame(":", &limits()), Err(FrameError::Empty));
        assert_eq!(parse_frame("", &limits()), Err(FrameError::MissingSentinel));
    }

    #[test]
    fn unknown_letter_is_malformed() {
        assert_eq!(
            parse_frame(":Q12", &limits()),
            Err(FrameError::UnknownCommand('Q'))
        );
        // Case-sensitive
        assert_eq!(
            parse_frame(":s0d1a090", &limits()),
            Err(FrameError::UnknownCommand('s'))
        );
    }

    // =========================================================================
    // Servo frames
    // =========================================================================

    #[test]
    fn servo_angles_parse_including_out_of_range() {
        for (frame, angle) in [(":X0", 0), (":X90", 90), (":X180", 180), (":X999", 999), (":X-45", -45)] {
            assert_eq!(
                parse_frame(frame, &limits()),
                Ok(Command::ServoAbsoluteSetpoint { angle }),
                "{frame}"
            );
        }
    }

    #[test]
    fn unreadable_servo_angle_is_an_angle_field_error() {
        assert_eq!(invalid(":X"), ErrorFlags::STP_ANG);
        assert_eq!(invalid(":X1000"), ErrorFlags::STP_ANG);
        assert_eq!(invalid(":X9a"), ErrorFlags::STP_ANG);
        assert_eq!(invalid(":X-"), ErrorFlags::STP_ANG);
    }

    #[test]
    fn line_terminators_are_ignored() {
        assert_eq!(
            parse_frame(":X45\r\n", &limits()),
            Ok(Command::ServoAbsoluteSetpoint { angle: 45 })
        );
        assert_eq!(
            parse_frame(":X45\0", &limits()),
            Ok(Command::ServoAbsoluteSetpoint { angle: 45 })
        );
    }

    // =========================================================================
    // Stepper moves
    // =========================================================================

    #[test]
    fn relative_move_converts_angle_to_steps() {
        assert_eq!(
            parse_frame(":S0D1A090", &limits()),
            Ok(Command::relative_move(AxisId(0), Direction::Forward, 1024))
        );
        assert_eq!(
            parse_frame(":S1D0A5", &limits()),
            Ok(Command::relative_move(AxisId(1), Direction::Backward, 56))
        );
    }

    #[test]
    fn zero_angle_parses_to_zero_steps() {
        assert_eq!(
            parse_frame(":S0D1A000", &limits()),
            Ok(Command::relative_move(AxisId(0), Direction::Forward, 0))
        );
    }

    #[test]
    fn bad_axis_reports_only_id() {
        assert_eq!(invalid(":S9D1A010"), ErrorFlags::STP_ID);
        assert_eq!(invalid(":S2D1A010"), ErrorFlags::STP_ID);
        assert_eq!(invalid(":SxD1A010"), ErrorFlags::STP_ID | ErrorFlags::STP_ANG);
    }

    #[test]
    fn bad_direction_reports_dir() {
        assert_eq!(invalid(":S0D2A010"), ErrorFlags::STP_DIR);
        assert_eq!(invalid(":S0DA010"), ErrorFlags::STP_DIR);
    }

    #[test]
    fn bad_angle_reports_ang() {
        assert_eq!(invalid(":S0D1A-10"), ErrorFlags::STP_ANG);
        assert_eq!(invalid(":S0D1A"), ErrorFlags::STP_ANG);
        assert_eq!(invalid(":S0D1A1234"), ErrorFlags::STP_ANG);
        assert_eq!(invalid(":S0D1B010"), ErrorFlags::STP_ANG);
        assert_eq!(invalid(":S0X1A010"), ErrorFlags::STP_ANG);
    }

    #[test]
    fn field_errors_accumulate() {
        assert_eq!(
            invalid(":S9D7A-01"),
            ErrorFlags::STP_ID | ErrorFlags::STP_DIR | ErrorFlags::STP_ANG
        );
    }

    // =========================================================================
    // Multi-axis moves
    // =========================================================================

    #[test]
    fn concatenated_segments_form_group_move() {
        let cmd = parse_frame(":S0D1A090S1D0A045", &limits()).unwrap();
        let moves = cmd.moves();
        assert!(matches!(cmd, Command::StepperGroupMove(_)));
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].axis, AxisId(0));
        assert_eq!(moves[0].steps, 1024);
        assert_eq!(moves[1].axis, AxisId(1));
        assert_eq!(moves[1].direction, Direction::Backward);
        assert_eq!(moves[1].steps, 512);
    }

    #[test]
    fn duplicate_axis_in_group_is_id_error() {
        assert_eq!(invalid(":S0D1A090S0D0A045"), ErrorFlags::STP_ID);
    }

    #[test]
    fn error_in_one_segment_rejects_whole_frame() {
        assert_eq!(invalid(":S0D1A090S1D5A045"), ErrorFlags::STP_DIR);
    }

    #[test]
    fn speed_change_cannot_join_group() {
        assert_eq!(invalid(":S0D1A090S1V5"), ErrorFlags::STP_VEL);
    }

    // =========================================================================
    // Speed changes
    // =========================================================================

    #[test]
    fn speed_change_parses() {
        assert_eq!(
            parse_frame(":S1V5", &limits()),
            Ok(Command::StepperSpeedChange {
                axis: AxisId(1),
                period_ms: 5
            })
        );
    }

    #[test]
    fn speed_change_out_of_range() {
        assert_eq!(invalid(":S0V0"), ErrorFlags::STP_VEL);
        assert_eq!(invalid(":S0V51"), ErrorFlags::STP_VEL);
        assert_eq!(invalid(":S0V-3"), ErrorFlags::STP_VEL);
        assert_eq!(invalid(":S0V"), ErrorFlags::STP_VEL);
        assert_eq!(invalid(":S0V5x"), ErrorFlags::STP_VEL);
        assert_eq!(invalid(":S7V5"), ErrorFlags::STP_ID);
    }

    #[test]
    fn speed_range_follows_config() {
        let narrow = FrameLimits::from_config(2, &StepperConfig::default().with_period_range(3, 9));
        assert!(parse_frame(":S0V3", &narrow).is_ok());
        assert_eq!(
            parse_frame(":S0V2", &narrow),
            Err(FrameError::Invalid(ErrorFlags::STP_VEL))
        );
    }

    // =========================================================================
    // validate()
    // =========================================================================

    #[test]
    fn validate_built_commands() {
        let limits = limits();
        assert!(validate(&Command::relative_move(AxisId(1), Direction::Forward, 10), &limits).is_empty());
        assert_eq!(
            validate(&Command::relative_move(AxisId(4), Direction::Forward, 10), &limits),
            ErrorFlags::STP_ID
        );
        assert_eq!(
            validate(
                &Command::StepperSpeedChange {
                    axis: AxisId(0),
                    period_ms: 0
                },
                &limits
            ),
            ErrorFlags::STP_VEL
        );
        assert!(validate(&Command::ServoAbsoluteSetpoint { angle: -500 }, &limits).is_empty());
    }
}
