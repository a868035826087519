//! Machine model: axes, jog directions and the G-code they produce.
//!
//! The foam cutter has two towers, each with a horizontal and a vertical
//! axis: X/Y on the left tower, A/Z on the right one.

use crate::error::ShellError;
use std::fmt;
use std::str::FromStr;

/// Relative positioning mode
pub const RELATIVE_MODE: &str = "G91";

/// Absolute positioning mode
pub const ABSOLUTE_MODE: &str = "G90";

/// Rapid move
pub const RAPID_MOVE: &str = "G0";

/// A machine axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal axis, left tower
    X,
    /// Vertical axis, left tower
    Y,
    /// Vertical axis, right tower
    Z,
    /// Horizontal axis, right tower
    A,
}

impl Axis {
    /// All axes in jog panel order
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::A];

    /// The G-code word letter for this axis
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::A => 'A',
        }
    }

    /// Parse an axis from its letter, case-insensitively
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'A' => Some(Axis::A),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_letter(c).ok_or_else(|| format!("Unknown axis: {}", s)),
            _ => Err(format!("Unknown axis: {}", s)),
        }
    }
}

/// Direction of a jog move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JogDirection {
    /// Towards increasing coordinates
    Positive,
    /// Towards decreasing coordinates
    Negative,
}

impl JogDirection {
    /// Build a direction from a "negative" flag
    pub fn from_negative(negative: bool) -> Self {
        if negative {
            JogDirection::Negative
        } else {
            JogDirection::Positive
        }
    }

    /// Whether the direction flips the sign of the step
    pub fn is_negative(self) -> bool {
        self == JogDirection::Negative
    }
}

impl fmt::Display for JogDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JogDirection::Positive => write!(f, "+"),
            JogDirection::Negative => write!(f, "-"),
        }
    }
}

/// Check that a jog step is usable
pub fn validate_step(step_mm: f64) -> Result<f64, ShellError> {
    if step_mm.is_finite() && step_mm > 0.0 {
        Ok(step_mm)
    } else {
        Err(ShellError::InvalidStepSize { value: step_mm })
    }
}

/// Build the two lines that make up a jog: relative mode, then the move.
///
/// The step is written with the shortest representation that round-trips,
/// so `5.0` becomes `5` and `2.5` stays `2.5`.
pub fn jog_commands(
    axis: Axis,
    direction: JogDirection,
    step_mm: f64,
) -> Result<[String; 2], ShellError> {
    let step = validate_step(step_mm)?;
    let sign = if direction.is_negative() { "-" } else { "" };
    Ok([
        RELATIVE_MODE.to_string(),
        format!("{} {}{}{}", RAPID_MOVE, axis, sign, step),
    ])
}
