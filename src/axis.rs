//! Stage axes and their fixed mechanical constants.
//!
//! An [`AxisTable`] is built once at startup (from defaults or configuration),
//! validated, and then only ever read. The session holds it by value and never
//! hands out mutable access.

use crate::error::{AppResult, PositionerError};
use crate::units;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three linear stage axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Horizontal axis.
    X,
    /// Depth axis.
    Y,
    /// Vertical axis.
    Z,
}

impl Axis {
    /// All axes in the order the position is read.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Wire label used in commands.
    pub fn label(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }

    /// Parse a single label, case-insensitively.
    pub fn from_label(label: char) -> AppResult<Self> {
        match label.to_ascii_lowercase() {
            'x' => Ok(Axis::X),
            'y' => Ok(Axis::Y),
            'z' => Ok(Axis::Z),
            other => Err(PositionerError::InvalidAxis(other.to_string())),
        }
    }

    /// Parse every character of `labels` into axes, failing on the first bad one.
    pub fn parse_labels(labels: &str) -> AppResult<Vec<Axis>> {
        labels.chars().map(Axis::from_label).collect()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Axis {
    type Err = PositionerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_label(c),
            _ => Err(PositionerError::InvalidAxis(s.to_string())),
        }
    }
}

/// Direction convention between controller steps and stage millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum AxisSign {
    /// Positive steps move toward positive millimetres.
    Normal,
    /// Mechanically reversed axis.
    Inverted,
}

impl AxisSign {
    /// `+1` or `-1`.
    pub fn factor(self) -> i64 {
        match self {
            AxisSign::Normal => 1,
            AxisSign::Inverted => -1,
        }
    }
}

impl TryFrom<i8> for AxisSign {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AxisSign::Normal),
            -1 => Ok(AxisSign::Inverted),
            other => Err(format!("axis sign must be 1 or -1, got {}", other)),
        }
    }
}

impl From<AxisSign> for i8 {
    fn from(sign: AxisSign) -> Self {
        sign.factor() as i8
    }
}

/// Mechanical constants and safe travel of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Motor step angle in degrees per step.
    pub step_angle_deg: f64,
    /// Lead screw travel per revolution in millimetres.
    pub lead_mm_per_turn: f64,
    /// Direction convention.
    pub sign: AxisSign,
    /// Lower travel bound in millimetres (inclusive).
    pub min_mm: f64,
    /// Upper travel bound in millimetres (inclusive).
    pub max_mm: f64,
}

impl AxisConfig {
    /// Millimetres travelled per motor step.
    pub fn mm_per_step(&self) -> f64 {
        units::mm_per_step(self.step_angle_deg, self.lead_mm_per_turn)
    }

    /// Step count for a physical position on this axis.
    pub fn to_steps(&self, mm: f64) -> i64 {
        units::to_steps(mm, self.mm_per_step(), self.sign)
    }

    /// Physical position for a step count on this axis.
    pub fn to_mm(&self, steps: i64) -> f64 {
        units::to_mm(steps, self.mm_per_step(), self.sign)
    }

    /// Whether `mm` lies inside the inclusive travel bounds. NaN never does.
    pub fn contains(&self, mm: f64) -> bool {
        mm >= self.min_mm && mm <= self.max_mm
    }

    fn validate(&self, axis: Axis) -> AppResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.step_angle_deg) {
            return Err(PositionerError::Configuration(format!(
                "axis {}: step_angle_deg must be positive and finite",
                axis
            )));
        }
        if !positive(self.lead_mm_per_turn) {
            return Err(PositionerError::Configuration(format!(
                "axis {}: lead_mm_per_turn must be positive and finite",
                axis
            )));
        }
        if !self.min_mm.is_finite() || !self.max_mm.is_finite() || self.min_mm > self.max_mm {
            return Err(PositionerError::Configuration(format!(
                "axis {}: bounds [{}, {}] must be finite with min_mm <= max_mm",
                axis, self.min_mm, self.max_mm
            )));
        }
        Ok(())
    }
}

/// Safety margin kept below the Z end stop.
pub const Z_SAFETY_MARGIN_MM: f64 = 5.0;

/// Full Z travel before the safety margin.
pub const Z_TRAVEL_MM: f64 = 555.0;

/// Constants for all three axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisTable {
    /// X axis.
    pub x: AxisConfig,
    /// Y axis.
    pub y: AxisConfig,
    /// Z axis.
    pub z: AxisConfig,
}

impl Default for AxisTable {
    fn default() -> Self {
        Self {
            x: AxisConfig {
                step_angle_deg: 0.9,
                lead_mm_per_turn: 2.0,
                sign: AxisSign::Inverted,
                min_mm: -255.0,
                max_mm: 255.0,
            },
            y: AxisConfig {
                step_angle_deg: 0.9,
                lead_mm_per_turn: 2.0,
                sign: AxisSign::Inverted,
                min_mm: -60.0,
                max_mm: 60.0,
            },
            z: AxisConfig {
                step_angle_deg: 1.8,
                lead_mm_per_turn: 2.0,
                sign: AxisSign::Normal,
                min_mm: 0.0,
                max_mm: Z_TRAVEL_MM - Z_SAFETY_MARGIN_MM,
            },
        }
    }
}

impl AxisTable {
    /// Constants for `axis`.
    pub fn get(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// Check every axis for usable constants and ordered bounds.
    pub fn validate(&self) -> AppResult<()> {
        for axis in Axis::ALL {
            self.get(axis).validate(axis)?;
        }
        Ok(())
    }
}

/// Stage coordinates in millimetres, freshly read from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Coordinate along `axis`.
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={:.3} mm, y={:.3} mm, z={:.3} mm", self.x, self.y, self.z)
    }
}
