use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Joint index -> servo angle.
///
/// Used both as an Action payload and as the state snapshot a robot reports.
/// Ordered so that serialisation and equality checks are deterministic.
pub type ServoState = BTreeMap<usize, u32>;

/// Comparison applied by a Conditional predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    AtLeast, // >=
    AtMost,  // <=
}

impl Comparator {
    pub fn apply(self, value: u32, threshold: u32) -> bool {
        match self {
            Comparator::AtLeast => value >= threshold,
            Comparator::AtMost => value <= threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::AtLeast => ">=",
            Comparator::AtMost => "<=",
        }
    }
}

/// Derived orientation estimate reported by a robot: pitch, yaw, height
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gyro {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Gyro {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Combined absolute tilt, the stability term of the fitness score
    pub fn tilt(&self) -> i64 {
        (self.x as i64).abs() + (self.y as i64).abs()
    }
}

impl From<(i32, i32, i32)> for Gyro {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Gyro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Render a joint map as `joint:angle` pairs joined by `;`
pub fn serialize_servo_state(state: &ServoState) -> String {
    state
        .iter()
        .map(|(joint, angle)| format!("{}:{}", joint, angle))
        .collect::<Vec<_>>()
        .join(";")
}
