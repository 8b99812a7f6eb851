use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Detector side. The spectrometer has an East and a West detector package; `Both` and `None`
/// label events (and time slots) which are not attributed to a single side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    East,
    West,
    Both,
    None,
}

impl Side {
    /// The two physical detector sides, in processing order
    pub const DETECTORS: [Side; 2] = [Side::East, Side::West];

    /// The side opposite to this one. Both and None are each other's opposites.
    pub fn other(&self) -> Side {
        match self {
            Side::East => Side::West,
            Side::West => Side::East,
            Side::Both => Side::None,
            Side::None => Side::Both,
        }
    }

    /// Single letter used in cut and sensor names
    pub fn letter(&self) -> char {
        match self {
            Side::East => 'E',
            Side::West => 'W',
            Side::Both => 'B',
            Side::None => 'N',
        }
    }

    /// Index into per-detector arrays. Only meaningful for East and West.
    pub fn index(&self) -> usize {
        match self {
            Side::East => 0,
            Side::West => 1,
            Side::Both => 2,
            Side::None => 3,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Side::East => "East",
            Side::West => "West",
            Side::Both => "Both",
            Side::None => "None",
        };
        write!(f, "{word}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_side_is_involution() {
        for s in [Side::East, Side::West, Side::Both, Side::None] {
            assert_eq!(s.other().other(), s);
        }
        assert_eq!(Side::East.other(), Side::West);
    }
}
