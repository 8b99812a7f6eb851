use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Sub, SubAssign};

use super::side::Side;

/// A time value kept separately for each blinded clock.
///
/// The East and West slots run on blinded clocks, the Both slot holds the unblinded run time
/// and the None slot is carried along for completeness. All arithmetic is slot-wise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlindedTime {
    pub east: f64,
    pub west: f64,
    pub both: f64,
    pub none: f64,
}

impl BlindedTime {
    /// The same value in every slot
    pub fn uniform(t: f64) -> Self {
        Self {
            east: t,
            west: t,
            both: t,
            none: t,
        }
    }

    pub fn new(east: f64, west: f64, both: f64, none: f64) -> Self {
        Self {
            east,
            west,
            both,
            none,
        }
    }

    /// Midpoint between two time estimates
    pub fn midpoint(a: &BlindedTime, b: &BlindedTime) -> Self {
        0.5 * (*a + *b)
    }

    fn map2(self, rhs: Self, op: impl Fn(f64, f64) -> f64) -> Self {
        Self {
            east: op(self.east, rhs.east),
            west: op(self.west, rhs.west),
            both: op(self.both, rhs.both),
            none: op(self.none, rhs.none),
        }
    }
}

impl Index<Side> for BlindedTime {
    type Output = f64;
    fn index(&self, side: Side) -> &Self::Output {
        match side {
            Side::East => &self.east,
            Side::West => &self.west,
            Side::Both => &self.both,
            Side::None => &self.none,
        }
    }
}

impl IndexMut<Side> for BlindedTime {
    fn index_mut(&mut self, side: Side) -> &mut Self::Output {
        match side {
            Side::East => &mut self.east,
            Side::West => &mut self.west,
            Side::Both => &mut self.both,
            Side::None => &mut self.none,
        }
    }
}

impl Add for BlindedTime {
    type Output = BlindedTime;
    fn add(self, rhs: Self) -> Self::Output {
        self.map2(rhs, |a, b| a + b)
    }
}

impl Sub for BlindedTime {
    type Output = BlindedTime;
    fn sub(self, rhs: Self) -> Self::Output {
        self.map2(rhs, |a, b| a - b)
    }
}

impl AddAssign for BlindedTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for BlindedTime {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<BlindedTime> for f64 {
    type Output = BlindedTime;
    fn mul(self, rhs: BlindedTime) -> Self::Output {
        BlindedTime {
            east: self * rhs.east,
            west: self * rhs.west,
            both: self * rhs.both,
            none: self * rhs.none,
        }
    }
}

impl std::iter::Sum for BlindedTime {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(BlindedTime::default(), |acc, t| acc + t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slotwise_arithmetic() {
        let a = BlindedTime::new(1.0, 2.0, 3.0, 4.0);
        let b = BlindedTime::uniform(1.0);
        assert_eq!(a + b, BlindedTime::new(2.0, 3.0, 4.0, 5.0));
        assert_eq!(a - b, BlindedTime::new(0.0, 1.0, 2.0, 3.0));
        assert_eq!(BlindedTime::midpoint(&a, &b), BlindedTime::new(1.0, 1.5, 2.0, 2.5));
        assert_eq!(a[Side::Both], 3.0);
    }
}
