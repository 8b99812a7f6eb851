use serde::{Deserialize, Serialize};

/// An inclusive `[start, end]` window used for every threshold style cut
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeCut {
    pub start: f64,
    pub end: f64,
}

impl RangeCut {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Check if value is in range
    pub fn in_range(&self, x: f64) -> bool {
        self.start <= x && x <= self.end
    }
}

/// A measured value paired with the cut it is tested against
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CutVariable {
    pub val: f64,
    pub range: RangeCut,
}

impl CutVariable {
    pub fn new(val: f64, range: RangeCut) -> Self {
        Self { val, range }
    }

    pub fn in_range(&self) -> bool {
        self.range.in_range(self.val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        let cut = RangeCut::new(1.0, 2.0);
        assert!(cut.in_range(1.0));
        assert!(cut.in_range(2.0));
        assert!(!cut.in_range(2.0001));
        assert!(!CutVariable::new(0.5, cut).in_range());
    }
}
