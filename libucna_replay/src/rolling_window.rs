use std::collections::VecDeque;

/// Sliding window over the arrival times of a tagged event stream.
///
/// The window holds at most `n_max` of the most recent tagged times, and never anything older
/// than `l_max` behind the latest time it has been moved to. A monitor firing at its nominal
/// rate therefore keeps the window full; `count() < n_max` signals a degraded rate.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    n_max: usize,
    l_max: f64,
    counts: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(n_max: usize, l_max: f64) -> Self {
        Self {
            n_max,
            l_max,
            counts: VecDeque::with_capacity(n_max + 1),
        }
    }

    /// Register a tagged event at time `t`
    pub fn add_count(&mut self, t: f64) {
        self.move_time_limit(t);
        self.counts.push_back(t);
        while self.counts.len() > self.n_max {
            self.counts.pop_front();
        }
    }

    /// Advance the trailing edge of the window to `t` without adding a count
    pub fn move_time_limit(&mut self, t: f64) {
        while let Some(front) = self.counts.front() {
            if t - front > self.l_max {
                self.counts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of tagged events currently inside the window
    pub fn count(&self) -> usize {
        self.counts.len()
    }

    /// Target number of events in a full window
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    /// Time width of the window
    pub fn l_max(&self) -> f64 {
        self.l_max
    }

    pub fn is_full(&self) -> bool {
        self.counts.len() == self.n_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_caps_at_n_max() {
        let mut window = RollingWindow::new(3, 10.0);
        for t in [0.0, 1.0, 2.0, 3.0, 4.0] {
            window.add_count(t);
        }
        assert_eq!(window.count(), 3);
        assert!(window.is_full());
    }

    #[test]
    fn test_old_counts_expire() {
        let mut window = RollingWindow::new(5, 5.0);
        for t in [0.0, 1.0, 2.0, 3.0, 4.0] {
            window.add_count(t);
        }
        assert!(window.is_full());
        window.move_time_limit(6.5);
        // 0.0 and 1.0 are now more than 5 s behind
        assert_eq!(window.count(), 3);
        window.move_time_limit(100.0);
        assert_eq!(window.count(), 0);
    }

    #[test]
    fn test_add_count_trims_before_inserting() {
        let mut window = RollingWindow::new(5, 1.0);
        window.add_count(0.0);
        window.add_count(0.5);
        window.add_count(3.0);
        assert_eq!(window.count(), 1);
    }
}
