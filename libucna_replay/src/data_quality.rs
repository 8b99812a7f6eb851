use serde::{Deserialize, Serialize};

use super::constants::EXPECTED_BKHF;
use super::raw_event::RawEvent;

/// Per-event DAQ header/footer consistency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderQuality {
    /// Every module's event counter agrees with the trigger number
    pub evnb_good: bool,
    /// Every module's footer word is intact
    pub bkhf_good: bool,
}

impl HeaderQuality {
    pub fn check(event: &RawEvent) -> Self {
        let evnb_good = event
            .evnb
            .iter()
            .all(|evnb| (evnb - event.trigger_number) as i32 == 0);
        let bkhf_good = event.bkhf.iter().all(|bkhf| *bkhf as i32 == EXPECTED_BKHF as i32);
        Self {
            evnb_good,
            bkhf_good,
        }
    }

    pub fn is_good(&self) -> bool {
        self.evnb_good && self.bkhf_good
    }
}

/// Running count of non-fatal data integrity faults, reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityTally {
    pub failed_evnb: u64,
    pub failed_bkhf: u64,
    /// Scaler jumps which could not be explained by a single counter wrap
    pub overflow_anomalies: u64,
}

impl DataQualityTally {
    pub fn record(&mut self, quality: &HeaderQuality) {
        self.failed_evnb += u64::from(!quality.evnb_good);
        self.failed_bkhf += u64::from(!quality.bkhf_good);
    }

    /// Total number of integrity faults of any kind
    pub fn total(&self) -> u64 {
        self.failed_evnb + self.failed_bkhf + self.overflow_anomalies
    }
}
