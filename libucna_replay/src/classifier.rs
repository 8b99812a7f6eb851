//! Particle identification and event topology.
//!
//! Classification is a pure function of the per-event [`ClassifierInputs`]. The only state an
//! [`EventClassifier`] holds is the self-trigger TDC windows of the run, which it needs to
//! break the tie when both scintillators' TDC cuts pass.
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::constants::{
    N_BETA_TUBES, PMT_FIRED_TDC_THRESHOLD, PULSER_ADC_HIGH_THRESHOLD, PULSER_ADC_THRESHOLD,
};
use super::cut_table::RunCuts;
use super::range_cut::RangeCut;
use super::raw_event::TriggerFlags;
use super::side::Side;

/// Particle identification class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pid {
    Led,
    Pulser,
    Muon,
    Beta,
    Single,
}

impl Pid {
    pub const ALL: [Pid; 5] = [Pid::Led, Pid::Pulser, Pid::Muon, Pid::Beta, Pid::Single];
}

impl Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Pid::Led => "LED",
            Pid::Pulser => "Pulser",
            Pid::Muon => "Muon",
            Pid::Beta => "Beta",
            Pid::Single => "Single",
        };
        write!(f, "{word}")
    }
}

/// Backscatter topology of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    Type0,
    TypeI,
    TypeII,
    TypeIII,
    TypeIV,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::Type0,
        EventType::TypeI,
        EventType::TypeII,
        EventType::TypeIII,
        EventType::TypeIV,
    ];
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            EventType::Type0 => "Type0",
            EventType::TypeI => "TypeI",
            EventType::TypeII => "TypeII",
            EventType::TypeIII => "TypeIII",
            EventType::TypeIV => "TypeIV",
        };
        write!(f, "{word}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub pid: Pid,
    pub event_type: EventType,
    pub side: Side,
}

/// Everything the classifier looks at for one detector side
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SideInputs {
    /// Wirechamber (cathode max) cut
    pub passed_mwpc: bool,
    /// Scintillator 2-of-4 TDC cut
    pub passed_scint_tdc: bool,
    /// Raw 2-of-4 self trigger TDC value
    pub selftrig_tdc: f64,
    pub tagged_back: bool,
    pub tagged_drift: bool,
    pub tagged_top: bool,
    /// Pedestal subtracted PMT ADCs
    pub pmt_adc: [f64; N_BETA_TUBES],
}

impl SideInputs {
    /// Wirechamber and scintillator both passed
    pub fn is_2fold(&self) -> bool {
        self.passed_mwpc && self.passed_scint_tdc
    }

    /// The hardware 2-of-4 trigger fired
    pub fn trig_2of4(&self) -> bool {
        self.selftrig_tdc > PMT_FIRED_TDC_THRESHOLD
    }

    pub fn tagged_muon(&self) -> bool {
        self.tagged_back || self.tagged_drift || self.tagged_top
    }

    /// A lone PMT far above threshold, the signature of the Bi pulser
    fn lone_high_pmt(&self) -> bool {
        let n_thresh = self
            .pmt_adc
            .iter()
            .filter(|adc| **adc > PULSER_ADC_THRESHOLD)
            .count();
        let n_high = self
            .pmt_adc
            .iter()
            .filter(|adc| **adc > PULSER_ADC_HIGH_THRESHOLD)
            .count();
        n_thresh == 1 && n_high == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassifierInputs {
    pub east: SideInputs,
    pub west: SideInputs,
    pub flags: TriggerFlags,
}

impl ClassifierInputs {
    pub fn side(&self, side: Side) -> &SideInputs {
        match side {
            Side::West => &self.west,
            _ => &self.east,
        }
    }
}

/// Which sides satisfy some per-side condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SidePattern {
    Neither,
    Only(Side),
    Both,
}

impl SidePattern {
    fn of(inputs: &ClassifierInputs, condition: impl Fn(&SideInputs) -> bool) -> Self {
        match (condition(&inputs.east), condition(&inputs.west)) {
            (true, true) => SidePattern::Both,
            (true, false) => SidePattern::Only(Side::East),
            (false, true) => SidePattern::Only(Side::West),
            (false, false) => SidePattern::Neither,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventClassifier {
    scint_selftrig: [RangeCut; 2],
}

impl EventClassifier {
    pub fn new(cuts: &RunCuts) -> Self {
        Self {
            scint_selftrig: [
                cuts.side(Side::East).scint_selftrig,
                cuts.side(Side::West).scint_selftrig,
            ],
        }
    }

    pub fn classify(&self, inputs: &ClassifierInputs) -> ClassificationResult {
        ClassificationResult {
            pid: self.pid(inputs),
            event_type: self.event_type(inputs),
            side: self.side(inputs),
        }
    }

    /// Bi pulser trigger: pulser flag without a 2-of-4 trigger on either side, or a lone high
    /// PMT on either side
    pub fn is_pulser(&self, inputs: &ClassifierInputs) -> bool {
        let flagged = inputs.flags.is_pulser()
            && !(inputs.east.trig_2of4() || inputs.west.trig_2of4());
        flagged || inputs.east.lone_high_pmt() || inputs.west.lone_high_pmt()
    }

    fn pid(&self, inputs: &ClassifierInputs) -> Pid {
        let coincidence = SidePattern::of(inputs, SideInputs::is_2fold);
        let muon = inputs.east.tagged_muon() || inputs.west.tagged_muon();
        match coincidence {
            _ if inputs.flags.is_led() => Pid::Led,
            _ if self.is_pulser(inputs) => Pid::Pulser,
            SidePattern::Neither => Pid::Single,
            _ if muon => Pid::Muon,
            _ => Pid::Beta,
        }
    }

    fn event_type(&self, inputs: &ClassifierInputs) -> EventType {
        match SidePattern::of(inputs, SideInputs::is_2fold) {
            SidePattern::Both => EventType::TypeI,
            SidePattern::Only(side) if !inputs.side(side.other()).passed_scint_tdc => {
                if inputs.side(side.other()).passed_mwpc {
                    EventType::TypeII
                } else {
                    EventType::Type0
                }
            }
            _ => EventType::TypeIV,
        }
    }

    fn side(&self, inputs: &ClassifierInputs) -> Side {
        match SidePattern::of(inputs, |s| s.passed_scint_tdc) {
            SidePattern::Only(side) => side,
            // Only the West self-trigger window decides; the East window is not consulted.
            SidePattern::Both => {
                if inputs.west.selftrig_tdc < self.scint_selftrig[Side::West.index()].start {
                    Side::East
                } else {
                    Side::West
                }
            }
            SidePattern::Neither => Side::None,
        }
    }
}
