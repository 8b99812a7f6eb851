//! Calibration services used during reconstruction.
//!
//! The replay only needs a handful of answers from a calibration: pedestals by sensor name,
//! a wirechamber position estimate, and the energy conversions. [`Calibrator`] is that
//! surface. [`LinearCalibration`] is a time independent implementation read from YAML, with
//! unit gains and zero pedestals when no file is given.
use std::path::Path;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::classifier::EventType;
use super::constants::{N_BETA_TUBES, N_MWPC_WIRES, N_SIDES};
use super::error::CalibrationError;
use super::side::Side;

/// Default cathode wire pitch in mm
const DEFAULT_WIRE_SPACING: f64 = 4.064;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WirePlane {
    X = 0,
    Y = 1,
}

impl WirePlane {
    pub const ALL: [WirePlane; 2] = [WirePlane::X, WirePlane::Y];

    pub fn letter(&self) -> char {
        match self {
            WirePlane::X => 'x',
            WirePlane::Y => 'y',
        }
    }
}

/// Position estimate from one cathode plane
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WireHit {
    pub center: f64,
    pub cathode_sum: f64,
    pub max_value: f64,
}

pub fn pmt_sensor_name(side: Side, tube: usize) -> String {
    format!("ADC{}{}Beta", side.letter(), tube + 1)
}

pub fn anode_sensor_name(side: Side) -> String {
    format!("MWPC{}Anode", side.letter())
}

pub fn cathode_sensor_name(side: Side, plane: WirePlane, wire: usize) -> String {
    format!("MWPC{}{}{}", side.letter(), plane.letter(), wire + 1)
}

/// Pedestal-subtracted centroid of the hottest wire and its neighbours
pub fn centroid_position(positions: &[f64], cathodes: &[f32], pedestals: &[f64]) -> WireHit {
    let signal: Vec<f64> = positions
        .iter()
        .enumerate()
        .map(|(i, _)| cathodes[i] as f64 - pedestals[i])
        .collect();
    let cathode_sum: f64 = signal.iter().sum();
    let Some((hottest, max_value)) = signal
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
    else {
        return WireHit::default();
    };

    let lo = hottest.saturating_sub(1);
    let hi = (hottest + 1).min(signal.len() - 1);
    let (weighted, weight) = (lo..=hi)
        .filter(|i| signal[*i] > 0.0)
        .fold((0.0, 0.0), |(wx, w), i| {
            (wx + positions[i] * signal[i], w + signal[i])
        });
    let center = if weight > 0.0 { weighted / weight } else { 0.0 };

    WireHit {
        center,
        cathode_sum,
        max_value,
    }
}

pub trait Calibrator {
    /// Pedestal of a named sensor at run time `time`
    fn pedestal(&self, sensor: &str, time: f64) -> f64;

    /// Positions of the cathode wires of one plane
    fn wire_positions(&self, side: Side, plane: WirePlane) -> &[f64];

    /// Relative light collection of a PMT for a hit at (x, y)
    fn light_collection(&self, _side: Side, _tube: usize, _x: f64, _y: f64) -> f64 {
        1.0
    }

    /// Visible scintillator energy from pedestal-subtracted PMT ADCs
    fn visible_energy(
        &self,
        side: Side,
        x: f64,
        y: f64,
        adc: &[f64; N_BETA_TUBES],
        time: f64,
    ) -> f64;

    fn anode_energy(&self, side: Side, anode: f64, x: f64, y: f64, time: f64) -> f64;

    /// Reconstructed initial energy for a classified event
    fn true_energy(&self, side: Side, event_type: EventType, e_east: f64, e_west: f64) -> f64;

    fn wire_hit(
        &self,
        side: Side,
        plane: WirePlane,
        cathodes: &[f32; N_MWPC_WIRES],
        time: f64,
    ) -> WireHit {
        let positions = self.wire_positions(side, plane);
        let pedestals: Vec<f64> = (0..positions.len())
            .map(|wire| self.pedestal(&cathode_sensor_name(side, plane, wire), time))
            .collect();
        centroid_position(positions, cathodes, &pedestals)
    }
}

fn default_wire_positions() -> Vec<f64> {
    let half = 0.5 * (N_MWPC_WIRES as f64 - 1.0);
    (0..N_MWPC_WIRES)
        .map(|i| (i as f64 - half) * DEFAULT_WIRE_SPACING)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearCalibration {
    pub pedestals: FxHashMap<String, f64>,
    pub pmt_gains: [[f64; N_BETA_TUBES]; N_SIDES],
    pub anode_gains: [f64; N_SIDES],
    pub wire_positions: [[Vec<f64>; 2]; N_SIDES],
}

impl Default for LinearCalibration {
    fn default() -> Self {
        Self {
            pedestals: FxHashMap::default(),
            pmt_gains: [[1.0; N_BETA_TUBES]; N_SIDES],
            anode_gains: [1.0; N_SIDES],
            wire_positions: [
                [default_wire_positions(), default_wire_positions()],
                [default_wire_positions(), default_wire_positions()],
            ],
        }
    }
}

impl LinearCalibration {
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        if !path.exists() {
            return Err(CalibrationError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        let calibration = serde_yaml::from_str::<Self>(&yaml_str)?;
        for side in Side::DETECTORS {
            for plane in WirePlane::ALL {
                let n_wires = calibration.wire_positions[side.index()][plane as usize].len();
                if n_wires > N_MWPC_WIRES {
                    return Err(CalibrationError::TooManyWires(
                        n_wires,
                        side.letter(),
                        plane as usize,
                    ));
                }
            }
        }
        log::info!(
            "Loaded calibration from {path:?} with {} pedestals",
            calibration.pedestals.len()
        );
        Ok(calibration)
    }

    /// Load from an optional path, falling back to the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CalibrationError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                log::info!("No calibration file given, using unit gains and zero pedestals");
                Ok(Self::default())
            }
        }
    }
}

impl Calibrator for LinearCalibration {
    fn pedestal(&self, sensor: &str, _time: f64) -> f64 {
        self.pedestals.get(sensor).copied().unwrap_or(0.0)
    }

    fn wire_positions(&self, side: Side, plane: WirePlane) -> &[f64] {
        match side {
            Side::East | Side::West => &self.wire_positions[side.index()][plane as usize],
            _ => &[],
        }
    }

    fn visible_energy(
        &self,
        side: Side,
        x: f64,
        y: f64,
        adc: &[f64; N_BETA_TUBES],
        _time: f64,
    ) -> f64 {
        if !matches!(side, Side::East | Side::West) {
            return 0.0;
        }
        let gains = &self.pmt_gains[side.index()];
        let total: f64 = (0..N_BETA_TUBES)
            .map(|t| gains[t] * adc[t] / self.light_collection(side, t, x, y))
            .sum();
        total / N_BETA_TUBES as f64
    }

    fn anode_energy(&self, side: Side, anode: f64, _x: f64, _y: f64, _time: f64) -> f64 {
        match side {
            Side::East | Side::West => self.anode_gains[side.index()] * anode,
            _ => 0.0,
        }
    }

    fn true_energy(&self, side: Side, event_type: EventType, e_east: f64, e_west: f64) -> f64 {
        match (event_type, side) {
            (EventType::TypeI, _) => e_east + e_west,
            (_, Side::East) => e_east,
            (_, Side::West) => e_west,
            _ => e_east + e_west,
        }
    }
}
