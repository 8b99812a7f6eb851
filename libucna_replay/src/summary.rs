//! End-of-run summary written next to the replay output.
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::classifier::{ClassificationResult, EventType, Pid};
use super::error::SummaryError;
use super::live_time::LiveTimeSummary;
use super::side::Side;
use super::trigger_fit::ChannelFit;

/// Classified event counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventCounts {
    pub by_pid: BTreeMap<Pid, u64>,
    pub by_type: BTreeMap<EventType, u64>,
    pub by_side: BTreeMap<Side, u64>,
}

impl EventCounts {
    pub fn record(&mut self, result: &ClassificationResult) {
        *self.by_pid.entry(result.pid).or_default() += 1;
        *self.by_type.entry(result.event_type).or_default() += 1;
        *self.by_side.entry(result.side).or_default() += 1;
    }

    pub fn pid(&self, pid: Pid) -> u64 {
        self.by_pid.get(&pid).copied().unwrap_or(0)
    }

    pub fn event_type(&self, event_type: EventType) -> u64 {
        self.by_type.get(&event_type).copied().unwrap_or(0)
    }

    pub fn side(&self, side: Side) -> u64 {
        self.by_side.get(&side).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.by_pid.values().sum()
    }
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Rate overview of a run, used as a sanity check while data is being taken
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickSummary {
    pub gv_monitor_counts: u64,
    pub gv_monitor_rate: f64,
    pub gv_monitor_rate_error: f64,
    /// Beta triggers of Type 0, I and II, East then West
    pub beta_counts: [u64; 2],
    pub beta_rates: [f64; 2],
    pub beta_per_gv: f64,
    /// (E-W)/(E+W) of the beta counts, percent
    pub bonehead_asymmetry: f64,
}

impl QuickSummary {
    pub fn new(gv_monitor_counts: u64, beta_counts: [u64; 2], wall_time: f64) -> Self {
        let gv = gv_monitor_counts as f64;
        let [east, west] = beta_counts.map(|c| c as f64);
        Self {
            gv_monitor_counts,
            gv_monitor_rate: ratio_or_zero(gv, wall_time),
            gv_monitor_rate_error: ratio_or_zero(gv.sqrt(), wall_time),
            beta_counts,
            beta_rates: [ratio_or_zero(east, wall_time), ratio_or_zero(west, wall_time)],
            beta_per_gv: ratio_or_zero(east + west, gv),
            bonehead_asymmetry: 100.0 * ratio_or_zero(east - west, east + west),
        }
    }

    pub fn log(&self, run_number: i32) {
        log::info!("------------------ Quick Summary ({run_number}) ------------------");
        log::info!(
            "GV Mon: {} = {:.2} +/- {:.2} Hz",
            self.gv_monitor_counts,
            self.gv_monitor_rate,
            self.gv_monitor_rate_error
        );
        for side in Side::DETECTORS {
            log::info!(
                "{side} Beta Triggers: {} = {:.2} Hz",
                self.beta_counts[side.index()],
                self.beta_rates[side.index()]
            );
        }
        log::info!("Beta/GV = {:.2}", self.beta_per_gv);
        log::info!("Bonehead (E-W)/(E+W) = {:.2}%", self.bonehead_asymmetry);
    }
}

/// Format absolute time (unix seconds) as RFC 3339
pub fn format_abs_time(seconds: f64) -> Option<String> {
    if !seconds.is_finite() {
        return None;
    }
    OffsetDateTime::from_unix_timestamp(seconds.floor() as i64)
        .ok()?
        .format(&Rfc3339)
        .ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_number: i32,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub live_time: LiveTimeSummary,
    pub counts: EventCounts,
    pub quick: QuickSummary,
    pub trigger_efficiency: Vec<ChannelFit>,
}

impl RunSummary {
    pub fn write(&self, path: &Path) -> Result<(), SummaryError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, SummaryError> {
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}
