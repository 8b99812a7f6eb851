//! Live time accounting.
//!
//! Every event passes through [`LiveTimeTracker::step`] in acquisition order. The tracker
//! corrects wraps of the 32 bit time scaler, keeps the rate monitor window current and
//! records "blips": intervals during which the global acceptance predicate failed. Blip
//! boundaries sit halfway between the events on either side of the transition, so that at the
//! end of a run the wall time splits exactly into live time plus the summed blip lengths.
use serde::{Deserialize, Serialize};

use super::blind_time::BlindedTime;
use super::constants::{MICROSECONDS_TO_SECONDS, SCALER_OVERFLOW_MARGIN, SCALER_WRAP_PERIOD};
use super::data_quality::{DataQualityTally, HeaderQuality};
use super::rolling_window::RollingWindow;

/// An excluded interval `[start, end)` of run time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Blip {
    pub start: BlindedTime,
    pub end: BlindedTime,
}

impl Blip {
    pub fn length(&self) -> BlindedTime {
        self.end - self.start
    }
}

/// A change in the blip list caused by one event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlipTransition {
    Opened(BlindedTime),
    Closed(Blip),
}

/// Result of processing one event's time information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Overflow corrected event time, seconds
    pub time: BlindedTime,
    pub passed_rate: bool,
    pub passed_global: bool,
    pub overflow_corrected: bool,
    pub transition: Option<BlipTransition>,
}

/// Fixed settings of a tracker for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveTimeSettings {
    /// Number of rate tags expected inside a full rate window
    pub rate_window_counts: usize,
    /// Time width of the rate window, seconds
    pub rate_window_seconds: f64,
    /// Ignore the rate condition entirely (e.g. source runs with no beam)
    pub ignore_gating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerState {
    Init,
    Running,
}

/// End-of-run live time tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveTimeSummary {
    /// Unfiltered run time (unblinded clock), seconds
    pub wall_time: f64,
    /// Final accumulated time in every slot
    pub total_time: BlindedTime,
    pub live_time: BlindedTime,
    pub lost_time: BlindedTime,
    pub blips: Vec<Blip>,
    pub quality: DataQualityTally,
    pub n_overflows: u64,
    pub n_events: u64,
}

#[derive(Debug, Clone)]
pub struct LiveTimeTracker {
    state: TrackerState,
    correction_offset: BlindedTime,
    accumulated: BlindedTime,
    prev_passed_global: bool,
    prev_passed_rate: bool,
    open_blip: Option<BlindedTime>,
    blips: Vec<Blip>,
    rate_monitor: RollingWindow,
    ignore_gating: bool,
    quality: DataQualityTally,
    n_overflows: u64,
    n_events: u64,
}

impl LiveTimeTracker {
    pub fn new(settings: LiveTimeSettings) -> Self {
        Self {
            state: TrackerState::Init,
            correction_offset: BlindedTime::default(),
            accumulated: BlindedTime::default(),
            prev_passed_global: true,
            prev_passed_rate: true,
            open_blip: None,
            blips: Vec::new(),
            rate_monitor: RollingWindow::new(
                settings.rate_window_counts,
                settings.rate_window_seconds,
            ),
            ignore_gating: settings.ignore_gating,
            quality: DataQualityTally::default(),
            n_overflows: 0,
            n_events: 0,
        }
    }

    /// Count the header faults of an event
    pub fn record_header(&mut self, quality: &HeaderQuality) {
        self.quality.record(quality);
    }

    /// Process the time information of the next event.
    ///
    /// `raw_scaler` is the time scaler in microseconds. `is_rate_tag` marks events of the
    /// monitored rate class. `passes_instant_cuts` is evaluated on the corrected event time.
    pub fn step<F>(
        &mut self,
        raw_scaler: BlindedTime,
        is_rate_tag: bool,
        passes_instant_cuts: F,
    ) -> TimeStep
    where
        F: FnOnce(&BlindedTime) -> bool,
    {
        if self.state == TrackerState::Init {
            self.correction_offset = BlindedTime::default();
            self.accumulated = BlindedTime::default();
            self.prev_passed_global = true;
            self.prev_passed_rate = true;
            self.state = TrackerState::Running;
        }
        self.n_events += 1;

        let raw = MICROSECONDS_TO_SECONDS * raw_scaler;

        let overflow_corrected = raw.both
            < self.accumulated.both - self.correction_offset.both - SCALER_OVERFLOW_MARGIN;
        if overflow_corrected {
            log::info!("Fixing timing scaler overflow at t = {:.1}s", self.accumulated.both);
            self.correction_offset += BlindedTime::uniform(SCALER_WRAP_PERIOD);
            self.n_overflows += 1;
        }
        let time = raw + self.correction_offset;

        if overflow_corrected && (time.both - self.accumulated.both).abs() > SCALER_OVERFLOW_MARGIN
        {
            log::warn!(
                "Scaler jump from {:.1}s to {:.1}s is not explained by a single overflow",
                self.accumulated.both,
                time.both
            );
            self.quality.overflow_anomalies += 1;
        }

        if is_rate_tag {
            self.rate_monitor.add_count(time.both);
        } else {
            self.rate_monitor.move_time_limit(time.both);
        }

        let count = self.rate_monitor.count();
        let passed_rate = count == self.rate_monitor.n_max()
            || (self.prev_passed_rate && count as f64 > self.rate_monitor.n_max() as f64 / 2.0);
        self.prev_passed_rate = passed_rate;

        let passed_global = passes_instant_cuts(&time)
            && (self.ignore_gating || time.both < self.rate_monitor.l_max() || passed_rate);

        let mut transition = None;
        if passed_global != self.prev_passed_global {
            let boundary = BlindedTime::midpoint(&time, &self.accumulated);
            if !passed_global {
                self.open_blip = Some(boundary);
                transition = Some(BlipTransition::Opened(boundary));
            } else if let Some(start) = self.open_blip.take() {
                let blip = Blip {
                    start,
                    end: boundary,
                };
                self.blips.push(blip);
                transition = Some(BlipTransition::Closed(blip));
            }
        }

        self.prev_passed_global = passed_global;
        self.accumulated = time;

        TimeStep {
            time,
            passed_rate,
            passed_global,
            overflow_corrected,
            transition,
        }
    }

    /// Current accumulated (overflow corrected) time
    pub fn accumulated(&self) -> BlindedTime {
        self.accumulated
    }

    pub fn blips(&self) -> &[Blip] {
        &self.blips
    }

    pub fn has_open_blip(&self) -> bool {
        self.open_blip.is_some()
    }

    /// Close any open blip at the final accumulated time and tally the run
    pub fn finalize(mut self) -> LiveTimeSummary {
        if let Some(start) = self.open_blip.take() {
            self.blips.push(Blip {
                start,
                end: self.accumulated,
            });
        }
        let lost_time: BlindedTime = self.blips.iter().map(Blip::length).sum();
        let live_time = self.accumulated - lost_time;

        log::info!(
            "Lost {:.1}s run time to {} blips, leaving {:.1}s. ({},{} failed Evnb,Bkhf)",
            lost_time.both,
            self.blips.len(),
            live_time.both,
            self.quality.failed_evnb,
            self.quality.failed_bkhf
        );

        LiveTimeSummary {
            wall_time: self.accumulated.both,
            total_time: self.accumulated,
            live_time,
            lost_time,
            blips: self.blips,
            quality: self.quality,
            n_overflows: self.n_overflows,
            n_events: self.n_events,
        }
    }
}
