//! One pass of a run's events through the reconstruction chain.
//!
//! [`Replay`] owns the per-run state: the live time tracker, the classifier, the trigger
//! efficiency histograms and the tallies. Events must be handed to
//! [`Replay::process_event`] in acquisition order. [`Replay::finish`] fits the efficiency
//! curves and returns the [`RunSummary`].
use super::blind_time::BlindedTime;
use super::calibration::{anode_sensor_name, pmt_sensor_name, Calibrator, WireHit, WirePlane};
use super::classifier::{
    ClassificationResult, ClassifierInputs, EventClassifier, EventType, Pid, SideInputs,
};
use super::constants::{
    MICROSECONDS_TO_SECONDS, N_BETA_TUBES, N_SIDES, PMT_FIRED_TDC_THRESHOLD, TRIG_EFFIC_MAX,
    TRIG_EFFIC_MIN, TRIG_EFFIC_N_BINS,
};
use super::cut_table::RunCuts;
use super::data_quality::HeaderQuality;
use super::efficiency::{EfficiencyCurve, EfficiencyHistogram};
use super::live_time::{BlipTransition, LiveTimeSettings, LiveTimeTracker, TimeStep};
use super::raw_event::{RawEvent, UcnMonitor};
use super::side::Side;
use super::summary::{format_abs_time, EventCounts, QuickSummary, RunSummary};
use super::trigger_fit::{ChannelKey, TriggerEfficiencyFitter};

/// Collaborators that want to see the event stream as it is replayed
pub trait ReplayObserver {
    /// Called for every reconstructed event passing the global cuts
    fn on_physics_event(&mut self, _event: &PhysicsEvent) {}

    /// Called whenever a blip opens or closes
    fn on_blip(&mut self, _transition: &BlipTransition) {}
}

/// Observer which ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ReplayObserver for NullObserver {}

/// Reconstructed quantities of one detector side
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SideReconstruction {
    /// Wire plane hits, [x, y]
    pub wires: [WireHit; 2],
    /// Pedestal subtracted anode
    pub anode: f64,
    pub cathode_sum: f64,
    pub cathode_max: f64,
    pub passed_anode: bool,
    pub passed_cathode_sum: bool,
    pub passed_mwpc: bool,
    pub visible_energy: f64,
    pub mwpc_energy: f64,
}

/// A fully reconstructed scintillator trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsEvent {
    pub trigger_number: u64,
    pub time: BlindedTime,
    pub passed_global: bool,
    pub sides: [SideReconstruction; N_SIDES],
    pub classification: ClassificationResult,
    pub true_energy: f64,
}

pub struct Replay<'a, C: Calibrator, O: ReplayObserver> {
    run_number: i32,
    cuts: RunCuts,
    classifier: EventClassifier,
    tracker: LiveTimeTracker,
    calibration: C,
    observer: &'a mut O,
    fitter: TriggerEfficiencyFitter,
    trig_effic: Vec<(ChannelKey, EfficiencyHistogram)>,
    counts: EventCounts,
    gv_monitor_counts: u64,
    beta_counts: [u64; N_SIDES],
    abs_time_start: Option<f64>,
    abs_time_end: Option<f64>,
}

impl<'a, C: Calibrator, O: ReplayObserver> Replay<'a, C, O> {
    pub fn new(
        cuts: RunCuts,
        settings: LiveTimeSettings,
        calibration: C,
        observer: &'a mut O,
    ) -> Self {
        let trig_effic = Side::DETECTORS
            .iter()
            .flat_map(|side| {
                (0..N_BETA_TUBES).map(move |tube| {
                    (
                        ChannelKey { side: *side, tube },
                        EfficiencyHistogram::new(TRIG_EFFIC_N_BINS, TRIG_EFFIC_MIN, TRIG_EFFIC_MAX),
                    )
                })
            })
            .collect();
        Self {
            run_number: cuts.run_number,
            classifier: EventClassifier::new(&cuts),
            cuts,
            tracker: LiveTimeTracker::new(settings),
            calibration,
            observer,
            fitter: TriggerEfficiencyFitter::default(),
            trig_effic,
            counts: EventCounts::default(),
            gv_monitor_counts: 0,
            beta_counts: [0; N_SIDES],
            abs_time_start: None,
            abs_time_end: None,
        }
    }

    pub fn with_fitter(mut self, fitter: TriggerEfficiencyFitter) -> Self {
        self.fitter = fitter;
        self
    }

    /// Run the time calibration of an event
    fn calibrate_times(&mut self, event: &RawEvent) -> TimeStep {
        let scaler = event.time_scaler.map(f64::from);
        let raw_scaler = BlindedTime::new(scaler[0], scaler[1], scaler[2], scaler[3]);
        let is_gv_tag = event
            .trigger_flags()
            .is_ucn_mon_channel(UcnMonitor::GateValve);
        if is_gv_tag {
            self.gv_monitor_counts += 1;
        }
        let beam_clock = event.beam_clock as f64 * MICROSECONDS_TO_SECONDS;
        let cuts = &self.cuts;
        let step = self.tracker.step(raw_scaler, is_gv_tag, |time| {
            cuts.passes_beam_cuts(beam_clock, time.both)
        });
        if let Some(transition) = &step.transition {
            self.observer.on_blip(transition);
        }
        step
    }

    /// Fill the per-PMT trigger efficiency histograms. A PMT's bin counts an event when two
    /// other PMTs of its side fired; it is triggered when the PMT fired too.
    fn fill_trigger_efficiency(
        &mut self,
        event: &RawEvent,
        pmt_adc: &[[f64; N_BETA_TUBES]; N_SIDES],
    ) {
        for (key, histogram) in self.trig_effic.iter_mut() {
            let s = key.side.index();
            let fired = |t: usize| event.scint_tdc[s][t] as f64 > PMT_FIRED_TDC_THRESHOLD;
            let n_others = (0..N_BETA_TUBES)
                .filter(|t| *t != key.tube && fired(*t))
                .count();
            if n_others >= 2 {
                histogram.fill(pmt_adc[s][key.tube], fired(key.tube));
            }
        }
    }

    fn reconstruct_side(
        &self,
        event: &RawEvent,
        side: Side,
        pmt_adc: &[f64; N_BETA_TUBES],
        time: f64,
    ) -> SideReconstruction {
        let s = side.index();
        let cuts = self.cuts.side(side);
        let cal = &self.calibration;

        let wires = WirePlane::ALL
            .map(|plane| cal.wire_hit(side, plane, &event.cathodes[s][plane as usize], time));
        let anode = event.anode[s] as f64 - cal.pedestal(&anode_sensor_name(side), time);
        let cathode_sum = wires[0].cathode_sum + wires[1].cathode_sum;
        let cathode_max = wires[0].max_value.min(wires[1].max_value);
        let passed_mwpc = cuts.cath_max.in_range(cathode_max);

        let (x, y) = if passed_mwpc {
            (wires[0].center, wires[1].center)
        } else {
            (0.0, 0.0)
        };

        SideReconstruction {
            wires,
            anode,
            cathode_sum,
            cathode_max,
            passed_anode: cuts.anode.in_range(anode),
            passed_cathode_sum: cuts.cath_sum.in_range(cathode_sum),
            passed_mwpc,
            visible_energy: cal.visible_energy(side, x, y, pmt_adc, time),
            mwpc_energy: cal.anode_energy(side, anode, x, y, time),
        }
    }

    fn classifier_inputs(
        &self,
        event: &RawEvent,
        sides: &[SideReconstruction; N_SIDES],
        pmt_adc: &[[f64; N_BETA_TUBES]; N_SIDES],
    ) -> ClassifierInputs {
        let side_inputs = |side: Side| {
            let s = side.index();
            let cuts = self.cuts.side(side);
            let selftrig_tdc = event.scint_tdc[s][N_BETA_TUBES] as f64;
            SideInputs {
                passed_mwpc: sides[s].passed_mwpc,
                passed_scint_tdc: cuts.scint_tdc.in_range(selftrig_tdc),
                selftrig_tdc,
                tagged_back: cuts.backing_tdc.in_range(event.backing_tdc[s] as f64),
                tagged_drift: cuts.drift_tac.in_range(event.drift_tac[s] as f64),
                // Only the East side has a top veto
                tagged_top: side == Side::East
                    && self.cuts.top_tdc_east.in_range(event.top_tdc[s] as f64),
                pmt_adc: pmt_adc[s],
            }
        };
        ClassifierInputs {
            east: side_inputs(Side::East),
            west: side_inputs(Side::West),
            flags: event.trigger_flags(),
        }
    }

    fn true_energy(
        &self,
        result: &ClassificationResult,
        sides: &[SideReconstruction; N_SIDES],
    ) -> f64 {
        let e_east = sides[Side::East.index()].visible_energy;
        let e_west = sides[Side::West.index()].visible_energy;
        let single_side = matches!(result.side, Side::East | Side::West);
        if single_side && result.event_type <= EventType::TypeIII {
            self.calibration
                .true_energy(result.side, result.event_type, e_east, e_west)
        } else {
            e_east + e_west
        }
    }

    /// Process the next event of the run.
    ///
    /// Returns the reconstructed event for scintillator triggers (LED excluded), whether or
    /// not it passed the global cuts. Other triggers only advance the clock.
    pub fn process_event(&mut self, event: &RawEvent) -> Option<PhysicsEvent> {
        let quality = HeaderQuality::check(event);
        self.tracker.record_header(&quality);

        let step = self.calibrate_times(event);
        let abs_time = event.abs_time as f64;
        self.abs_time_start.get_or_insert(abs_time);
        self.abs_time_end = Some(abs_time);

        let time = step.time.both;
        let mut pmt_adc = [[0.0; N_BETA_TUBES]; N_SIDES];
        for side in Side::DETECTORS {
            let s = side.index();
            for t in 0..N_BETA_TUBES {
                pmt_adc[s][t] = event.pmt_adc[s][t] as f64
                    - self.calibration.pedestal(&pmt_sensor_name(side, t), time);
            }
        }

        let flags = event.trigger_flags();
        if flags.is_led() || !flags.is_scint_trigger() {
            return None;
        }
        self.fill_trigger_efficiency(event, &pmt_adc);

        let sides = Side::DETECTORS
            .map(|side| self.reconstruct_side(event, side, &pmt_adc[side.index()], time));
        let inputs = self.classifier_inputs(event, &sides, &pmt_adc);
        let classification = self.classifier.classify(&inputs);
        let true_energy = self.true_energy(&classification, &sides);

        self.counts.record(&classification);
        let counts_as_beta = classification.pid == Pid::Beta
            && matches!(classification.side, Side::East | Side::West)
            && classification.event_type <= EventType::TypeII;
        if step.passed_global && counts_as_beta {
            self.beta_counts[classification.side.index()] += 1;
        }

        let physics = PhysicsEvent {
            trigger_number: event.trigger_number as u64,
            time: step.time,
            passed_global: step.passed_global,
            sides,
            classification,
            true_energy,
        };
        if step.passed_global {
            self.observer.on_physics_event(&physics);
        }
        Some(physics)
    }

    /// The finished trigger efficiency curves, in channel order
    pub fn efficiency_curves(&self) -> Vec<(ChannelKey, EfficiencyCurve)> {
        self.trig_effic
            .iter()
            .map(|(key, histogram)| (*key, histogram.to_curve()))
            .collect()
    }

    /// Close out the run: fit the trigger efficiencies and tally the run time
    pub fn finish(self) -> RunSummary {
        log::info!("Calculating trigger efficiency...");
        let trigger_efficiency = self.fitter.fit_all(&self.efficiency_curves());
        let live_time = self.tracker.finalize();
        let quick =
            QuickSummary::new(self.gv_monitor_counts, self.beta_counts, live_time.wall_time);
        quick.log(self.run_number);

        RunSummary {
            run_number: self.run_number,
            start_time: self.abs_time_start.and_then(format_abs_time),
            end_time: self.abs_time_end.and_then(format_abs_time),
            live_time,
            counts: self.counts,
            quick,
            trigger_efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use crate::calibration::LinearCalibration;
    use crate::constants::{
        EXPECTED_BKHF, SIS_LED_BIT, SIS_UCN_MON_BIT, SIS_UCN_MON_FIRST_CHANNEL_BIT,
    };
    use crate::cut_table::tests::complete_table;

    #[derive(Default)]
    struct Recorder {
        physics: Vec<PhysicsEvent>,
        transitions: Vec<BlipTransition>,
    }

    impl ReplayObserver for Recorder {
        fn on_physics_event(&mut self, event: &PhysicsEvent) {
            self.physics.push(*event);
        }

        fn on_blip(&mut self, transition: &BlipTransition) {
            self.transitions.push(*transition);
        }
    }

    fn settings() -> LiveTimeSettings {
        LiveTimeSettings {
            rate_window_counts: 5,
            rate_window_seconds: 5.0,
            ignore_gating: true,
        }
    }

    fn base_event(n: u32, t_seconds: f64) -> RawEvent {
        let mut event = RawEvent {
            trigger_number: n as f32,
            abs_time: 1.0e9,
            time_scaler: [(t_seconds * 1.0e6) as f32; 4],
            beam_clock: 100_000.0,
            evnb: [n as f32; 5],
            bkhf: [EXPECTED_BKHF; 5],
            ..Default::default()
        };
        // Wirechamber hit in the middle of both planes on both sides
        for side in 0..N_SIDES {
            for plane in 0..2 {
                event.cathodes[side][plane][7] = 500.0;
            }
        }
        event
    }

    /// A clean West beta: West 2-of-4 and wirechamber, nothing on East
    fn west_beta(n: u32, t_seconds: f64) -> RawEvent {
        let mut event = base_event(n, t_seconds);
        event.sis00 = 0b10 as f32;
        event.scint_tdc[Side::West.index()] = [2000.0; N_BETA_TUBES + 1];
        event.pmt_adc[Side::West.index()] = [100.0; N_BETA_TUBES];
        event.cathodes[Side::East.index()] = [[0.0; 16]; 2];
        event
    }

    #[test]
    fn test_west_beta_is_reconstructed() {
        let cuts = complete_table().run_cuts(100, true).unwrap();
        let mut recorder = Recorder::default();
        let mut replay = Replay::new(cuts, settings(), LinearCalibration::default(), &mut recorder);
        let physics = replay.process_event(&west_beta(1, 1.0)).unwrap();
        assert_eq!(physics.classification.pid, Pid::Beta);
        assert_eq!(physics.classification.event_type, EventType::Type0);
        assert_eq!(physics.classification.side, Side::West);
        assert!(physics.sides[Side::West.index()].passed_mwpc);
        assert_eq!(physics.true_energy, 100.0);
        let summary = replay.finish();
        assert_eq!(summary.counts.pid(Pid::Beta), 1);
        assert_eq!(summary.quick.beta_counts, [0, 1]);
        assert_eq!(recorder.physics.len(), 1);
    }

    #[test]
    fn test_led_and_monitor_events_only_advance_time() {
        let cuts = complete_table().run_cuts(100, true).unwrap();
        let mut observer = NullObserver;
        let mut replay = Replay::new(cuts, settings(), LinearCalibration::default(), &mut observer);

        let mut led = west_beta(1, 1.0);
        led.sis00 = (SIS_LED_BIT | 0b10) as f32;
        assert!(replay.process_event(&led).is_none());

        let mut monitor = base_event(2, 2.0);
        monitor.sis00 = (SIS_UCN_MON_BIT | (1 << SIS_UCN_MON_FIRST_CHANNEL_BIT)) as f32;
        assert!(replay.process_event(&monitor).is_none());

        let summary = replay.finish();
        assert_eq!(summary.counts.total(), 0);
        assert_eq!(summary.quick.gv_monitor_counts, 1);
        assert_eq!(summary.live_time.n_events, 2);
        assert_approx_eq!(summary.live_time.wall_time, 2.0);
        assert_eq!(summary.trigger_efficiency.len(), 8);
    }

    #[test]
    fn test_trigger_efficiency_filling() {
        let cuts = complete_table().run_cuts(100, true).unwrap();
        let mut observer = NullObserver;
        let mut replay = Replay::new(cuts, settings(), LinearCalibration::default(), &mut observer);

        // Tubes 0, 1, 2 fire; tube 3 has signal but no TDC
        let mut event = west_beta(1, 1.0);
        event.scint_tdc[Side::West.index()] = [2000.0, 2000.0, 2000.0, 0.0, 2000.0];
        event.pmt_adc[Side::West.index()] = [150.0, 150.0, 150.0, 20.0];
        replay.process_event(&event);

        let curves = replay.efficiency_curves();
        let totals = |side: Side, tube: usize| -> (u64, u64) {
            let (_, curve) = curves
                .iter()
                .find(|(key, _)| key.side == side && key.tube == tube)
                .unwrap();
            curve
                .points
                .iter()
                .fold((0, 0), |(k, n), p| (k + p.triggered, n + p.total))
        };
        assert_eq!(totals(Side::West, 0), (1, 1));
        assert_eq!(totals(Side::West, 3), (0, 1));
        assert_eq!(totals(Side::East, 0), (0, 0));
    }

    #[test]
    fn test_bad_header_is_counted_not_fatal() {
        let cuts = complete_table().run_cuts(100, true).unwrap();
        let mut observer = NullObserver;
        let mut replay = Replay::new(cuts, settings(), LinearCalibration::default(), &mut observer);
        let mut event = west_beta(1, 1.0);
        event.evnb[2] = 7.0;
        event.bkhf[0] = 3.0;
        assert!(replay.process_event(&event).is_some());
        let summary = replay.finish();
        assert_eq!(summary.live_time.quality.failed_evnb, 1);
        assert_eq!(summary.live_time.quality.failed_bkhf, 1);
    }
}
