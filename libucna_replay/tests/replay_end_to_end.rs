use assert_approx_eq::assert_approx_eq;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::mpsc;

use libucna_replay::artifact_store::ArtifactStore;
use libucna_replay::calibration::LinearCalibration;
use libucna_replay::classifier::{EventType, Pid};
use libucna_replay::config::Config;
use libucna_replay::constants::{
    EXPECTED_BKHF, MICROSECONDS_TO_SECONDS, SCALER_WRAP_PERIOD, SIS_UCN_MON_BIT,
    SIS_UCN_MON_FIRST_CHANNEL_BIT,
};
use libucna_replay::cut_table::{CutEntry, CutTable, TimeCutEntry};
use libucna_replay::live_time::{BlipTransition, LiveTimeSettings};
use libucna_replay::process::process_run;
use libucna_replay::raw_event::RawEvent;
use libucna_replay::replay::{PhysicsEvent, Replay, ReplayObserver};
use libucna_replay::side::Side;
use libucna_replay::summary::RunSummary;
use libucna_replay::worker_status::{ReplayStage, WorkerStatus};

const RUN: i32 = 16500;

fn cut_table() -> CutTable {
    let entry = |name: String, start: f64, end: f64| CutEntry {
        name,
        first_run: 16000,
        last_run: 17000,
        start,
        end,
    };
    let mut cuts = Vec::new();
    for s in ['E', 'W'] {
        cuts.push(entry(format!("Cut_MWPC_{s}_Anode"), 0.0, 4000.0));
        cuts.push(entry(format!("Cut_MWPC_{s}_CathMax"), 100.0, 4000.0));
        cuts.push(entry(format!("Cut_MWPC_{s}_CathSum"), 200.0, 60000.0));
        cuts.push(entry(format!("Cut_TDC_Back_{s}"), 500.0, 3000.0));
        cuts.push(entry(format!("Cut_ADC_Drift_{s}"), 400.0, 3500.0));
        cuts.push(entry(format!("Cut_TDC_Scint_{s}_Selftrig"), 2000.0, 2300.0));
        cuts.push(entry(format!("Cut_TDC_Scint_{s}"), 1500.0, 2500.0));
    }
    cuts.push(entry(String::from("Cut_TDC_Top_E"), 1000.0, 3000.0));
    cuts.push(entry(String::from("Cut_BeamBurst"), 0.05, 1000.0));
    CutTable {
        cuts,
        time_cuts: vec![TimeCutEntry {
            run: RUN + 1,
            start: 0.0,
            end: 1.0e6,
        }],
    }
}

fn header(n: u32, scaler_seconds: f64) -> RawEvent {
    RawEvent {
        trigger_number: n as f32,
        abs_time: 1.3e9,
        time_scaler: [(scaler_seconds * 1.0e6) as f32; 4],
        beam_clock: 100_000.0,
        evnb: [n as f32; 5],
        bkhf: [EXPECTED_BKHF; 5],
        ..Default::default()
    }
}

/// Gate valve monitor event
fn gv_event(n: u32, scaler_seconds: f64) -> RawEvent {
    let mut event = header(n, scaler_seconds);
    event.sis00 = (SIS_UCN_MON_BIT | (1 << SIS_UCN_MON_FIRST_CHANNEL_BIT)) as f32;
    event
}

/// West scintillator and wirechamber, nothing on East
fn west_beta(n: u32, scaler_seconds: f64) -> RawEvent {
    let mut event = header(n, scaler_seconds);
    let w = Side::West.index();
    event.sis00 = 0b10 as f32;
    event.scint_tdc[w] = [2000.0; 5];
    event.pmt_adc[w] = [100.0; 4];
    event.cathodes[w][0][7] = 500.0;
    event.cathodes[w][1][7] = 500.0;
    event
}

/// Ten events with the scaler wrapping at event 5. The monitor tags at events 0 and 7 keep the
/// one-count rate window alive; it lapses at event 3.
fn ten_event_stream() -> Vec<RawEvent> {
    let wrap = SCALER_WRAP_PERIOD;
    vec![
        gv_event(0, 4280.0),
        west_beta(1, 4281.0),
        west_beta(2, 4283.0),
        west_beta(3, 4286.0),
        west_beta(4, 4290.0),
        west_beta(5, 4296.0 - wrap),
        west_beta(6, 4298.0 - wrap),
        gv_event(7, 4300.0 - wrap),
        west_beta(8, 4301.0 - wrap),
        west_beta(9, 4303.0 - wrap),
    ]
}

/// Corrected time of an event as the replay computes it
fn corrected(event: &RawEvent, wrapped: bool) -> f64 {
    let raw = MICROSECONDS_TO_SECONDS * event.time_scaler[2] as f64;
    if wrapped {
        raw + SCALER_WRAP_PERIOD
    } else {
        raw
    }
}

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

#[test]
fn test_ten_event_stream() {
    let events = ten_event_stream();
    let cuts = cut_table().run_cuts(RUN, false).unwrap();
    let settings = LiveTimeSettings {
        rate_window_counts: 1,
        rate_window_seconds: 5.0,
        ignore_gating: false,
    };
    let mut recorder = Recorder::default();
    let mut replay = Replay::new(cuts, settings, LinearCalibration::default(), &mut recorder);

    let mut times = Vec::new();
    for event in events.iter() {
        if let Some(physics) = replay.process_event(event) {
            times.push(physics.time.both);
        }
    }
    let summary = replay.finish();

    // Corrected times never go backwards across the wrap
    assert!(times.windows(2).all(|w| w[0] <= w[1]));

    let live = &summary.live_time;
    assert_eq!(live.n_events, 10);
    assert_eq!(live.n_overflows, 1);
    assert_eq!(live.quality.total(), 0);

    let wall = corrected(&events[9], true);
    assert_approx_eq!(live.wall_time, wall, 1e-9);

    assert_eq!(live.blips.len(), 1);
    let blip = live.blips[0];
    let start = 0.5 * (corrected(&events[3], false) + corrected(&events[2], false));
    let end = 0.5 * (corrected(&events[7], true) + corrected(&events[6], true));
    assert_approx_eq!(blip.start.both, start, 1e-9);
    assert_approx_eq!(blip.end.both, end, 1e-9);
    assert_approx_eq!(live.live_time.both, wall - (end - start), 1e-9);
    assert_approx_eq!(live.live_time.both + live.lost_time.both, live.wall_time, 1e-9);

    // Only the betas outside the blip reach the physics stream
    assert_eq!(summary.counts.pid(Pid::Beta), 8);
    assert_eq!(summary.counts.event_type(EventType::Type0), 8);
    assert_eq!(summary.quick.beta_counts, [0, 4]);
    assert_eq!(summary.quick.gv_monitor_counts, 2);
    assert_eq!(recorder.physics.len(), 4);
    assert!(matches!(
        recorder.transitions.as_slice(),
        [BlipTransition::Opened(_), BlipTransition::Closed(_)]
    ));
}

fn write_events(path: &Path, events: &[RawEvent]) {
    let mut writer = BufWriter::new(File::create(path).unwrap());
    for event in events {
        event.write_to(&mut writer).unwrap();
    }
}

#[test]
fn test_process_run_writes_summary_and_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw");
    let output = dir.path().join("out");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(&output).unwrap();

    let cuts_path = dir.path().join("cuts.yml");
    std::fs::write(&cuts_path, serde_yaml::to_string(&cut_table()).unwrap()).unwrap();

    let config = Config {
        input_path: input.clone(),
        output_path: output.clone(),
        cuts_path,
        calibration_path: None,
        artifact_store_path: Some(dir.path().join("artifacts.yml")),
        first_run_number: RUN,
        last_run_number: RUN,
        n_threads: 1,
        ignore_beam_out: true,
        rate_window_counts: 1,
        rate_window_seconds: 5.0,
    };
    write_events(&config.get_event_file_name(RUN), &ten_event_stream());
    assert!(config.does_run_exist(RUN));

    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let summary = process_run(&config, RUN, &tx, &0).unwrap();
    drop(tx);

    // Beam out is ignored, so there is no blip
    assert!(summary.live_time.blips.is_empty());
    assert_approx_eq!(summary.live_time.live_time.both, summary.live_time.wall_time);
    assert_eq!(summary.trigger_efficiency.len(), 8);
    assert!(summary.start_time.is_some());

    let statuses: Vec<WorkerStatus> = rx.iter().collect();
    let last = statuses.last().unwrap();
    assert_eq!(last.stage, ReplayStage::Summarizing);
    assert_eq!(last.progress, 1.0);

    let written = RunSummary::read(&config.get_summary_file_name(RUN).unwrap()).unwrap();
    assert_eq!(written, summary);

    // Replaying replaces the stored fits instead of adding to them
    let (tx, _rx) = mpsc::channel::<WorkerStatus>();
    process_run(&config, RUN, &tx, &0).unwrap();
    let store = ArtifactStore::open(config.artifact_store_path.as_deref().unwrap()).unwrap();
    assert_eq!(store.len(), 8);
    assert!(store.get(RUN, Side::West, 3).is_some());
}

#[test]
fn test_missing_cut_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = cut_table();
    table.cuts.retain(|c| c.name != "Cut_BeamBurst");
    let cuts_path = dir.path().join("cuts.yml");
    std::fs::write(&cuts_path, serde_yaml::to_string(&table).unwrap()).unwrap();

    let config = Config {
        input_path: dir.path().to_path_buf(),
        output_path: dir.path().to_path_buf(),
        cuts_path,
        ..Default::default()
    };
    write_events(&config.get_event_file_name(RUN), &ten_event_stream());

    let (tx, _rx) = mpsc::channel::<WorkerStatus>();
    let result = process_run(&config, RUN, &tx, &0);
    assert!(result.is_err());
    assert!(!config.get_summary_file_name(RUN).unwrap().exists());
}
