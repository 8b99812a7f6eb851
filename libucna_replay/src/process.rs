use std::sync::mpsc::Sender;
use std::sync::Mutex;

use super::artifact_store::ArtifactStore;
use super::calibration::LinearCalibration;
use super::config::Config;
use super::cut_table::CutTable;
use super::error::{EventFileError, ProcessorError, RawEventError};
use super::event_file::EventFile;
use super::replay::{NullObserver, Replay};
use super::summary::RunSummary;
use super::worker_status::{ReplayStage, WorkerStatus};

/// Workers share one artifact store file
static ARTIFACT_STORE_LOCK: Mutex<()> = Mutex::new(());

/// Write the trigger efficiency fits of a run into the artifact store
fn store_artifacts(config: &Config, summary: &RunSummary) -> Result<(), ProcessorError> {
    let Some(store_path) = config.artifact_store_path.as_deref() else {
        return Ok(());
    };
    let _guard = ARTIFACT_STORE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut store = ArtifactStore::open(store_path)?;
    store.replace_run(summary.run_number, &summary.trigger_efficiency);
    store.save()?;
    log::info!(
        "Stored {} trigger efficiency fits for run {} in {store_path:?}",
        summary.trigger_efficiency.len(),
        summary.run_number
    );
    Ok(())
}

/// The main loop of the replay.
///
/// Reads every event of the run, reconstructs and classifies it, then fits the trigger
/// efficiencies and writes the run summary. Progress is reported through `tx`.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<RunSummary, ProcessorError> {
    let cuts = CutTable::load(&config.cuts_path)?.run_cuts(run_number, config.ignore_beam_out)?;
    let calibration = LinearCalibration::load_or_default(config.calibration_path.as_deref())?;
    let summary_path = config.get_summary_file_name(run_number)?;

    let event_file = EventFile::open(&config.get_event_file_name(run_number))?;
    log::info!(
        "Total run size: {}",
        human_bytes::human_bytes(event_file.size_bytes() as f64)
    );
    let flush_frac: f32 = 0.01;
    let flush_val = ((event_file.n_events() as f64 * flush_frac as f64) as u64).max(1);
    let mut count = 0;
    let mut progress: f32 = 0.0;

    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, ReplayStage::Scanning))?;
    let mut observer = NullObserver;
    let mut replay = Replay::new(cuts, config.live_time_settings(), calibration, &mut observer);
    for event in event_file {
        let event = match event {
            Ok(event) => event,
            Err(EventFileError::BadEvent(RawEventError::Truncated(n))) => {
                log::warn!(
                    "Run {run_number} ends with a truncated record of {n} bytes, ignoring it"
                );
                break;
            }
            Err(e) => return Err(e.into()),
        };
        replay.process_event(&event);

        count += 1;
        if count > flush_val {
            count = 0;
            progress += flush_frac;
            tx.send(WorkerStatus::new(
                progress,
                run_number,
                *worker_id,
                ReplayStage::Scanning,
            ))?;
        }
    }
    tx.send(WorkerStatus::new(1.0, run_number, *worker_id, ReplayStage::Scanning))?;

    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, ReplayStage::Fitting))?;
    let summary = replay.finish();
    tx.send(WorkerStatus::new(1.0, run_number, *worker_id, ReplayStage::Fitting))?;

    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, ReplayStage::Summarizing))?;
    summary.write(&summary_path)?;
    store_artifacts(config, &summary)?;
    tx.send(WorkerStatus::new(1.0, run_number, *worker_id, ReplayStage::Summarizing))?;
    log::info!("Wrote summary to {summary_path:?}");

    Ok(summary)
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    for run in subset {
        if config.does_run_exist(run) {
            log::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            log::info!("Finished processing run {}.", run);
        } else {
            log::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}
