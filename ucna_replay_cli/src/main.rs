use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libucna_replay::config::Config;
use libucna_replay::process::{create_subsets, process_subset};
use libucna_replay::worker_status::{ReplayStage, WorkerStatus};

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn bar_style(stage: ReplayStage) -> ProgressStyle {
    let template = format!(
        "{{prefix}} [{{bar:40.{}/blue}}] {{percent}}% {{msg}}",
        stage.color()
    );
    ProgressStyle::with_template(&template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn stage_name(stage: ReplayStage) -> &'static str {
    match stage {
        ReplayStage::Scanning => "scanning events",
        ReplayStage::Fitting => "fitting trigger efficiency",
        ReplayStage::Summarizing => "writing summary",
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("ucna_replay_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if !config.is_n_threads_valid() {
        log::error!("n_threads must be at least 1, found {}", config.n_threads);
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Input Path: {}", config.input_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Cut Table: {}", config.cuts_path.to_string_lossy());
    match &config.calibration_path {
        Some(p) => log::info!("Calibration: {}", p.to_string_lossy()),
        None => log::info!("Calibration: default"),
    }
    if config.has_artifact_store() {
        log::info!(
            "Artifact Store: {}",
            config
                .artifact_store_path
                .as_deref()
                .unwrap_or(Path::new(""))
                .to_string_lossy()
        );
    }
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    log::info!("Ignore Beam Out: {}", config.ignore_beam_out);

    // Spawn the workers, one progress bar each
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut bars: Vec<Option<ProgressBar>> = Vec::new();
    let mut workers = Vec::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            bars.push(None);
            continue;
        }
        let pb = pb_manager.add(ProgressBar::new(100));
        pb.set_style(bar_style(ReplayStage::default()));
        pb.set_prefix(format!("Worker {idx}"));
        bars.push(Some(pb));

        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    // Only the workers hold senders now, so the channel closes when they are all done
    drop(tx);

    let mut current_stage: Vec<Option<ReplayStage>> = vec![None; bars.len()];
    for status in rx.iter() {
        let Some(Some(pb)) = bars.get(status.worker_id) else {
            continue;
        };
        if current_stage[status.worker_id] != Some(status.stage) {
            pb.set_style(bar_style(status.stage));
            current_stage[status.worker_id] = Some(status.stage);
        }
        pb.set_message(format!("run {} {}", status.run_number, stage_name(status.stage)));
        pb.set_position((status.progress.clamp(0.0, 1.0) * 100.0) as u64);
    }

    let mut n_failed = 0;
    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                n_failed += 1;
                log::error!("Replay failed with error: {e}");
            }
            Err(_) => {
                n_failed += 1;
                log::error!("Failed to join a replay worker!");
            }
        }
    }

    for pb in bars.into_iter().flatten() {
        pb.finish();
    }

    if n_failed == 0 {
        log::info!("Successfully replayed runs!");
    } else {
        log::warn!("{n_failed} worker(s) stopped early, check the log for details");
    }
    log::info!("Done.");
}
