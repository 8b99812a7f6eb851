//! # ucna_replay
//!
//! ucna_replay is the first-pass replay of the UCNA beta decay spectrometer, written in Rust.
//! It takes the raw event records written by the data acquisition for a run, corrects the
//! run clock, reconstructs and classifies every scintillator trigger, measures the PMT
//! trigger efficiencies and writes a summary of the run with its live time.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./ucna_replay_cli` from the top
//! level ucna_replay repository. The binary is installed to your cargo install location
//! (typically `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! A template configuration can be generated with `ucna_replay_cli -p config.yml new`. The
//! YAML format of a configuration file is as follows:
//!
//! ```yml
//! input_path: None
//! output_path: None
//! cuts_path: None
//! calibration_path: null
//! artifact_store_path: null
//! first_run_number: 0
//! last_run_number: 0
//! n_threads: 1
//! ignore_beam_out: true
//! rate_window_counts: 5
//! rate_window_seconds: 5.0
//! ```
//!
//! - input_path: directory containing the raw event files, named `full<run>.dat`
//! - output_path: directory to which run summaries `run_<run>.yml` are written
//! - cuts_path: the cut table (see below)
//! - calibration_path: optional calibration file. If `null`, unit gains and zero pedestals
//! are used.
//! - artifact_store_path: optional file in which the trigger efficiency fits of every run
//! are kept. Replaying a run replaces its old entries.
//! - first_run_number/last_run_number: the run range (inclusive)
//! - n_threads: the number of parallel workers to divide the runs amongst. Must be at
//! least 1.
//! - ignore_beam_out: keep periods without beam (source and background runs) as live time
//! - rate_window_counts/rate_window_seconds: the gate valve monitor rate check. The run is
//! considered live while the last `rate_window_counts` monitor events fall within
//! `rate_window_seconds`.
//!
//! ### Cut table
//!
//! Every cut is a named inclusive range valid for a range of runs. Exactly one entry must
//! apply to each cut for a run to be replayed. Manual time cuts remove intervals (seconds
//! of run time) from the live time of a run.
//!
//! ```yml
//! cuts:
//!   - name: Cut_BeamBurst
//!     first_run: 16000
//!     last_run: 18000
//!     start: 0.05
//!     end: 1000.0
//! time_cuts:
//!   - run: 16500
//!     start: 120.0
//!     end: 180.0
//! ```
//!
//! The cuts needed per side (`E` or `W`) are `Cut_MWPC_<s>_Anode`, `Cut_MWPC_<s>_CathMax`,
//! `Cut_MWPC_<s>_CathSum`, `Cut_TDC_Back_<s>`, `Cut_ADC_Drift_<s>`,
//! `Cut_TDC_Scint_<s>_Selftrig` and `Cut_TDC_Scint_<s>`, plus `Cut_TDC_Top_E` and
//! `Cut_BeamBurst`.
//!
//! ## Output
//!
//! For each run a YAML summary is written with the wall time, the live time of every clock,
//! the list of blips (intervals cut from the live time), header fault counts, event counts
//! by particle ID, type and side, a quick rate summary and the trigger efficiency fit of
//! each PMT.
pub mod artifact_store;
pub mod blind_time;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod cut_table;
pub mod data_quality;
pub mod efficiency;
pub mod error;
pub mod event_file;
pub mod live_time;
pub mod process;
pub mod range_cut;
pub mod raw_event;
pub mod replay;
pub mod rolling_window;
pub mod side;
pub mod special_functions;
pub mod summary;
pub mod trigger_fit;
pub mod worker_status;
