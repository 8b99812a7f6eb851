use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum CutError {
    #[error("Failed to load cut table as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("CutTable failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("CutTable failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Expected 1 cut but found none for {0}/{1}")]
    MissingCut(String, i32),
    #[error("Expected 1 cut but found {2} for {0}/{1}")]
    DuplicateCut(String, i32, usize),
}

#[derive(Debug, Error)]
pub enum RawEventError {
    #[error("Failed to parse buffer into RawEvent: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RawEvent record was truncated after {0} bytes")]
    Truncated(usize),
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open EventFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Error when parsing RawEvent from EventFile: {0}")]
    BadEvent(#[from] RawEventError),
    #[error("EventFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Failed to load calibration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Calibration has {0} wire positions for side {1} plane {2}; at most {max} are supported", max=super::constants::N_MWPC_WIRES)]
    TooManyWires(usize, char, usize),
}

#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("ArtifactStore failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("ArtifactStore failed to convert YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("RunSummary failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RunSummary failed to convert to YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to CutTable error: {0}")]
    CutError(#[from] CutError),
    #[error("Processor failed due to EventFile error: {0}")]
    EventFileError(#[from] EventFileError),
    #[error("Processor failed due to Calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Processor failed due to ArtifactStore error: {0}")]
    ArtifactStoreError(#[from] ArtifactStoreError),
    #[error("Processor failed due to RunSummary error: {0}")]
    SummaryError(#[from] SummaryError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
