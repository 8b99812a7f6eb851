use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{DEFAULT_RATE_WINDOW_COUNTS, DEFAULT_RATE_WINDOW_SECONDS};
use super::error::ConfigError;
use super::live_time::LiveTimeSettings;

/// Structure representing the replay configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub cuts_path: PathBuf,
    pub calibration_path: Option<PathBuf>,
    pub artifact_store_path: Option<PathBuf>,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
    pub ignore_beam_out: bool,
    pub rate_window_counts: usize,
    pub rate_window_seconds: f64,
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            cuts_path: PathBuf::from("None"),
            calibration_path: None,
            artifact_store_path: None,
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
            ignore_beam_out: true,
            rate_window_counts: DEFAULT_RATE_WINDOW_COUNTS,
            rate_window_seconds: DEFAULT_RATE_WINDOW_SECONDS,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check if a specific run exists by evaluating the existance of its raw event file
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.get_event_file_name(run_number).exists()
    }

    /// Get the path to the raw event file for a run
    pub fn get_event_file_name(&self, run_number: i32) -> PathBuf {
        self.input_path.join(format!("full{run_number}.dat"))
    }

    /// Get the path to the output summary file
    pub fn get_summary_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self
                .output_path
                .join(format!("{}.yml", self.get_run_str(run_number))))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    /// Construct the run string used for output names
    fn get_run_str(&self, run_number: i32) -> String {
        format!("run_{run_number}")
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn has_artifact_store(&self) -> bool {
        self.artifact_store_path.is_some()
    }

    /// Live time settings for a run. Ignoring beam-off periods also disables rate gating.
    pub fn live_time_settings(&self) -> LiveTimeSettings {
        LiveTimeSettings {
            rate_window_counts: self.rate_window_counts,
            rate_window_seconds: self.rate_window_seconds,
            ignore_gating: self.ignore_beam_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(parsed.ignore_beam_out);
        assert_eq!(parsed.rate_window_counts, DEFAULT_RATE_WINDOW_COUNTS);
        assert!(parsed.calibration_path.is_none());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::read_config_file(Path::new("/definitely/not/here.yml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }

    #[test]
    fn test_run_file_names() {
        let config = Config {
            input_path: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(
            config.get_event_file_name(16500),
            PathBuf::from("/data/full16500.dat")
        );
    }
}
