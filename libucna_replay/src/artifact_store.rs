//! Persistent store for per-run calibration artifacts.
//!
//! The store is a single YAML file holding one entry per (run, side, tube). Writing the fits of
//! a run replaces whatever that run already had for the same channel, so replaying a run
//! twice never leaves duplicates behind.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ArtifactStoreError;
use super::side::Side;
use super::trigger_fit::{ChannelFit, TriggerEfficiencyFit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEfficiencyArtifact {
    pub run: i32,
    pub side: Side,
    pub tube: usize,
    pub fit: TriggerEfficiencyFit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreContents {
    #[serde(default)]
    trigger_efficiency: Vec<TriggerEfficiencyArtifact>,
}

#[derive(Debug)]
pub struct ArtifactStore {
    path: PathBuf,
    contents: StoreContents,
}

impl ArtifactStore {
    /// Open the store at path. A missing file is an empty store; it is created on save.
    pub fn open(path: &Path) -> Result<Self, ArtifactStoreError> {
        let contents = if path.exists() {
            let yaml_str = std::fs::read_to_string(path)?;
            if yaml_str.trim().is_empty() {
                StoreContents::default()
            } else {
                serde_yaml::from_str::<StoreContents>(&yaml_str)?
            }
        } else {
            log::info!("Artifact store {path:?} does not exist yet, starting empty");
            StoreContents::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    /// Replace the trigger efficiency entry of one channel of one run
    pub fn replace(&mut self, run: i32, fit: &ChannelFit) {
        let key = fit.key;
        self.contents
            .trigger_efficiency
            .retain(|a| !(a.run == run && a.side == key.side && a.tube == key.tube));
        self.contents
            .trigger_efficiency
            .push(TriggerEfficiencyArtifact {
                run,
                side: key.side,
                tube: key.tube,
                fit: fit.fit,
            });
    }

    /// Replace every channel given for a run
    pub fn replace_run(&mut self, run: i32, fits: &[ChannelFit]) {
        for fit in fits {
            self.replace(run, fit);
        }
    }

    pub fn get(&self, run: i32, side: Side, tube: usize) -> Option<&TriggerEfficiencyFit> {
        self.contents
            .trigger_efficiency
            .iter()
            .find(|a| a.run == run && a.side == side && a.tube == tube)
            .map(|a| &a.fit)
    }

    pub fn len(&self) -> usize {
        self.contents.trigger_efficiency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.trigger_efficiency.is_empty()
    }

    /// Write the store back to its file, ordered by run then channel
    pub fn save(&mut self) -> Result<(), ArtifactStoreError> {
        self.contents
            .trigger_efficiency
            .sort_by(|a, b| (a.run, a.side, a.tube).cmp(&(b.run, b.side, b.tube)));
        let yaml_str = serde_yaml::to_string(&self.contents)?;
        std::fs::write(&self.path, yaml_str)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger_fit::{ChannelKey, ValueError};

    fn channel_fit(side: Side, tube: usize, center: f64) -> ChannelFit {
        let ve = |value| ValueError { value, error: 0.1 };
        ChannelFit {
            key: ChannelKey { side, tube },
            fit: TriggerEfficiencyFit {
                center: ve(center),
                width: ve(10.0),
                shape: ve(1.4),
                plateau: ve(0.99),
                n: center / 10.0 * 1.4,
                chi2: 12.0,
                ndf: 20,
                converged: true,
            },
        }
    }

    #[test]
    fn test_replace_overwrites_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(&dir.path().join("store.yml")).unwrap();
        assert!(store.is_empty());

        store.replace(100, &channel_fit(Side::East, 0, 20.0));
        store.replace(100, &channel_fit(Side::East, 1, 21.0));
        store.replace(101, &channel_fit(Side::East, 0, 22.0));
        store.replace(100, &channel_fit(Side::East, 0, 25.0));

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(100, Side::East, 0).unwrap().center.value, 25.0);
        assert_eq!(store.get(101, Side::East, 0).unwrap().center.value, 22.0);
        assert!(store.get(100, Side::West, 0).is_none());
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");
        let mut store = ArtifactStore::open(&path).unwrap();
        store.replace_run(
            7,
            &[
                channel_fit(Side::West, 3, 30.0),
                channel_fit(Side::East, 2, 31.0),
            ],
        );
        store.save().unwrap();

        let mut reopened = ArtifactStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get(7, Side::West, 3).unwrap().center.value, 30.0);

        reopened.replace(7, &channel_fit(Side::West, 3, 33.0));
        reopened.save().unwrap();
        let again = ArtifactStore::open(&path).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again.get(7, Side::West, 3).unwrap().center.value, 33.0);
    }
}
