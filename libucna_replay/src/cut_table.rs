//! Per-run cut definitions.
//!
//! Cuts are kept in a YAML table where every named cut is valid over an inclusive range of
//! runs. Resolving the table for one run must find exactly one entry for every cut the replay
//! needs; anything else is a configuration fault and the run is not processed.
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::CutError;
use super::range_cut::RangeCut;
use super::side::Side;

/// A named cut valid for runs `first_run..=last_run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutEntry {
    pub name: String,
    pub first_run: i32,
    pub last_run: i32,
    pub start: f64,
    pub end: f64,
}

/// A manually excluded segment of run time, in seconds of corrected run time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeCutEntry {
    pub run: i32,
    pub start: f64,
    pub end: f64,
}

/// The full table of cuts as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutTable {
    pub cuts: Vec<CutEntry>,
    #[serde(default)]
    pub time_cuts: Vec<TimeCutEntry>,
}

/// Cuts applied to one detector side
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideCuts {
    pub anode: RangeCut,
    pub cath_max: RangeCut,
    pub cath_sum: RangeCut,
    pub backing_tdc: RangeCut,
    pub drift_tac: RangeCut,
    /// Self-trigger window of the 2-of-4 TDC, used to break side ambiguity
    pub scint_selftrig: RangeCut,
    pub scint_tdc: RangeCut,
}

/// Every cut needed to replay one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunCuts {
    pub run_number: i32,
    pub sides: [SideCuts; 2],
    pub top_tdc_east: RangeCut,
    pub beam_clock: RangeCut,
    pub manual_cuts: Vec<(f64, f64)>,
}

impl RunCuts {
    pub fn side(&self, side: Side) -> &SideCuts {
        &self.sides[side.index()]
    }

    /// Beam and manual time cuts; `time` is the corrected unblinded run time
    pub fn passes_beam_cuts(&self, beam_clock: f64, time: f64) -> bool {
        if !self.beam_clock.in_range(beam_clock) {
            return false;
        }
        !self
            .manual_cuts
            .iter()
            .any(|(start, end)| *start <= time && time <= *end)
    }
}

impl CutTable {
    /// Read a cut table from a YAML file
    pub fn load(path: &Path) -> Result<Self, CutError> {
        if !path.exists() {
            return Err(CutError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Resolve every cut for a run.
    ///
    /// If `ignore_beam_out` is set the upper bound of the beam burst cut is removed, so long
    /// beam outages (e.g. during source runs) are kept as live time.
    pub fn run_cuts(&self, run_number: i32, ignore_beam_out: bool) -> Result<RunCuts, CutError> {
        let index = self.index_for_run(run_number);
        let load = |name: String| -> Result<RangeCut, CutError> {
            match index.get(name.as_str()).map(|v| v.as_slice()) {
                Some([entry]) => {
                    log::info!(
                        "Loaded cut {name}/{run_number} = ({},{})",
                        entry.start,
                        entry.end
                    );
                    Ok(RangeCut::new(entry.start, entry.end))
                }
                Some(entries) if entries.len() > 1 => {
                    Err(CutError::DuplicateCut(name, run_number, entries.len()))
                }
                _ => Err(CutError::MissingCut(name, run_number)),
            }
        };

        let mut cuts = RunCuts {
            run_number,
            ..Default::default()
        };
        for side in Side::DETECTORS {
            let s = side.letter();
            cuts.sides[side.index()] = SideCuts {
                anode: load(format!("Cut_MWPC_{s}_Anode"))?,
                cath_max: load(format!("Cut_MWPC_{s}_CathMax"))?,
                cath_sum: load(format!("Cut_MWPC_{s}_CathSum"))?,
                backing_tdc: load(format!("Cut_TDC_Back_{s}"))?,
                drift_tac: load(format!("Cut_ADC_Drift_{s}"))?,
                scint_selftrig: load(format!("Cut_TDC_Scint_{s}_Selftrig"))?,
                scint_tdc: load(format!("Cut_TDC_Scint_{s}"))?,
            };
        }
        cuts.top_tdc_east = load(String::from("Cut_TDC_Top_E"))?;
        cuts.beam_clock = load(String::from("Cut_BeamBurst"))?;
        if ignore_beam_out {
            cuts.beam_clock.end = f64::MAX;
        }

        cuts.manual_cuts = self
            .time_cuts
            .iter()
            .filter(|c| c.run == run_number)
            .map(|c| (c.start, c.end))
            .collect();
        if !cuts.manual_cuts.is_empty() {
            log::info!(
                "Manually cutting {} time ranges...",
                cuts.manual_cuts.len()
            );
        }

        Ok(cuts)
    }

    /// Group the entries valid for a run by name
    fn index_for_run(&self, run_number: i32) -> FxHashMap<&str, Vec<&CutEntry>> {
        let mut index: FxHashMap<&str, Vec<&CutEntry>> = FxHashMap::default();
        for entry in self
            .cuts
            .iter()
            .filter(|c| c.first_run <= run_number && run_number <= c.last_run)
        {
            index.entry(entry.name.as_str()).or_default().push(entry);
        }
        index
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn entry(name: &str, start: f64, end: f64) -> CutEntry {
        CutEntry {
            name: name.to_string(),
            first_run: 0,
            last_run: 100_000,
            start,
            end,
        }
    }

    /// A table with every cut the replay needs
    pub(crate) fn complete_table() -> CutTable {
        let mut cuts = Vec::new();
        for s in ['E', 'W'] {
            cuts.push(entry(&format!("Cut_MWPC_{s}_Anode"), 0.0, 4000.0));
            cuts.push(entry(&format!("Cut_MWPC_{s}_CathMax"), 100.0, 4000.0));
            cuts.push(entry(&format!("Cut_MWPC_{s}_CathSum"), 200.0, 60000.0));
            cuts.push(entry(&format!("Cut_TDC_Back_{s}"), 500.0, 3000.0));
            cuts.push(entry(&format!("Cut_ADC_Drift_{s}"), 400.0, 3500.0));
            cuts.push(entry(&format!("Cut_TDC_Scint_{s}_Selftrig"), 2000.0, 2300.0));
            cuts.push(entry(&format!("Cut_TDC_Scint_{s}"), 1500.0, 2500.0));
        }
        cuts.push(entry("Cut_TDC_Top_E", 1000.0, 3000.0));
        cuts.push(entry("Cut_BeamBurst", 0.05, 1000.0));
        CutTable {
            cuts,
            time_cuts: vec![],
        }
    }

    #[test]
    fn test_resolve_complete_table() {
        let table = complete_table();
        let cuts = table.run_cuts(16500, false).unwrap();
        assert_eq!(cuts.side(Side::West).scint_tdc, RangeCut::new(1500.0, 2500.0));
        assert_eq!(cuts.beam_clock.end, 1000.0);

        let ignoring = table.run_cuts(16500, true).unwrap();
        assert_eq!(ignoring.beam_clock.end, f64::MAX);
    }

    #[test]
    fn test_missing_cut_is_fatal() {
        let mut table = complete_table();
        table.cuts.retain(|c| c.name != "Cut_TDC_Top_E");
        match table.run_cuts(16500, false) {
            Err(CutError::MissingCut(name, run)) => {
                assert_eq!(name, "Cut_TDC_Top_E");
                assert_eq!(run, 16500);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_cut_is_fatal() {
        let mut table = complete_table();
        table.cuts.push(entry("Cut_BeamBurst", 0.0, 1.0));
        assert!(matches!(
            table.run_cuts(16500, false),
            Err(CutError::DuplicateCut(_, _, 2))
        ));
    }

    #[test]
    fn test_run_ranges_and_manual_cuts() {
        let mut table = complete_table();
        // A second beam cut which does not apply to the run being resolved
        table.cuts.push(CutEntry {
            name: String::from("Cut_BeamBurst"),
            first_run: 200_000,
            last_run: 300_000,
            start: 0.0,
            end: 1.0,
        });
        table.time_cuts.push(TimeCutEntry {
            run: 16500,
            start: 10.0,
            end: 20.0,
        });
        table.time_cuts.push(TimeCutEntry {
            run: 16501,
            start: 0.0,
            end: 1.0,
        });
        let cuts = table.run_cuts(16500, false).unwrap();
        assert_eq!(cuts.manual_cuts, vec![(10.0, 20.0)]);
        assert!(cuts.passes_beam_cuts(0.5, 5.0));
        assert!(!cuts.passes_beam_cuts(0.5, 15.0));
        assert!(!cuts.passes_beam_cuts(0.01, 5.0));
    }
}
