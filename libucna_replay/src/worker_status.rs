/// The phase of a run a worker is in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayStage {
    #[default]
    Scanning,
    Fitting,
    Summarizing,
}

impl ReplayStage {
    /// Progress bar template color for this stage
    pub fn color(&self) -> &'static str {
        match self {
            ReplayStage::Scanning => "cyan",
            ReplayStage::Fitting => "magenta",
            ReplayStage::Summarizing => "green",
        }
    }
}

/// Progress message sent from a worker thread to whoever displays progress
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub stage: ReplayStage,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, stage: ReplayStage) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            stage,
        }
    }
}
