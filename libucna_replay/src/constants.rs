// Detector geometry
pub const N_BETA_TUBES: usize = 4;
pub const N_MWPC_WIRES: usize = 16;
pub const N_DAQ_MODULES: usize = 5;
pub const N_UCN_MONITORS: usize = 4;
pub const N_SIDES: usize = 2;

// Time scalers
pub const MICROSECONDS_TO_SECONDS: f64 = 1.0e-6;
/// One full wrap of the 32 bit time scaler, in seconds
pub const SCALER_WRAP_PERIOD: f64 = 4294967296.0 * MICROSECONDS_TO_SECONDS;
/// A scaler reading this far (seconds) behind the running total is taken as a wrap
pub const SCALER_OVERFLOW_MARGIN: f64 = 1000.0;

// Rate monitor defaults (GV monitor)
pub const DEFAULT_RATE_WINDOW_COUNTS: usize = 5;
pub const DEFAULT_RATE_WINDOW_SECONDS: f64 = 5.0;

// Sis00 trigger flag bits
pub const SIS_SCINT_TRIGGER_MASK: u32 = 0b11;
pub const SIS_UCN_MON_BIT: u32 = 1 << 2;
pub const SIS_PULSER_BIT: u32 = 1 << 5;
pub const SIS_LED_BIT: u32 = 1 << 7;
pub const SIS_UCN_MON_FIRST_CHANNEL_BIT: u32 = 8;
pub const SIS_UCN_MON_MASK: u32 = SIS_UCN_MON_BIT | (0b1111 << SIS_UCN_MON_FIRST_CHANNEL_BIT);

// Header quality
pub const EXPECTED_BKHF: f32 = 17.0;

// Thresholds (channels above pedestal)
pub const PMT_FIRED_TDC_THRESHOLD: f64 = 5.0;
pub const PULSER_ADC_THRESHOLD: f64 = 200.0;
pub const PULSER_ADC_HIGH_THRESHOLD: f64 = 1500.0;

// Trigger efficiency histograms
pub const TRIG_EFFIC_N_BINS: usize = 125;
pub const TRIG_EFFIC_MIN: f64 = -50.0;
pub const TRIG_EFFIC_MAX: f64 = 200.0;
