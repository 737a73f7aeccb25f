//! Medication timing alarm engine.
//!
//! Models a chain of dependent doses, each with an absorption/efficacy
//! curve over elapsed time, and derives from it when to alarm (threshold
//! crossing on the active dose) and what-if schedules at a target
//! efficiency. Single-threaded and tick-driven: the host supplies the
//! clock and the tick cadence.

pub mod chain;
pub mod clock;
pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod fiber;
pub mod monitor;
pub mod projector;

pub use chain::{ChainStatus, Dose, DoseChain};
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::{Config, DoseConfig, MonitorConfig, SignalMode};
pub use curve::{CurvePoint, EfficacyCurve};
pub use engine::{AlarmEngine, DoseStatus, EngineSnapshot};
pub use error::{ScheduleError, ScheduleResult};
pub use monitor::{AlarmState, Signal, SignalKind, ThresholdMonitor};
pub use projector::ProjectedDose;
