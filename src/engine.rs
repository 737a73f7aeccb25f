use crate::chain::{ChainStatus, DoseChain};
use crate::clock::{SystemClock, TimeSource};
use crate::config::Config;
use crate::error::{ScheduleError, ScheduleResult};
use crate::monitor::{AlarmState, Signal, ThresholdMonitor};
use crate::projector::{self, ProjectedDose};
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::Serialize;

type SignalHandler = Box<dyn FnMut(&Signal)>;

/// Host-facing facade over one medication sequence run: owns the chain,
/// the threshold monitor, and the time source. The host supplies the tick
/// cadence; the engine never spawns threads or timers of its own.
pub struct AlarmEngine {
    chain: DoseChain,
    monitor: ThresholdMonitor,
    clock: Box<dyn TimeSource>,
    on_signal: Option<SignalHandler>,
}

/// Read-only state for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub started: bool,
    pub completed: bool,
    pub active_dose_id: Option<String>,
    /// Elapsed minutes of the active dose, if its anchor is resolved.
    pub elapsed_minutes: Option<f64>,
    /// Current efficacy of the active dose.
    pub efficacy_percent: Option<u8>,
    pub threshold_percent: f64,
    pub doses: Vec<DoseStatus>,
    pub projected: Vec<ProjectedDose>,
    pub milestone_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoseStatus {
    pub id: String,
    pub name: String,
    pub alarm_state: AlarmState,
    pub administered_at: Option<DateTime<Utc>>,
    /// Frozen at the administration time once the dose is taken.
    pub elapsed_minutes: Option<f64>,
    pub efficacy_percent: Option<u8>,
}

impl AlarmEngine {
    pub fn new(config: &Config) -> ScheduleResult<Self> {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Box<dyn TimeSource>) -> ScheduleResult<Self> {
        Ok(Self {
            chain: DoseChain::from_config(config)?,
            monitor: ThresholdMonitor::new(&config.monitor)?,
            clock,
            on_signal: None,
        })
    }

    /// Register the abstract "alert the user" effect. Fire-and-forget:
    /// the engine never waits on the host's handling.
    pub fn on_signal(&mut self, handler: SignalHandler) {
        self.on_signal = Some(handler);
    }

    pub fn chain(&self) -> &DoseChain {
        &self.chain
    }

    pub fn threshold_percent(&self) -> f64 {
        self.monitor.threshold_percent()
    }

    /// Begin a new run anchored at `anchor` (or "now" if omitted). Any
    /// previous run's history and alarm state are discarded.
    pub fn start_sequence(&mut self, anchor: Option<DateTime<Utc>>) {
        let anchor = anchor.unwrap_or_else(|| self.clock.now());
        info!("sequence started, anchored at {}", anchor);
        self.chain.start(anchor);
        self.monitor.reset();
    }

    /// End the run. The host's tick loop should observe
    /// [`is_running`](Self::is_running) and release its timer.
    pub fn abandon(&mut self) {
        info!("sequence abandoned");
        self.chain.reset();
        self.monitor.reset();
    }

    /// True while a started sequence still has pending doses.
    pub fn is_running(&self) -> bool {
        matches!(self.chain.status(), ChainStatus::Active(_))
    }

    /// Mark a dose taken at `at` (or "now"). Silences its alarm and arms
    /// the next dose in the chain.
    pub fn administer_dose(&mut self, id: &str, at: Option<DateTime<Utc>>) -> ScheduleResult<()> {
        let at = at.unwrap_or_else(|| self.clock.now());
        self.chain.administer(id, at)?;
        self.monitor.acknowledge(id);
        if let Some(next) = self.chain.active_dose() {
            let next_id = next.id.clone();
            self.monitor.rearm(&next_id);
        }
        Ok(())
    }

    /// Backdated administration: taken `minutes_ago` before the current
    /// clock reading.
    pub fn administer_dose_ago(&mut self, id: &str, minutes_ago: f64) -> ScheduleResult<()> {
        if minutes_ago < 0.0 {
            return Err(ScheduleError::Validation(format!(
                "minutes ago must be non-negative, got {}",
                minutes_ago
            )));
        }
        let millis = (minutes_ago * 60_000.0).round() as i64;
        let at = self.clock.now() - Duration::milliseconds(millis);
        self.administer_dose(id, Some(at))
    }

    /// Reconfigure the alarm threshold; re-arms all doses (monitor-wide).
    pub fn set_alarm_threshold(&mut self, percent: f64) -> ScheduleResult<()> {
        self.monitor.set_threshold(percent)
    }

    /// One tick of the cooperative loop: re-read the clock, evaluate the
    /// active dose, dispatch any signal to the registered handler. Also
    /// returns the signal so hosts without a handler can react inline.
    pub fn tick(&mut self) -> ScheduleResult<Option<Signal>> {
        let now = self.clock.now();
        let signal = self.monitor.check(&self.chain, now)?;
        if let (Some(signal), Some(handler)) = (&signal, self.on_signal.as_mut()) {
            handler(signal);
        }
        Ok(signal)
    }

    /// What-if schedule at a target efficiency (see [`projector::project`]).
    pub fn projection(&self, target_percent: f64) -> Vec<ProjectedDose> {
        projector::project(&self.chain, target_percent)
    }

    pub fn snapshot(&self) -> ScheduleResult<EngineSnapshot> {
        let now = self.clock.now();
        let status = self.chain.status();
        let active = self.chain.active_dose();

        let (active_dose_id, elapsed_minutes, efficacy_percent) = match active {
            Some(dose) => {
                let elapsed = self.chain.elapsed_minutes(&dose.id, now)?;
                let efficacy = elapsed.map(|e| dose.curve.efficacy_at(e));
                (Some(dose.id.clone()), elapsed, efficacy)
            }
            None => (None, None, None),
        };

        let mut doses = Vec::with_capacity(self.chain.doses().len());
        for dose in self.chain.doses() {
            let administered_at = self.chain.administered_at(&dose.id);
            // History freezes at the administration time.
            let as_of = administered_at.unwrap_or(now);
            let elapsed = self.chain.elapsed_minutes(&dose.id, as_of)?;
            doses.push(DoseStatus {
                id: dose.id.clone(),
                name: dose.name.clone(),
                alarm_state: self.monitor.alarm_state(&self.chain, &dose.id),
                administered_at,
                elapsed_minutes: elapsed,
                efficacy_percent: elapsed.map(|e| dose.curve.efficacy_at(e)),
            });
        }

        let target = self.monitor.threshold_percent();
        Ok(EngineSnapshot {
            started: status != ChainStatus::NotStarted,
            completed: status == ChainStatus::Completed,
            active_dose_id,
            elapsed_minutes,
            efficacy_percent,
            threshold_percent: target,
            projected: projector::project(&self.chain, target),
            milestone_at: projector::milestone(&self.chain, target),
            doses,
        })
    }
}
