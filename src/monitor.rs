use crate::chain::{ChainStatus, DoseChain};
use crate::config::{MonitorConfig, SignalMode};
use crate::error::{ScheduleError, ScheduleResult};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;

/// Alarm lifecycle of a single dose within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    /// Not the active dose; not eligible to trigger.
    NotArmed,
    /// Active and waiting for efficacy to cross the threshold.
    Armed,
    /// Already signalled; will not trigger again until re-armed.
    Triggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// First threshold crossing for this activation.
    Trigger,
    /// Ongoing unacknowledged alarm (repeating mode only).
    Repeat,
}

/// Abstract "alert the user" effect. The host decides what it means
/// (sound, OS notification); the engine never waits for it.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub dose_id: String,
    pub dose_name: String,
    pub efficacy_percent: u8,
    pub threshold_percent: f64,
}

/// Tick-driven threshold watcher for the active dose.
///
/// Holds no clock and no thread; the host calls [`check`](Self::check)
/// once per tick. Each dose triggers at most once per activation, and
/// re-arming happens only through explicit events: the dose becoming
/// active, or the threshold changing (which re-arms everything).
#[derive(Debug, Clone)]
pub struct ThresholdMonitor {
    threshold_percent: f64,
    signal_mode: SignalMode,
    triggered: HashSet<String>,
    /// Dose with an unacknowledged alarm, if any.
    signalling: Option<String>,
}

impl ThresholdMonitor {
    pub fn new(config: &MonitorConfig) -> ScheduleResult<Self> {
        Self::validate_threshold(config.threshold_percent)?;
        Ok(Self {
            threshold_percent: config.threshold_percent,
            signal_mode: config.signal_mode,
            triggered: HashSet::new(),
            signalling: None,
        })
    }

    fn validate_threshold(percent: f64) -> ScheduleResult<()> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(ScheduleError::Validation(format!(
                "alarm threshold {} outside [0, 100]",
                percent
            )));
        }
        Ok(())
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn signal_mode(&self) -> SignalMode {
        self.signal_mode
    }

    /// Change the alarm threshold. Re-arms every dose and silences any
    /// alarm in progress, so the new threshold can fire afresh.
    pub fn set_threshold(&mut self, percent: f64) -> ScheduleResult<()> {
        Self::validate_threshold(percent)?;
        info!(
            "alarm threshold changed {} -> {}, re-arming all doses",
            self.threshold_percent, percent
        );
        self.threshold_percent = percent;
        self.triggered.clear();
        self.signalling = None;
        Ok(())
    }

    /// Clear a dose's triggered flag so it may alarm again. Invoked when
    /// the dose becomes the active one.
    pub fn rearm(&mut self, dose_id: &str) {
        self.triggered.remove(dose_id);
        if self.signalling.as_deref() == Some(dose_id) {
            self.signalling = None;
        }
    }

    /// Stop the outstanding alarm for a dose (user took it or dismissed
    /// the alert). The triggered flag stays set.
    pub fn acknowledge(&mut self, dose_id: &str) {
        if self.signalling.as_deref() == Some(dose_id) {
            debug!("alarm for {} acknowledged", dose_id);
            self.signalling = None;
        }
    }

    /// Forget all per-run state (new sequence or abandonment).
    pub fn reset(&mut self) {
        self.triggered.clear();
        self.signalling = None;
    }

    pub fn alarm_state(&self, chain: &DoseChain, dose_id: &str) -> AlarmState {
        if self.triggered.contains(dose_id) {
            return AlarmState::Triggered;
        }
        match chain.active_dose() {
            Some(active) if active.id == dose_id => AlarmState::Armed,
            _ => AlarmState::NotArmed,
        }
    }

    /// One tick: evaluate the active dose's efficacy against the
    /// threshold. Returns the signal to deliver, if any.
    pub fn check(&mut self, chain: &DoseChain, now: DateTime<Utc>) -> ScheduleResult<Option<Signal>> {
        let active = match chain.status() {
            ChainStatus::Active(index) => &chain.doses()[index],
            _ => return Ok(None),
        };

        let elapsed = match chain.elapsed_minutes(&active.id, now)? {
            Some(elapsed) => elapsed,
            // Anchor unresolved; dose not yet active in time.
            None => return Ok(None),
        };
        let efficacy = active.curve.efficacy_at(elapsed);

        if !self.triggered.contains(&active.id) {
            if f64::from(efficacy) >= self.threshold_percent {
                info!(
                    "{} reached {}% efficacy (threshold {}%), triggering alarm",
                    active.name, efficacy, self.threshold_percent
                );
                self.triggered.insert(active.id.clone());
                self.signalling = Some(active.id.clone());
                return Ok(Some(Signal {
                    kind: SignalKind::Trigger,
                    dose_id: active.id.clone(),
                    dose_name: active.name.clone(),
                    efficacy_percent: efficacy,
                    threshold_percent: self.threshold_percent,
                }));
            }
            return Ok(None);
        }

        // Already triggered: keep nudging the host until acknowledged,
        // unless configured single-shot.
        if self.signal_mode == SignalMode::Repeating
            && self.signalling.as_deref() == Some(active.id.as_str())
        {
            return Ok(Some(Signal {
                kind: SignalKind::Repeat,
                dose_id: active.id.clone(),
                dose_name: active.name.clone(),
                efficacy_percent: efficacy,
                threshold_percent: self.threshold_percent,
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DoseConfig};
    use crate::curve::CurvePoint;
    use chrono::{Duration, TimeZone};

    fn one_dose_config(signal_mode: SignalMode) -> Config {
        Config {
            doses: vec![DoseConfig {
                id: "a".to_string(),
                name: "Dose A".to_string(),
                description: String::new(),
                min_offset_minutes: 0.0,
                optimal_offset_minutes: 30.0,
                predecessor: None,
                efficacy_points: Some(vec![
                    CurvePoint {
                        minutes: 0.0,
                        percent: 60.0,
                    },
                    CurvePoint {
                        minutes: 10.0,
                        percent: 75.0,
                    },
                    CurvePoint {
                        minutes: 20.0,
                        percent: 88.0,
                    },
                    CurvePoint {
                        minutes: 30.0,
                        percent: 100.0,
                    },
                ]),
            }],
            monitor: MonitorConfig {
                threshold_percent: 100.0,
                signal_mode,
            },
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_triggers_exactly_once_at_threshold() {
        let config = one_dose_config(SignalMode::SingleShot);
        let mut chain = DoseChain::from_config(&config).unwrap();
        let mut monitor = ThresholdMonitor::new(&config.monitor).unwrap();
        chain.start(t0());

        // 99% at 29 minutes: below the 100% threshold.
        let early = monitor.check(&chain, t0() + Duration::minutes(29)).unwrap();
        assert!(early.is_none());

        let fired = monitor
            .check(&chain, t0() + Duration::minutes(30))
            .unwrap()
            .unwrap();
        assert_eq!(fired.kind, SignalKind::Trigger);
        assert_eq!(fired.dose_id, "a");
        assert_eq!(fired.efficacy_percent, 100);

        // Single-shot: later ticks stay quiet.
        let again = monitor.check(&chain, t0() + Duration::minutes(31)).unwrap();
        assert!(again.is_none());
        assert_eq!(monitor.alarm_state(&chain, "a"), AlarmState::Triggered);
    }

    #[test]
    fn test_repeating_mode_signals_until_acknowledged() {
        let config = one_dose_config(SignalMode::Repeating);
        let mut chain = DoseChain::from_config(&config).unwrap();
        let mut monitor = ThresholdMonitor::new(&config.monitor).unwrap();
        chain.start(t0());

        let fired = monitor
            .check(&chain, t0() + Duration::minutes(30))
            .unwrap()
            .unwrap();
        assert_eq!(fired.kind, SignalKind::Trigger);

        let nudge = monitor
            .check(&chain, t0() + Duration::minutes(31))
            .unwrap()
            .unwrap();
        assert_eq!(nudge.kind, SignalKind::Repeat);

        monitor.acknowledge("a");
        let after = monitor.check(&chain, t0() + Duration::minutes(32)).unwrap();
        assert!(after.is_none());
    }

    #[test]
    fn test_threshold_change_rearms_and_refires() {
        let config = one_dose_config(SignalMode::SingleShot);
        let mut chain = DoseChain::from_config(&config).unwrap();
        let mut monitor = ThresholdMonitor::new(&config.monitor).unwrap();
        chain.start(t0());

        monitor
            .check(&chain, t0() + Duration::minutes(30))
            .unwrap()
            .unwrap();
        assert_eq!(monitor.alarm_state(&chain, "a"), AlarmState::Triggered);

        // Lowering the threshold re-arms; efficacy 100 >= 50 fires again
        // on the very next tick.
        monitor.set_threshold(50.0).unwrap();
        assert_eq!(monitor.alarm_state(&chain, "a"), AlarmState::Armed);
        let refired = monitor
            .check(&chain, t0() + Duration::minutes(31))
            .unwrap()
            .unwrap();
        assert_eq!(refired.kind, SignalKind::Trigger);
    }

    #[test]
    fn test_no_signal_before_start_or_after_administration() {
        let config = one_dose_config(SignalMode::Repeating);
        let mut chain = DoseChain::from_config(&config).unwrap();
        let mut monitor = ThresholdMonitor::new(&config.monitor).unwrap();

        assert!(monitor.check(&chain, t0()).unwrap().is_none());

        chain.start(t0());
        monitor
            .check(&chain, t0() + Duration::minutes(30))
            .unwrap()
            .unwrap();

        chain.administer("a", t0() + Duration::minutes(31)).unwrap();
        monitor.acknowledge("a");
        // Chain completed, nothing left to watch.
        assert!(monitor
            .check(&chain, t0() + Duration::minutes(40))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_invalid_threshold_rejected_without_state_change() {
        let config = one_dose_config(SignalMode::Repeating);
        let mut monitor = ThresholdMonitor::new(&config.monitor).unwrap();

        assert!(matches!(
            monitor.set_threshold(150.0),
            Err(ScheduleError::Validation(_))
        ));
        assert_eq!(monitor.threshold_percent(), 100.0);
    }
}
