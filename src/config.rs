use crate::curve::CurvePoint;
use crate::error::{ScheduleError, ScheduleResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub doses: Vec<DoseConfig>,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub min_offset_minutes: f64,
    pub optimal_offset_minutes: f64,
    /// Id of the dose whose administration starts this dose's clock.
    /// Absent on the chain's root dose.
    #[serde(default)]
    pub predecessor: Option<String>,
    /// Measured absorption profile. Absent means the dose is fully
    /// effective the moment it is reached.
    #[serde(default)]
    pub efficacy_points: Option<Vec<CurvePoint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub threshold_percent: f64,
    pub signal_mode: SignalMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 100.0,
            signal_mode: SignalMode::Repeating,
        }
    }
}

/// Whether an unacknowledged alarm keeps signalling on every tick or
/// signals only once per trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalMode {
    Repeating,
    SingleShot,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ScheduleResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        if self.doses.is_empty() {
            return Err(ScheduleError::InvalidChain(
                "at least one dose must be specified".to_string(),
            ));
        }

        self.validate_dose_graph()?;

        if !(0.0..=100.0).contains(&self.monitor.threshold_percent) {
            return Err(ScheduleError::Validation(format!(
                "alarm threshold {} outside [0, 100]",
                self.monitor.threshold_percent
            )));
        }

        Ok(())
    }

    fn validate_dose_graph(&self) -> ScheduleResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut roots = 0usize;

        for (index, dose) in self.doses.iter().enumerate() {
            if dose.id.is_empty() {
                return Err(ScheduleError::InvalidDose(
                    "dose id must not be empty".to_string(),
                ));
            }
            if !seen.insert(&dose.id) {
                return Err(ScheduleError::InvalidChain(format!(
                    "duplicate dose id: {}",
                    dose.id
                )));
            }

            match &dose.predecessor {
                None => roots += 1,
                Some(pred) => {
                    // Predecessors must be defined earlier in the chain,
                    // which also rules out cycles.
                    match self.doses.iter().position(|d| &d.id == pred) {
                        None => {
                            return Err(ScheduleError::InvalidChain(format!(
                                "dose {} references unknown predecessor {}",
                                dose.id, pred
                            )))
                        }
                        Some(p) if p >= index => {
                            return Err(ScheduleError::InvalidChain(format!(
                                "dose {} must come after its predecessor {}",
                                dose.id, pred
                            )))
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        if roots != 1 {
            return Err(ScheduleError::InvalidChain(format!(
                "expected exactly one root dose without a predecessor, found {}",
                roots
            )));
        }

        Ok(())
    }

    /// Built-in five-step morning regimen, used when no config file is
    /// supplied.
    pub fn default_regimen() -> Self {
        let point = |minutes: f64, percent: f64| CurvePoint { minutes, percent };
        Self {
            doses: vec![
                DoseConfig {
                    id: "batch1".to_string(),
                    name: "Vitamin Batch 1".to_string(),
                    description: "First batch, take with fat".to_string(),
                    min_offset_minutes: 30.0,
                    optimal_offset_minutes: 60.0,
                    predecessor: None,
                    efficacy_points: Some(vec![
                        point(30.0, 85.0),
                        point(45.0, 95.0),
                        point(60.0, 100.0),
                    ]),
                },
                DoseConfig {
                    id: "batch2".to_string(),
                    name: "Vitamin Batch 2".to_string(),
                    description: "Second batch".to_string(),
                    min_offset_minutes: 45.0,
                    optimal_offset_minutes: 90.0,
                    predecessor: Some("batch1".to_string()),
                    efficacy_points: Some(vec![
                        point(45.0, 70.0),
                        point(60.0, 80.0),
                        point(75.0, 90.0),
                        point(90.0, 100.0),
                    ]),
                },
                DoseConfig {
                    id: "mos".to_string(),
                    name: "MOS".to_string(),
                    description: "Mannan oligosaccharides".to_string(),
                    min_offset_minutes: 45.0,
                    optimal_offset_minutes: 90.0,
                    predecessor: Some("batch2".to_string()),
                    efficacy_points: Some(vec![
                        point(45.0, 75.0),
                        point(60.0, 85.0),
                        point(75.0, 92.0),
                        point(90.0, 100.0),
                    ]),
                },
                DoseConfig {
                    id: "chlorella".to_string(),
                    name: "Chlorella".to_string(),
                    description: "Most timing-sensitive binder".to_string(),
                    min_offset_minutes: 45.0,
                    optimal_offset_minutes: 90.0,
                    predecessor: Some("mos".to_string()),
                    efficacy_points: Some(vec![
                        point(45.0, 70.0),
                        point(60.0, 85.0),
                        point(75.0, 92.0),
                        point(90.0, 100.0),
                    ]),
                },
                DoseConfig {
                    id: "meal".to_string(),
                    name: "First Meal".to_string(),
                    description: "Safe immediately after the last binder".to_string(),
                    min_offset_minutes: 0.0,
                    optimal_offset_minutes: 0.0,
                    predecessor: Some("chlorella".to_string()),
                    efficacy_points: None,
                },
            ],
            monitor: MonitorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regimen_is_valid() {
        let config = Config::default_regimen();
        config.validate().unwrap();
        assert_eq!(config.doses.len(), 5);
        assert_eq!(config.monitor.threshold_percent, 100.0);
        assert_eq!(config.monitor.signal_mode, SignalMode::Repeating);
    }

    #[test]
    fn test_rejects_unknown_predecessor() {
        let mut config = Config::default_regimen();
        config.doses[1].predecessor = Some("nonexistent".to_string());
        assert!(matches!(
            config.validate(),
            Err(ScheduleError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_rejects_multiple_roots() {
        let mut config = Config::default_regimen();
        config.doses[2].predecessor = None;
        assert!(matches!(
            config.validate(),
            Err(ScheduleError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_rejects_cycle() {
        let mut config = Config::default_regimen();
        // Pointing an early dose at a later one breaks the walk order.
        config.doses[0].predecessor = Some("meal".to_string());
        config.doses[1].predecessor = None;
        assert!(matches!(
            config.validate(),
            Err(ScheduleError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut config = Config::default_regimen();
        config.doses[1].id = "batch1".to_string();
        assert!(matches!(
            config.validate(),
            Err(ScheduleError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = Config::default_regimen();
        config.monitor.threshold_percent = 120.0;
        assert!(matches!(
            config.validate(),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn test_parses_json_config() {
        let json = r#"{
            "doses": [
                {
                    "id": "a",
                    "name": "Dose A",
                    "min_offset_minutes": 0,
                    "optimal_offset_minutes": 30,
                    "efficacy_points": [
                        {"minutes": 0, "percent": 60},
                        {"minutes": 30, "percent": 100}
                    ]
                },
                {
                    "id": "b",
                    "name": "Dose B",
                    "min_offset_minutes": 15,
                    "optimal_offset_minutes": 15,
                    "predecessor": "a"
                }
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.doses[1].predecessor.as_deref(), Some("a"));
        assert!(config.doses[1].efficacy_points.is_none());
        assert_eq!(config.monitor.threshold_percent, 100.0);
    }
}
