use crate::config::{Config, DoseConfig};
use crate::curve::EfficacyCurve;
use crate::error::{ScheduleError, ScheduleResult};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;

/// Immutable definition of one step in an administration sequence.
#[derive(Debug, Clone)]
pub struct Dose {
    pub id: String,
    pub name: String,
    pub description: String,
    pub min_offset_minutes: f64,
    pub optimal_offset_minutes: f64,
    pub predecessor: Option<String>,
    pub curve: EfficacyCurve,
}

impl Dose {
    fn from_config(config: &DoseConfig) -> ScheduleResult<Self> {
        let curve = EfficacyCurve::new(
            config.efficacy_points.clone(),
            config.min_offset_minutes,
            config.optimal_offset_minutes,
        )?;
        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            min_offset_minutes: config.min_offset_minutes,
            optimal_offset_minutes: config.optimal_offset_minutes,
            predecessor: config.predecessor.clone(),
            curve,
        })
    }
}

/// Position of a running sequence within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    NotStarted,
    /// Index of the first dose without an administration record.
    Active(usize),
    Completed,
}

/// Ordered sequence of dependent doses for one run.
///
/// Each dose's clock starts at its anchor: the chain's anchor time for the
/// root dose, or the predecessor's actual administration time otherwise.
#[derive(Debug, Clone)]
pub struct DoseChain {
    doses: Vec<Dose>,
    anchor_time: Option<DateTime<Utc>>,
    administered: HashMap<String, DateTime<Utc>>,
}

impl DoseChain {
    pub fn from_config(config: &Config) -> ScheduleResult<Self> {
        config.validate()?;
        let doses = config
            .doses
            .iter()
            .map(Dose::from_config)
            .collect::<ScheduleResult<Vec<_>>>()?;
        Ok(Self {
            doses,
            anchor_time: None,
            administered: HashMap::new(),
        })
    }

    pub fn doses(&self) -> &[Dose] {
        &self.doses
    }

    pub fn dose(&self, id: &str) -> ScheduleResult<&Dose> {
        self.doses
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| ScheduleError::UnknownDose(id.to_string()))
    }

    pub fn anchor_time(&self) -> Option<DateTime<Utc>> {
        self.anchor_time
    }

    pub fn administered_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.administered.get(id).copied()
    }

    /// Begin a new run. Clears all administration records from any
    /// previous run.
    pub fn start(&mut self, anchor: DateTime<Utc>) {
        debug!("starting sequence anchored at {}", anchor);
        self.anchor_time = Some(anchor);
        self.administered.clear();
    }

    /// End the current run and discard its history.
    pub fn reset(&mut self) {
        self.anchor_time = None;
        self.administered.clear();
    }

    /// Absolute time the dose's clock starts from, or `None` while it
    /// cannot be determined yet (sequence not started, or predecessor not
    /// administered).
    pub fn resolve_anchor(&self, id: &str) -> ScheduleResult<Option<DateTime<Utc>>> {
        let dose = self.dose(id)?;
        Ok(match &dose.predecessor {
            None => self.anchor_time,
            Some(pred) => self.administered.get(pred).copied(),
        })
    }

    /// Fractional minutes since the dose's anchor as of `as_of`, or `None`
    /// while the anchor is unresolved. A negative value means `as_of`
    /// precedes the anchor.
    pub fn elapsed_minutes(&self, id: &str, as_of: DateTime<Utc>) -> ScheduleResult<Option<f64>> {
        let anchor = match self.resolve_anchor(id)? {
            Some(anchor) => anchor,
            None => return Ok(None),
        };
        let millis = (as_of - anchor).num_milliseconds() as f64;
        Ok(Some(millis / 60_000.0))
    }

    /// Record that a dose was actually taken at `at`.
    ///
    /// Permissive by design: overwriting an earlier record or backdating
    /// before the dose's anchor is recorded anyway, but flagged as a data
    /// inconsistency.
    pub fn administer(&mut self, id: &str, at: DateTime<Utc>) -> ScheduleResult<()> {
        let dose = self.dose(id)?;
        let name = dose.name.clone();

        if let Some(previous) = self.administered.get(id) {
            warn!(
                "overwriting administration time for {} ({} -> {})",
                name, previous, at
            );
        }
        if let Some(anchor) = self.resolve_anchor(id)? {
            if at < anchor {
                warn!(
                    "{} administered at {}, before its anchor {}",
                    name, at, anchor
                );
            }
        }

        debug!("{} administered at {}", name, at);
        self.administered.insert(id.to_string(), at);
        Ok(())
    }

    /// The currently pending dose: first in chain order without an
    /// administration record.
    pub fn status(&self) -> ChainStatus {
        if self.anchor_time.is_none() {
            return ChainStatus::NotStarted;
        }
        match self
            .doses
            .iter()
            .position(|d| !self.administered.contains_key(&d.id))
        {
            Some(index) => ChainStatus::Active(index),
            None => ChainStatus::Completed,
        }
    }

    pub fn active_dose(&self) -> Option<&Dose> {
        match self.status() {
            ChainStatus::Active(index) => self.doses.get(index),
            _ => None,
        }
    }
}
