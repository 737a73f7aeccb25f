use crate::chain::DoseChain;
use crate::curve::round_half_up;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Predicted administration time for one dose under a what-if target
/// efficiency.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedDose {
    pub dose_id: String,
    pub predicted_at: DateTime<Utc>,
}

/// Hypothetical schedule assuming every dose is taken the moment its
/// predecessor reaches `target_percent` efficacy.
///
/// The root dose is predicted exactly at the chain's anchor; each later
/// dose follows its predecessor by the predecessor's wait time. Doses
/// without an efficacy curve contribute a fixed `min_offset_minutes` wait
/// instead and are not affected by the target. This is a pure simulation:
/// actual administration history is ignored. Empty until the sequence has
/// been started (no anchor).
pub fn project(chain: &DoseChain, target_percent: f64) -> Vec<ProjectedDose> {
    let anchor = match chain.anchor_time() {
        Some(anchor) => anchor,
        None => return Vec::new(),
    };

    let mut predicted: HashMap<&str, DateTime<Utc>> = HashMap::new();
    let mut schedule = Vec::with_capacity(chain.doses().len());

    for dose in chain.doses() {
        let at = match &dose.predecessor {
            None => anchor,
            Some(pred_id) => {
                // Predecessors always precede their dependents in chain
                // order, so the lookup cannot miss.
                let pred_at = predicted[pred_id.as_str()];
                let pred = chain
                    .doses()
                    .iter()
                    .find(|d| &d.id == pred_id)
                    .expect("validated at construction");
                let wait_minutes = if pred.curve.has_points() {
                    pred.curve.time_for_efficacy(target_percent)
                } else {
                    round_half_up(pred.min_offset_minutes) as i64
                };
                pred_at + Duration::minutes(wait_minutes)
            }
        };
        predicted.insert(dose.id.as_str(), at);
        schedule.push(ProjectedDose {
            dose_id: dose.id.clone(),
            predicted_at: at,
        });
    }

    schedule
}

/// Predicted time of the chain's final dose (the downstream milestone,
/// e.g. earliest safe meal), or `None` before the sequence starts.
pub fn milestone(chain: &DoseChain, target_percent: f64) -> Option<DateTime<Utc>> {
    project(chain, target_percent)
        .last()
        .map(|p| p.predicted_at)
}

/// Heuristic remaining wait before a meal: the base wait shrinks as the
/// current dose's efficiency rises, scaled by how much of the medication's
/// effect is still outstanding.
pub fn meal_offset_minutes(
    efficiency_percent: f64,
    remaining_fraction: f64,
    base_wait_minutes: f64,
) -> i64 {
    let eff_fraction = efficiency_percent / 100.0;
    let remaining = base_wait_minutes * (1.0 - eff_fraction * remaining_fraction);
    (round_half_up(remaining) as i64).max(0)
}
