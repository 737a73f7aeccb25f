//! Daily fiber intake arithmetic for the binder protocol: weighted sum of
//! supplement servings plus a tier classification of the total.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
pub struct FiberCounts {
    pub protein_shakes: u32,
    pub phgg: u32,
    pub chia_seeds: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct FiberWeights {
    pub protein_shake_grams: f64,
    pub phgg_grams: f64,
    pub chia_seed_grams: f64,
}

impl Default for FiberWeights {
    fn default() -> Self {
        Self {
            protein_shake_grams: 5.0,
            phgg_grams: 5.0,
            chia_seed_grams: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FiberEffectiveness {
    pub level: &'static str,
    pub description: &'static str,
}

pub fn total_grams(counts: FiberCounts, weights: FiberWeights) -> f64 {
    f64::from(counts.protein_shakes) * weights.protein_shake_grams
        + f64::from(counts.phgg) * weights.phgg_grams
        + f64::from(counts.chia_seeds) * weights.chia_seed_grams
}

/// Classify a daily fiber total. Breakpoints are inclusive lower bounds:
/// exactly 5 g is already Minimal, exactly 35 g already Excellent.
pub fn effectiveness(total_grams: f64) -> FiberEffectiveness {
    let tier = |level, description| FiberEffectiveness { level, description };
    if total_grams < 5.0 {
        tier("None", "Not enough fiber. Aim for at least 5g.")
    } else if total_grams < 10.0 {
        tier(
            "Minimal",
            "Barely moves stool. High chance toxins sit longer. ~10-20% effective for clearance.",
        )
    } else if total_grams < 15.0 {
        tier(
            "Slight",
            "Slight help. Still slow transit for most people. ~30% effective.",
        )
    } else if total_grams < 20.0 {
        tier(
            "Starting",
            "Minimum where things start working. Some benefit. ~50% effective.",
        )
    } else if total_grams < 25.0 {
        tier(
            "Decent",
            "Decent. Many people okay here. Still suboptimal with binders. ~65-70%.",
        )
    } else if total_grams < 30.0 {
        tier("Solid", "Solid baseline. Low reabsorption risk. ~80%.")
    } else if total_grams < 35.0 {
        tier(
            "Sweet Spot",
            "Sweet spot for most. Good speed, good consistency. ~90%.",
        )
    } else {
        tier(
            "Excellent",
            "Still good if tolerated. Marginal gains over 30 g. ~92-95%.",
        )
    }
}
