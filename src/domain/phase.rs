//! Economic cycle phases and the per-phase score vector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the four canonical macroeconomic regimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Expansion,
    Peak,
    Contraction,
    Recovery,
}

/// Priority used to break exact score ties, highest first.
pub const TIE_BREAK_ORDER: [Phase; 4] = [
    Phase::Expansion,
    Phase::Recovery,
    Phase::Peak,
    Phase::Contraction,
];

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Expansion,
        Phase::Peak,
        Phase::Contraction,
        Phase::Recovery,
    ];

    /// Lowercase key used in configuration section and value names.
    pub fn key(&self) -> &'static str {
        match self {
            Phase::Expansion => "expansion",
            Phase::Peak => "peak",
            Phase::Contraction => "contraction",
            Phase::Recovery => "recovery",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Expansion => "EXPANSION",
            Phase::Peak => "PEAK",
            Phase::Contraction => "CONTRACTION",
            Phase::Recovery => "RECOVERY",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expansion" => Ok(Phase::Expansion),
            "peak" => Ok(Phase::Peak),
            "contraction" => Ok(Phase::Contraction),
            "recovery" => Ok(Phase::Recovery),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// Accumulated non-negative score per phase.
///
/// Every phase is always present, so lookups never miss.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PhaseScoreVector(BTreeMap<Phase, f64>);

impl PhaseScoreVector {
    pub fn zero() -> Self {
        Self(Phase::ALL.iter().map(|p| (*p, 0.0)).collect())
    }

    /// Build a vector from explicit pairs; phases not listed score zero.
    pub fn from_pairs(pairs: &[(Phase, f64)]) -> Self {
        let mut vector = Self::zero();
        for (phase, score) in pairs {
            vector.add(*phase, *score);
        }
        vector
    }

    pub(crate) fn add(&mut self, phase: Phase, weight: f64) {
        if weight.is_finite() && weight > 0.0 {
            *self.0.entry(phase).or_insert(0.0) += weight;
        }
    }

    pub fn get(&self, phase: Phase) -> f64 {
        self.0.get(&phase).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Phase with the strictly greatest score, ties resolved by [`TIE_BREAK_ORDER`].
    pub fn winner(&self) -> Phase {
        let mut best = TIE_BREAK_ORDER[0];
        for phase in TIE_BREAK_ORDER.iter().skip(1) {
            if self.get(*phase) > self.get(best) {
                best = *phase;
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, f64)> + '_ {
        self.0.iter().map(|(p, s)| (*p, *s))
    }
}
