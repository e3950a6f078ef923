//! Market-timing score.
//!
//! Each term maps its input through a step table to a raw contribution in
//! `[-100, 100]`, scaled by the term weight. Absent inputs are skipped and do
//! not appear in `contributing_terms`. The sum is clipped to `[-100, 100]`.

use crate::domain::cycle::CycleResult;
use crate::domain::phase::Phase;
use crate::domain::step_table::StepTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub const SCORE_MIN: f64 = -100.0;
pub const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    StrongSell,
    Sell,
    Neutral,
    Buy,
    StrongBuy,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Band::StrongSell => "STRONG_SELL",
            Band::Sell => "SELL",
            Band::Neutral => "NEUTRAL",
            Band::Buy => "BUY",
            Band::StrongBuy => "STRONG_BUY",
        };
        write!(f, "{label}")
    }
}

/// Lower bounds (inclusive) of the SELL, NEUTRAL, BUY and STRONG_BUY bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandThresholds {
    pub sell: f64,
    pub neutral: f64,
    pub buy: f64,
    pub strong_buy: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            sell: -70.0,
            neutral: -30.0,
            buy: 30.0,
            strong_buy: 70.0,
        }
    }
}

impl BandThresholds {
    pub fn band(&self, score: f64) -> Band {
        if score >= self.strong_buy {
            Band::StrongBuy
        } else if score >= self.buy {
            Band::Buy
        } else if score >= self.neutral {
            Band::Neutral
        } else if score >= self.sell {
            Band::Sell
        } else {
            Band::StrongSell
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.sell < self.neutral && self.neutral < self.buy && self.buy < self.strong_buy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingTerm {
    Cycle,
    Valuation,
    Momentum,
    SovereignRisk,
    Liquidity,
}

impl TimingTerm {
    pub const ALL: [TimingTerm; 5] = [
        TimingTerm::Cycle,
        TimingTerm::Valuation,
        TimingTerm::Momentum,
        TimingTerm::SovereignRisk,
        TimingTerm::Liquidity,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            TimingTerm::Cycle => "cycle",
            TimingTerm::Valuation => "valuation",
            TimingTerm::Momentum => "momentum",
            TimingTerm::SovereignRisk => "sovereign_risk",
            TimingTerm::Liquidity => "liquidity",
        }
    }
}

impl fmt::Display for TimingTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingWeights {
    pub cycle: f64,
    pub valuation: f64,
    pub momentum: f64,
    pub sovereign_risk: f64,
    pub liquidity: f64,
}

impl Default for TimingWeights {
    fn default() -> Self {
        Self {
            cycle: 0.30,
            valuation: 0.25,
            momentum: 0.20,
            sovereign_risk: 0.15,
            liquidity: 0.10,
        }
    }
}

impl TimingWeights {
    pub fn get(&self, term: TimingTerm) -> f64 {
        match term {
            TimingTerm::Cycle => self.cycle,
            TimingTerm::Valuation => self.valuation,
            TimingTerm::Momentum => self.momentum,
            TimingTerm::SovereignRisk => self.sovereign_risk,
            TimingTerm::Liquidity => self.liquidity,
        }
    }
}

/// Raw cycle contribution per phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleValues {
    pub expansion: f64,
    pub peak: f64,
    pub contraction: f64,
    pub recovery: f64,
}

impl Default for CycleValues {
    fn default() -> Self {
        Self {
            expansion: 200.0 / 3.0,
            peak: -200.0 / 3.0,
            contraction: -100.0,
            recovery: 100.0,
        }
    }
}

impl CycleValues {
    pub fn get(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Expansion => self.expansion,
            Phase::Peak => self.peak,
            Phase::Contraction => self.contraction,
            Phase::Recovery => self.recovery,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    pub weights: TimingWeights,
    pub bands: BandThresholds,
    pub cycle_values: CycleValues,
    /// Equity risk premium, percent.
    pub premium: StepTable,
    /// Sovereign CDS, basis points.
    pub sovereign_risk: StepTable,
    /// Policy rate, percent.
    pub liquidity: StepTable,
    /// Equity index change, percent.
    pub momentum: StepTable,
    /// Observations of the equity index spanned by the derived momentum.
    pub momentum_lookback: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            weights: TimingWeights::default(),
            bands: BandThresholds::default(),
            cycle_values: CycleValues::default(),
            premium: StepTable::above(
                &[
                    (5.0, 100.0),
                    (3.0, 75.0),
                    (1.0, 25.0),
                    (-1.0, 0.0),
                    (-3.0, -25.0),
                    (-5.0, -75.0),
                ],
                -100.0,
            ),
            sovereign_risk: StepTable::below(&[(150.0, 100.0), (250.0, 50.0), (350.0, -50.0)], -100.0),
            liquidity: StepTable::below(&[(6.0, 100.0), (9.0, 50.0), (12.0, -50.0)], -100.0),
            momentum: StepTable::above(
                &[(5.0, 100.0), (2.0, 50.0), (-2.0, 0.0), (-5.0, -50.0)],
                -100.0,
            ),
            momentum_lookback: 21,
        }
    }
}

/// Scalar inputs of the timing score. `None` marks an unavailable signal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TimingInputs {
    pub valuation_premium: Option<f64>,
    pub sovereign_risk_level: Option<f64>,
    pub policy_rate_level: Option<f64>,
    pub momentum: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TermContribution {
    pub term: TimingTerm,
    /// Step-table output before weighting.
    pub raw: f64,
    pub weighted_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingResult {
    pub score: f64,
    pub band: Band,
    pub contributing_terms: Vec<TermContribution>,
}

impl TimingResult {
    pub fn contribution(&self, term: TimingTerm) -> Option<f64> {
        self.contributing_terms
            .iter()
            .find(|c| c.term == term)
            .map(|c| c.weighted_contribution)
    }
}

/// Score market timing. Never fails.
pub fn score(cycle: &CycleResult, inputs: &TimingInputs, config: &TimingConfig) -> TimingResult {
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());

    // A phase picked by fallback carries no information.
    let cycle_raw = if cycle.confidence > 0.0 {
        Some(config.cycle_values.get(cycle.phase))
    } else {
        None
    };

    let raws = [
        (TimingTerm::Cycle, cycle_raw),
        (
            TimingTerm::Valuation,
            finite(inputs.valuation_premium).map(|v| config.premium.lookup(v)),
        ),
        (
            TimingTerm::Momentum,
            finite(inputs.momentum).map(|v| config.momentum.lookup(v)),
        ),
        (
            TimingTerm::SovereignRisk,
            finite(inputs.sovereign_risk_level).map(|v| config.sovereign_risk.lookup(v)),
        ),
        (
            TimingTerm::Liquidity,
            finite(inputs.policy_rate_level).map(|v| config.liquidity.lookup(v)),
        ),
    ];

    let contributing_terms: Vec<TermContribution> = raws
        .into_iter()
        .filter_map(|(term, raw)| {
            let raw = raw?.clamp(SCORE_MIN, SCORE_MAX);
            Some(TermContribution {
                term,
                raw,
                weighted_contribution: raw * config.weights.get(term),
            })
        })
        .collect();

    let sum: f64 = contributing_terms
        .iter()
        .map(|c| c.weighted_contribution)
        .sum();
    let score = sum.clamp(SCORE_MIN, SCORE_MAX);
    let band = config.bands.band(score);

    debug!(score, %band, terms = contributing_terms.len(), "timing scored");

    TimingResult {
        score,
        band,
        contributing_terms,
    }
}

/// Percent change of the index over `lookback` observations.
pub fn momentum_from_index(history: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || history.len() <= lookback {
        return None;
    }
    let latest = history[history.len() - 1];
    let base = history[history.len() - 1 - lookback];
    if base <= 0.0 {
        return None;
    }
    Some((latest / base - 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::phase::PhaseScoreVector;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn cycle(phase: Phase, confidence: f64) -> CycleResult {
        CycleResult {
            phase,
            confidence,
            score_vector: PhaseScoreVector::from_pairs(&[(phase, confidence)]),
            phase_detail: BTreeMap::new(),
        }
    }

    #[test]
    fn all_absent_is_neutral_zero() {
        let result = score(
            &cycle(Phase::Expansion, 0.0),
            &TimingInputs::default(),
            &TimingConfig::default(),
        );
        assert_eq!(result.score, 0.0);
        assert_eq!(result.band, Band::Neutral);
        assert!(result.contributing_terms.is_empty());
    }

    #[test]
    fn cycle_term_uses_phase_value() {
        let result = score(
            &cycle(Phase::Recovery, 60.0),
            &TimingInputs::default(),
            &TimingConfig::default(),
        );
        assert_relative_eq!(result.score, 30.0);
        assert_eq!(result.band, Band::Buy);
        assert_eq!(result.contributing_terms.len(), 1);
        assert_eq!(result.contributing_terms[0].term, TimingTerm::Cycle);
    }

    #[test]
    fn expansion_cycle_term_matches_two_thirds() {
        let result = score(
            &cycle(Phase::Expansion, 40.0),
            &TimingInputs::default(),
            &TimingConfig::default(),
        );
        assert_relative_eq!(result.score, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn full_bullish_inputs_reach_strong_buy() {
        let inputs = TimingInputs {
            valuation_premium: Some(6.0),
            sovereign_risk_level: Some(120.0),
            policy_rate_level: Some(5.0),
            momentum: Some(8.0),
        };
        let result = score(&cycle(Phase::Recovery, 70.0), &inputs, &TimingConfig::default());
        assert_relative_eq!(result.score, 100.0);
        assert_eq!(result.band, Band::StrongBuy);
        assert_eq!(result.contributing_terms.len(), 5);
    }

    #[test]
    fn full_bearish_inputs_reach_strong_sell() {
        let inputs = TimingInputs {
            valuation_premium: Some(-6.0),
            sovereign_risk_level: Some(400.0),
            policy_rate_level: Some(14.0),
            momentum: Some(-8.0),
        };
        let result = score(&cycle(Phase::Contraction, 70.0), &inputs, &TimingConfig::default());
        assert_relative_eq!(result.score, -100.0);
        assert_eq!(result.band, Band::StrongSell);
    }

    #[test]
    fn absent_terms_are_omitted() {
        let inputs = TimingInputs {
            valuation_premium: Some(4.0),
            sovereign_risk_level: None,
            policy_rate_level: Some(f64::NAN),
            momentum: None,
        };
        let result = score(&cycle(Phase::Peak, 0.0), &inputs, &TimingConfig::default());
        assert_eq!(result.contributing_terms.len(), 1);
        assert_relative_eq!(result.contribution(TimingTerm::Valuation).unwrap(), 18.75);
        assert_eq!(result.contribution(TimingTerm::Liquidity), None);
        assert_eq!(result.contribution(TimingTerm::Cycle), None);
    }

    #[test]
    fn terms_keep_fixed_order() {
        let inputs = TimingInputs {
            valuation_premium: Some(0.0),
            sovereign_risk_level: Some(200.0),
            policy_rate_level: Some(10.0),
            momentum: Some(0.0),
        };
        let result = score(&cycle(Phase::Peak, 50.0), &inputs, &TimingConfig::default());
        let order: Vec<TimingTerm> = result.contributing_terms.iter().map(|c| c.term).collect();
        assert_eq!(order, TimingTerm::ALL.to_vec());
    }

    #[test]
    fn oversized_weights_are_clipped() {
        let config = TimingConfig {
            weights: TimingWeights {
                cycle: 5.0,
                ..TimingWeights::default()
            },
            ..TimingConfig::default()
        };
        let result = score(&cycle(Phase::Contraction, 80.0), &TimingInputs::default(), &config);
        assert_eq!(result.score, SCORE_MIN);
        assert_eq!(result.band, Band::StrongSell);
    }

    #[test]
    fn band_boundaries_are_inclusive_lower_bounds() {
        let bands = BandThresholds::default();
        assert_eq!(bands.band(70.0), Band::StrongBuy);
        assert_eq!(bands.band(69.9), Band::Buy);
        assert_eq!(bands.band(30.0), Band::Buy);
        assert_eq!(bands.band(-30.0), Band::Neutral);
        assert_eq!(bands.band(-30.1), Band::Sell);
        assert_eq!(bands.band(-70.0), Band::Sell);
        assert_eq!(bands.band(-70.1), Band::StrongSell);
    }

    #[test]
    fn momentum_from_index_uses_lookback() {
        let history: Vec<f64> = (0..=21).map(|i| 100.0 + i as f64).collect();
        assert_relative_eq!(momentum_from_index(&history, 21).unwrap(), 21.0);
        assert_eq!(momentum_from_index(&history[..21], 21), None);
        assert_eq!(momentum_from_index(&[0.0, 5.0], 1), None);
    }
}
