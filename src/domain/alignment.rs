//! Portfolio alignment against an allocation target.

use crate::domain::allocation::AllocationTarget;
use crate::domain::sector::Sector;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub instrument_id: String,
    pub weight_percent: f64,
}

impl Holding {
    pub fn new(instrument_id: impl Into<String>, weight_percent: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            weight_percent,
        }
    }
}

/// Held instruments. Weights need not sum to 100.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub holdings: Vec<Holding>,
}

impl PortfolioHolding {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self { holdings }
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentConfig {
    /// Absolute gap, in percentage points, beyond which a rebalance is suggested.
    pub threshold: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self { threshold: 5.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceAction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceSuggestion {
    pub sector: Sector,
    pub action: RebalanceAction,
    pub magnitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectorGap {
    pub current: f64,
    pub target: f64,
    /// `current - target`.
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UnclassifiedBucket {
    /// Share of the supplied total, percent.
    pub weight_percent: f64,
    pub instrument_ids: Vec<String>,
}

/// One classified instrument checked against the phase's favoured sectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentPlacement {
    pub instrument_id: String,
    pub sector: Sector,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentReport {
    pub score: f64,
    pub per_sector_gap: BTreeMap<Sector, SectorGap>,
    pub unclassified: UnclassifiedBucket,
    pub rebalance_suggestions: Vec<RebalanceSuggestion>,
    /// Holdings in a sector the target phase favours, in holding order.
    pub aligned_instruments: Vec<InstrumentPlacement>,
    pub misaligned_instruments: Vec<InstrumentPlacement>,
}

/// Compare held sector weights with `target`.
///
/// Instruments `sector_of` cannot place go to the unclassified bucket and
/// are left out of the score base.
pub fn align<F>(
    holding: &PortfolioHolding,
    target: &AllocationTarget,
    sector_of: F,
    config: &AlignmentConfig,
) -> AlignmentReport
where
    F: Fn(&str) -> Option<Sector>,
{
    let mut by_sector: BTreeMap<Sector, f64> = BTreeMap::new();
    let mut unclassified = UnclassifiedBucket::default();
    let mut unclassified_weight = 0.0;
    let mut supplied_total = 0.0;
    let mut aligned_instruments = Vec::new();
    let mut misaligned_instruments = Vec::new();
    let phase = target.phase.key();

    for h in &holding.holdings {
        if !(h.weight_percent.is_finite() && h.weight_percent > 0.0) {
            warn!(instrument = %h.instrument_id, weight = h.weight_percent, "holding ignored");
            continue;
        }
        supplied_total += h.weight_percent;
        match sector_of(&h.instrument_id) {
            Some(sector) => {
                *by_sector.entry(sector).or_insert(0.0) += h.weight_percent;
                let favoured = target.favoured_sectors.contains(&sector);
                let placement = InstrumentPlacement {
                    instrument_id: h.instrument_id.clone(),
                    sector,
                    justification: if favoured {
                        format!("sector favoured in the {phase} phase")
                    } else {
                        format!("sector not favoured in the {phase} phase")
                    },
                };
                if favoured {
                    aligned_instruments.push(placement);
                } else {
                    misaligned_instruments.push(placement);
                }
            }
            None => {
                unclassified_weight += h.weight_percent;
                unclassified.instrument_ids.push(h.instrument_id.clone());
            }
        }
    }
    if supplied_total > 0.0 {
        unclassified.weight_percent = unclassified_weight * 100.0 / supplied_total;
    }

    let classified_total: f64 = by_sector.values().sum();
    let held: BTreeMap<Sector, f64> = if classified_total > 0.0 {
        by_sector
            .iter()
            .map(|(s, w)| (*s, w * 100.0 / classified_total))
            .collect()
    } else {
        BTreeMap::new()
    };

    let mut per_sector_gap = BTreeMap::new();
    let mut score = 0.0;
    for sector in held.keys().chain(target.weights.keys()) {
        if per_sector_gap.contains_key(sector) {
            continue;
        }
        let current = held.get(sector).copied().unwrap_or(0.0);
        let wanted = target.weights.get(sector).copied().unwrap_or(0.0);
        score += current.min(wanted);
        per_sector_gap.insert(
            *sector,
            SectorGap {
                current,
                target: wanted,
                difference: current - wanted,
            },
        );
    }

    let rebalance_suggestions = if held.is_empty() {
        score = 0.0;
        let mut all: Vec<RebalanceSuggestion> = target
            .weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(sector, w)| RebalanceSuggestion {
                sector: *sector,
                action: RebalanceAction::Increase,
                magnitude: *w,
            })
            .collect();
        sort_suggestions(&mut all);
        all
    } else {
        suggestions(&per_sector_gap, config.threshold)
    };

    let score = score.clamp(0.0, 100.0);
    debug!(
        score,
        suggestions = rebalance_suggestions.len(),
        unclassified = unclassified.instrument_ids.len(),
        "portfolio aligned"
    );

    AlignmentReport {
        score,
        per_sector_gap,
        unclassified,
        rebalance_suggestions,
        aligned_instruments,
        misaligned_instruments,
    }
}

fn suggestions(gaps: &BTreeMap<Sector, SectorGap>, threshold: f64) -> Vec<RebalanceSuggestion> {
    let mut out: Vec<RebalanceSuggestion> = gaps
        .iter()
        .filter_map(|(sector, gap)| {
            let action = if gap.difference < -threshold {
                RebalanceAction::Increase
            } else if gap.difference > threshold {
                RebalanceAction::Decrease
            } else {
                return None;
            };
            Some(RebalanceSuggestion {
                sector: *sector,
                action,
                magnitude: gap.difference.abs(),
            })
        })
        .collect();
    sort_suggestions(&mut out);
    out
}

fn sort_suggestions(suggestions: &mut [RebalanceSuggestion]) {
    suggestions.sort_by(|a, b| match b.magnitude.total_cmp(&a.magnitude) {
        Ordering::Equal => a.sector.cmp(&b.sector),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::phase::Phase;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn target(weights: &[(Sector, f64)]) -> AllocationTarget {
        AllocationTarget {
            phase: Phase::Expansion,
            weights: weights.iter().copied().collect(),
            cash_residual: 0.0,
            adjustments: vec![],
            favoured_sectors: vec![Sector::Financials, Sector::InformationTechnology],
        }
    }

    fn lookup(map: &[(&str, Sector)]) -> impl Fn(&str) -> Option<Sector> {
        let table: HashMap<String, Sector> =
            map.iter().map(|(id, s)| (id.to_string(), *s)).collect();
        move |id| table.get(id).copied()
    }

    #[test]
    fn exact_match_scores_one_hundred_without_suggestions() {
        let t = target(&[(Sector::Energy, 40.0), (Sector::Financials, 60.0)]);
        let holding = PortfolioHolding::new(vec![
            Holding::new("PETR4", 40.0),
            Holding::new("ITUB4", 60.0),
        ]);
        let sector_of = lookup(&[("PETR4", Sector::Energy), ("ITUB4", Sector::Financials)]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());
        assert_eq!(report.score, 100.0);
        assert!(report.rebalance_suggestions.is_empty());
    }

    #[test]
    fn holding_weights_are_rescaled_to_classified_total() {
        let t = target(&[(Sector::Energy, 50.0), (Sector::Financials, 50.0)]);
        let holding = PortfolioHolding::new(vec![
            Holding::new("PETR4", 10.0),
            Holding::new("ITUB4", 10.0),
        ]);
        let sector_of = lookup(&[("PETR4", Sector::Energy), ("ITUB4", Sector::Financials)]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());
        assert_eq!(report.score, 100.0);
    }

    #[test]
    fn gaps_and_suggestions_are_ordered_by_magnitude() {
        let t = target(&[
            (Sector::Energy, 30.0),
            (Sector::Financials, 30.0),
            (Sector::Utilities, 40.0),
        ]);
        let holding = PortfolioHolding::new(vec![
            Holding::new("A", 70.0),
            Holding::new("B", 27.0),
            Holding::new("C", 3.0),
        ]);
        let sector_of = lookup(&[
            ("A", Sector::Energy),
            ("B", Sector::Financials),
            ("C", Sector::Utilities),
        ]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());
        assert_relative_eq!(report.score, 30.0 + 27.0 + 3.0);
        assert_eq!(report.rebalance_suggestions.len(), 2);
        assert_eq!(report.rebalance_suggestions[0].sector, Sector::Energy);
        assert_eq!(report.rebalance_suggestions[0].action, RebalanceAction::Decrease);
        assert_relative_eq!(report.rebalance_suggestions[0].magnitude, 40.0);
        assert_eq!(report.rebalance_suggestions[1].sector, Sector::Utilities);
        assert_eq!(report.rebalance_suggestions[1].action, RebalanceAction::Increase);
        assert_relative_eq!(report.per_sector_gap[&Sector::Financials].difference, -3.0);
    }

    #[test]
    fn gap_equal_to_threshold_is_not_flagged() {
        let t = target(&[(Sector::Energy, 50.0), (Sector::Financials, 50.0)]);
        let holding = PortfolioHolding::new(vec![Holding::new("A", 55.0), Holding::new("B", 45.0)]);
        let sector_of = lookup(&[("A", Sector::Energy), ("B", Sector::Financials)]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());
        assert!(report.rebalance_suggestions.is_empty());
    }

    #[test]
    fn ties_break_by_sector_key() {
        let t = target(&[(Sector::Utilities, 50.0), (Sector::Energy, 50.0)]);
        let holding = PortfolioHolding::new(vec![Holding::new("X", 100.0)]);
        let sector_of = lookup(&[("X", Sector::HealthCare)]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());
        let order: Vec<Sector> = report
            .rebalance_suggestions
            .iter()
            .map(|s| s.sector)
            .collect();
        assert_eq!(order, vec![Sector::HealthCare, Sector::Energy, Sector::Utilities]);
        assert_eq!(report.score, 0.0);
    }

    #[test]
    fn empty_holding_suggests_full_target() {
        let t = target(&[
            (Sector::Energy, 60.0),
            (Sector::Financials, 40.0),
            (Sector::RealEstate, 0.0),
        ]);
        let report = align(
            &PortfolioHolding::default(),
            &t,
            |_| None,
            &AlignmentConfig::default(),
        );
        assert_eq!(report.score, 0.0);
        assert_eq!(report.rebalance_suggestions.len(), 2);
        assert!(report
            .rebalance_suggestions
            .iter()
            .all(|s| s.action == RebalanceAction::Increase));
        assert_eq!(report.rebalance_suggestions[0].sector, Sector::Energy);
        assert_eq!(report.rebalance_suggestions[0].magnitude, 60.0);
    }

    #[test]
    fn instruments_split_by_favoured_sector() {
        let t = target(&[(Sector::Energy, 50.0), (Sector::Financials, 50.0)]);
        let holding = PortfolioHolding::new(vec![
            Holding::new("PETR4", 40.0),
            Holding::new("ITUB4", 40.0),
            Holding::new("TOTS3", 10.0),
            Holding::new("MYSTERY", 10.0),
            Holding::new("ZERO", 0.0),
        ]);
        let sector_of = lookup(&[
            ("PETR4", Sector::Energy),
            ("ITUB4", Sector::Financials),
            ("TOTS3", Sector::InformationTechnology),
            ("ZERO", Sector::Financials),
        ]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());

        let aligned: Vec<&str> = report
            .aligned_instruments
            .iter()
            .map(|p| p.instrument_id.as_str())
            .collect();
        assert_eq!(aligned, vec!["ITUB4", "TOTS3"]);
        assert_eq!(report.misaligned_instruments.len(), 1);
        let petr = &report.misaligned_instruments[0];
        assert_eq!(petr.instrument_id, "PETR4");
        assert_eq!(petr.sector, Sector::Energy);
        assert_eq!(petr.justification, "sector not favoured in the expansion phase");
        assert_eq!(
            report.aligned_instruments[0].justification,
            "sector favoured in the expansion phase"
        );
    }

    #[test]
    fn unclassified_instruments_are_reported_not_scored() {
        let t = target(&[(Sector::Energy, 100.0)]);
        let holding = PortfolioHolding::new(vec![
            Holding::new("PETR4", 75.0),
            Holding::new("MYSTERY", 25.0),
        ]);
        let sector_of = lookup(&[("PETR4", Sector::Energy)]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());
        assert_eq!(report.score, 100.0);
        assert_eq!(report.unclassified.instrument_ids, vec!["MYSTERY".to_string()]);
        assert_relative_eq!(report.unclassified.weight_percent, 25.0);
    }

    #[test]
    fn all_unclassified_behaves_like_empty() {
        let t = target(&[(Sector::Energy, 100.0)]);
        let holding = PortfolioHolding::new(vec![Holding::new("MYSTERY", 10.0)]);
        let report = align(&holding, &t, |_| None, &AlignmentConfig::default());
        assert_eq!(report.score, 0.0);
        assert_eq!(report.rebalance_suggestions.len(), 1);
        assert_relative_eq!(report.unclassified.weight_percent, 100.0);
    }

    #[test]
    fn non_positive_weights_are_ignored() {
        let t = target(&[(Sector::Energy, 100.0)]);
        let holding = PortfolioHolding::new(vec![
            Holding::new("PETR4", 20.0),
            Holding::new("SHORT", -5.0),
            Holding::new("NAN", f64::NAN),
        ]);
        let sector_of = lookup(&[
            ("PETR4", Sector::Energy),
            ("SHORT", Sector::Financials),
            ("NAN", Sector::Financials),
        ]);
        let report = align(&holding, &t, sector_of, &AlignmentConfig::default());
        assert_eq!(report.score, 100.0);
        assert!(!report.per_sector_gap.contains_key(&Sector::Financials));
    }
}
