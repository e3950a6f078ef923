//! Sector valuation classification.
//!
//! Every metric is scored in `[0, 1]`, higher meaning cheaper. Within a
//! universe the score is cross-sectional min-max; a metric reported by fewer
//! than two sectors falls back to the deviation from the sector's own
//! historical baseline. A sector's score is the mean of the metrics it has.
//!
//! Instrument-level multiples also roll up into holding-weighted portfolio
//! averages.

use crate::domain::alignment::PortfolioHolding;
use crate::domain::sector::Sector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMetric {
    Pe,
    Pb,
    EvEbitda,
    DividendYield,
}

impl ValuationMetric {
    pub const ALL: [ValuationMetric; 4] = [
        ValuationMetric::Pe,
        ValuationMetric::Pb,
        ValuationMetric::EvEbitda,
        ValuationMetric::DividendYield,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ValuationMetric::Pe => "pe",
            ValuationMetric::Pb => "pb",
            ValuationMetric::EvEbitda => "ev_ebitda",
            ValuationMetric::DividendYield => "dividend_yield",
        }
    }

    pub fn higher_is_cheaper(&self) -> bool {
        matches!(self, ValuationMetric::DividendYield)
    }

    /// Multiples must be positive; yields may be zero.
    fn usable(&self, value: Option<f64>) -> Option<f64> {
        let v = value.filter(|v| v.is_finite())?;
        let ok = if self.higher_is_cheaper() { v >= 0.0 } else { v > 0.0 };
        ok.then_some(v)
    }
}

impl fmt::Display for ValuationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricValues {
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ev_ebitda: Option<f64>,
    pub dividend_yield: Option<f64>,
}

impl MetricValues {
    pub fn get(&self, metric: ValuationMetric) -> Option<f64> {
        match metric {
            ValuationMetric::Pe => self.pe,
            ValuationMetric::Pb => self.pb,
            ValuationMetric::EvEbitda => self.ev_ebitda,
            ValuationMetric::DividendYield => self.dividend_yield,
        }
    }
}

/// Current and historical multiples for one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorMetrics {
    pub sector: Sector,
    pub current: MetricValues,
    pub baseline: MetricValues,
}

impl SectorMetrics {
    pub fn new(sector: Sector, current: MetricValues) -> Self {
        Self {
            sector,
            current,
            baseline: MetricValues::default(),
        }
    }

    pub fn with_baseline(mut self, baseline: MetricValues) -> Self {
        self.baseline = baseline;
        self
    }
}

/// Current multiples of one listed instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetrics {
    pub instrument_id: String,
    pub sector: Option<Sector>,
    pub values: MetricValues,
}

impl InstrumentMetrics {
    pub fn new(instrument_id: impl Into<String>, sector: Option<Sector>, values: MetricValues) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            sector,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PortfolioMultiples {
    /// Holding-weighted mean of each metric over the instruments reporting it.
    pub averages: MetricValues,
    /// Sum of the usable holding weights.
    pub total_weight: f64,
    /// Held instruments without a metrics row.
    pub missing_instruments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuationLabel {
    VeryCheap,
    Cheap,
    Neutral,
    Expensive,
    VeryExpensive,
    /// No metric could be scored.
    Undetermined,
}

impl fmt::Display for ValuationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValuationLabel::VeryCheap => "VERY_CHEAP",
            ValuationLabel::Cheap => "CHEAP",
            ValuationLabel::Neutral => "NEUTRAL",
            ValuationLabel::Expensive => "EXPENSIVE",
            ValuationLabel::VeryExpensive => "VERY_EXPENSIVE",
            ValuationLabel::Undetermined => "UNDETERMINED",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    CrossSectional,
    Historical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricScore {
    pub score: f64,
    pub basis: ScoreBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorValuationClassification {
    pub sector: Sector,
    pub score: Option<f64>,
    pub label: ValuationLabel,
    pub metric_scores: BTreeMap<ValuationMetric, MetricScore>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuationConfig {
    /// Right-inclusive bin edges, ascending, between the five labels.
    pub edges: [f64; 4],
    /// Relative deviation from baseline that moves a score from 0.5 to 0 or 1.
    pub deviation_span: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            edges: [0.2, 0.4, 0.6, 0.8],
            deviation_span: 0.5,
        }
    }
}

pub fn label_for(score: f64, edges: &[f64; 4]) -> ValuationLabel {
    if score <= edges[0] {
        ValuationLabel::VeryExpensive
    } else if score <= edges[1] {
        ValuationLabel::Expensive
    } else if score <= edges[2] {
        ValuationLabel::Neutral
    } else if score <= edges[3] {
        ValuationLabel::Cheap
    } else {
        ValuationLabel::VeryCheap
    }
}

/// Classify one sector against its own history only.
pub fn classify_sector(
    metrics: &SectorMetrics,
    config: &ValuationConfig,
) -> SectorValuationClassification {
    let metric_scores = ValuationMetric::ALL
        .iter()
        .filter_map(|m| historical_score(*m, metrics, config).map(|s| (*m, s)))
        .collect();
    finish(metrics.sector, metric_scores, config)
}

/// Classify a universe of sectors. Duplicate sectors keep their first entry.
pub fn classify_all(
    sectors: &[SectorMetrics],
    config: &ValuationConfig,
) -> BTreeMap<Sector, SectorValuationClassification> {
    let mut seen = HashSet::new();
    let universe: Vec<&SectorMetrics> = sectors
        .iter()
        .filter(|m| {
            let first = seen.insert(m.sector);
            if !first {
                warn!(sector = %m.sector, "duplicate sector metrics ignored");
            }
            first
        })
        .collect();

    let ranges: BTreeMap<ValuationMetric, (f64, f64)> = ValuationMetric::ALL
        .iter()
        .filter_map(|m| universe_range(*m, &universe).map(|r| (*m, r)))
        .collect();

    universe
        .iter()
        .map(|metrics| {
            let metric_scores = ValuationMetric::ALL
                .iter()
                .filter_map(|m| {
                    let score = match ranges.get(m) {
                        Some(range) => cross_sectional_score(*m, metrics, *range),
                        None => historical_score(*m, metrics, config),
                    };
                    score.map(|s| (*m, s))
                })
                .collect();
            (metrics.sector, finish(metrics.sector, metric_scores, config))
        })
        .collect()
}

/// Average multiples of a portfolio, each weighted by holding size.
///
/// Instruments that do not report a metric, or report an unusable value,
/// drop out of that metric's average only.
pub fn portfolio_multiples(
    holding: &PortfolioHolding,
    instruments: &[InstrumentMetrics],
) -> PortfolioMultiples {
    let mut by_id: HashMap<&str, &MetricValues> = HashMap::new();
    for instrument in instruments {
        by_id
            .entry(instrument.instrument_id.as_str())
            .or_insert(&instrument.values);
    }

    let held: Vec<(&str, f64)> = holding
        .holdings
        .iter()
        .filter(|h| h.weight_percent.is_finite() && h.weight_percent > 0.0)
        .map(|h| (h.instrument_id.as_str(), h.weight_percent))
        .collect();

    let average = |metric: ValuationMetric| {
        let (weighted, weight) = held
            .iter()
            .filter_map(|(id, w)| {
                let value = metric.usable(by_id.get(id)?.get(metric))?;
                Some((value * w, *w))
            })
            .fold((0.0, 0.0), |(sv, sw), (v, w)| (sv + v, sw + w));
        (weight > 0.0).then(|| weighted / weight)
    };

    PortfolioMultiples {
        averages: MetricValues {
            pe: average(ValuationMetric::Pe),
            pb: average(ValuationMetric::Pb),
            ev_ebitda: average(ValuationMetric::EvEbitda),
            dividend_yield: average(ValuationMetric::DividendYield),
        },
        total_weight: held.iter().map(|(_, w)| w).sum(),
        missing_instruments: held
            .iter()
            .filter(|(id, _)| !by_id.contains_key(id))
            .map(|(id, _)| id.to_string())
            .collect(),
    }
}

/// Min and max of a metric across the universe, when at least two sectors report it.
fn universe_range(metric: ValuationMetric, universe: &[&SectorMetrics]) -> Option<(f64, f64)> {
    let values: Vec<f64> = universe
        .iter()
        .filter_map(|m| metric.usable(m.current.get(metric)))
        .collect();
    if values.len() < 2 {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

fn cross_sectional_score(
    metric: ValuationMetric,
    metrics: &SectorMetrics,
    (min, max): (f64, f64),
) -> Option<MetricScore> {
    let value = metric.usable(metrics.current.get(metric))?;
    let spread = max - min;
    let score = if spread <= f64::EPSILON {
        0.5
    } else {
        let norm = (value - min) / spread;
        if metric.higher_is_cheaper() { norm } else { 1.0 - norm }
    };
    Some(MetricScore {
        score: score.clamp(0.0, 1.0),
        basis: ScoreBasis::CrossSectional,
    })
}

fn historical_score(
    metric: ValuationMetric,
    metrics: &SectorMetrics,
    config: &ValuationConfig,
) -> Option<MetricScore> {
    let current = metric.usable(metrics.current.get(metric))?;
    let baseline = metrics
        .baseline
        .get(metric)
        .filter(|b| b.is_finite() && *b > 0.0)?;
    if config.deviation_span <= 0.0 {
        return None;
    }
    let deviation = current / baseline - 1.0;
    let shift = deviation / (2.0 * config.deviation_span);
    let score = if metric.higher_is_cheaper() {
        0.5 + shift
    } else {
        0.5 - shift
    };
    Some(MetricScore {
        score: score.clamp(0.0, 1.0),
        basis: ScoreBasis::Historical,
    })
}

fn finish(
    sector: Sector,
    metric_scores: BTreeMap<ValuationMetric, MetricScore>,
    config: &ValuationConfig,
) -> SectorValuationClassification {
    let score = if metric_scores.is_empty() {
        None
    } else {
        Some(metric_scores.values().map(|s| s.score).sum::<f64>() / metric_scores.len() as f64)
    };
    let label = score
        .map(|s| label_for(s, &config.edges))
        .unwrap_or(ValuationLabel::Undetermined);
    debug!(%sector, ?score, %label, "sector valuation classified");
    SectorValuationClassification {
        sector,
        score,
        label,
        metric_scores,
    }
}
