//! Instrument screening inside the sectors a phase favours.
//!
//! Each instrument earns points for a low earnings multiple, a low book
//! multiple and a high dividend yield. Instruments below the minimum score
//! are dropped; the rest are listed per sector, best first.

use crate::domain::sector::Sector;
use crate::domain::valuation::InstrumentMetrics;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningConfig {
    /// P/E below this earns two points.
    pub pe_attractive: f64,
    /// P/E below this earns one point.
    pub pe_reasonable: f64,
    pub pb_very_attractive: f64,
    pub pb_attractive: f64,
    /// Dividend yield above this earns two points, percent.
    pub dividend_high: f64,
    pub dividend_good: f64,
    pub min_score: u32,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            pe_attractive: 10.0,
            pe_reasonable: 15.0,
            pb_very_attractive: 1.0,
            pb_attractive: 1.5,
            dividend_high: 7.0,
            dividend_good: 5.0,
            min_score: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenCriterion {
    PeAttractive,
    PeReasonable,
    PbVeryAttractive,
    PbAttractive,
    DividendHigh,
    DividendGood,
}

impl ScreenCriterion {
    pub fn points(&self) -> u32 {
        match self {
            ScreenCriterion::PeAttractive
            | ScreenCriterion::PbVeryAttractive
            | ScreenCriterion::DividendHigh => 2,
            ScreenCriterion::PeReasonable
            | ScreenCriterion::PbAttractive
            | ScreenCriterion::DividendGood => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenReason {
    pub criterion: ScreenCriterion,
    pub value: f64,
}

impl fmt::Display for ScreenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.value;
        match self.criterion {
            ScreenCriterion::PeAttractive => write!(f, "attractive P/E: {v:.2}"),
            ScreenCriterion::PeReasonable => write!(f, "reasonable P/E: {v:.2}"),
            ScreenCriterion::PbVeryAttractive => write!(f, "very attractive P/B: {v:.2}"),
            ScreenCriterion::PbAttractive => write!(f, "attractive P/B: {v:.2}"),
            ScreenCriterion::DividendHigh => write!(f, "high dividend yield: {v:.2}%"),
            ScreenCriterion::DividendGood => write!(f, "good dividend yield: {v:.2}%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentPick {
    pub instrument_id: String,
    pub score: u32,
    pub reasons: Vec<ScreenReason>,
    pub justification: String,
}

/// Score one instrument's multiples. Non-positive multiples earn nothing.
pub fn score_instrument(metrics: &InstrumentMetrics, config: &ScreeningConfig) -> InstrumentPick {
    let values = &metrics.values;
    let mut reasons = Vec::new();

    if let Some(pe) = values.pe.filter(|v| v.is_finite() && *v > 0.0) {
        if pe < config.pe_attractive {
            reasons.push(ScreenReason { criterion: ScreenCriterion::PeAttractive, value: pe });
        } else if pe < config.pe_reasonable {
            reasons.push(ScreenReason { criterion: ScreenCriterion::PeReasonable, value: pe });
        }
    }
    if let Some(pb) = values.pb.filter(|v| v.is_finite() && *v > 0.0) {
        if pb < config.pb_very_attractive {
            reasons.push(ScreenReason { criterion: ScreenCriterion::PbVeryAttractive, value: pb });
        } else if pb < config.pb_attractive {
            reasons.push(ScreenReason { criterion: ScreenCriterion::PbAttractive, value: pb });
        }
    }
    if let Some(dy) = values.dividend_yield.filter(|v| v.is_finite()) {
        if dy > config.dividend_high {
            reasons.push(ScreenReason { criterion: ScreenCriterion::DividendHigh, value: dy });
        } else if dy > config.dividend_good {
            reasons.push(ScreenReason { criterion: ScreenCriterion::DividendGood, value: dy });
        }
    }

    let justification = reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    InstrumentPick {
        instrument_id: metrics.instrument_id.clone(),
        score: reasons.iter().map(|r| r.criterion.points()).sum(),
        reasons,
        justification,
    }
}

/// Picks per sector for every sector in `sectors`, highest score first.
/// Equal scores keep input order. Sectors with no qualifying instrument map
/// to an empty list.
pub fn screen(
    instruments: &[InstrumentMetrics],
    sectors: &[Sector],
    config: &ScreeningConfig,
) -> BTreeMap<Sector, Vec<InstrumentPick>> {
    let mut picks: BTreeMap<Sector, Vec<InstrumentPick>> =
        sectors.iter().map(|s| (*s, Vec::new())).collect();

    let mut seen = HashSet::new();
    for instrument in instruments {
        if !seen.insert(instrument.instrument_id.as_str()) {
            continue;
        }
        let Some(list) = instrument.sector.and_then(|s| picks.get_mut(&s)) else {
            continue;
        };
        let pick = score_instrument(instrument, config);
        if pick.score >= config.min_score {
            list.push(pick);
        }
    }
    for list in picks.values_mut() {
        list.sort_by(|a, b| b.score.cmp(&a.score));
    }

    debug!(
        sectors = picks.len(),
        picks = picks.values().map(Vec::len).sum::<usize>(),
        "instruments screened"
    );
    picks
}
