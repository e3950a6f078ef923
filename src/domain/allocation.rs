//! Sector allocation recommendation.
//!
//! The phase selects a base weight table. Sectors classified VERY_CHEAP gain
//! a bonus and VERY_EXPENSIVE sectors lose a floored penalty, then the vector
//! is rescaled to 100. The cash residual and the risk posture come from the
//! timing result and sit beside the sector vector. Each phase also names
//! the sectors it favours, which portfolio alignment and instrument
//! screening read from the target.

use crate::domain::cycle::CycleResult;
use crate::domain::error::MacrocycleError;
use crate::domain::phase::Phase;
use crate::domain::sector::Sector;
use crate::domain::step_table::StepTable;
use crate::domain::timing::{Band, TimingResult};
use crate::domain::valuation::{SectorValuationClassification, ValuationLabel};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub type SectorWeights = BTreeMap<Sector, f64>;

/// Tolerance on tables that must sum to 100.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssetMix {
    pub equity: f64,
    pub fixed_income: f64,
    pub cash: f64,
}

impl AssetMix {
    pub const fn new(equity: f64, fixed_income: f64, cash: f64) -> Self {
        Self {
            equity,
            fixed_income,
            cash,
        }
    }

    pub fn total(&self) -> f64 {
        self.equity + self.fixed_income + self.cash
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskProfile {
    Aggressive,
    ModeratelyAggressive,
    Neutral,
    ModeratelyDefensive,
    Defensive,
}

impl RiskProfile {
    pub fn for_band(band: Band) -> Self {
        match band {
            Band::StrongBuy => RiskProfile::Aggressive,
            Band::Buy => RiskProfile::ModeratelyAggressive,
            Band::Neutral => RiskProfile::Neutral,
            Band::Sell => RiskProfile::ModeratelyDefensive,
            Band::StrongSell => RiskProfile::Defensive,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationConfig {
    pub base: BTreeMap<Phase, SectorWeights>,
    pub very_cheap_bonus: f64,
    pub very_expensive_penalty: f64,
    /// Timing score to cash/fixed-income residual, percent.
    pub cash_residual: StepTable,
    pub asset_mix: BTreeMap<Band, AssetMix>,
    pub favoured: BTreeMap<Phase, Vec<Sector>>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            base: default_base_tables(),
            very_cheap_bonus: 5.0,
            very_expensive_penalty: 5.0,
            cash_residual: StepTable::below(
                &[(-50.0, 30.0), (-20.0, 20.0), (20.0, 10.0), (50.0, 5.0)],
                0.0,
            ),
            asset_mix: default_asset_mix(),
            favoured: default_favoured_sectors(),
        }
    }
}

pub fn default_base_tables() -> BTreeMap<Phase, SectorWeights> {
    use Sector::*;

    let table = |rows: &[(Sector, f64)]| rows.iter().copied().collect::<SectorWeights>();
    BTreeMap::from([
        (
            Phase::Expansion,
            table(&[
                (ConsumerCyclical, 20.0),
                (InformationTechnology, 15.0),
                (Industrials, 15.0),
                (Financials, 15.0),
                (BasicMaterials, 10.0),
                (HealthCare, 5.0),
                (Energy, 5.0),
                (ConsumerStaples, 5.0),
                (Utilities, 5.0),
                (Telecommunications, 3.0),
                (RealEstate, 2.0),
            ]),
        ),
        (
            Phase::Peak,
            table(&[
                (Financials, 20.0),
                (BasicMaterials, 15.0),
                (Energy, 15.0),
                (Utilities, 10.0),
                (ConsumerStaples, 10.0),
                (HealthCare, 10.0),
                (InformationTechnology, 5.0),
                (Telecommunications, 5.0),
                (Industrials, 5.0),
                (ConsumerCyclical, 3.0),
                (RealEstate, 2.0),
            ]),
        ),
        (
            Phase::Contraction,
            table(&[
                (Utilities, 20.0),
                (ConsumerStaples, 20.0),
                (HealthCare, 15.0),
                (Telecommunications, 10.0),
                (Financials, 10.0),
                (Energy, 10.0),
                (InformationTechnology, 5.0),
                (BasicMaterials, 5.0),
                (Industrials, 3.0),
                (ConsumerCyclical, 2.0),
                (RealEstate, 0.0),
            ]),
        ),
        (
            Phase::Recovery,
            table(&[
                (RealEstate, 15.0),
                (Financials, 15.0),
                (ConsumerCyclical, 15.0),
                (Industrials, 10.0),
                (InformationTechnology, 10.0),
                (BasicMaterials, 10.0),
                (Energy, 10.0),
                (HealthCare, 5.0),
                (ConsumerStaples, 5.0),
                (Utilities, 3.0),
                (Telecommunications, 2.0),
            ]),
        ),
    ])
}

pub fn default_asset_mix() -> BTreeMap<Band, AssetMix> {
    BTreeMap::from([
        (Band::StrongBuy, AssetMix::new(80.0, 15.0, 5.0)),
        (Band::Buy, AssetMix::new(70.0, 25.0, 5.0)),
        (Band::Neutral, AssetMix::new(60.0, 30.0, 10.0)),
        (Band::Sell, AssetMix::new(40.0, 45.0, 15.0)),
        (Band::StrongSell, AssetMix::new(30.0, 50.0, 20.0)),
    ])
}

/// Sectors each phase favours: the heaviest rows of the base tables.
pub fn default_favoured_sectors() -> BTreeMap<Phase, Vec<Sector>> {
    use Sector::*;

    BTreeMap::from([
        (
            Phase::Expansion,
            vec![ConsumerCyclical, InformationTechnology, Industrials, Financials],
        ),
        (Phase::Peak, vec![Financials, BasicMaterials, Energy]),
        (Phase::Contraction, vec![Utilities, ConsumerStaples, HealthCare]),
        (Phase::Recovery, vec![RealEstate, Financials, ConsumerCyclical]),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationAdjustment {
    pub sector: Sector,
    pub label: ValuationLabel,
    /// Points added to the base weight before rescaling.
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationTarget {
    pub phase: Phase,
    pub weights: SectorWeights,
    pub cash_residual: f64,
    pub adjustments: Vec<AllocationAdjustment>,
    pub favoured_sectors: Vec<Sector>,
}

impl AllocationTarget {
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostureAction {
    Increase,
    Reduce,
    Balance,
    Maintain,
    Prioritize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureCategory {
    Equity,
    FixedIncome,
    Cash,
    CyclicalSectors,
    PricingPowerSectors,
    DefensiveSectors,
    FinancialAndCyclicalSectors,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostureAdjustment {
    pub action: PostureAction,
    pub category: PostureCategory,
    /// Target share of the portfolio for asset-class lines.
    pub percent: Option<f64>,
    pub justification: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPosture {
    pub profile: RiskProfile,
    pub asset_mix: Option<AssetMix>,
    pub justification: &'static str,
    pub adjustments: Vec<PostureAdjustment>,
}

pub fn recommend(
    cycle: &CycleResult,
    timing: &TimingResult,
    valuations: &BTreeMap<Sector, SectorValuationClassification>,
    config: &AllocationConfig,
) -> Result<AllocationTarget, MacrocycleError> {
    let base = config
        .base
        .get(&cycle.phase)
        .filter(|table| !table.is_empty())
        .ok_or(MacrocycleError::MissingBaseAllocation { phase: cycle.phase })?;

    let mut adjusted = base.clone();
    let mut adjustments = Vec::new();
    for (sector, weight) in adjusted.iter_mut() {
        let Some(classification) = valuations.get(sector) else {
            continue;
        };
        let before = *weight;
        match classification.label {
            ValuationLabel::VeryCheap => *weight += config.very_cheap_bonus,
            ValuationLabel::VeryExpensive => {
                *weight = (*weight - config.very_expensive_penalty).max(0.0)
            }
            _ => continue,
        }
        adjustments.push(AllocationAdjustment {
            sector: *sector,
            label: classification.label,
            delta: *weight - before,
        });
    }

    let weights = normalize(&adjusted).unwrap_or_else(|| base.clone());
    let cash_residual = config.cash_residual.lookup(timing.score);

    debug!(
        phase = %cycle.phase,
        adjustments = adjustments.len(),
        cash_residual,
        "allocation recommended"
    );

    Ok(AllocationTarget {
        phase: cycle.phase,
        weights,
        cash_residual,
        adjustments,
        favoured_sectors: config.favoured.get(&cycle.phase).cloned().unwrap_or_default(),
    })
}

/// Rescale to sum to 100. `None` when nothing is left to scale.
pub fn normalize(weights: &SectorWeights) -> Option<SectorWeights> {
    let total: f64 = weights.values().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    Some(
        weights
            .iter()
            .map(|(sector, w)| (*sector, w * 100.0 / total))
            .collect(),
    )
}

/// Risk profile from the timing band, asset-class moves toward the band's
/// configured mix, and the sector group the phase prioritises.
pub fn risk_posture(phase: Phase, timing: &TimingResult, config: &AllocationConfig) -> RiskPosture {
    use PostureAction::*;

    let profile = RiskProfile::for_band(timing.band);
    let asset_mix = config.asset_mix.get(&timing.band).copied();

    let (justification, lines) = match profile {
        RiskProfile::Aggressive => (
            "very positive timing score favours higher risk exposure",
            [
                (Increase, "very favourable backdrop for risk assets"),
                (Reduce, "hold only for liquidity and opportunities"),
                (Maintain, "minimum for immediate liquidity"),
            ],
        ),
        RiskProfile::ModeratelyAggressive => (
            "positive timing score favours moderate risk exposure",
            [
                (Increase, "favourable backdrop for risk assets"),
                (Reduce, "hold for balance and opportunities"),
                (Maintain, "minimum for immediate liquidity"),
            ],
        ),
        RiskProfile::Neutral => (
            "neutral timing score suggests a balanced allocation",
            [
                (Balance, "keep a balanced exposure"),
                (Balance, "hold for balance and protection"),
                (Maintain, "liquidity for opportunities"),
            ],
        ),
        RiskProfile::ModeratelyDefensive => (
            "negative timing score suggests reducing risk exposure",
            [
                (Reduce, "cut exposure to risk assets"),
                (Increase, "add protection and stability"),
                (Increase, "keep liquidity for opportunities"),
            ],
        ),
        RiskProfile::Defensive => (
            "very negative timing score calls for a defensive stance",
            [
                (Reduce, "keep only strategic positions"),
                (Increase, "prioritise protection and stability"),
                (Increase, "keep high liquidity for future opportunities"),
            ],
        ),
    };

    let mut adjustments = Vec::new();
    if let Some(mix) = asset_mix {
        let categories = [
            (PostureCategory::Equity, mix.equity),
            (PostureCategory::FixedIncome, mix.fixed_income),
            (PostureCategory::Cash, mix.cash),
        ];
        for ((category, percent), (action, why)) in categories.into_iter().zip(lines) {
            adjustments.push(PostureAdjustment {
                action,
                category,
                percent: Some(percent),
                justification: why,
            });
        }
    }

    let (category, why) = match phase {
        Phase::Expansion => (
            PostureCategory::CyclicalSectors,
            "expansion favours cyclical and growth sectors",
        ),
        Phase::Peak => (
            PostureCategory::PricingPowerSectors,
            "peak favours sectors with pricing power and commodities",
        ),
        Phase::Contraction => (
            PostureCategory::DefensiveSectors,
            "contraction favours defensive and dividend sectors",
        ),
        Phase::Recovery => (
            PostureCategory::FinancialAndCyclicalSectors,
            "recovery favours financial and cyclical sectors",
        ),
    };
    adjustments.push(PostureAdjustment {
        action: Prioritize,
        category,
        percent: None,
        justification: why,
    });

    RiskPosture {
        profile,
        asset_mix,
        justification,
        adjustments,
    }
}
