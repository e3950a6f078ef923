//! One full evaluation of a snapshot, in data-dependency order.
//!
//! classify → timing → valuation → allocation → posture → screening →
//! alignment → alerts.
//! Only configuration defects abort; data gaps flow through as absent values
//! and undetermined labels.

use crate::domain::alerts::{self, Alert};
use crate::domain::alignment::{self, AlignmentReport, PortfolioHolding};
use crate::domain::allocation::{self, AllocationTarget, RiskPosture};
use crate::domain::cycle::{self, CurveSlopes, CycleResult};
use crate::domain::engine_config::EngineConfig;
use crate::domain::error::MacrocycleError;
use crate::domain::screening::{self, InstrumentPick};
use crate::domain::sector::Sector;
use crate::domain::snapshot::{Indicator, IndicatorSnapshot};
use crate::domain::timing::{self, TimingConfig, TimingInputs, TimingResult};
use crate::domain::valuation::{
    self, InstrumentMetrics, PortfolioMultiples, SectorMetrics, SectorValuationClassification,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// A held portfolio plus the raw sector label of each instrument.
#[derive(Debug, Clone, Default)]
pub struct PortfolioInput {
    pub holding: PortfolioHolding,
    pub instrument_sectors: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub config_version: String,
    pub as_of: Option<NaiveDate>,
    pub curve: CurveSlopes,
    pub timing_inputs: TimingInputs,
    pub cycle: CycleResult,
    pub timing: TimingResult,
    pub valuations: BTreeMap<Sector, SectorValuationClassification>,
    pub allocation: AllocationTarget,
    pub posture: RiskPosture,
    /// Picks inside each sector the selected phase favours.
    pub screening: BTreeMap<Sector, Vec<InstrumentPick>>,
    pub alignment: Option<AlignmentReport>,
    pub portfolio_multiples: Option<PortfolioMultiples>,
    pub alerts: Vec<Alert>,
}

/// Extract the scalar timing inputs from a snapshot.
///
/// Momentum uses the supplied reading, else the equity index change over
/// `momentum_lookback` observations. Nothing is invented when both are missing.
pub fn timing_inputs(snapshot: &IndicatorSnapshot, config: &TimingConfig) -> TimingInputs {
    let momentum = snapshot.latest(Indicator::Momentum).or_else(|| {
        timing::momentum_from_index(
            &snapshot.history(Indicator::EquityIndex),
            config.momentum_lookback,
        )
    });
    TimingInputs {
        valuation_premium: cycle::valuation_premium(snapshot),
        sovereign_risk_level: snapshot.latest(Indicator::SovereignCds),
        policy_rate_level: snapshot.latest(Indicator::PolicyRate),
        momentum,
    }
}

pub fn evaluate(
    snapshot: &IndicatorSnapshot,
    sectors: &[SectorMetrics],
    instruments: &[InstrumentMetrics],
    portfolio: Option<&PortfolioInput>,
    config: &EngineConfig,
) -> Result<Evaluation, MacrocycleError> {
    let cycle_result = cycle::classify(snapshot, &config.phase);
    let inputs = timing_inputs(snapshot, &config.timing);
    let timing_result = timing::score(&cycle_result, &inputs, &config.timing);
    let valuations = valuation::classify_all(sectors, &config.valuation);
    let target = allocation::recommend(
        &cycle_result,
        &timing_result,
        &valuations,
        &config.allocation,
    )?;
    let posture = allocation::risk_posture(cycle_result.phase, &timing_result, &config.allocation);
    let picks = screening::screen(instruments, &target.favoured_sectors, &config.screening);

    let alignment_report = portfolio.map(|p| {
        let sector_of = |id: &str| {
            p.instrument_sectors
                .get(id)
                .and_then(|label| config.sector_mapper.map(label))
        };
        alignment::align(&p.holding, &target, sector_of, &config.alignment)
    });

    let multiples = portfolio.map(|p| valuation::portfolio_multiples(&p.holding, instruments));

    let alerts = alerts::generate(&cycle_result, &timing_result);

    info!(
        version = %config.version,
        phase = %cycle_result.phase,
        confidence = cycle_result.confidence,
        timing = timing_result.score,
        band = %timing_result.band,
        "evaluation complete"
    );

    Ok(Evaluation {
        config_version: config.version.clone(),
        as_of: snapshot.as_of(),
        curve: cycle::yield_curve_slopes(snapshot),
        timing_inputs: inputs,
        cycle: cycle_result,
        timing: timing_result,
        valuations,
        allocation: target,
        posture,
        screening: picks,
        alignment: alignment_report,
        portfolio_multiples: multiples,
        alerts,
    })
}
