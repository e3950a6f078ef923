//! Typed engine configuration built from INI sections.
//!
//! Every table has a built-in default; keys present in the file replace the
//! matching default. Base allocation tables are the exception: when any
//! `[allocation.base.<phase>]` section has entries, the built-in tables are
//! dropped and only the file's tables are used.

use crate::domain::alignment::AlignmentConfig;
use crate::domain::allocation::{AllocationConfig, AssetMix, SectorWeights};
use crate::domain::cycle::{LevelBands, PhaseConfig, SignalGroup};
use crate::domain::error::MacrocycleError;
use crate::domain::phase::Phase;
use crate::domain::screening::ScreeningConfig;
use crate::domain::sector::{Sector, SectorMapper};
use crate::domain::step_table::StepTable;
use crate::domain::timing::{Band, TimingConfig};
use crate::domain::valuation::ValuationConfig;
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeMap;

pub const DEFAULT_VERSION: &str = "builtin-1";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Identifies the heuristic table set; echoed in every evaluation.
    pub version: String,
    pub phase: PhaseConfig,
    pub timing: TimingConfig,
    pub valuation: ValuationConfig,
    pub allocation: AllocationConfig,
    pub alignment: AlignmentConfig,
    pub screening: ScreeningConfig,
    pub sector_mapper: SectorMapper,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            phase: PhaseConfig::default(),
            timing: TimingConfig::default(),
            valuation: ValuationConfig::default(),
            allocation: AllocationConfig::default(),
            alignment: AlignmentConfig::default(),
            screening: ScreeningConfig::default(),
            sector_mapper: SectorMapper::builtin(),
        }
    }
}

impl EngineConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, MacrocycleError> {
        let mut engine = EngineConfig::default();
        if let Some(version) = non_empty(config.get_string("engine", "version")) {
            engine.version = version;
        }
        load_phase(config, &mut engine.phase)?;
        load_timing(config, &mut engine.timing)?;
        load_valuation(config, &mut engine.valuation)?;
        load_allocation(config, &mut engine.allocation)?;
        engine.alignment.threshold =
            double(config, "alignment", "threshold", engine.alignment.threshold)?;
        load_screening(config, &mut engine.screening)?;
        load_sector_map(config, &mut engine.sector_mapper)?;
        Ok(engine)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `default` when the key is absent or blank. A present value the port
/// cannot read as a number is an error naming the key.
fn double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, MacrocycleError> {
    let Some(raw) = non_empty(config.get_string(section, key)) else {
        return Ok(default);
    };
    let value = config.get_double(section, key, f64::NAN);
    if value.is_nan() {
        return Err(MacrocycleError::invalid(section, key, format!("not a number: {raw}")));
    }
    Ok(value)
}

fn count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, MacrocycleError> {
    let Some(raw) = non_empty(config.get_string(section, key)) else {
        return Ok(default);
    };
    usize::try_from(config.get_int(section, key, -1)).map_err(|_| {
        MacrocycleError::invalid(section, key, format!("not a non-negative integer: {raw}"))
    })
}

fn sector_list(section: &str, key: &str, raw: &str) -> Result<Vec<Sector>, MacrocycleError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Sector>()
                .map_err(|reason| MacrocycleError::invalid(section, key, reason))
        })
        .collect()
}

fn bands(
    config: &dyn ConfigPort,
    section: &str,
    prefix: &str,
    default: LevelBands,
) -> Result<LevelBands, MacrocycleError> {
    Ok(LevelBands::new(
        double(config, section, &format!("{prefix}_low"), default.low)?,
        double(config, section, &format!("{prefix}_moderate"), default.moderate)?,
        double(config, section, &format!("{prefix}_high"), default.high)?,
    ))
}

fn step_table(
    config: &dyn ConfigPort,
    section: &str,
    table: &mut StepTable,
) -> Result<(), MacrocycleError> {
    if let Some(raw) = non_empty(config.get_string(section, "steps")) {
        table.steps = StepTable::parse_steps(&raw)
            .map_err(|reason| MacrocycleError::invalid(section, "steps", reason))?;
    }
    table.otherwise = double(config, section, "otherwise", table.otherwise)?;
    Ok(())
}

fn load_phase(config: &dyn ConfigPort, phase: &mut PhaseConfig) -> Result<(), MacrocycleError> {
    if let Some(raw) = non_empty(config.get_string("engine", "fallback_phase")) {
        phase.fallback_phase = raw
            .parse()
            .map_err(|reason: String| MacrocycleError::invalid("engine", "fallback_phase", reason))?;
    }

    const S: &str = "phase.thresholds";
    let t = &mut phase.thresholds;
    t.curve_steep = double(config, S, "curve_steep", t.curve_steep)?;
    t.curve_normal = double(config, S, "curve_normal", t.curve_normal)?;
    t.curve_flat = double(config, S, "curve_flat", t.curve_flat)?;
    t.inflation_levels = bands(config, S, "inflation", t.inflation_levels)?;
    t.inflation_trend_band = double(config, S, "inflation_trend_band", t.inflation_trend_band)?;
    t.inflation_trend_window =
        count(config, S, "inflation_trend_window", t.inflation_trend_window)?;
    t.policy_levels = bands(config, S, "policy", t.policy_levels)?;
    t.policy_trend_lag = count(config, S, "policy_trend_lag", t.policy_trend_lag)?;
    t.labor_levels = bands(config, S, "labor", t.labor_levels)?;
    t.risk_levels = bands(config, S, "risk", t.risk_levels)?;
    t.risk_trend_band = double(config, S, "risk_trend_band", t.risk_trend_band)?;
    t.risk_trend_window = count(config, S, "risk_trend_window", t.risk_trend_window)?;
    t.embi_levels = bands(config, S, "embi", t.embi_levels)?;
    t.reit_trend_band = double(config, S, "reit_trend_band", t.reit_trend_band)?;
    t.reit_trend_window = count(config, S, "reit_trend_window", t.reit_trend_window)?;
    t.premium_high = double(config, S, "premium_high", t.premium_high)?;
    t.premium_positive = double(config, S, "premium_positive", t.premium_positive)?;
    t.premium_negative = double(config, S, "premium_negative", t.premium_negative)?;

    const W: &str = "phase.weights";
    for key in config.keys(W) {
        let (group_key, state_key) = key
            .split_once('.')
            .ok_or_else(|| MacrocycleError::invalid(W, &key, "expected group.state"))?;
        let group = SignalGroup::from_key(group_key)
            .ok_or_else(|| MacrocycleError::invalid(W, &key, "unknown signal group"))?;
        let state = group
            .parse_state(state_key)
            .ok_or_else(|| MacrocycleError::invalid(W, &key, "unknown state for group"))?;
        let weights = match non_empty(config.get_string(W, &key)) {
            None => Vec::new(),
            Some(raw) => parse_phase_weights(&raw)
                .map_err(|reason| MacrocycleError::invalid(W, &key, reason))?,
        };
        phase.weights.set(group, state, weights);
    }
    Ok(())
}

/// Parse `phase:weight` pairs, e.g. `peak:2, contraction:2`.
pub fn parse_phase_weights(input: &str) -> Result<Vec<(Phase, f64)>, String> {
    let mut weights = Vec::new();
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (phase, weight) = token
            .split_once(':')
            .ok_or_else(|| format!("expected phase:weight, got '{token}'"))?;
        let phase: Phase = phase.parse()?;
        let weight: f64 = weight
            .trim()
            .parse()
            .map_err(|_| format!("invalid weight '{}'", weight.trim()))?;
        weights.push((phase, weight));
    }
    Ok(weights)
}

fn load_timing(config: &dyn ConfigPort, timing: &mut TimingConfig) -> Result<(), MacrocycleError> {
    const S: &str = "timing";
    let w = &mut timing.weights;
    w.cycle = double(config, S, "cycle_weight", w.cycle)?;
    w.valuation = double(config, S, "valuation_weight", w.valuation)?;
    w.momentum = double(config, S, "momentum_weight", w.momentum)?;
    w.sovereign_risk = double(config, S, "sovereign_risk_weight", w.sovereign_risk)?;
    w.liquidity = double(config, S, "liquidity_weight", w.liquidity)?;

    let b = &mut timing.bands;
    b.sell = double(config, S, "sell_threshold", b.sell)?;
    b.neutral = double(config, S, "neutral_threshold", b.neutral)?;
    b.buy = double(config, S, "buy_threshold", b.buy)?;
    b.strong_buy = double(config, S, "strong_buy_threshold", b.strong_buy)?;

    let c = &mut timing.cycle_values;
    c.expansion = double(config, S, "cycle_expansion", c.expansion)?;
    c.peak = double(config, S, "cycle_peak", c.peak)?;
    c.contraction = double(config, S, "cycle_contraction", c.contraction)?;
    c.recovery = double(config, S, "cycle_recovery", c.recovery)?;

    timing.momentum_lookback = count(config, S, "momentum_lookback", timing.momentum_lookback)?;

    step_table(config, "timing.premium", &mut timing.premium)?;
    step_table(config, "timing.sovereign_risk", &mut timing.sovereign_risk)?;
    step_table(config, "timing.liquidity", &mut timing.liquidity)?;
    step_table(config, "timing.momentum", &mut timing.momentum)?;
    Ok(())
}

fn load_valuation(
    config: &dyn ConfigPort,
    valuation: &mut ValuationConfig,
) -> Result<(), MacrocycleError> {
    const S: &str = "valuation";
    if let Some(raw) = non_empty(config.get_string(S, "edges")) {
        let parsed: Result<Vec<f64>, _> = raw.split(',').map(|e| e.trim().parse::<f64>()).collect();
        let edges = parsed.map_err(|_| MacrocycleError::invalid(S, "edges", "not a number list"))?;
        valuation.edges = edges
            .try_into()
            .map_err(|_| MacrocycleError::invalid(S, "edges", "expected exactly four edges"))?;
    }
    valuation.deviation_span = double(config, S, "deviation_span", valuation.deviation_span)?;
    Ok(())
}

fn load_allocation(
    config: &dyn ConfigPort,
    allocation: &mut AllocationConfig,
) -> Result<(), MacrocycleError> {
    const S: &str = "allocation";
    allocation.very_cheap_bonus = double(config, S, "very_cheap_bonus", allocation.very_cheap_bonus)?;
    allocation.very_expensive_penalty = double(
        config,
        S,
        "very_expensive_penalty",
        allocation.very_expensive_penalty,
    )?;
    step_table(config, "allocation.cash", &mut allocation.cash_residual)?;

    let mut base: BTreeMap<Phase, SectorWeights> = BTreeMap::new();
    for phase in Phase::ALL {
        let section = format!("allocation.base.{}", phase.key());
        if !config.has_section(&section) {
            continue;
        }
        let keys = config.keys(&section);
        if keys.is_empty() {
            return Err(MacrocycleError::ConfigMissing {
                section,
                key: "<sector>".to_string(),
            });
        }
        let mut table = SectorWeights::new();
        for key in keys {
            let sector: Sector = key
                .parse()
                .map_err(|reason: String| MacrocycleError::invalid(&section, &key, reason))?;
            table.insert(sector, double(config, &section, &key, 0.0)?);
        }
        if !table.is_empty() {
            base.insert(phase, table);
        }
    }
    if !base.is_empty() {
        allocation.base = base;
    }

    const F: &str = "allocation.favoured";
    for phase in Phase::ALL {
        if let Some(raw) = non_empty(config.get_string(F, phase.key())) {
            allocation
                .favoured
                .insert(phase, sector_list(F, phase.key(), &raw)?);
        }
    }

    const M: &str = "allocation.asset_mix";
    for band in [Band::StrongBuy, Band::Buy, Band::Neutral, Band::Sell, Band::StrongSell] {
        let key = band.to_string().to_lowercase();
        if let Some(raw) = non_empty(config.get_string(M, &key)) {
            let parts: Result<Vec<f64>, _> = raw.split(',').map(|p| p.trim().parse::<f64>()).collect();
            match parts.as_deref() {
                Ok([equity, fixed_income, cash]) => {
                    allocation
                        .asset_mix
                        .insert(band, AssetMix::new(*equity, *fixed_income, *cash));
                }
                _ => {
                    return Err(MacrocycleError::invalid(
                        M,
                        &key,
                        "expected equity, fixed_income, cash",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn load_screening(
    config: &dyn ConfigPort,
    screening: &mut ScreeningConfig,
) -> Result<(), MacrocycleError> {
    const S: &str = "screening";
    screening.pe_attractive = double(config, S, "pe_attractive", screening.pe_attractive)?;
    screening.pe_reasonable = double(config, S, "pe_reasonable", screening.pe_reasonable)?;
    screening.pb_very_attractive =
        double(config, S, "pb_very_attractive", screening.pb_very_attractive)?;
    screening.pb_attractive = double(config, S, "pb_attractive", screening.pb_attractive)?;
    screening.dividend_high = double(config, S, "dividend_high", screening.dividend_high)?;
    screening.dividend_good = double(config, S, "dividend_good", screening.dividend_good)?;
    let min_score = count(config, S, "min_score", screening.min_score as usize)?;
    screening.min_score = u32::try_from(min_score)
        .map_err(|_| MacrocycleError::invalid(S, "min_score", "too large"))?;
    Ok(())
}

fn load_sector_map(
    config: &dyn ConfigPort,
    mapper: &mut SectorMapper,
) -> Result<(), MacrocycleError> {
    const S: &str = "sector_map";
    for label in config.keys(S) {
        let raw = non_empty(config.get_string(S, &label))
            .ok_or_else(|| MacrocycleError::invalid(S, &label, "missing sector"))?;
        let sector: Sector = raw
            .parse()
            .map_err(|reason: String| MacrocycleError::invalid(S, &label, reason))?;
        mapper.insert(&label, sector);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::cycle::{CurveStatus, SubState};

    fn load(content: &str) -> Result<EngineConfig, MacrocycleError> {
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        EngineConfig::from_port(&adapter)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = load("").unwrap();
        let defaults = EngineConfig::default();
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.phase, defaults.phase);
        assert_eq!(config.timing, defaults.timing);
        assert_eq!(config.allocation, defaults.allocation);
    }

    #[test]
    fn engine_section_overrides_version_and_fallback() {
        let config = load("[engine]\nversion = 2024-q3\nfallback_phase = recovery\n").unwrap();
        assert_eq!(config.version, "2024-q3");
        assert_eq!(config.phase.fallback_phase, Phase::Recovery);
    }

    #[test]
    fn unknown_fallback_phase_is_invalid() {
        let result = load("[engine]\nfallback_phase = boom\n");
        assert!(matches!(
            result,
            Err(MacrocycleError::ConfigInvalid { ref key, .. }) if key == "fallback_phase"
        ));
    }

    #[test]
    fn phase_weights_override_and_remove_entries() {
        let config = load(
            "[phase.weights]\ncurve.inverted = contraction:3, peak:1\ncurve.flat =\nembi_level.very_high = contraction:1\n",
        )
        .unwrap();
        let w = &config.phase.weights;
        assert_eq!(
            w.get(SignalGroup::Curve, SubState::Curve(CurveStatus::Inverted)),
            &[(Phase::Contraction, 3.0), (Phase::Peak, 1.0)]
        );
        assert!(w.get(SignalGroup::Curve, SubState::Curve(CurveStatus::Flat)).is_empty());
        assert_eq!(
            w.get(
                SignalGroup::EmbiLevel,
                SubState::Level(crate::domain::cycle::Level::VeryHigh)
            ),
            &[(Phase::Contraction, 1.0)]
        );
    }

    #[test]
    fn phase_weight_with_unknown_state_is_invalid() {
        let result = load("[phase.weights]\ncurve.rising = peak:1\n");
        assert!(matches!(result, Err(MacrocycleError::ConfigInvalid { .. })));
    }

    #[test]
    fn thresholds_are_read_by_prefix() {
        let config = load("[phase.thresholds]\npolicy_low = 4\npolicy_high = 14\nrisk_trend_window = 20\n")
            .unwrap();
        let t = &config.phase.thresholds;
        assert_eq!(t.policy_levels, LevelBands::new(4.0, 9.0, 14.0));
        assert_eq!(t.risk_trend_window, 20);
    }

    #[test]
    fn non_numeric_threshold_is_invalid() {
        let result = load("[phase.thresholds]\ncurve_steep = steep\n");
        assert!(matches!(
            result,
            Err(MacrocycleError::ConfigInvalid { ref section, .. }) if section == "phase.thresholds"
        ));
    }

    #[test]
    fn timing_step_tables_are_replaced() {
        let config = load(
            "[timing]\ncycle_weight = 0.5\n\n[timing.premium]\nsteps = 4:100, 0:0\notherwise = -50\n",
        )
        .unwrap();
        assert_eq!(config.timing.weights.cycle, 0.5);
        assert_eq!(config.timing.premium.steps, vec![(4.0, 100.0), (0.0, 0.0)]);
        assert_eq!(config.timing.premium.otherwise, -50.0);
        assert_eq!(config.timing.liquidity, TimingConfig::default().liquidity);
    }

    #[test]
    fn base_tables_are_replaced_wholesale() {
        let config = load("[allocation.base.peak]\nenergy = 60\nfinancials = 40\n").unwrap();
        assert_eq!(config.allocation.base.len(), 1);
        let peak = &config.allocation.base[&Phase::Peak];
        assert_eq!(peak[&Sector::Energy], 60.0);
        assert_eq!(peak[&Sector::Financials], 40.0);
    }

    #[test]
    fn unknown_sector_in_base_table_is_invalid() {
        let result = load("[allocation.base.peak]\nshipping = 100\n");
        assert!(matches!(result, Err(MacrocycleError::ConfigInvalid { .. })));
    }

    #[test]
    fn asset_mix_parses_three_parts() {
        let config = load("[allocation.asset_mix]\nstrong_buy = 90, 10, 0\n").unwrap();
        assert_eq!(
            config.allocation.asset_mix[&Band::StrongBuy],
            AssetMix::new(90.0, 10.0, 0.0)
        );
        assert!(load("[allocation.asset_mix]\nbuy = 90, 10\n").is_err());
    }

    #[test]
    fn valuation_edges_need_four_values() {
        let config = load("[valuation]\nedges = 0.1, 0.3, 0.7, 0.9\n").unwrap();
        assert_eq!(config.valuation.edges, [0.1, 0.3, 0.7, 0.9]);
        assert!(load("[valuation]\nedges = 0.1, 0.3\n").is_err());
    }

    #[test]
    fn sector_map_adds_entries() {
        let config = load("[sector_map]\nShipping = industrials\n").unwrap();
        assert_eq!(config.sector_mapper.map("SHIPPING"), Some(Sector::Industrials));
        assert!(load("[sector_map]\nShipping = boats\n").is_err());
    }

    #[test]
    fn empty_base_section_is_a_missing_key() {
        let result = load("[allocation.base.peak]\n\n[engine]\nversion = x\n");
        match result {
            Err(MacrocycleError::ConfigMissing { section, .. }) => {
                assert_eq!(section, "allocation.base.peak")
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn integer_keys_reject_negative_and_fractional_values() {
        assert!(matches!(
            load("[timing]\nmomentum_lookback = -3\n"),
            Err(MacrocycleError::ConfigInvalid { ref key, .. }) if key == "momentum_lookback"
        ));
        assert!(load("[timing]\nmomentum_lookback = 2.5\n").is_err());
        let config = load("[timing]\nmomentum_lookback = 63\n").unwrap();
        assert_eq!(config.timing.momentum_lookback, 63);
    }

    #[test]
    fn blank_value_keeps_default() {
        let config = load("[alignment]\nthreshold =\n").unwrap();
        assert_eq!(config.alignment.threshold, AlignmentConfig::default().threshold);
    }

    #[test]
    fn favoured_sectors_are_replaced_per_phase() {
        let config = load("[allocation.favoured]\npeak = energy, utilities\n").unwrap();
        assert_eq!(
            config.allocation.favoured[&Phase::Peak],
            vec![Sector::Energy, Sector::Utilities]
        );
        assert_eq!(
            config.allocation.favoured[&Phase::Expansion],
            AllocationConfig::default().favoured[&Phase::Expansion]
        );
        assert!(load("[allocation.favoured]\npeak = boats\n").is_err());
    }

    #[test]
    fn screening_and_reit_thresholds_are_read() {
        let config = load(
            "[screening]\npe_attractive = 8\nmin_score = 2\n\n[phase.thresholds]\nreit_trend_window = 20\n",
        )
        .unwrap();
        assert_eq!(config.screening.pe_attractive, 8.0);
        assert_eq!(config.screening.min_score, 2);
        assert_eq!(config.screening.pe_reasonable, 15.0);
        assert_eq!(config.phase.thresholds.reit_trend_window, 20);
    }

    #[test]
    fn parse_phase_weights_rejects_unknown_phase() {
        assert!(parse_phase_weights("boom:1").is_err());
        assert!(parse_phase_weights("peak").is_err());
        assert!(parse_phase_weights("").unwrap().is_empty());
    }
}
