//! Configuration validation.
//!
//! Checks a typed [`EngineConfig`] before any evaluation runs. A phase with
//! no base allocation is not rejected here; it only fails when that phase is
//! actually selected, so it is reported by [`phases_without_base_allocation`].

use crate::domain::allocation::WEIGHT_SUM_TOLERANCE;
use crate::domain::cycle::{LevelBands, PhaseConfig};
use crate::domain::engine_config::EngineConfig;
use crate::domain::error::MacrocycleError;
use crate::domain::phase::Phase;
use crate::domain::step_table::StepTable;
use crate::domain::timing::{SCORE_MAX, SCORE_MIN, TimingConfig, TimingTerm};

pub fn validate_engine_config(config: &EngineConfig) -> Result<(), MacrocycleError> {
    validate_phase(&config.phase)?;
    validate_timing(&config.timing)?;
    validate_valuation(config)?;
    validate_allocation(config)?;
    validate_alignment(config)?;
    validate_screening(config)?;
    Ok(())
}

pub fn phases_without_base_allocation(config: &EngineConfig) -> Vec<Phase> {
    Phase::ALL
        .iter()
        .filter(|p| {
            config
                .allocation
                .base
                .get(p)
                .is_none_or(|table| table.is_empty())
        })
        .copied()
        .collect()
}

fn finite(section: &str, key: &str, value: f64) -> Result<(), MacrocycleError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MacrocycleError::invalid(section, key, "must be a finite number"))
    }
}

fn non_negative(section: &str, key: &str, value: f64) -> Result<(), MacrocycleError> {
    finite(section, key, value)?;
    if value < 0.0 {
        return Err(MacrocycleError::invalid(section, key, "must be non-negative"));
    }
    Ok(())
}

fn positive_count(section: &str, key: &str, value: usize) -> Result<(), MacrocycleError> {
    if value == 0 {
        return Err(MacrocycleError::invalid(section, key, "must be at least 1"));
    }
    Ok(())
}

fn ordered_bands(section: &str, prefix: &str, bands: &LevelBands) -> Result<(), MacrocycleError> {
    for (suffix, value) in [("low", bands.low), ("moderate", bands.moderate), ("high", bands.high)] {
        finite(section, &format!("{prefix}_{suffix}"), value)?;
    }
    if !bands.is_ordered() {
        return Err(MacrocycleError::invalid(
            section,
            &format!("{prefix}_low"),
            "levels must be strictly ascending (low < moderate < high)",
        ));
    }
    Ok(())
}

fn bounded_step_table(
    section: &str,
    table: &StepTable,
    min: f64,
    max: f64,
) -> Result<(), MacrocycleError> {
    if table.steps.iter().any(|(t, _)| !t.is_finite()) {
        return Err(MacrocycleError::invalid(section, "steps", "thresholds must be finite"));
    }
    if !table.is_ordered() {
        return Err(MacrocycleError::invalid(
            section,
            "steps",
            "thresholds must be strictly monotone in evaluation order",
        ));
    }
    if table.values().any(|v| !(v.is_finite() && (min..=max).contains(&v))) {
        return Err(MacrocycleError::invalid(
            section,
            "steps",
            format!("values must lie within [{min}, {max}]"),
        ));
    }
    Ok(())
}

fn validate_phase(phase: &PhaseConfig) -> Result<(), MacrocycleError> {
    const S: &str = "phase.thresholds";
    let t = &phase.thresholds;
    for (key, value) in [
        ("curve_steep", t.curve_steep),
        ("curve_normal", t.curve_normal),
        ("curve_flat", t.curve_flat),
        ("premium_high", t.premium_high),
        ("premium_positive", t.premium_positive),
        ("premium_negative", t.premium_negative),
    ] {
        finite(S, key, value)?;
    }
    if !(t.curve_flat < t.curve_normal && t.curve_normal < t.curve_steep) {
        return Err(MacrocycleError::invalid(
            S,
            "curve_steep",
            "curve thresholds must satisfy flat < normal < steep",
        ));
    }
    if !(t.premium_negative < t.premium_positive && t.premium_positive < t.premium_high) {
        return Err(MacrocycleError::invalid(
            S,
            "premium_high",
            "premium thresholds must satisfy negative < positive < high",
        ));
    }
    ordered_bands(S, "inflation", &t.inflation_levels)?;
    ordered_bands(S, "policy", &t.policy_levels)?;
    ordered_bands(S, "labor", &t.labor_levels)?;
    ordered_bands(S, "risk", &t.risk_levels)?;
    ordered_bands(S, "embi", &t.embi_levels)?;
    non_negative(S, "inflation_trend_band", t.inflation_trend_band)?;
    non_negative(S, "risk_trend_band", t.risk_trend_band)?;
    non_negative(S, "reit_trend_band", t.reit_trend_band)?;
    positive_count(S, "inflation_trend_window", t.inflation_trend_window)?;
    positive_count(S, "policy_trend_lag", t.policy_trend_lag)?;
    positive_count(S, "risk_trend_window", t.risk_trend_window)?;
    positive_count(S, "reit_trend_window", t.reit_trend_window)?;

    for (group, state, weights) in phase.weights.iter() {
        let key = format!("{}.{}", group.key(), state.key());
        for (_, weight) in weights {
            non_negative("phase.weights", &key, *weight)?;
        }
    }
    Ok(())
}

fn validate_timing(timing: &TimingConfig) -> Result<(), MacrocycleError> {
    const S: &str = "timing";
    for term in TimingTerm::ALL {
        non_negative(S, &format!("{}_weight", term.key()), timing.weights.get(term))?;
    }

    let b = &timing.bands;
    for (key, value) in [
        ("sell_threshold", b.sell),
        ("neutral_threshold", b.neutral),
        ("buy_threshold", b.buy),
        ("strong_buy_threshold", b.strong_buy),
    ] {
        finite(S, key, value)?;
    }
    if !b.is_ordered() {
        return Err(MacrocycleError::invalid(
            S,
            "sell_threshold",
            "band thresholds must be strictly ascending",
        ));
    }

    for phase in Phase::ALL {
        let key = format!("cycle_{}", phase.key());
        let value = timing.cycle_values.get(phase);
        finite(S, &key, value)?;
        if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
            return Err(MacrocycleError::invalid(S, &key, "must lie within [-100, 100]"));
        }
    }
    positive_count(S, "momentum_lookback", timing.momentum_lookback)?;

    bounded_step_table("timing.premium", &timing.premium, SCORE_MIN, SCORE_MAX)?;
    bounded_step_table("timing.sovereign_risk", &timing.sovereign_risk, SCORE_MIN, SCORE_MAX)?;
    bounded_step_table("timing.liquidity", &timing.liquidity, SCORE_MIN, SCORE_MAX)?;
    bounded_step_table("timing.momentum", &timing.momentum, SCORE_MIN, SCORE_MAX)?;
    Ok(())
}

fn validate_valuation(config: &EngineConfig) -> Result<(), MacrocycleError> {
    const S: &str = "valuation";
    let edges = &config.valuation.edges;
    let inside = edges.iter().all(|e| e.is_finite() && *e > 0.0 && *e < 1.0);
    let ascending = edges.windows(2).all(|pair| pair[0] < pair[1]);
    if !(inside && ascending) {
        return Err(MacrocycleError::invalid(
            S,
            "edges",
            "edges must be strictly ascending within (0, 1)",
        ));
    }
    finite(S, "deviation_span", config.valuation.deviation_span)?;
    if config.valuation.deviation_span <= 0.0 {
        return Err(MacrocycleError::invalid(S, "deviation_span", "must be positive"));
    }
    Ok(())
}

fn validate_allocation(config: &EngineConfig) -> Result<(), MacrocycleError> {
    let allocation = &config.allocation;
    non_negative("allocation", "very_cheap_bonus", allocation.very_cheap_bonus)?;
    non_negative(
        "allocation",
        "very_expensive_penalty",
        allocation.very_expensive_penalty,
    )?;
    bounded_step_table("allocation.cash", &allocation.cash_residual, 0.0, 100.0)?;

    for (phase, table) in &allocation.base {
        let section = format!("allocation.base.{}", phase.key());
        for (sector, weight) in table {
            non_negative(&section, sector.key(), *weight)?;
        }
        let total: f64 = table.values().sum();
        if !table.is_empty() && (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MacrocycleError::invalid(
                &section,
                "*",
                format!("weights must sum to 100, got {total}"),
            ));
        }
    }

    for (band, mix) in &allocation.asset_mix {
        let key = band.to_string().to_lowercase();
        for value in [mix.equity, mix.fixed_income, mix.cash] {
            non_negative("allocation.asset_mix", &key, value)?;
        }
        if (mix.total() - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MacrocycleError::invalid(
                "allocation.asset_mix",
                &key,
                format!("mix must sum to 100, got {}", mix.total()),
            ));
        }
    }
    Ok(())
}

fn validate_alignment(config: &EngineConfig) -> Result<(), MacrocycleError> {
    non_negative("alignment", "threshold", config.alignment.threshold)
}

fn validate_screening(config: &EngineConfig) -> Result<(), MacrocycleError> {
    const S: &str = "screening";
    let c = &config.screening;
    for (key, value) in [
        ("pe_attractive", c.pe_attractive),
        ("pe_reasonable", c.pe_reasonable),
        ("pb_very_attractive", c.pb_very_attractive),
        ("pb_attractive", c.pb_attractive),
        ("dividend_high", c.dividend_high),
        ("dividend_good", c.dividend_good),
    ] {
        non_negative(S, key, value)?;
    }
    if c.pe_attractive >= c.pe_reasonable {
        return Err(MacrocycleError::invalid(
            S,
            "pe_attractive",
            "must be below pe_reasonable",
        ));
    }
    if c.pb_very_attractive >= c.pb_attractive {
        return Err(MacrocycleError::invalid(
            S,
            "pb_very_attractive",
            "must be below pb_attractive",
        ));
    }
    if c.dividend_good >= c.dividend_high {
        return Err(MacrocycleError::invalid(
            S,
            "dividend_good",
            "must be below dividend_high",
        ));
    }
    Ok(())
}
