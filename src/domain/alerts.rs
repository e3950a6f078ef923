//! Human-readable alerts derived from the cycle and timing results.

use crate::domain::cycle::{CurveStatus, CycleResult, RiskTrend, SignalGroup, SubState, Trend};
use crate::domain::phase::Phase;
use crate::domain::timing::{Band, TimingResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CyclePhase,
    TimingBand,
    InvertedCurve,
    RisingInflation,
    PolicyTightening,
    PolicyEasing,
    WorseningRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    fn high(kind: AlertKind, message: String) -> Self {
        Self {
            kind,
            severity: Severity::High,
            message,
        }
    }

    fn medium(kind: AlertKind, message: &str) -> Self {
        Self {
            kind,
            severity: Severity::Medium,
            message: message.to_string(),
        }
    }
}

fn phase_hint(phase: Phase) -> &'static str {
    match phase {
        Phase::Expansion => "favour cyclical and growth sectors",
        Phase::Peak => "favour pricing power and commodities",
        Phase::Contraction => "favour defensive and dividend sectors",
        Phase::Recovery => "favour cyclicals and financials",
    }
}

fn band_hint(band: Band) -> &'static str {
    match band {
        Band::StrongBuy => "conditions strongly favour adding equity exposure",
        Band::Buy => "conditions favour adding equity exposure",
        Band::Neutral => "keep exposure close to neutral",
        Band::Sell => "conditions favour reducing equity exposure",
        Band::StrongSell => "conditions strongly favour a defensive stance",
    }
}

/// Alerts in a fixed order: phase, timing, then signal-specific warnings.
pub fn generate(cycle: &CycleResult, timing: &TimingResult) -> Vec<Alert> {
    let mut alerts = vec![
        Alert::high(
            AlertKind::CyclePhase,
            format!(
                "cycle phase {} ({:.0}% confidence): {}",
                cycle.phase,
                cycle.confidence,
                phase_hint(cycle.phase)
            ),
        ),
        Alert::high(
            AlertKind::TimingBand,
            format!(
                "market timing {} ({:.0}): {}",
                timing.band,
                timing.score,
                band_hint(timing.band)
            ),
        ),
    ];

    if cycle.detail(SignalGroup::Curve) == Some(SubState::Curve(CurveStatus::Inverted)) {
        alerts.push(Alert::high(
            AlertKind::InvertedCurve,
            "yield curve inverted: historically a leading recession signal".to_string(),
        ));
    }
    if cycle.detail(SignalGroup::InflationTrend) == Some(SubState::Trend(Trend::Rising)) {
        alerts.push(Alert::medium(
            AlertKind::RisingInflation,
            "inflation trending up: monetary tightening risk",
        ));
    }
    match cycle.detail(SignalGroup::PolicyTrend) {
        Some(SubState::Trend(Trend::Rising)) => alerts.push(Alert::medium(
            AlertKind::PolicyTightening,
            "policy rate rising: tighter financial conditions ahead",
        )),
        Some(SubState::Trend(Trend::Falling)) => alerts.push(Alert::medium(
            AlertKind::PolicyEasing,
            "policy rate falling: easing supports risk assets",
        )),
        _ => {}
    }
    if cycle.detail(SignalGroup::RiskTrend) == Some(SubState::Risk(RiskTrend::Worsening)) {
        alerts.push(Alert::medium(
            AlertKind::WorseningRisk,
            "sovereign risk worsening: expect higher volatility",
        ));
    }
    alerts
}
