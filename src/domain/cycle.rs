//! Economic cycle phase classification.
//!
//! Each signal group derives a categorical sub-state from the snapshot using
//! configured thresholds. The sub-state then adds its configured weights to
//! one or more phases. Missing indicators add nothing to any phase.

use crate::domain::phase::{Phase, PhaseScoreVector};
use crate::domain::snapshot::{Indicator, IndicatorSnapshot};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Phase reported when no signal group contributes any weight.
pub const DEFAULT_FALLBACK_PHASE: Phase = Phase::Expansion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurveStatus {
    Steep,
    Normal,
    Flat,
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trend {
    Rising,
    Stable,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RiskTrend {
    Improving,
    Stable,
    Worsening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PremiumState {
    High,
    Positive,
    Negative,
    VeryNegative,
}

/// Sub-classification produced by one signal group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubState {
    Curve(CurveStatus),
    Level(Level),
    Trend(Trend),
    Risk(RiskTrend),
    Premium(PremiumState),
}

impl SubState {
    pub fn key(&self) -> &'static str {
        match self {
            SubState::Curve(CurveStatus::Steep) => "steep",
            SubState::Curve(CurveStatus::Normal) => "normal",
            SubState::Curve(CurveStatus::Flat) => "flat",
            SubState::Curve(CurveStatus::Inverted) => "inverted",
            SubState::Level(Level::Low) => "low",
            SubState::Level(Level::Moderate) => "moderate",
            SubState::Level(Level::High) => "high",
            SubState::Level(Level::VeryHigh) => "very_high",
            SubState::Trend(Trend::Rising) => "rising",
            SubState::Trend(Trend::Stable) | SubState::Risk(RiskTrend::Stable) => "stable",
            SubState::Trend(Trend::Falling) => "falling",
            SubState::Risk(RiskTrend::Improving) => "improving",
            SubState::Risk(RiskTrend::Worsening) => "worsening",
            SubState::Premium(PremiumState::High) => "high",
            SubState::Premium(PremiumState::Positive) => "positive",
            SubState::Premium(PremiumState::Negative) => "negative",
            SubState::Premium(PremiumState::VeryNegative) => "very_negative",
        }
    }
}

impl fmt::Display for SubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key().to_uppercase())
    }
}

impl Serialize for SubState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Indicator groups that vote on the cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalGroup {
    Curve,
    InflationTrend,
    InflationLevel,
    PolicyTrend,
    PolicyLevel,
    LaborLevel,
    RiskLevel,
    RiskTrend,
    EmbiLevel,
    Premium,
    ReitTrend,
}

impl SignalGroup {
    pub const ALL: [SignalGroup; 11] = [
        SignalGroup::Curve,
        SignalGroup::InflationTrend,
        SignalGroup::InflationLevel,
        SignalGroup::PolicyTrend,
        SignalGroup::PolicyLevel,
        SignalGroup::LaborLevel,
        SignalGroup::RiskLevel,
        SignalGroup::RiskTrend,
        SignalGroup::EmbiLevel,
        SignalGroup::Premium,
        SignalGroup::ReitTrend,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SignalGroup::Curve => "curve",
            SignalGroup::InflationTrend => "inflation_trend",
            SignalGroup::InflationLevel => "inflation_level",
            SignalGroup::PolicyTrend => "policy_trend",
            SignalGroup::PolicyLevel => "policy_level",
            SignalGroup::LaborLevel => "labor_level",
            SignalGroup::RiskLevel => "risk_level",
            SignalGroup::RiskTrend => "risk_trend",
            SignalGroup::EmbiLevel => "embi_level",
            SignalGroup::Premium => "premium",
            SignalGroup::ReitTrend => "reit_trend",
        }
    }

    pub fn from_key(key: &str) -> Option<SignalGroup> {
        let key = key.trim().to_lowercase();
        SignalGroup::ALL.iter().find(|g| g.key() == key).copied()
    }

    /// Every sub-state this group can produce.
    pub fn states(&self) -> Vec<SubState> {
        match self {
            SignalGroup::Curve => [
                CurveStatus::Steep,
                CurveStatus::Normal,
                CurveStatus::Flat,
                CurveStatus::Inverted,
            ]
            .into_iter()
            .map(SubState::Curve)
            .collect(),
            SignalGroup::InflationTrend | SignalGroup::PolicyTrend | SignalGroup::ReitTrend => {
                [Trend::Rising, Trend::Stable, Trend::Falling]
                    .into_iter()
                    .map(SubState::Trend)
                    .collect()
            }
            SignalGroup::InflationLevel
            | SignalGroup::PolicyLevel
            | SignalGroup::LaborLevel
            | SignalGroup::RiskLevel
            | SignalGroup::EmbiLevel => [Level::Low, Level::Moderate, Level::High, Level::VeryHigh]
                .into_iter()
                .map(SubState::Level)
                .collect(),
            SignalGroup::RiskTrend => [RiskTrend::Improving, RiskTrend::Stable, RiskTrend::Worsening]
                .into_iter()
                .map(SubState::Risk)
                .collect(),
            SignalGroup::Premium => [
                PremiumState::High,
                PremiumState::Positive,
                PremiumState::Negative,
                PremiumState::VeryNegative,
            ]
            .into_iter()
            .map(SubState::Premium)
            .collect(),
        }
    }

    pub fn parse_state(&self, key: &str) -> Option<SubState> {
        let key = key.trim().to_lowercase();
        self.states().into_iter().find(|s| s.key() == key)
    }
}

impl fmt::Display for SignalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Ascending cut points for a four-level classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelBands {
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
}

impl LevelBands {
    pub const fn new(low: f64, moderate: f64, high: f64) -> Self {
        Self {
            low,
            moderate,
            high,
        }
    }

    pub fn classify(&self, value: f64) -> Level {
        if value < self.low {
            Level::Low
        } else if value < self.moderate {
            Level::Moderate
        } else if value < self.high {
            Level::High
        } else {
            Level::VeryHigh
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.low < self.moderate && self.moderate < self.high
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseThresholds {
    /// Curve slope (long minus short) above which the curve is steep.
    pub curve_steep: f64,
    pub curve_normal: f64,
    pub curve_flat: f64,
    pub inflation_levels: LevelBands,
    /// Relative change of the smoothed inflation series that counts as a trend.
    pub inflation_trend_band: f64,
    /// Observations in each of the two smoothing windows.
    pub inflation_trend_window: usize,
    pub policy_levels: LevelBands,
    /// Number of decisions back the latest policy rate is compared against.
    pub policy_trend_lag: usize,
    pub labor_levels: LevelBands,
    pub risk_levels: LevelBands,
    pub risk_trend_band: f64,
    pub risk_trend_window: usize,
    pub embi_levels: LevelBands,
    /// Deviation of the REIT index from its window mean that counts as a trend.
    pub reit_trend_band: f64,
    pub reit_trend_window: usize,
    pub premium_high: f64,
    pub premium_positive: f64,
    pub premium_negative: f64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            curve_steep: 1.5,
            curve_normal: 0.5,
            curve_flat: -0.5,
            inflation_levels: LevelBands::new(3.0, 5.0, 8.0),
            inflation_trend_band: 0.05,
            inflation_trend_window: 3,
            policy_levels: LevelBands::new(6.0, 9.0, 12.0),
            policy_trend_lag: 2,
            labor_levels: LevelBands::new(7.0, 10.0, 13.0),
            risk_levels: LevelBands::new(150.0, 250.0, 350.0),
            risk_trend_band: 0.10,
            risk_trend_window: 30,
            embi_levels: LevelBands::new(200.0, 300.0, 400.0),
            reit_trend_band: 0.05,
            reit_trend_window: 30,
            premium_high: 3.0,
            premium_positive: 0.0,
            premium_negative: -3.0,
        }
    }
}

/// Static sub-state to phase-weight table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhaseWeights {
    table: BTreeMap<(SignalGroup, SubState), Vec<(Phase, f64)>>,
}

impl PhaseWeights {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, group: SignalGroup, state: SubState) -> &[(Phase, f64)] {
        self.table
            .get(&(group, state))
            .map(|w| w.as_slice())
            .unwrap_or(&[])
    }

    /// Replace the weights for one sub-state. An empty list removes the entry.
    pub fn set(&mut self, group: SignalGroup, state: SubState, weights: Vec<(Phase, f64)>) {
        if weights.is_empty() {
            self.table.remove(&(group, state));
        } else {
            self.table.insert((group, state), weights);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalGroup, SubState, &[(Phase, f64)])> {
        self.table
            .iter()
            .map(|((group, state), weights)| (*group, *state, weights.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Built-in weights. `embi_level` and `reit_trend` carry no default votes.
/// A steep curve votes like a normal one.
pub fn default_weights() -> PhaseWeights {
    use Phase::*;
    use SignalGroup as G;

    let mut w = PhaseWeights::empty();
    let curve = SubState::Curve;
    let level = SubState::Level;
    let trend = SubState::Trend;

    w.set(G::Curve, curve(CurveStatus::Steep), vec![(Expansion, 2.0), (Recovery, 1.0)]);
    w.set(G::Curve, curve(CurveStatus::Normal), vec![(Expansion, 2.0), (Recovery, 1.0)]);
    w.set(G::Curve, curve(CurveStatus::Flat), vec![(Peak, 1.0), (Recovery, 1.0)]);
    w.set(G::Curve, curve(CurveStatus::Inverted), vec![(Peak, 2.0), (Contraction, 2.0)]);

    w.set(G::InflationTrend, trend(Trend::Rising), vec![(Expansion, 1.0), (Peak, 2.0)]);
    w.set(G::InflationTrend, trend(Trend::Stable), vec![(Expansion, 1.0), (Contraction, 1.0)]);
    w.set(G::InflationTrend, trend(Trend::Falling), vec![(Contraction, 1.0), (Recovery, 2.0)]);

    w.set(G::InflationLevel, level(Level::Low), vec![(Recovery, 2.0)]);
    w.set(G::InflationLevel, level(Level::Moderate), vec![(Expansion, 1.0)]);
    w.set(G::InflationLevel, level(Level::High), vec![(Peak, 1.0)]);
    w.set(G::InflationLevel, level(Level::VeryHigh), vec![(Peak, 2.0)]);

    w.set(G::PolicyTrend, trend(Trend::Rising), vec![(Peak, 2.0), (Expansion, 1.0)]);
    w.set(G::PolicyTrend, trend(Trend::Stable), vec![(Expansion, 1.0), (Contraction, 1.0)]);
    w.set(G::PolicyTrend, trend(Trend::Falling), vec![(Contraction, 1.0), (Recovery, 2.0)]);

    w.set(G::PolicyLevel, level(Level::Low), vec![(Recovery, 2.0), (Expansion, 1.0)]);
    w.set(G::PolicyLevel, level(Level::Moderate), vec![(Expansion, 1.0)]);
    w.set(G::PolicyLevel, level(Level::High), vec![(Peak, 1.0), (Contraction, 1.0)]);
    w.set(G::PolicyLevel, level(Level::VeryHigh), vec![(Contraction, 2.0)]);

    w.set(G::LaborLevel, level(Level::Low), vec![(Expansion, 1.0), (Peak, 1.0)]);
    w.set(G::LaborLevel, level(Level::Moderate), vec![(Expansion, 1.0)]);
    w.set(G::LaborLevel, level(Level::High), vec![(Contraction, 1.0), (Recovery, 1.0)]);
    w.set(G::LaborLevel, level(Level::VeryHigh), vec![(Contraction, 2.0)]);

    w.set(G::RiskLevel, level(Level::Low), vec![(Expansion, 1.0), (Recovery, 1.0)]);
    w.set(G::RiskLevel, level(Level::High), vec![(Peak, 1.0), (Contraction, 1.0)]);
    w.set(G::RiskLevel, level(Level::VeryHigh), vec![(Peak, 1.0), (Contraction, 1.0)]);

    w.set(G::RiskTrend, SubState::Risk(RiskTrend::Improving), vec![(Recovery, 1.0)]);
    w.set(G::RiskTrend, SubState::Risk(RiskTrend::Worsening), vec![(Peak, 1.0)]);

    w.set(G::Premium, SubState::Premium(PremiumState::High), vec![(Contraction, 1.0), (Recovery, 2.0)]);
    w.set(G::Premium, SubState::Premium(PremiumState::Positive), vec![(Expansion, 1.0)]);
    w.set(G::Premium, SubState::Premium(PremiumState::Negative), vec![(Peak, 1.0)]);
    w.set(G::Premium, SubState::Premium(PremiumState::VeryNegative), vec![(Peak, 2.0)]);

    w
}

/// Immutable configuration for [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseConfig {
    pub thresholds: PhaseThresholds,
    pub weights: PhaseWeights,
    pub fallback_phase: Phase,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            thresholds: PhaseThresholds::default(),
            weights: default_weights(),
            fallback_phase: DEFAULT_FALLBACK_PHASE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    pub phase: Phase,
    pub confidence: f64,
    pub score_vector: PhaseScoreVector,
    pub phase_detail: BTreeMap<SignalGroup, SubState>,
}

impl CycleResult {
    pub fn detail(&self, group: SignalGroup) -> Option<SubState> {
        self.phase_detail.get(&group).copied()
    }
}

/// Classify the cycle phase for one snapshot. Never fails.
pub fn classify(snapshot: &IndicatorSnapshot, config: &PhaseConfig) -> CycleResult {
    let phase_detail = derive_sub_states(snapshot, &config.thresholds);

    let mut score_vector = PhaseScoreVector::zero();
    for (group, state) in &phase_detail {
        for (phase, weight) in config.weights.get(*group, *state) {
            score_vector.add(*phase, *weight);
        }
    }

    let total = score_vector.total();
    let (phase, confidence) = if total > 0.0 {
        let winner = score_vector.winner();
        let share = 100.0 * score_vector.get(winner) / total;
        (winner, share.clamp(0.0, 100.0))
    } else {
        (config.fallback_phase, 0.0)
    };

    debug!(
        %phase,
        confidence,
        groups = phase_detail.len(),
        "cycle phase classified"
    );

    CycleResult {
        phase,
        confidence,
        score_vector,
        phase_detail,
    }
}

/// Derive every sub-state the snapshot has enough data for.
pub fn derive_sub_states(
    snapshot: &IndicatorSnapshot,
    t: &PhaseThresholds,
) -> BTreeMap<SignalGroup, SubState> {
    let mut detail = BTreeMap::new();

    if let Some(slope) = curve_slope(snapshot) {
        detail.insert(SignalGroup::Curve, SubState::Curve(curve_status(slope, t)));
    }

    let inflation = inflation_12m_series(snapshot);
    if let Some(latest) = inflation.last() {
        detail.insert(
            SignalGroup::InflationLevel,
            SubState::Level(t.inflation_levels.classify(*latest)),
        );
    }
    if let Some(change) = smoothed_change(&inflation, t.inflation_trend_window) {
        detail.insert(
            SignalGroup::InflationTrend,
            SubState::Trend(trend_from_change(change, t.inflation_trend_band)),
        );
    }

    let policy = snapshot.history(Indicator::PolicyRate);
    if let Some(latest) = policy.last() {
        detail.insert(
            SignalGroup::PolicyLevel,
            SubState::Level(t.policy_levels.classify(*latest)),
        );
    }
    if let Some(trend) = policy_trend(&policy, t.policy_trend_lag) {
        detail.insert(SignalGroup::PolicyTrend, SubState::Trend(trend));
    }

    if let Some(unemployment) = snapshot.latest(Indicator::Unemployment) {
        detail.insert(
            SignalGroup::LaborLevel,
            SubState::Level(t.labor_levels.classify(unemployment)),
        );
    }

    let cds = snapshot.history(Indicator::SovereignCds);
    if let Some(latest) = cds.last() {
        detail.insert(
            SignalGroup::RiskLevel,
            SubState::Level(t.risk_levels.classify(*latest)),
        );
    }
    if let Some(trend) = risk_trend(&cds, t.risk_trend_window, t.risk_trend_band) {
        detail.insert(SignalGroup::RiskTrend, SubState::Risk(trend));
    }

    if let Some(embi) = snapshot.latest(Indicator::Embi) {
        detail.insert(
            SignalGroup::EmbiLevel,
            SubState::Level(t.embi_levels.classify(embi)),
        );
    }

    let reit = snapshot.history(Indicator::ReitIndex);
    if let Some(trend) = window_trend(&reit, t.reit_trend_window, t.reit_trend_band) {
        detail.insert(SignalGroup::ReitTrend, SubState::Trend(trend));
    }

    if let Some(premium) = valuation_premium(snapshot) {
        detail.insert(SignalGroup::Premium, SubState::Premium(premium_state(premium, t)));
    }

    for (group, state) in &detail {
        debug!(group = %group, state = %state, "signal group derived");
    }
    detail
}

/// Long tenor minus short tenor, in percentage points.
pub fn curve_slope(snapshot: &IndicatorSnapshot) -> Option<f64> {
    let long = snapshot.latest(Indicator::LongRate)?;
    let short = snapshot.latest(Indicator::ShortRate)?;
    Some(long - short)
}

pub fn curve_status(slope: f64, t: &PhaseThresholds) -> CurveStatus {
    if slope > t.curve_steep {
        CurveStatus::Steep
    } else if slope > t.curve_normal {
        CurveStatus::Normal
    } else if slope > t.curve_flat {
        CurveStatus::Flat
    } else {
        CurveStatus::Inverted
    }
}

/// Slopes between each pair of curve tenors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CurveSlopes {
    pub mid_minus_short: Option<f64>,
    pub long_minus_mid: Option<f64>,
    pub long_minus_short: Option<f64>,
}

pub fn yield_curve_slopes(snapshot: &IndicatorSnapshot) -> CurveSlopes {
    let short = snapshot.latest(Indicator::ShortRate);
    let mid = snapshot.latest(Indicator::MidRate);
    let long = snapshot.latest(Indicator::LongRate);
    let diff = |a: Option<f64>, b: Option<f64>| Some(a? - b?);
    CurveSlopes {
        mid_minus_short: diff(mid, short),
        long_minus_mid: diff(long, mid),
        long_minus_short: diff(long, short),
    }
}

/// Twelve-month inflation series, compounded from monthly prints when the
/// accumulated series is not supplied.
pub fn inflation_12m_series(snapshot: &IndicatorSnapshot) -> Vec<f64> {
    let accumulated = snapshot.history(Indicator::Inflation12m);
    if !accumulated.is_empty() {
        return accumulated;
    }
    let monthly = snapshot.history(Indicator::InflationMonthly);
    monthly
        .windows(12)
        .map(|w| (w.iter().map(|m| 1.0 + m / 100.0).product::<f64>() - 1.0) * 100.0)
        .collect()
}

/// Relative change between the mean of the last `window` values and the mean
/// of the `window` values before them.
fn smoothed_change(series: &[f64], window: usize) -> Option<f64> {
    if window == 0 || series.len() < 2 * window {
        return None;
    }
    let n = series.len();
    let recent = mean(&series[n - window..])?;
    let prior = mean(&series[n - 2 * window..n - window])?;
    relative_change(recent, prior)
}

fn trend_from_change(change: f64, band: f64) -> Trend {
    if change > band {
        Trend::Rising
    } else if change < -band {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

fn policy_trend(series: &[f64], lag: usize) -> Option<Trend> {
    if lag == 0 || series.len() <= lag {
        return None;
    }
    let latest = series[series.len() - 1];
    let earlier = series[series.len() - 1 - lag];
    Some(if latest > earlier {
        Trend::Rising
    } else if latest < earlier {
        Trend::Falling
    } else {
        Trend::Stable
    })
}

fn risk_trend(series: &[f64], window: usize, band: f64) -> Option<RiskTrend> {
    if window == 0 || series.len() < window {
        return None;
    }
    let latest = *series.last()?;
    let average = mean(&series[series.len() - window..])?;
    let change = relative_change(latest, average)?;
    Some(if change < -band {
        RiskTrend::Improving
    } else if change > band {
        RiskTrend::Worsening
    } else {
        RiskTrend::Stable
    })
}

/// Latest value against the mean of the last `window` values.
fn window_trend(series: &[f64], window: usize, band: f64) -> Option<Trend> {
    if window == 0 || series.len() < window {
        return None;
    }
    let latest = *series.last()?;
    let average = mean(&series[series.len() - window..])?;
    Some(trend_from_change(relative_change(latest, average)?, band))
}

/// Equity risk premium: the supplied reading, else earnings yield minus the long rate.
pub fn valuation_premium(snapshot: &IndicatorSnapshot) -> Option<f64> {
    if let Some(premium) = snapshot.latest(Indicator::EquityRiskPremium) {
        return Some(premium);
    }
    let pe = snapshot.latest(Indicator::MarketPe).filter(|pe| *pe > 0.0)?;
    let long = snapshot.latest(Indicator::LongRate)?;
    Some(100.0 / pe - long)
}

pub fn premium_state(premium: f64, t: &PhaseThresholds) -> PremiumState {
    if premium > t.premium_high {
        PremiumState::High
    } else if premium > t.premium_positive {
        PremiumState::Positive
    } else if premium > t.premium_negative {
        PremiumState::Negative
    } else {
        PremiumState::VeryNegative
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn relative_change(current: f64, reference: f64) -> Option<f64> {
    if reference.abs() < f64::EPSILON {
        return None;
    }
    Some((current - reference) / reference.abs())
}
