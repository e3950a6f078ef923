//! Indicator readings and the per-evaluation snapshot built from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of indicator families consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// One-month point of the nominal curve.
    ShortRate,
    /// One-year point of the nominal curve.
    MidRate,
    /// Three-year point of the nominal curve.
    LongRate,
    /// Accumulated twelve-month inflation, percent.
    Inflation12m,
    /// Monthly inflation, percent.
    InflationMonthly,
    PolicyRate,
    Unemployment,
    /// Five-year sovereign CDS, basis points.
    SovereignCds,
    /// Sovereign spread index, basis points.
    Embi,
    /// Equity market earnings multiple.
    MarketPe,
    /// Earnings yield minus the long rate, percent.
    EquityRiskPremium,
    /// Percent change of the equity index.
    Momentum,
    /// Equity index level.
    EquityIndex,
    /// Listed real-estate fund index level.
    ReitIndex,
}

impl Indicator {
    pub const ALL: [Indicator; 14] = [
        Indicator::ShortRate,
        Indicator::MidRate,
        Indicator::LongRate,
        Indicator::Inflation12m,
        Indicator::InflationMonthly,
        Indicator::PolicyRate,
        Indicator::Unemployment,
        Indicator::SovereignCds,
        Indicator::Embi,
        Indicator::MarketPe,
        Indicator::EquityRiskPremium,
        Indicator::Momentum,
        Indicator::EquityIndex,
        Indicator::ReitIndex,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Indicator::ShortRate => "short_rate",
            Indicator::MidRate => "mid_rate",
            Indicator::LongRate => "long_rate",
            Indicator::Inflation12m => "inflation_12m",
            Indicator::InflationMonthly => "inflation_monthly",
            Indicator::PolicyRate => "policy_rate",
            Indicator::Unemployment => "unemployment",
            Indicator::SovereignCds => "sovereign_cds",
            Indicator::Embi => "embi",
            Indicator::MarketPe => "market_pe",
            Indicator::EquityRiskPremium => "equity_risk_premium",
            Indicator::Momentum => "momentum",
            Indicator::EquityIndex => "equity_index",
            Indicator::ReitIndex => "reit_index",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Indicator::ALL
            .iter()
            .find(|i| i.key() == wanted)
            .copied()
            .ok_or_else(|| format!("unknown indicator: {}", s.trim()))
    }
}

/// One observation. `value` is `None` when the source explicitly reports no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub indicator: Indicator,
    pub value: Option<f64>,
    pub as_of: NaiveDate,
}

impl IndicatorReading {
    pub fn new(indicator: Indicator, value: Option<f64>, as_of: NaiveDate) -> Self {
        Self {
            indicator,
            value,
            as_of,
        }
    }

    /// Value if present and finite.
    pub fn present(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

/// Date-ordered readings per indicator for one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot {
    series: BTreeMap<Indicator, Vec<IndicatorReading>>,
}

impl IndicatorSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_readings<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = IndicatorReading>,
    {
        let mut series: BTreeMap<Indicator, Vec<IndicatorReading>> = BTreeMap::new();
        for reading in readings {
            series.entry(reading.indicator).or_default().push(reading);
        }
        for readings in series.values_mut() {
            readings.sort_by_key(|r| r.as_of);
        }
        Self { series }
    }

    /// Most recent present value.
    pub fn latest(&self, indicator: Indicator) -> Option<f64> {
        self.series
            .get(&indicator)?
            .iter()
            .rev()
            .find_map(IndicatorReading::present)
    }

    /// Present values in date order, oldest first.
    pub fn history(&self, indicator: Indicator) -> Vec<f64> {
        self.series
            .get(&indicator)
            .map(|readings| readings.iter().filter_map(IndicatorReading::present).collect())
            .unwrap_or_default()
    }

    pub fn readings(&self, indicator: Indicator) -> &[IndicatorReading] {
        self.series
            .get(&indicator)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Date of the most recent present reading across all indicators.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.series
            .values()
            .flat_map(|readings| readings.iter())
            .filter(|r| r.present().is_some())
            .map(|r| r.as_of)
            .max()
    }

    pub fn reading_count(&self) -> usize {
        self.series.values().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.reading_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn latest_skips_absent_and_non_finite_values() {
        let snapshot = IndicatorSnapshot::from_readings(vec![
            IndicatorReading::new(Indicator::PolicyRate, Some(10.5), date(2024, 1, 1)),
            IndicatorReading::new(Indicator::PolicyRate, Some(f64::NAN), date(2024, 2, 1)),
            IndicatorReading::new(Indicator::PolicyRate, None, date(2024, 3, 1)),
        ]);
        assert_eq!(snapshot.latest(Indicator::PolicyRate), Some(10.5));
    }

    #[test]
    fn readings_are_sorted_by_date() {
        let snapshot = IndicatorSnapshot::from_readings(vec![
            IndicatorReading::new(Indicator::Embi, Some(300.0), date(2024, 3, 1)),
            IndicatorReading::new(Indicator::Embi, Some(100.0), date(2024, 1, 1)),
            IndicatorReading::new(Indicator::Embi, Some(200.0), date(2024, 2, 1)),
        ]);
        assert_eq!(snapshot.history(Indicator::Embi), vec![100.0, 200.0, 300.0]);
        assert_eq!(snapshot.latest(Indicator::Embi), Some(300.0));
    }

    #[test]
    fn missing_indicator_is_none() {
        let snapshot = IndicatorSnapshot::empty();
        assert_eq!(snapshot.latest(Indicator::LongRate), None);
        assert!(snapshot.history(Indicator::LongRate).is_empty());
        assert!(snapshot.readings(Indicator::LongRate).is_empty());
        assert_eq!(snapshot.as_of(), None);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn as_of_ignores_absent_readings() {
        let snapshot = IndicatorSnapshot::from_readings(vec![
            IndicatorReading::new(Indicator::MarketPe, Some(8.0), date(2024, 5, 1)),
            IndicatorReading::new(Indicator::SovereignCds, None, date(2024, 6, 1)),
        ]);
        assert_eq!(snapshot.as_of(), Some(date(2024, 5, 1)));
    }

    #[test]
    fn indicator_keys_round_trip() {
        for indicator in Indicator::ALL {
            assert_eq!(indicator.key().parse::<Indicator>().unwrap(), indicator);
        }
        assert!("gdp".parse::<Indicator>().is_err());
    }
}
