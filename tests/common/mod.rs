#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use macrocycle::domain::alignment::{Holding, PortfolioHolding};
use macrocycle::domain::error::MacrocycleError;
use macrocycle::domain::sector::{Sector, SectorMapper};
use macrocycle::domain::snapshot::{Indicator, IndicatorReading, IndicatorSnapshot};
use macrocycle::domain::valuation::{InstrumentMetrics, MetricValues, SectorMetrics};
use macrocycle::ports::indicator_port::IndicatorPort;
use std::collections::HashMap;

/// In-memory port. Sector rows carry raw labels so the mapper is exercised.
pub struct MockIndicatorPort {
    pub readings: Vec<IndicatorReading>,
    pub sectors: Vec<(String, MetricValues)>,
    pub instruments: Vec<(String, String, MetricValues)>,
    pub holdings: Option<Vec<(String, f64, String)>>,
    pub error: Option<String>,
}

impl MockIndicatorPort {
    pub fn new() -> Self {
        Self {
            readings: Vec::new(),
            sectors: Vec::new(),
            instruments: Vec::new(),
            holdings: None,
            error: None,
        }
    }

    pub fn with_reading(mut self, indicator: Indicator, value: f64, as_of: NaiveDate) -> Self {
        self.readings
            .push(IndicatorReading::new(indicator, Some(value), as_of));
        self
    }

    pub fn with_series(mut self, indicator: Indicator, values: &[f64]) -> Self {
        self.readings.extend(series(indicator, values));
        self
    }

    pub fn with_sector(mut self, label: &str, current: MetricValues) -> Self {
        self.sectors.push((label.to_string(), current));
        self
    }

    pub fn with_instrument(mut self, id: &str, sector_label: &str, values: MetricValues) -> Self {
        self.instruments
            .push((id.to_string(), sector_label.to_string(), values));
        self
    }

    pub fn with_holding(mut self, id: &str, weight: f64, sector_label: &str) -> Self {
        self.holdings
            .get_or_insert_with(Vec::new)
            .push((id.to_string(), weight, sector_label.to_string()));
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl IndicatorPort for MockIndicatorPort {
    fn fetch_snapshot(&self) -> Result<IndicatorSnapshot, MacrocycleError> {
        if let Some(reason) = &self.error {
            return Err(MacrocycleError::Data {
                reason: reason.clone(),
            });
        }
        Ok(IndicatorSnapshot::from_readings(self.readings.clone()))
    }

    fn fetch_sector_metrics(
        &self,
        mapper: &SectorMapper,
    ) -> Result<Vec<SectorMetrics>, MacrocycleError> {
        Ok(self
            .sectors
            .iter()
            .filter_map(|(label, values)| {
                mapper
                    .map(label)
                    .map(|sector| SectorMetrics::new(sector, *values))
            })
            .collect())
    }

    fn fetch_instrument_metrics(
        &self,
        mapper: &SectorMapper,
    ) -> Result<Vec<InstrumentMetrics>, MacrocycleError> {
        Ok(self
            .instruments
            .iter()
            .map(|(id, label, values)| InstrumentMetrics::new(id.as_str(), mapper.map(label), *values))
            .collect())
    }

    fn fetch_holdings(&self) -> Result<Option<PortfolioHolding>, MacrocycleError> {
        Ok(self.holdings.as_ref().map(|rows| {
            PortfolioHolding::new(
                rows.iter()
                    .map(|(id, weight, _)| Holding::new(id.as_str(), *weight))
                    .collect(),
            )
        }))
    }

    fn fetch_instrument_sectors(&self) -> Result<HashMap<String, String>, MacrocycleError> {
        Ok(self
            .holdings
            .iter()
            .flatten()
            .filter(|(_, _, label)| !label.is_empty())
            .map(|(id, _, label)| (id.clone(), label.clone()))
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One reading per day starting 2024-01-01.
pub fn series(indicator: Indicator, values: &[f64]) -> Vec<IndicatorReading> {
    let start = date(2024, 1, 1);
    values
        .iter()
        .enumerate()
        .map(|(i, v)| IndicatorReading::new(indicator, Some(*v), start + Days::new(i as u64)))
        .collect()
}

/// Latest-only snapshot from `(indicator, value)` pairs.
pub fn snapshot_of(values: &[(Indicator, f64)]) -> IndicatorSnapshot {
    IndicatorSnapshot::from_readings(
        values
            .iter()
            .map(|(indicator, v)| IndicatorReading::new(*indicator, Some(*v), date(2024, 6, 28))),
    )
}

pub fn pe_only(pe: f64) -> MetricValues {
    MetricValues {
        pe: Some(pe),
        ..MetricValues::default()
    }
}

pub fn metrics(sector: Sector, current: MetricValues) -> SectorMetrics {
    SectorMetrics::new(sector, current)
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
