//! CSV data directory adapter.
//!
//! Layout: `indicators.csv` (required), `sectors.csv` and `holdings.csv`
//! (optional). Columns are located by header name so extra columns are
//! ignored.

use crate::domain::alignment::{Holding, PortfolioHolding};
use crate::domain::error::MacrocycleError;
use crate::domain::sector::SectorMapper;
use crate::domain::snapshot::{Indicator, IndicatorReading, IndicatorSnapshot};
use crate::domain::valuation::{InstrumentMetrics, MetricValues, SectorMetrics};
use crate::ports::indicator_port::IndicatorPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const INDICATORS_FILE: &str = "indicators.csv";
pub const SECTORS_FILE: &str = "sectors.csv";
pub const HOLDINGS_FILE: &str = "holdings.csv";
pub const INSTRUMENTS_FILE: &str = "instruments.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Parsed file: header row plus data rows tagged with their line number.
struct Table {
    file: &'static str,
    headers: StringRecord,
    rows: Vec<(u64, StringRecord)>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    fn required_column(&self, name: &str) -> Result<usize, MacrocycleError> {
        self.column(name).ok_or_else(|| MacrocycleError::Data {
            reason: format!("{}: missing column {}", self.file, name),
        })
    }

    fn cell<'r>(&self, row: &'r StringRecord, index: Option<usize>) -> &'r str {
        index.and_then(|i| row.get(i)).unwrap_or("").trim()
    }

    /// Empty cells are absent values; anything else must parse as a number.
    fn number(
        &self,
        line: u64,
        row: &StringRecord,
        index: Option<usize>,
        name: &str,
    ) -> Result<Option<f64>, MacrocycleError> {
        let raw = self.cell(row, index);
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<f64>()
            .map(Some)
            .map_err(|e| MacrocycleError::Data {
                reason: format!("{} line {}: invalid {} value {:?}: {}", self.file, line, name, raw, e),
            })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn read_table(&self, file: &'static str) -> Result<Option<Table>, MacrocycleError> {
        let path = self.base_path.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| MacrocycleError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| MacrocycleError::Data {
                reason: format!("{}: CSV header error: {}", file, e),
            })?
            .clone();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| MacrocycleError::Data {
                reason: format!("{}: CSV parse error: {}", file, e),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.iter().all(|c| c.is_empty()) {
                continue;
            }
            rows.push((line, record));
        }
        debug!(file, rows = rows.len(), "csv table loaded");
        Ok(Some(Table {
            file,
            headers,
            rows,
        }))
    }
}

impl IndicatorPort for CsvAdapter {
    fn fetch_snapshot(&self) -> Result<IndicatorSnapshot, MacrocycleError> {
        let table = self
            .read_table(INDICATORS_FILE)?
            .ok_or_else(|| MacrocycleError::Data {
                reason: format!(
                    "{} not found in {}",
                    INDICATORS_FILE,
                    self.base_path.display()
                ),
            })?;
        let name_col = table.required_column("indicator")?;
        let value_col = table.required_column("value")?;
        let date_col = table.required_column("as_of")?;

        let mut readings = Vec::with_capacity(table.rows.len());
        for (line, row) in &table.rows {
            let name = table.cell(row, Some(name_col));
            let indicator: Indicator = match name.parse() {
                Ok(i) => i,
                Err(reason) => {
                    warn!(file = table.file, line, %reason, "indicator row skipped");
                    continue;
                }
            };
            let date_str = table.cell(row, Some(date_col));
            let as_of = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                MacrocycleError::Data {
                    reason: format!(
                        "{} line {}: invalid date {:?}: {}",
                        table.file, line, date_str, e
                    ),
                }
            })?;
            let value = table.number(*line, row, Some(value_col), "value")?;
            readings.push(IndicatorReading::new(indicator, value, as_of));
        }
        Ok(IndicatorSnapshot::from_readings(readings))
    }

    fn fetch_sector_metrics(
        &self,
        mapper: &SectorMapper,
    ) -> Result<Vec<SectorMetrics>, MacrocycleError> {
        let Some(table) = self.read_table(SECTORS_FILE)? else {
            warn!(file = SECTORS_FILE, "no sector multiples supplied");
            return Ok(Vec::new());
        };
        let sector_col = table.required_column("sector")?;

        let current_cols = ["pe", "pb", "ev_ebitda", "dividend_yield"].map(|n| table.column(n));
        let baseline_cols = [
            "baseline_pe",
            "baseline_pb",
            "baseline_ev_ebitda",
            "baseline_dividend_yield",
        ]
        .map(|n| table.column(n));

        let values = |line: u64, row: &StringRecord, cols: &[Option<usize>; 4]| {
            Ok::<_, MacrocycleError>(MetricValues {
                pe: table.number(line, row, cols[0], "pe")?,
                pb: table.number(line, row, cols[1], "pb")?,
                ev_ebitda: table.number(line, row, cols[2], "ev_ebitda")?,
                dividend_yield: table.number(line, row, cols[3], "dividend_yield")?,
            })
        };

        let mut metrics = Vec::with_capacity(table.rows.len());
        for (line, row) in &table.rows {
            let label = table.cell(row, Some(sector_col));
            let Some(sector) = mapper.map(label) else {
                warn!(file = table.file, line, label, "unmapped sector row skipped");
                continue;
            };
            let current = values(*line, row, &current_cols)?;
            let baseline = values(*line, row, &baseline_cols)?;
            metrics.push(SectorMetrics::new(sector, current).with_baseline(baseline));
        }
        Ok(metrics)
    }

    fn fetch_instrument_metrics(
        &self,
        mapper: &SectorMapper,
    ) -> Result<Vec<InstrumentMetrics>, MacrocycleError> {
        let Some(table) = self.read_table(INSTRUMENTS_FILE)? else {
            return Ok(Vec::new());
        };
        let id_col = table.required_column("instrument_id")?;
        let sector_col = table.column("sector");
        let [pe, pb, ev_ebitda, dividend_yield] =
            ["pe", "pb", "ev_ebitda", "dividend_yield"].map(|n| table.column(n));

        let mut instruments = Vec::with_capacity(table.rows.len());
        for (line, row) in &table.rows {
            let id = table.cell(row, Some(id_col));
            if id.is_empty() {
                warn!(file = table.file, line, "instrument without id skipped");
                continue;
            }
            let label = table.cell(row, sector_col);
            let sector = mapper.map(label);
            if sector.is_none() && !label.is_empty() {
                debug!(file = table.file, line, label, "instrument sector not mapped");
            }
            let values = MetricValues {
                pe: table.number(*line, row, pe, "pe")?,
                pb: table.number(*line, row, pb, "pb")?,
                ev_ebitda: table.number(*line, row, ev_ebitda, "ev_ebitda")?,
                dividend_yield: table.number(*line, row, dividend_yield, "dividend_yield")?,
            };
            instruments.push(InstrumentMetrics::new(id, sector, values));
        }
        Ok(instruments)
    }

    fn fetch_holdings(&self) -> Result<Option<PortfolioHolding>, MacrocycleError> {
        let Some(table) = self.read_table(HOLDINGS_FILE)? else {
            return Ok(None);
        };
        let id_col = table.required_column("instrument_id")?;
        let weight_col = table.required_column("weight_percent")?;

        let mut holdings = Vec::with_capacity(table.rows.len());
        for (line, row) in &table.rows {
            let id = table.cell(row, Some(id_col));
            if id.is_empty() {
                warn!(file = table.file, line, "holding without instrument id skipped");
                continue;
            }
            let weight = table
                .number(*line, row, Some(weight_col), "weight_percent")?
                .unwrap_or(0.0);
            holdings.push(Holding::new(id, weight));
        }
        Ok(Some(PortfolioHolding::new(holdings)))
    }

    fn fetch_instrument_sectors(&self) -> Result<HashMap<String, String>, MacrocycleError> {
        let Some(table) = self.read_table(HOLDINGS_FILE)? else {
            return Ok(HashMap::new());
        };
        let id_col = table.required_column("instrument_id")?;
        let Some(sector_col) = table.column("sector") else {
            return Ok(HashMap::new());
        };

        let mut sectors = HashMap::new();
        for (_, row) in &table.rows {
            let id = table.cell(row, Some(id_col));
            let label = table.cell(row, Some(sector_col));
            if !id.is_empty() && !label.is_empty() {
                sectors.insert(id.to_string(), label.to_string());
            }
        }
        Ok(sectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sector::Sector;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> (TempDir, CsvAdapter) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        (dir, adapter)
    }

    #[test]
    fn fetch_snapshot_reads_readings_in_date_order() {
        let (_dir, adapter) = setup(&[(
            INDICATORS_FILE,
            "indicator,value,as_of\n\
             policy_rate,10.5,2024-02-01\n\
             policy_rate,10.0,2024-01-01\n\
             short_rate,,2024-02-01\n",
        )]);
        let snapshot = adapter.fetch_snapshot().unwrap();
        assert_eq!(snapshot.history(Indicator::PolicyRate), vec![10.0, 10.5]);
        assert_eq!(snapshot.latest(Indicator::PolicyRate), Some(10.5));
        assert_eq!(snapshot.latest(Indicator::ShortRate), None);
        assert_eq!(snapshot.readings(Indicator::ShortRate).len(), 1);
    }

    #[test]
    fn unknown_indicator_rows_are_skipped() {
        let (_dir, adapter) = setup(&[(
            INDICATORS_FILE,
            "indicator,value,as_of\nweather,20,2024-01-01\nembi,300,2024-01-01\n",
        )]);
        let snapshot = adapter.fetch_snapshot().unwrap();
        assert_eq!(snapshot.reading_count(), 1);
        assert_eq!(snapshot.latest(Indicator::Embi), Some(300.0));
    }

    #[test]
    fn missing_indicator_file_is_a_data_error() {
        let (_dir, adapter) = setup(&[]);
        assert!(matches!(
            adapter.fetch_snapshot(),
            Err(MacrocycleError::Data { .. })
        ));
    }

    #[test]
    fn bad_value_reports_the_line() {
        let (_dir, adapter) = setup(&[(
            INDICATORS_FILE,
            "indicator,value,as_of\nembi,300,2024-01-01\nembi,lots,2024-01-02\n",
        )]);
        match adapter.fetch_snapshot() {
            Err(MacrocycleError::Data { reason }) => assert!(reason.contains("line 3"), "{reason}"),
            other => panic!("expected data error, got {other:?}"),
        }
    }

    #[test]
    fn bad_date_is_a_data_error() {
        let (_dir, adapter) = setup(&[(
            INDICATORS_FILE,
            "indicator,value,as_of\nembi,300,01/02/2024\n",
        )]);
        assert!(adapter.fetch_snapshot().is_err());
    }

    #[test]
    fn sector_metrics_map_labels_and_read_baselines() {
        let (_dir, adapter) = setup(&[(
            SECTORS_FILE,
            "sector,pe,pb,ev_ebitda,dividend_yield,baseline_pe\n\
             Banks,8,1.2,,6.5,10\n\
             Crypto Mining,30,5,20,0,\n\
             Utilities,12,,,,\n",
        )]);
        let metrics = adapter.fetch_sector_metrics(&SectorMapper::builtin()).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].sector, Sector::Financials);
        assert_eq!(metrics[0].current.pe, Some(8.0));
        assert_eq!(metrics[0].current.ev_ebitda, None);
        assert_eq!(metrics[0].baseline.pe, Some(10.0));
        assert_eq!(metrics[1].sector, Sector::Utilities);
        assert_eq!(metrics[1].current.pb, None);
    }

    #[test]
    fn missing_sector_file_gives_no_metrics() {
        let (_dir, adapter) = setup(&[]);
        assert!(adapter
            .fetch_sector_metrics(&SectorMapper::builtin())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn holdings_and_instrument_sectors() {
        let (_dir, adapter) = setup(&[(
            HOLDINGS_FILE,
            "instrument_id,weight_percent,sector\n\
             PETR4,60,Oil & Gas Integrated\n\
             XYZ,40,\n",
        )]);
        let holding = adapter.fetch_holdings().unwrap().unwrap();
        assert_eq!(holding.holdings.len(), 2);
        assert_eq!(holding.holdings[0], Holding::new("PETR4", 60.0));

        let sectors = adapter.fetch_instrument_sectors().unwrap();
        assert_eq!(sectors.len(), 1);
        assert_eq!(sectors["PETR4"], "Oil & Gas Integrated");
    }

    #[test]
    fn no_holdings_file_means_no_portfolio() {
        let (_dir, adapter) = setup(&[]);
        assert!(adapter.fetch_holdings().unwrap().is_none());
        assert!(adapter.fetch_instrument_sectors().unwrap().is_empty());
    }

    #[test]
    fn instrument_metrics_keep_unmapped_sectors_as_none() {
        let (_dir, adapter) = setup(&[(
            INSTRUMENTS_FILE,
            "instrument_id,sector,pe,pb,ev_ebitda,dividend_yield\n\
             BBAS3,Banks,4.5,0.8,,9.1\n\
             GOLD11,Commodities,,,,\n\
             ,Utilities,10,1,,\n",
        )]);
        let instruments = adapter
            .fetch_instrument_metrics(&SectorMapper::builtin())
            .unwrap();
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].instrument_id, "BBAS3");
        assert_eq!(instruments[0].sector, Some(Sector::Financials));
        assert_eq!(instruments[0].values.pb, Some(0.8));
        assert_eq!(instruments[0].values.ev_ebitda, None);
        assert_eq!(instruments[1].sector, None);
    }

    #[test]
    fn instrument_bad_multiple_is_a_data_error() {
        let (_dir, adapter) = setup(&[(
            INSTRUMENTS_FILE,
            "instrument_id,sector,pe\nBBAS3,Banks,cheap\n",
        )]);
        assert!(matches!(
            adapter.fetch_instrument_metrics(&SectorMapper::builtin()),
            Err(MacrocycleError::Data { .. })
        ));
    }

    #[test]
    fn missing_instrument_file_gives_no_instruments() {
        let (_dir, adapter) = setup(&[]);
        assert!(adapter
            .fetch_instrument_metrics(&SectorMapper::builtin())
            .unwrap()
            .is_empty());
    }
}
