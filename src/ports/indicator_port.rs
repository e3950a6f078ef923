//! Market data access port trait.

use crate::domain::alignment::PortfolioHolding;
use crate::domain::error::MacrocycleError;
use crate::domain::sector::SectorMapper;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::valuation::{InstrumentMetrics, SectorMetrics};
use std::collections::HashMap;

pub trait IndicatorPort {
    fn fetch_snapshot(&self) -> Result<IndicatorSnapshot, MacrocycleError>;

    /// Sector multiples keyed by canonical sector. Rows whose label `mapper`
    /// cannot place are dropped.
    fn fetch_sector_metrics(
        &self,
        mapper: &SectorMapper,
    ) -> Result<Vec<SectorMetrics>, MacrocycleError>;

    /// Per-instrument multiples. An unplaceable sector label leaves the
    /// instrument without a sector; it still counts toward portfolio multiples.
    fn fetch_instrument_metrics(
        &self,
        mapper: &SectorMapper,
    ) -> Result<Vec<InstrumentMetrics>, MacrocycleError>;

    /// `None` when no portfolio was supplied.
    fn fetch_holdings(&self) -> Result<Option<PortfolioHolding>, MacrocycleError>;

    /// Raw sector label per instrument id.
    fn fetch_instrument_sectors(&self) -> Result<HashMap<String, String>, MacrocycleError>;
}
