//! Canonical sector taxonomy and the raw-label lookup that feeds it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Label reported for instruments whose sector cannot be mapped.
pub const UNCLASSIFIED: &str = "unclassified";

/// Canonical sector set. Declaration order is alphabetical by key, which
/// makes the derived `Ord` usable as the deterministic tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    BasicMaterials,
    ConsumerCyclical,
    ConsumerStaples,
    Energy,
    Financials,
    HealthCare,
    Industrials,
    InformationTechnology,
    RealEstate,
    Telecommunications,
    Utilities,
}

impl Sector {
    pub const ALL: [Sector; 11] = [
        Sector::BasicMaterials,
        Sector::ConsumerCyclical,
        Sector::ConsumerStaples,
        Sector::Energy,
        Sector::Financials,
        Sector::HealthCare,
        Sector::Industrials,
        Sector::InformationTechnology,
        Sector::RealEstate,
        Sector::Telecommunications,
        Sector::Utilities,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Sector::BasicMaterials => "basic_materials",
            Sector::ConsumerCyclical => "consumer_cyclical",
            Sector::ConsumerStaples => "consumer_staples",
            Sector::Energy => "energy",
            Sector::Financials => "financials",
            Sector::HealthCare => "health_care",
            Sector::Industrials => "industrials",
            Sector::InformationTechnology => "information_technology",
            Sector::RealEstate => "real_estate",
            Sector::Telecommunications => "telecommunications",
            Sector::Utilities => "utilities",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Sector::BasicMaterials => "Basic Materials",
            Sector::ConsumerCyclical => "Consumer Cyclical",
            Sector::ConsumerStaples => "Consumer Staples",
            Sector::Energy => "Energy",
            Sector::Financials => "Financials",
            Sector::HealthCare => "Health Care",
            Sector::Industrials => "Industrials",
            Sector::InformationTechnology => "Information Technology",
            Sector::RealEstate => "Real Estate",
            Sector::Telecommunications => "Telecommunications",
            Sector::Utilities => "Utilities",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Sector::ALL
            .iter()
            .find(|sector| sector.key() == wanted)
            .copied()
            .ok_or_else(|| format!("unknown sector: {}", s.trim()))
    }
}

const BUILTIN_LABELS: &[(&str, Sector)] = &[
    // Data-provider sector and industry names
    ("Financial Services", Sector::Financials),
    ("Financial", Sector::Financials),
    ("Banks", Sector::Financials),
    ("Insurance", Sector::Financials),
    ("Energy", Sector::Energy),
    ("Oil & Gas", Sector::Energy),
    ("Oil & Gas E&P", Sector::Energy),
    ("Oil & Gas Integrated", Sector::Energy),
    ("Oil & Gas Midstream", Sector::Energy),
    ("Oil & Gas Refining & Marketing", Sector::Energy),
    ("Basic Materials", Sector::BasicMaterials),
    ("Materials", Sector::BasicMaterials),
    ("Chemicals", Sector::BasicMaterials),
    ("Steel", Sector::BasicMaterials),
    ("Paper & Forest Products", Sector::BasicMaterials),
    ("Mining", Sector::BasicMaterials),
    ("Industrials", Sector::Industrials),
    ("Industrial Products", Sector::Industrials),
    ("Aerospace & Defense", Sector::Industrials),
    ("Building Products", Sector::Industrials),
    ("Electrical Equipment", Sector::Industrials),
    ("Machinery", Sector::Industrials),
    ("Transportation", Sector::Industrials),
    ("Consumer Cyclical", Sector::ConsumerCyclical),
    ("Consumer Discretionary", Sector::ConsumerCyclical),
    ("Retail", Sector::ConsumerCyclical),
    ("Apparel Retail", Sector::ConsumerCyclical),
    ("Department Stores", Sector::ConsumerCyclical),
    ("Specialty Retail", Sector::ConsumerCyclical),
    ("Auto Manufacturers", Sector::ConsumerCyclical),
    ("Auto Parts", Sector::ConsumerCyclical),
    ("Entertainment", Sector::ConsumerCyclical),
    ("Hotels, Restaurants & Leisure", Sector::ConsumerCyclical),
    ("Consumer Defensive", Sector::ConsumerStaples),
    ("Consumer Staples", Sector::ConsumerStaples),
    ("Food & Beverage", Sector::ConsumerStaples),
    ("Beverages—Brewers", Sector::ConsumerStaples),
    ("Beverages—Non-Alcoholic", Sector::ConsumerStaples),
    ("Beverages—Wineries & Distilleries", Sector::ConsumerStaples),
    ("Farm Products", Sector::ConsumerStaples),
    ("Food Distribution", Sector::ConsumerStaples),
    ("Grocery Stores", Sector::ConsumerStaples),
    ("Household Products", Sector::ConsumerStaples),
    ("Packaged Foods", Sector::ConsumerStaples),
    ("Tobacco", Sector::ConsumerStaples),
    ("Healthcare", Sector::HealthCare),
    ("Health Care", Sector::HealthCare),
    ("Biotechnology", Sector::HealthCare),
    ("Drug Manufacturers", Sector::HealthCare),
    ("Health Care Plans", Sector::HealthCare),
    ("Health Care Providers", Sector::HealthCare),
    ("Medical Devices", Sector::HealthCare),
    ("Medical Instruments & Supplies", Sector::HealthCare),
    ("Pharmaceutical Retailers", Sector::HealthCare),
    ("Technology", Sector::InformationTechnology),
    ("Information Technology", Sector::InformationTechnology),
    ("Software", Sector::InformationTechnology),
    ("Software—Application", Sector::InformationTechnology),
    ("Software—Infrastructure", Sector::InformationTechnology),
    ("Communication Equipment", Sector::InformationTechnology),
    ("Computer Hardware", Sector::InformationTechnology),
    ("Consumer Electronics", Sector::InformationTechnology),
    ("Electronic Components", Sector::InformationTechnology),
    ("Electronics & Computer Distribution", Sector::InformationTechnology),
    ("Information Technology Services", Sector::InformationTechnology),
    ("Scientific & Technical Instruments", Sector::InformationTechnology),
    ("Semiconductor Equipment & Materials", Sector::InformationTechnology),
    ("Semiconductors", Sector::InformationTechnology),
    ("Communication Services", Sector::Telecommunications),
    ("Telecom Services", Sector::Telecommunications),
    ("Telecom", Sector::Telecommunications),
    ("Wireless Telecom", Sector::Telecommunications),
    ("Utilities", Sector::Utilities),
    ("Utilities—Regulated", Sector::Utilities),
    ("Utilities—Regulated Electric", Sector::Utilities),
    ("Utilities—Regulated Gas", Sector::Utilities),
    ("Utilities—Regulated Water", Sector::Utilities),
    ("Utilities—Independent Power Producers", Sector::Utilities),
    ("Utilities—Renewable", Sector::Utilities),
    ("Real Estate", Sector::RealEstate),
    ("REIT", Sector::RealEstate),
    ("REIT—Diversified", Sector::RealEstate),
    ("REIT—Healthcare Facilities", Sector::RealEstate),
    ("REIT—Hotel & Motel", Sector::RealEstate),
    ("REIT—Industrial", Sector::RealEstate),
    ("REIT—Office", Sector::RealEstate),
    ("REIT—Residential", Sector::RealEstate),
    ("REIT—Retail", Sector::RealEstate),
    ("REIT—Specialty", Sector::RealEstate),
    ("Real Estate Services", Sector::RealEstate),
    ("Real Estate—Development", Sector::RealEstate),
    ("Real Estate—Diversified", Sector::RealEstate),
    // B3 exchange classification
    ("Financeiro", Sector::Financials),
    ("Energia", Sector::Energy),
    ("Materiais Básicos", Sector::BasicMaterials),
    ("Mineração", Sector::BasicMaterials),
    ("Bens Industriais", Sector::Industrials),
    ("Transporte", Sector::Industrials),
    ("Consumo Cíclico", Sector::ConsumerCyclical),
    ("Consumo Não Cíclico", Sector::ConsumerStaples),
    ("Agronegócio", Sector::ConsumerStaples),
    ("Saúde", Sector::HealthCare),
    ("Tecnologia da Informação", Sector::InformationTechnology),
    ("Tecnologia", Sector::InformationTechnology),
    ("Telecomunicações", Sector::Telecommunications),
    ("Utilidade Pública", Sector::Utilities),
    ("Imobiliário", Sector::RealEstate),
];

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Case-insensitive lookup from external sector labels to [`Sector`].
#[derive(Debug, Clone)]
pub struct SectorMapper {
    table: HashMap<String, Sector>,
}

impl SectorMapper {
    /// Mapper holding only the canonical keys and display names.
    pub fn empty() -> Self {
        let mut table = HashMap::new();
        for sector in Sector::ALL {
            table.insert(sector.key().to_string(), sector);
            table.insert(normalize(sector.display_name()), sector);
        }
        Self { table }
    }

    pub fn builtin() -> Self {
        let mut mapper = Self::empty();
        for (label, sector) in BUILTIN_LABELS {
            mapper.insert(label, *sector);
        }
        mapper
    }

    /// Add or replace one entry. Later entries win.
    pub fn insert(&mut self, label: &str, sector: Sector) {
        let key = normalize(label);
        if !key.is_empty() {
            self.table.insert(key, sector);
        }
    }

    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Sector)>,
    {
        for (label, sector) in overrides {
            self.insert(label, sector);
        }
        self
    }

    pub fn map(&self, raw_label: &str) -> Option<Sector> {
        self.table.get(&normalize(raw_label)).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for SectorMapper {
    fn default() -> Self {
        Self::builtin()
    }
}
