//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::config_validation::{phases_without_base_allocation, validate_engine_config};
use crate::domain::engine_config::EngineConfig;
use crate::domain::error::MacrocycleError;
use crate::domain::evaluation::{self, Evaluation, PortfolioInput};
use crate::domain::sector::UNCLASSIFIED;
use crate::ports::indicator_port::IndicatorPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "macrocycle",
    about = "Macro cycle phase, market timing and sector allocation engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a data directory and emit the JSON report
    Evaluate {
        /// Directory holding indicators.csv plus optional sectors.csv,
        /// instruments.csv and holdings.csv
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate an engine configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the canonical sector for a raw sector label
    MapSector {
        label: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Evaluate {
            data,
            config,
            output,
        } => run_evaluate(&data, config.as_ref(), output.as_ref()),
        Command::Validate { config } => run_validate(&config),
        Command::MapSector { label, config } => run_map_sector(&label, config.as_ref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, MacrocycleError> {
    FileConfigAdapter::from_file(path).map_err(|e| MacrocycleError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Built-in tables when `path` is `None`, else the file layered over them.
/// The result is always validated.
pub fn load_engine_config(path: Option<&PathBuf>) -> Result<EngineConfig, MacrocycleError> {
    let config = match path {
        Some(p) => EngineConfig::from_port(&load_config(p)?)?,
        None => EngineConfig::default(),
    };
    validate_engine_config(&config)?;
    Ok(config)
}

/// Gather every input from `port` and run the engine.
pub fn run_evaluation(
    port: &dyn IndicatorPort,
    config: &EngineConfig,
) -> Result<Evaluation, MacrocycleError> {
    let snapshot = port.fetch_snapshot()?;
    let sectors = port.fetch_sector_metrics(&config.sector_mapper)?;
    let instruments = port.fetch_instrument_metrics(&config.sector_mapper)?;
    let portfolio = match port.fetch_holdings()? {
        Some(holding) => Some(PortfolioInput {
            holding,
            instrument_sectors: port.fetch_instrument_sectors()?,
        }),
        None => None,
    };
    eprintln!(
        "Loaded {} readings, {} sectors, {} instruments{}",
        snapshot.reading_count(),
        sectors.len(),
        instruments.len(),
        match &portfolio {
            Some(p) => format!(", {} holdings", p.holding.holdings.len()),
            None => String::new(),
        }
    );
    evaluation::evaluate(&snapshot, &sectors, &instruments, portfolio.as_ref(), config)
}

fn fail(err: MacrocycleError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

fn warn_missing_base(config: &EngineConfig) {
    for phase in phases_without_base_allocation(config) {
        eprintln!("warning: no base allocation for phase {phase}");
    }
}

fn run_evaluate(
    data_dir: &PathBuf,
    config_path: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    if let Some(p) = config_path {
        eprintln!("Loading config from {}", p.display());
    }
    let config = match load_engine_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    warn_missing_base(&config);

    eprintln!("Reading data from {}", data_dir.display());
    let adapter = CsvAdapter::new(data_dir.clone());
    let result = match run_evaluation(&adapter, &config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    eprint!("{}", format_summary(&result));

    let report = JsonReportAdapter::new();
    match output_path {
        Some(path) => {
            let path_str = path.to_string_lossy();
            if let Err(e) = report.write(&result, &path_str) {
                return fail(e);
            }
            eprintln!("\nReport written to: {}", path.display());
        }
        None => match report.render(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => return fail(e),
        },
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_engine_config(Some(config_path)) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    warn_missing_base(&config);

    eprintln!("  version:          {}", config.version);
    eprintln!("  fallback phase:   {}", config.phase.fallback_phase);
    eprintln!("  phase weights:    {} entries", config.phase.weights.len());
    eprintln!("  base tables:      {}", config.allocation.base.len());
    eprintln!("  sector labels:    {}", config.sector_mapper.len());
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_map_sector(label: &str, config_path: Option<&PathBuf>) -> ExitCode {
    let config = match load_engine_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    match config.sector_mapper.map(label) {
        Some(sector) => println!("{sector}"),
        None => println!("{UNCLASSIFIED}"),
    }
    ExitCode::SUCCESS
}

/// Human-readable console summary of an evaluation.
pub fn format_summary(result: &Evaluation) -> String {
    Summary(result).to_string()
}

struct Summary<'a>(&'a Evaluation);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        let as_of = result
            .as_of
            .map(|d| d.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        writeln!(out, "\n=== Evaluation ({}, as of {}) ===", result.config_version, as_of)?;

        let cycle = &result.cycle;
        writeln!(
            out,
            "Cycle Phase:      {} ({:.1}% confidence)",
            cycle.phase, cycle.confidence
        )?;
        let scores: Vec<String> = cycle
            .score_vector
            .iter()
            .map(|(phase, score)| format!("{phase} {score:.2}"))
            .collect();
        writeln!(out, "Phase Scores:     {}", scores.join("  "))?;
        if let Some(slope) = result.curve.long_minus_short {
            writeln!(out, "Curve Slope:      {slope:.2}")?;
        }

        writeln!(
            out,
            "Market Timing:    {:.1} ({})",
            result.timing.score, result.timing.band
        )?;
        for term in &result.timing.contributing_terms {
            writeln!(
                out,
                "  {:<16} raw {:>7.1}  weighted {:>7.1}",
                term.term.to_string(),
                term.raw,
                term.weighted_contribution
            )?;
        }

        if !result.valuations.is_empty() {
            writeln!(out, "\n=== Sector Valuation ===")?;
            for (sector, v) in &result.valuations {
                let score = v
                    .score
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(out, "  {:<24} {:>5}  {}", sector.display_name(), score, v.label)?;
            }
        }

        writeln!(out, "\n=== Target Allocation ({}) ===", result.allocation.phase)?;
        for (sector, weight) in &result.allocation.weights {
            writeln!(out, "  {:<24} {:>5.1}%", sector.display_name(), weight)?;
        }
        writeln!(out, "Cash Residual:    {:.1}%", result.allocation.cash_residual)?;
        write!(out, "Risk Posture:     {:?}", result.posture.profile)?;
        match result.posture.asset_mix {
            Some(mix) => writeln!(
                out,
                " (equity {:.0}%, fixed income {:.0}%, cash {:.0}%)",
                mix.equity, mix.fixed_income, mix.cash
            )?,
            None => writeln!(out)?,
        }
        for line in &result.posture.adjustments {
            let percent = line
                .percent
                .map(|p| format!(" {p:.0}%"))
                .unwrap_or_default();
            writeln!(
                out,
                "  {:?} {:?}{}: {}",
                line.action, line.category, percent, line.justification
            )?;
        }

        if result.screening.values().any(|picks| !picks.is_empty()) {
            writeln!(out, "\n=== Instrument Picks ===")?;
            for (sector, picks) in &result.screening {
                for pick in picks {
                    writeln!(
                        out,
                        "  {:<24} {:<8} score {}  {}",
                        sector.display_name(),
                        pick.instrument_id,
                        pick.score,
                        pick.justification
                    )?;
                }
            }
        }

        if let Some(alignment) = &result.alignment {
            writeln!(out, "\n=== Portfolio Alignment ===")?;
            writeln!(out, "Alignment Score:  {:.1}%", alignment.score)?;
            if !alignment.unclassified.instrument_ids.is_empty() {
                writeln!(
                    out,
                    "Unclassified:     {:.1}% ({})",
                    alignment.unclassified.weight_percent,
                    alignment.unclassified.instrument_ids.join(", ")
                )?;
            }
            writeln!(
                out,
                "Favoured Sectors: {} aligned, {} misaligned instruments",
                alignment.aligned_instruments.len(),
                alignment.misaligned_instruments.len()
            )?;
            for s in &alignment.rebalance_suggestions {
                writeln!(
                    out,
                    "  {:?} {:<24} {:>5.1} pp",
                    s.action,
                    s.sector.display_name(),
                    s.magnitude
                )?;
            }
        }

        if let Some(multiples) = &result.portfolio_multiples {
            let fmt_value =
                |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string());
            writeln!(
                out,
                "Portfolio Multiples: P/E {}  P/B {}  EV/EBITDA {}  DY {}",
                fmt_value(multiples.averages.pe),
                fmt_value(multiples.averages.pb),
                fmt_value(multiples.averages.ev_ebitda),
                fmt_value(multiples.averages.dividend_yield)
            )?;
        }

        writeln!(out, "\n=== Alerts ===")?;
        for alert in &result.alerts {
            writeln!(out, "  [{:?}] {}", alert.severity, alert.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::IndicatorSnapshot;

    #[test]
    fn cli_parses_evaluate() {
        let cli = Cli::try_parse_from([
            "macrocycle",
            "evaluate",
            "--data",
            "/tmp/data",
            "--output",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Command::Evaluate {
                data,
                config,
                output,
            } => {
                assert_eq!(data, PathBuf::from("/tmp/data"));
                assert!(config.is_none());
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_map_sector() {
        let cli = Cli::try_parse_from(["macrocycle", "map-sector", "Banks"]).unwrap();
        assert!(matches!(cli.command, Command::MapSector { ref label, .. } if label == "Banks"));
    }

    #[test]
    fn evaluate_requires_data() {
        assert!(Cli::try_parse_from(["macrocycle", "evaluate"]).is_err());
    }

    #[test]
    fn load_engine_config_without_file_is_default() {
        let config = load_engine_config(None).unwrap();
        assert_eq!(config.version, EngineConfig::default().version);
    }

    #[test]
    fn summary_mentions_phase_and_band() {
        let result = evaluation::evaluate(
            &IndicatorSnapshot::empty(),
            &[],
            &[],
            None,
            &EngineConfig::default(),
        )
        .unwrap();
        let summary = format_summary(&result);
        assert!(summary.contains("EXPANSION (0.0% confidence)"));
        assert!(summary.contains("0.0 (NEUTRAL)"));
        assert!(summary.contains("as of n/a"));
        assert!(!summary.contains("Portfolio Alignment"));
        assert!(summary.contains("Prioritize CyclicalSectors"));
        assert!(!summary.contains("Instrument Picks"));
    }
}
