use crate::config::AppConfig;
use crate::coverage::{Aggregator, CancelToken};
use crate::data;
use crate::output::{CellSink, CoverageSummary, CsvSink};
use crate::tiler::{self, GridTiler};
use crate::types::{CellSet, CountryPolygons, CoverageKey};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Written { cells: usize, complete: bool },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub key: CoverageKey,
    pub resolution: u8,
    pub status: ReportStatus,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ReportStatus::Written { cells, complete: true } => {
                write!(f, "{} res {}: {} cells", self.key, self.resolution, cells)
            }
            ReportStatus::Written { cells, complete: false } => {
                write!(f, "{} res {}: {} cells (incomplete)", self.key, self.resolution, cells)
            }
            ReportStatus::Failed { reason } => {
                write!(f, "{} res {}: failed: {}", self.key, self.resolution, reason)
            }
        }
    }
}

/// Outcome of every (key, resolution) pair of a run, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, ReportStatus::Failed { .. }))
    }

    pub fn incomplete(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, ReportStatus::Written { complete: false, .. }))
    }
}

/// Loads boundaries, tiles them and writes CSV files as configured.
pub fn generate(config: &AppConfig, cancel: &CancelToken) -> Result<RunReport> {
    let polygons = data::load_country_polygons(&config.input)?;
    let mut sink = CsvSink::create(&config.output.dir)?;
    let aggregator = Aggregator::new(
        config.processing.tiler(),
        config.processing.aggregate_options(),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.processing.threads)
        .build()
        .context("Failed to build worker pool")?;
    info!(threads = pool.current_num_threads(), "Tiling boundaries");

    pool.install(|| {
        run(
            &aggregator,
            &polygons,
            &config.processing.resolutions,
            &mut sink,
            cancel,
        )
    })
}

/// Tiles `polygons` at each resolution and hands every finished set to `sink`.
///
/// Resolutions are processed one after another and each resolution's cells
/// are released once written. Countries are written in code order, then the
/// land set. A country that failed is reported and never written. Repeated
/// resolutions are written once, in ascending order.
pub fn run<T: GridTiler, S: CellSink>(
    aggregator: &Aggregator<T>,
    polygons: &CountryPolygons,
    resolutions: &[u8],
    sink: &mut S,
    cancel: &CancelToken,
) -> Result<RunReport> {
    let resolutions = resolutions
        .iter()
        .map(|&res| tiler::parse_resolution(res).map(|_| res))
        .collect::<std::result::Result<BTreeSet<u8>, _>>()?;

    let mut report = RunReport::default();

    for res in resolutions {
        let coverage = aggregator.aggregate_resolution(polygons, res, cancel)?;
        let land_complete = coverage.land_is_complete();

        for (code, outcome) in &coverage.countries {
            let key = CoverageKey::Country(code.clone());
            let status = match outcome {
                Ok(country) => {
                    if country.produced_no_cells() {
                        warn!(key = %key, res, polygons = country.polygons, "Polygons produced no cells");
                    }
                    let complete = country.is_complete() && !country.produced_no_cells();
                    let summary = CoverageSummary::new(key.clone(), res, &country.cells);
                    write_set(sink, &summary, &country.cells, complete)?;
                    ReportStatus::Written {
                        cells: summary.cell_count,
                        complete,
                    }
                }
                Err(e) => {
                    error!(key = %key, res, error = %e, "Failed to tile country");
                    ReportStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.entries.push(ReportEntry {
                key,
                resolution: res,
                status,
            });
        }

        if let Some(land) = &coverage.land {
            let land_complete = land_complete
                && !(land.is_empty() && polygons.values().any(|p| !p.is_empty()));
            let summary = CoverageSummary::new(CoverageKey::Land, res, land);
            write_set(sink, &summary, land, land_complete)?;
            report.entries.push(ReportEntry {
                key: CoverageKey::Land,
                resolution: res,
                status: ReportStatus::Written {
                    cells: summary.cell_count,
                    complete: land_complete,
                },
            });
        }
    }

    Ok(report)
}

fn write_set<S: CellSink>(
    sink: &mut S,
    summary: &CoverageSummary,
    cells: &CellSet,
    complete: bool,
) -> Result<()> {
    sink.write(summary, cells)
        .with_context(|| format!("Failed to write {}", summary.file_name()))?;

    if complete {
        info!(key = %summary.key, res = summary.resolution, count = summary.cell_count, "Done writing cells");
    } else {
        warn!(key = %summary.key, res = summary.resolution, count = summary.cell_count, "Wrote incomplete cells");
    }
    Ok(())
}
