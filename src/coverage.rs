//! Folding per-polygon tiling results into per-country and land-wide cell sets.
//!
//! Every (country, resolution) pair is an independent task on the rayon pool.
//! A task owns its [`CellSet`] until it finishes; the land set is the union of
//! the finished country sets, so nothing is shared or locked while tiling.

use crate::error::{CoverageError, Result};
use crate::tiler::{self, GridTiler, H3Tiler};
use crate::types::{CellSet, CountryCode, CountryPolygons};
use geo::Polygon;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do when tiling one polygon of a country fails.
///
/// Invalid geometry and unsupported resolutions always abort the country;
/// the policy only governs [`CoverageError::TilingFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the country; it contributes no cells.
    #[default]
    FailFast,
    /// Skip the polygon and keep going; the result is marked incomplete.
    SkipPolygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub aggregate_land: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            aggregate_land: true,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

/// Shared flag checked before each country task starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A polygon that was skipped under [`FailurePolicy::SkipPolygon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolygonFailure {
    pub index: usize,
    pub error: CoverageError,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountryCoverage {
    pub cells: CellSet,
    /// Number of polygons the country had as input.
    pub polygons: usize,
    pub skipped: Vec<PolygonFailure>,
}

impl CountryCoverage {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Polygons were tiled but none of them contained a cell centre.
    pub fn produced_no_cells(&self) -> bool {
        self.polygons > 0 && self.cells.is_empty()
    }
}

pub type CountryOutcome = Result<CountryCoverage>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionCoverage {
    pub resolution: u8,
    pub countries: BTreeMap<CountryCode, CountryOutcome>,
    /// Union of every successful country set, if land aggregation is enabled.
    pub land: Option<CellSet>,
}

impl ResolutionCoverage {
    /// Whether the land set lacks cells from failed or partial countries.
    pub fn land_is_complete(&self) -> bool {
        self.countries.values().all(|outcome| match outcome {
            Ok(country) => country.is_complete(),
            Err(_) => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Coverage {
    pub resolutions: BTreeMap<u8, ResolutionCoverage>,
}

pub struct Aggregator<T> {
    tiler: T,
    options: AggregateOptions,
}

impl Aggregator<H3Tiler> {
    pub fn h3(tiler: H3Tiler, options: AggregateOptions) -> Self {
        Self::new(tiler, options)
    }
}

impl<T: GridTiler> Aggregator<T> {
    pub fn new(tiler: T, options: AggregateOptions) -> Self {
        Self { tiler, options }
    }

    /// Tiles every country at every resolution.
    ///
    /// All resolutions are validated before any tiling starts; duplicates in
    /// `resolutions` are processed once.
    pub fn aggregate(
        &self,
        polygons: &CountryPolygons,
        resolutions: &[u8],
        cancel: &CancelToken,
    ) -> Result<Coverage> {
        let resolutions = validate_resolutions(resolutions)?;

        let tasks: Vec<(u8, &CountryCode, &Vec<Polygon<f64>>)> = resolutions
            .iter()
            .flat_map(|&res| polygons.iter().map(move |(code, polys)| (res, code, polys)))
            .collect();

        let outcomes: Vec<(u8, CountryCode, CountryOutcome)> = tasks
            .into_par_iter()
            .map(|(res, code, polys)| (res, code.clone(), self.cover_country(code, polys, res, cancel)))
            .collect();

        let mut by_resolution: BTreeMap<u8, BTreeMap<CountryCode, CountryOutcome>> = resolutions
            .iter()
            .map(|&res| (res, BTreeMap::new()))
            .collect();
        for (res, code, outcome) in outcomes {
            by_resolution.entry(res).or_default().insert(code, outcome);
        }

        let resolutions = by_resolution
            .into_iter()
            .map(|(res, countries)| (res, self.finish(res, countries)))
            .collect();
        Ok(Coverage { resolutions })
    }

    /// Tiles every country at a single resolution.
    pub fn aggregate_resolution(
        &self,
        polygons: &CountryPolygons,
        resolution: u8,
        cancel: &CancelToken,
    ) -> Result<ResolutionCoverage> {
        tiler::parse_resolution(resolution)?;

        let countries: BTreeMap<CountryCode, CountryOutcome> = polygons
            .par_iter()
            .map(|(code, polys)| (code.clone(), self.cover_country(code, polys, resolution, cancel)))
            .collect();

        Ok(self.finish(resolution, countries))
    }

    /// Tiles all polygons of one country into a single deduplicated set.
    pub fn cover_country(
        &self,
        code: &CountryCode,
        polygons: &[Polygon<f64>],
        resolution: u8,
        cancel: &CancelToken,
    ) -> CountryOutcome {
        if cancel.is_cancelled() {
            return Err(CoverageError::Cancelled);
        }

        let mut coverage = CountryCoverage {
            polygons: polygons.len(),
            ..CountryCoverage::default()
        };
        if polygons.is_empty() {
            debug!(country = %code, res = resolution, "Country has no polygons");
            return Ok(coverage);
        }

        for (index, polygon) in polygons.iter().enumerate() {
            match self.tiler.tile(polygon, resolution) {
                Ok(cells) => coverage.cells.extend(cells),
                Err(error) if !error.is_fatal_for_country()
                    && self.options.failure_policy == FailurePolicy::SkipPolygon =>
                {
                    warn!(country = %code, res = resolution, polygon = index, %error, "Skipping polygon");
                    coverage.skipped.push(PolygonFailure { index, error });
                }
                Err(error) => return Err(at_polygon(error, index)),
            }
        }

        Ok(coverage)
    }

    fn finish(
        &self,
        resolution: u8,
        countries: BTreeMap<CountryCode, CountryOutcome>,
    ) -> ResolutionCoverage {
        let land = self.options.aggregate_land.then(|| {
            countries
                .values()
                .filter_map(|outcome| outcome.as_ref().ok())
                .flat_map(|country| country.cells.iter().copied())
                .collect::<CellSet>()
        });

        ResolutionCoverage {
            resolution,
            countries,
            land,
        }
    }
}

/// Tiles `polygons` with the default h3o tiler.
pub fn aggregate(
    polygons: &CountryPolygons,
    resolutions: &[u8],
    options: AggregateOptions,
) -> Result<Coverage> {
    Aggregator::h3(H3Tiler::default(), options).aggregate(polygons, resolutions, &CancelToken::new())
}

fn validate_resolutions(resolutions: &[u8]) -> Result<BTreeSet<u8>> {
    resolutions
        .iter()
        .map(|&res| tiler::parse_resolution(res).map(|_| res))
        .collect()
}

fn at_polygon(error: CoverageError, index: usize) -> CoverageError {
    match error {
        CoverageError::InvalidGeometry(msg) => {
            CoverageError::InvalidGeometry(format!("polygon {}: {}", index, msg))
        }
        CoverageError::TilingFailure(msg) => {
            CoverageError::TilingFailure(format!("polygon {}: {}", index, msg))
        }
        other => other,
    }
}
