//! Converts national land boundaries into sets of H3 cells.
//!
//! Boundary polygons are grouped by country ([`data`]), each polygon is tiled
//! into the cells whose centre it contains ([`tiler`]), and the cells are
//! folded into one deduplicated set per country and resolution, plus an
//! optional land-wide union ([`coverage`]). Finished sets are written as
//! `id,lat,lng` CSV files ([`output`]); [`pipeline`] ties it together.

pub mod config;
pub mod coverage;
pub mod data;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod tiler;
pub mod types;

pub use coverage::{
    aggregate, AggregateOptions, Aggregator, CancelToken, Coverage, CountryCoverage, FailurePolicy,
    ResolutionCoverage,
};
pub use error::CoverageError;
pub use output::{CellSink, CoverageSummary, CsvSink};
pub use tiler::{center_of, tile, tile_with, GridTiler, H3Tiler, HoleMode};
pub use types::{CellSet, CountryCode, CountryCodeSource, CountryPolygons, CoverageKey};
