use geo::Polygon;
use h3o::CellIndex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Deduplicated cells of one resolution. Iterates in ascending cell id order.
pub type CellSet = BTreeSet<CellIndex>;

/// Boundary polygons grouped by the country they belong to.
pub type CountryPolygons = BTreeMap<CountryCode, Vec<Polygon<f64>>>;

/// Normalized country identifier, usually an ISO 3166-1 alpha-3 code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountryCode(String);

impl CountryCode {
    pub const UNKNOWN: &'static str = "UNKNOWN";

    /// Accepts a field value only if it looks like an alpha-3 code.
    ///
    /// Natural Earth marks missing codes with `-99`, which is rejected here.
    pub fn parse_alpha3(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() == 3 && value.bytes().all(|b| b.is_ascii_uppercase()) {
            Some(CountryCode(value.to_string()))
        } else {
            None
        }
    }

    pub fn unknown() -> Self {
        CountryCode(Self::UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which attribute a feature's country code was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryCodeSource {
    Primary(CountryCode),
    Secondary(CountryCode),
    Unknown,
}

impl CountryCodeSource {
    pub fn into_code(self) -> CountryCode {
        match self {
            CountryCodeSource::Primary(code) | CountryCodeSource::Secondary(code) => code,
            CountryCodeSource::Unknown => CountryCode::unknown(),
        }
    }
}

/// Grouping key of a written cell set: one country or the union of all of them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoverageKey {
    Country(CountryCode),
    Land,
}

impl CoverageKey {
    /// Lowercase name used in file names and log lines.
    pub fn file_stem(&self) -> String {
        match self {
            CoverageKey::Country(code) => code.as_str().to_lowercase(),
            CoverageKey::Land => "land".to_string(),
        }
    }
}

impl fmt::Display for CoverageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageKey::Country(code) => write!(f, "{}", code),
            CoverageKey::Land => f.write_str("land"),
        }
    }
}
