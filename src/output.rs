//! Writing finished cell sets.

use crate::tiler::center_of;
use crate::types::{CellSet, CoverageKey};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// The facts needed to name and log one written cell set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSummary {
    pub key: CoverageKey,
    pub resolution: u8,
    pub cell_count: usize,
}

impl CoverageSummary {
    pub fn new(key: CoverageKey, resolution: u8, cells: &CellSet) -> Self {
        Self {
            key,
            resolution,
            cell_count: cells.len(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("h3_res_{}_{}.csv", self.resolution, self.key.file_stem())
    }
}

/// Destination for finished cell sets.
pub trait CellSink {
    fn write(&mut self, summary: &CoverageSummary, cells: &CellSet) -> Result<()>;
}

/// Writes one `id,lat,lng` CSV file per cell set into a directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    /// Creates the output directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, summary: &CoverageSummary) -> PathBuf {
        self.dir.join(summary.file_name())
    }
}

impl CellSink for CsvSink {
    fn write(&mut self, summary: &CoverageSummary, cells: &CellSet) -> Result<()> {
        let path = self.path_for(summary);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create CSV file: {:?}", path))?;

        writer.write_record(["id", "lat", "lng"])?;
        for &cell in cells {
            let (lat, lng) = center_of(cell);
            writer.write_record([
                u64::from(cell).to_string(),
                format!("{:.6}", lat),
                format!("{:.6}", lng),
            ])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write CSV file: {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CountryCode;
    use h3o::{LatLng, Resolution};

    #[test]
    fn test_file_name() {
        let cells = CellSet::new();
        let fra = CoverageKey::Country(CountryCode::parse_alpha3("FRA").unwrap());
        assert_eq!(CoverageSummary::new(fra, 4, &cells).file_name(), "h3_res_4_fra.csv");
        assert_eq!(
            CoverageSummary::new(CoverageKey::Land, 7, &cells).file_name(),
            "h3_res_7_land.csv"
        );
    }

    #[test]
    fn test_csv_rows_sorted_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::create(dir.path().join("nested")).unwrap();

        let cells: CellSet = [(48.85, 2.35), (51.5, -0.12), (40.4, -3.7)]
            .iter()
            .map(|&(lat, lng)| LatLng::new(lat, lng).unwrap().to_cell(Resolution::Four))
            .collect();
        let summary = CoverageSummary::new(CoverageKey::Land, 4, &cells);
        sink.write(&summary, &cells).unwrap();

        let mut reader = csv::Reader::from_path(sink.path_for(&summary)).unwrap();
        let headers: Vec<&str> = reader.headers().unwrap().iter().collect();
        assert_eq!(headers, vec!["id", "lat", "lng"]);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);

        let ids: Vec<u64> = rows.iter().map(|r| r[0].parse().unwrap()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);

        for (row, cell) in rows.iter().zip(&cells) {
            let (lat, lng) = center_of(*cell);
            assert_eq!(&row[1], format!("{:.6}", lat));
            assert_eq!(&row[2], format!("{:.6}", lng));
            assert_eq!(row[1].split('.').nth(1).unwrap().len(), 6);
        }
    }
}
