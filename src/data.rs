use crate::config::InputConfig;
use crate::types::{CountryCode, CountryCodeSource, CountryPolygons};
use anyhow::{anyhow, Context, Result};
use geo::MultiPolygon;
use geojson::GeoJson;
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where boundary polygons are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundarySource {
    Url(String),
    GeoJson(PathBuf),
    Shapefile(PathBuf),
}

impl BoundarySource {
    pub fn parse(source: &str) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(BoundarySource::Url(source.to_string()));
        }

        let path = PathBuf::from(source);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .ok_or_else(|| anyhow!("Boundary file has no extension: {:?}", path))?;

        match extension.as_str() {
            "json" | "geojson" => Ok(BoundarySource::GeoJson(path)),
            "shp" => Ok(BoundarySource::Shapefile(path)),
            _ => Err(anyhow!("Unsupported boundary format: {}", extension)),
        }
    }
}

/// Reads boundary polygons and groups them by country code.
pub fn load_country_polygons(input: &InputConfig) -> Result<CountryPolygons> {
    let polygons = match BoundarySource::parse(&input.source)? {
        BoundarySource::Url(url) => {
            let geojson = fetch_geojson(&url)?;
            polygons_from_geojson(geojson, input)?
        }
        BoundarySource::GeoJson(path) => {
            let geojson = read_geojson(&path)?;
            polygons_from_geojson(geojson, input)?
        }
        BoundarySource::Shapefile(path) => polygons_from_shapefile(&path, input)?,
    };

    let total: usize = polygons.values().map(Vec::len).sum();
    info!(countries = polygons.len(), polygons = total, "Loaded boundaries");
    Ok(polygons)
}

/// Picks the first field that holds a valid alpha-3 code.
pub fn resolve_country_code(primary: Option<&str>, secondary: Option<&str>) -> CountryCodeSource {
    if let Some(code) = primary.and_then(CountryCode::parse_alpha3) {
        return CountryCodeSource::Primary(code);
    }
    if let Some(code) = secondary.and_then(CountryCode::parse_alpha3) {
        return CountryCodeSource::Secondary(code);
    }
    CountryCodeSource::Unknown
}

fn fetch_geojson(url: &str) -> Result<GeoJson> {
    info!(%url, "Fetching boundaries");
    let body = reqwest::blocking::get(url)
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .with_context(|| format!("Failed to fetch boundaries from {}", url))?;
    body.parse::<GeoJson>()
        .with_context(|| format!("Failed to parse GeoJSON from {}", url))
}

fn read_geojson(path: &Path) -> Result<GeoJson> {
    info!("Loading GeoJSON from {:?}", path);
    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    GeoJson::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")
}

pub fn polygons_from_geojson(geojson: GeoJson, input: &InputConfig) -> Result<CountryPolygons> {
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("Boundary GeoJSON must be a FeatureCollection")),
    };

    let mut by_country = CountryPolygons::new();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let property = |name: &str| {
            feature
                .properties
                .as_ref()
                .and_then(|props| props.get(name))
                .and_then(|value| value.as_str())
                .map(str::to_string)
        };
        let primary = property(&input.primary_code_field);
        let secondary = property(&input.secondary_code_field);
        let code = resolve_country_code(primary.as_deref(), secondary.as_deref());
        if code == CountryCodeSource::Unknown {
            warn!(feature = index, "No valid country code, grouping under {}", CountryCode::UNKNOWN);
        }

        let geometry = match feature.geometry {
            Some(geometry) => geometry,
            None => {
                warn!(feature = index, "Feature has no geometry, skipping");
                continue;
            }
        };
        let geometry: geo::Geometry<f64> = geometry
            .value
            .try_into()
            .map_err(|e| anyhow!("Failed to convert geometry of feature {}: {:?}", index, e))?;

        let polygons = match geometry {
            geo::Geometry::Polygon(p) => vec![p],
            geo::Geometry::MultiPolygon(mp) => mp.0,
            other => {
                return Err(anyhow!(
                    "Feature {} has unsupported geometry type {}",
                    index,
                    geometry_name(&other)
                ))
            }
        };

        by_country
            .entry(code.into_code())
            .or_default()
            .extend(polygons);
    }

    Ok(by_country)
}

fn polygons_from_shapefile(path: &Path, input: &InputConfig) -> Result<CountryPolygons> {
    info!("Loading Shapefile from {:?}", path);
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut by_country = CountryPolygons::new();

    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        let field = |name: &str| match record.get(name) {
            Some(FieldValue::Character(Some(s))) => Some(s.clone()),
            _ => None,
        };
        let primary = field(&input.primary_code_field);
        let secondary = field(&input.secondary_code_field);
        let code = resolve_country_code(primary.as_deref(), secondary.as_deref());
        if code == CountryCodeSource::Unknown {
            warn!(record = index, "No valid country code, grouping under {}", CountryCode::UNKNOWN);
        }

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon of record {}: {:?}", index, e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM of record {}: {:?}", index, e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ of record {}: {:?}", index, e))?,
            shapefile::Shape::NullShape => {
                warn!(record = index, "Record has no shape, skipping");
                continue;
            }
            other => {
                return Err(anyhow!(
                    "Record {} has unsupported shape type {:?}",
                    index,
                    other.shapetype()
                ))
            }
        };

        by_country
            .entry(code.into_code())
            .or_default()
            .extend(geometry.0);
    }

    Ok(by_country)
}

fn geometry_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
        #[allow(unreachable_patterns)]
        _ => "Unknown",
    }
}
