use crate::config::AppConfig;
use crate::spatial::FacilityIndex;
use crate::types::{BoundaryFeature, FacilityKind, FacilityRecord, LocationRecord};
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord};
use geo::MultiPolygon;
use shapefile::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// A facility file together with its spatial index.
pub struct FacilityLayer {
    pub records: Vec<FacilityRecord>,
    pub index: FacilityIndex,
}

impl FacilityLayer {
    pub fn new(records: Vec<FacilityRecord>) -> Self {
        let index = FacilityIndex::build(&records);
        Self { records, index }
    }
}

/// Read-only snapshot of every input file. The location table is loaded up
/// front; the overlay files are loaded on first use and then kept for the
/// lifetime of the process. Failed loads are not cached.
pub struct DataStore {
    config: AppConfig,
    locations: Vec<LocationRecord>,
    hospitals: OnceCell<Arc<FacilityLayer>>,
    ports: OnceCell<Arc<FacilityLayer>>,
    boundaries: OnceCell<Option<Arc<Vec<BoundaryFeature>>>>,
}

impl DataStore {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let locations = load_locations(&config.input.locations_csv)
            .context("Error reading location CSV file")?;
        info!("Loaded {} location records", locations.len());
        Ok(Self::with_locations(config.clone(), locations))
    }

    pub fn with_locations(config: AppConfig, locations: Vec<LocationRecord>) -> Self {
        Self {
            config,
            locations,
            hospitals: OnceCell::new(),
            ports: OnceCell::new(),
            boundaries: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn locations(&self) -> &[LocationRecord] {
        &self.locations
    }

    pub async fn facilities(&self, kind: FacilityKind) -> Result<Arc<FacilityLayer>> {
        let (cell, path) = match kind {
            FacilityKind::Hospital => (&self.hospitals, &self.config.input.hospitals_csv),
            FacilityKind::Port => (&self.ports, &self.config.input.ports_csv),
        };
        let layer = cell
            .get_or_try_init(|| async {
                let path = path.clone();
                let records = tokio::task::spawn_blocking(move || load_facilities(&path))
                    .await
                    .context("Facility loader task failed")??;
                info!("Loaded {} {} records", records.len(), kind.file_label());
                Ok::<_, anyhow::Error>(Arc::new(FacilityLayer::new(records)))
            })
            .await
            .with_context(|| format!("Error reading {} CSV file", kind.file_label()))?;
        Ok(layer.clone())
    }

    /// `Ok(None)` when the boundary file does not exist.
    pub async fn boundaries(&self) -> Result<Option<Arc<Vec<BoundaryFeature>>>> {
        let features = self
            .boundaries
            .get_or_try_init(|| async {
                let path = self.config.input.boundaries.clone();
                if !path.exists() {
                    warn!("Boundary file not found: {:?}", path);
                    return Ok(None);
                }
                let key = self.config.input.boundary_key.clone();
                let features = tokio::task::spawn_blocking(move || load_boundaries(&path, &key))
                    .await
                    .context("Boundary loader task failed")??;
                info!("Loaded {} boundary features", features.len());
                Ok::<_, anyhow::Error>(Some(Arc::new(features)))
            })
            .await
            .context("Error reading boundary file")?;
        Ok(features.clone())
    }
}

pub fn load_locations(path: &Path) -> Result<Vec<LocationRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    read_locations(file)
}

pub fn load_facilities(path: &Path) -> Result<Vec<FacilityRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    read_facilities(file)
}

pub fn read_locations<R: Read>(reader: R) -> Result<Vec<LocationRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let admin1_idx = column_index(&headers, "Admin1")?;
    let admin2_idx = column_index(&headers, "Admin2")?;
    let admin3_idx = column_index(&headers, "Admin3")?;
    let lat_idx = column_index(&headers, "Lat")?;
    let lon_idx = column_index(&headers, "Lon")?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let record = result?;
        let Some((lat, lon)) = parse_coordinates(&record, lat_idx, lon_idx) else {
            skipped += 1;
            continue;
        };
        records.push(LocationRecord {
            admin1: record.get(admin1_idx).unwrap_or("").to_string(),
            admin2: record.get(admin2_idx).unwrap_or("").to_string(),
            admin3: record.get(admin3_idx).unwrap_or("").to_string(),
            lat,
            lon,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} location rows with invalid coordinates", skipped);
    }
    Ok(records)
}

pub fn read_facilities<R: Read>(reader: R) -> Result<Vec<FacilityRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let name_idx = column_index(&headers, "Name")?;
    let lat_idx = column_index(&headers, "Lat")?;
    let lon_idx = column_index(&headers, "Lon")?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let record = result?;
        let Some((lat, lon)) = parse_coordinates(&record, lat_idx, lon_idx) else {
            skipped += 1;
            continue;
        };
        records.push(FacilityRecord {
            name: record.get(name_idx).unwrap_or("").to_string(),
            lat,
            lon,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} facility rows with invalid coordinates", skipped);
    }
    Ok(records)
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers.iter().position(|h| h == name)
        .ok_or_else(|| anyhow!("Column '{}' not found in CSV", name))
}

fn parse_coordinates(record: &StringRecord, lat_idx: usize, lon_idx: usize) -> Option<(f64, f64)> {
    let lat: f64 = record.get(lat_idx)?.trim().parse().ok()?;
    let lon: f64 = record.get(lon_idx)?.trim().parse().ok()?;
    (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
}

/// Load district polygons from a GeoJSON FeatureCollection or a Shapefile.
pub fn load_boundaries(path: &Path, key: &str) -> Result<Vec<BoundaryFeature>> {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Boundary file has no extension"))?;

    match extension.as_str() {
        "shp" => load_shapefile_boundaries(path, key),
        "json" | "geojson" => {
            debug!("Loading GeoJSON from {:?}...", path);
            let file = File::open(path)
                .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
            read_geojson_boundaries(BufReader::new(file), key)
        }
        _ => Err(anyhow!("Unsupported geometry format: {}", extension)),
    }
}

pub fn read_geojson_boundaries<R: Read>(reader: R, key: &str) -> Result<Vec<BoundaryFeature>> {
    use geojson::GeoJson;

    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::new();

    for feature in collection.features {
        let properties = feature.properties.unwrap_or_default();

        // Only string keys can equal a district name.
        let id = match properties.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => continue,
        };

        let geometry = match feature.geometry {
            Some(geo) => {
                let valid_geo: geo::Geometry<f64> = geo.value.try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;
                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue,
                }
            }
            None => continue,
        };

        features.push(BoundaryFeature { key: id, properties, geometry });
    }

    Ok(features)
}

fn load_shapefile_boundaries(path: &Path, key: &str) -> Result<Vec<BoundaryFeature>> {
    use shapefile::dbase::FieldValue;

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut features = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        let fields: HashMap<String, FieldValue> = record.into();

        let id = match fields.get(key) {
            Some(FieldValue::Character(Some(s))) => s.trim_end().to_string(),
            Some(_) => continue,
            None => return Err(anyhow!("Key column '{}' not found in Shapefile", key)),
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => continue,
        };

        let mut properties = serde_json::Map::new();
        for (name, value) in fields {
            let json = match value {
                FieldValue::Character(Some(s)) => serde_json::Value::from(s.trim_end()),
                FieldValue::Numeric(Some(n)) => serde_json::Value::from(n),
                FieldValue::Float(Some(f)) => serde_json::Value::from(f),
                FieldValue::Double(d) => serde_json::Value::from(d),
                FieldValue::Integer(i) => serde_json::Value::from(i),
                FieldValue::Logical(Some(b)) => serde_json::Value::from(b),
                _ => continue,
            };
            properties.insert(name, json);
        }

        features.push(BoundaryFeature { key: id, properties, geometry });
    }

    Ok(features)
}

/// Features whose key equals the chosen district exactly.
pub fn boundaries_for<'a>(features: &'a [BoundaryFeature], admin2: &str) -> Vec<&'a BoundaryFeature> {
    features.iter().filter(|f| f.key == admin2).collect()
}

/// Scratch directory under the system temp dir, used by tests that need real files.
#[cfg(test)]
pub(crate) fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("drc-positioning-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
