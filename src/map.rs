use crate::config::MapConfig;
use crate::data::{DataStore, boundaries_for};
use crate::selection::{self, Cascade, Selection};
use crate::types::{BoundaryFeature, FacilityKind, FacilityRecord, LocationRecord};
use geo::BoundingRect;
use geojson::{Feature, FeatureCollection, Geometry};
use serde::Serialize;
use tracing::{debug, error};

pub const BOUNDARY_LAYER_NAME: &str = "Admin2 Boundary";

/// Everything the browser needs to draw one state of the page.
#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
    pub caption: String,
    pub tiles: TileLayer,
    pub markers: Vec<Marker>,
    pub layers: Vec<Layer>,
    pub layer_control: bool,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileLayer {
    pub url: String,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub popup: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Boundary {
        name: &'static str,
        data: FeatureCollection,
        style: PolygonStyle,
        /// `[[south, west], [north, east]]`
        bounds: Option<[[f64; 2]; 2]>,
    },
    Markers {
        name: &'static str,
        markers: Vec<Marker>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonStyle {
    pub fill_color: &'static str,
    pub color: &'static str,
    pub weight: u32,
    pub fill_opacity: f64,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self { fill_color: "blue", color: "blue", weight: 2, fill_opacity: 0.2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }
}

/// Which optional overlays were switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerRequest {
    pub hospitals: bool,
    pub ports: bool,
}

impl LayerRequest {
    fn wants(&self, kind: FacilityKind) -> bool {
        match kind {
            FacilityKind::Hospital => self.hospitals,
            FacilityKind::Port => self.ports,
        }
    }
}

/// State of the boundary file as seen by the composer.
pub enum Boundaries<'a> {
    Absent,
    Failed,
    Loaded(&'a [BoundaryFeature]),
}

/// Inputs gathered from the store for one view.
pub struct Overlays<'a> {
    pub boundaries: Boundaries<'a>,
    pub facilities: Vec<(FacilityKind, &'a [FacilityRecord])>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewResponse {
    pub selection: Cascade,
    pub map: MapView,
}

/// Resolve the selection and compose the map, loading overlays on demand.
/// Overlay load failures end up as notices, never as errors.
pub async fn build_view(store: &DataStore, selection: &Selection, request: LayerRequest) -> ViewResponse {
    let cascade = selection::resolve(store.locations(), selection);
    let mut notices = Vec::new();

    let boundary_file = store.boundaries().await;
    let boundaries = match &boundary_file {
        Ok(Some(features)) => Boundaries::Loaded(features.as_slice()),
        Ok(None) => Boundaries::Absent,
        Err(e) => {
            error!("{:#}", e);
            notices.push(Notice::error(format!("{:#}", e)));
            Boundaries::Failed
        }
    };

    let mut layers = Vec::new();
    for kind in FacilityKind::ALL {
        if !request.wants(kind) {
            continue;
        }
        match store.facilities(kind).await {
            Ok(layer) => layers.push((kind, layer)),
            Err(e) => {
                error!("{:#}", e);
                notices.push(Notice::error(format!("{:#}", e)));
            }
        }
    }

    let overlays = Overlays {
        boundaries,
        facilities: layers.iter().map(|(kind, layer)| (*kind, layer.records.as_slice())).collect(),
        notices,
    };
    let map = compose(&cascade, overlays, &store.config().map);
    ViewResponse { selection: cascade, map }
}

pub fn compose(cascade: &Cascade, overlays: Overlays<'_>, config: &MapConfig) -> MapView {
    let (center, zoom, caption) = match cascade.matches.first() {
        Some(first) => (
            [first.lat, first.lon],
            config.selected_zoom,
            format!(
                "Coordinates for {}: Latitude {:?}, Longitude {:?}",
                cascade.admin3.as_deref().unwrap_or_default(),
                first.lat,
                first.lon
            ),
        ),
        None => (
            [0.0, 0.0],
            config.default_zoom,
            "No data found for the selected options.".to_string(),
        ),
    };

    let markers = cascade.matches.iter().map(location_marker).collect();

    let mut notices = Vec::new();
    let mut layers = Vec::new();
    let mut layer_control = false;

    match overlays.boundaries {
        Boundaries::Absent => notices.push(Notice::warning("Admin2 polygon file not found.")),
        Boundaries::Failed => {}
        Boundaries::Loaded(features) => {
            layer_control = true;
            let matched = match cascade.admin2.as_deref() {
                Some(admin2) => boundaries_for(features, admin2),
                None => Vec::new(),
            };
            if matched.is_empty() {
                notices.push(Notice::info("No polygon found for the selected Admin2."));
            } else {
                debug!("{} polygon(s) for district {:?}", matched.len(), cascade.admin2);
                layers.push(boundary_layer(&matched));
            }
        }
    }

    notices.extend(overlays.notices);

    for (kind, records) in overlays.facilities {
        layers.push(facility_layer(kind, records.iter()));
        layer_control = true;
    }

    MapView {
        center,
        zoom,
        caption,
        tiles: TileLayer {
            url: config.tile_url.clone(),
            attribution: config.tile_attribution.clone(),
        },
        markers,
        layers,
        layer_control,
        notices,
    }
}

fn location_marker(record: &LocationRecord) -> Marker {
    Marker {
        lat: record.lat,
        lon: record.lon,
        popup: format!("{} | {} | {}", record.admin1, record.admin2, record.admin3),
        color: None,
        icon: None,
    }
}

pub fn facility_layer<'a>(kind: FacilityKind, records: impl Iterator<Item = &'a FacilityRecord>) -> Layer {
    let markers = records
        .map(|r| Marker {
            lat: r.lat,
            lon: r.lon,
            popup: format!("{}{}", kind.popup_prefix(), r.name),
            color: Some(kind.color()),
            icon: Some(kind.icon()),
        })
        .collect();
    Layer::Markers { name: kind.layer_name(), markers }
}

fn boundary_layer(features: &[&BoundaryFeature]) -> Layer {
    let collection = FeatureCollection {
        bbox: None,
        features: features.iter().map(|f| to_feature(f)).collect(),
        foreign_members: None,
    };

    let bounds = features.iter()
        .filter_map(|f| f.geometry.bounding_rect())
        .reduce(|a, b| {
            geo::Rect::new(
                geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
        .map(|r| [[r.min().y, r.min().x], [r.max().y, r.max().x]]);

    Layer::Boundary {
        name: BOUNDARY_LAYER_NAME,
        data: collection,
        style: PolygonStyle::default(),
        bounds,
    }
}

fn to_feature(boundary: &BoundaryFeature) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&boundary.geometry))),
        id: None,
        properties: Some(boundary.properties.clone()),
        foreign_members: None,
    }
}
