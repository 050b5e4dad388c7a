use geo::MultiPolygon;
use serde::Serialize;

/// One row of the administrative table: a town and its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub admin1: String, // province
    pub admin2: String, // district
    pub admin3: String, // town
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityRecord {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityKind {
    Hospital,
    Port,
}

impl FacilityKind {
    pub const ALL: [FacilityKind; 2] = [FacilityKind::Hospital, FacilityKind::Port];

    /// Path segment used by the layer endpoint.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "hospitals" => Some(FacilityKind::Hospital),
            "ports" => Some(FacilityKind::Port),
            _ => None,
        }
    }

    pub fn layer_name(self) -> &'static str {
        match self {
            FacilityKind::Hospital => "Hospitals",
            FacilityKind::Port => "Ports",
        }
    }

    pub fn popup_prefix(self) -> &'static str {
        match self {
            FacilityKind::Hospital => "Hospital: ",
            FacilityKind::Port => "Port: ",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            FacilityKind::Hospital => "red",
            FacilityKind::Port => "green",
        }
    }

    pub fn icon(self) -> &'static str {
        "plus-sign"
    }

    /// Noun used in load error messages.
    pub fn file_label(self) -> &'static str {
        match self {
            FacilityKind::Hospital => "hospital",
            FacilityKind::Port => "port",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub key: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub geometry: MultiPolygon<f64>,
}
