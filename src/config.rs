use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub locations_csv: PathBuf,
    pub hospitals_csv: PathBuf,
    pub ports_csv: PathBuf,
    pub boundaries: PathBuf, // .geojson, .json or .shp
    #[serde(default = "default_boundary_key")]
    pub boundary_key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub title: String,
    pub selected_zoom: u8,
    pub default_zoom: u8,
    pub tile_url: String,
    pub tile_attribution: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

fn default_boundary_key() -> String {
    "ADM2_FR".to_string()
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: "DRC Congo Positioning".to_string(),
            selected_zoom: 10,
            default_zoom: 2,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            tile_attribution: "&copy; OpenStreetMap contributors".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8501, static_dir: None }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
