use crate::data::DataStore;
use crate::html;
use crate::map::{self, Layer, LayerRequest, ViewResponse};
use crate::selection::{self, Selection};
use crate::spatial::BoundingBox;
use crate::types::FacilityKind;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub type AppState = Arc<DataStore>;

/// Failure surfaced to the browser as a status code and a plain message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    admin1: Option<String>,
    admin2: Option<String>,
    admin3: Option<String>,
    #[serde(default)]
    hospitals: bool,
    #[serde(default)]
    ports: bool,
}

impl ViewParams {
    fn split(self) -> (Selection, LayerRequest) {
        (
            Selection { admin1: self.admin1, admin2: self.admin2, admin3: self.admin3 },
            LayerRequest { hospitals: self.hospitals, ports: self.ports },
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct Admin2Params {
    admin1: String,
}

#[derive(Debug, Deserialize)]
pub struct Admin3Params {
    admin1: String,
    admin2: String,
}

#[derive(Debug, Deserialize)]
pub struct LayerParams {
    bbox: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.config().server.static_dir.clone();

    let mut app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(|| async { "ok" }))
        .route("/api/view", get(view_handler))
        .route("/api/options/admin1", get(admin1_handler))
        .route("/api/options/admin2", get(admin2_handler))
        .route("/api/options/admin3", get(admin3_handler))
        .route("/api/layers/:kind", get(layer_handler));

    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

pub async fn start_server(store: DataStore) -> Result<()> {
    let port = store.config().server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let app = router(Arc::new(store));

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(html::index_page(&state.config().map.title))
}

async fn view_handler(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Json<ViewResponse> {
    let (selection, request) = params.split();
    Json(map::build_view(&state, &selection, request).await)
}

async fn admin1_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(selection::admin1_options(state.locations()))
}

async fn admin2_handler(
    State(state): State<AppState>,
    Query(params): Query<Admin2Params>,
) -> Json<Vec<String>> {
    Json(selection::admin2_options(state.locations(), &params.admin1))
}

async fn admin3_handler(
    State(state): State<AppState>,
    Query(params): Query<Admin3Params>,
) -> Json<Vec<String>> {
    Json(selection::admin3_options(state.locations(), &params.admin1, &params.admin2))
}

async fn layer_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<LayerParams>,
) -> Result<Json<Layer>, ApiError> {
    let kind = FacilityKind::from_slug(&kind)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Unknown layer: {}", kind)))?;

    let bbox = params.bbox.as_deref()
        .map(BoundingBox::parse)
        .transpose()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let layer = state.facilities(kind).await.map_err(|e| {
        error!("{:#}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
    })?;

    let layer = match bbox {
        Some(bbox) => map::facility_layer(kind, layer.index.within(&layer.records, &bbox).into_iter()),
        None => map::facility_layer(kind, layer.records.iter()),
    };
    Ok(Json(layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::types::LocationRecord;

    fn state(name: &str) -> AppState {
        let dir = crate::data::scratch_dir(name);
        let mut config = AppConfig::from_toml(
            "[input]\nlocations_csv = \"x\"\nhospitals_csv = \"x\"\nports_csv = \"x\"\nboundaries = \"x\"\n",
        )
        .unwrap();
        config.input.ports_csv = dir.join("ports.csv");
        config.input.hospitals_csv = dir.join("absent.csv");
        config.input.boundaries = dir.join("absent.geojson");
        std::fs::write(
            &config.input.ports_csv,
            "Name,Lat,Lon\nMatadi,-5.82,13.45\nGoma,-1.68,29.22\nBoma,-5.85,13.05\n",
        )
        .unwrap();

        let locations = vec![
            LocationRecord {
                admin1: "Kongo-Central".to_string(),
                admin2: "Matadi".to_string(),
                admin3: "Matadi".to_string(),
                lat: -5.82,
                lon: 13.45,
            },
            LocationRecord {
                admin1: "Kinshasa".to_string(),
                admin2: "Funa".to_string(),
                admin3: "Limete".to_string(),
                lat: -4.35,
                lon: 15.35,
            },
        ];
        Arc::new(DataStore::with_locations(config, locations))
    }

    fn markers_of(layer: &Layer) -> Vec<String> {
        match layer {
            Layer::Markers { markers, .. } => markers.iter().map(|m| m.popup.clone()).collect(),
            Layer::Boundary { .. } => panic!("expected marker layer"),
        }
    }

    #[tokio::test]
    async fn layer_is_filtered_by_bbox() {
        let state = state("layer-bbox");
        let params = LayerParams { bbox: Some("12,-6,14,-5".to_string()) };
        let Json(layer) = layer_handler(State(state), Path("ports".to_string()), Query(params))
            .await
            .unwrap();
        assert_eq!(markers_of(&layer), ["Port: Matadi", "Port: Boma"]);
    }

    #[tokio::test]
    async fn layer_errors_map_to_status_codes() {
        let state = state("layer-errors");

        let err = layer_handler(State(state.clone()), Path("schools".to_string()), Query(LayerParams { bbox: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = layer_handler(
            State(state.clone()),
            Path("ports".to_string()),
            Query(LayerParams { bbox: Some("1,2".to_string()) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = layer_handler(State(state), Path("hospitals".to_string()), Query(LayerParams { bbox: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.starts_with("Error reading hospital CSV file"));
    }

    #[tokio::test]
    async fn view_resolves_selection_and_layers() {
        let state = state("view");
        let params = ViewParams {
            admin1: Some("Kinshasa".to_string()),
            ports: true,
            ..Default::default()
        };
        let Json(response) = view_handler(State(state), Query(params)).await;
        assert_eq!(response.selection.admin3.as_deref(), Some("Limete"));
        assert_eq!(response.map.center, [-4.35, 15.35]);
        assert_eq!(response.map.layers.len(), 1);
    }

    #[tokio::test]
    async fn option_endpoints_follow_the_cascade() {
        let state = state("options");
        let Json(admin1) = admin1_handler(State(state.clone())).await;
        assert_eq!(admin1, ["Kinshasa", "Kongo-Central"]);

        let Json(admin2) = admin2_handler(
            State(state.clone()),
            Query(Admin2Params { admin1: "Kongo-Central".to_string() }),
        )
        .await;
        assert_eq!(admin2, ["Matadi"]);

        let Json(admin3) = admin3_handler(
            State(state),
            Query(Admin3Params { admin1: "Kinshasa".to_string(), admin2: "Funa".to_string() }),
        )
        .await;
        assert_eq!(admin3, ["Limete"]);
    }

    async fn send(app: &Router, uri: &str) -> (StatusCode, axum::body::Bytes) {
        use axum::body::{Body, to_bytes};
        use axum::http::Request;
        use tower::ServiceExt;

        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn requests_are_routed_end_to_end() {
        let app = router(state("router"));

        let (status, body) = send(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ok");

        let (status, body) = send(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&body).contains("<title>DRC Congo Positioning</title>"));

        let (status, body) = send(&app, "/api/view?admin1=Kinshasa&hospitals=false&ports=true").await;
        assert_eq!(status, StatusCode::OK);
        let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["selection"]["admin3"], "Limete");
        assert_eq!(view["map"]["layers"].as_array().unwrap().len(), 1);
        assert_eq!(view["map"]["layers"][0]["name"], "Ports");
        assert_eq!(view["map"]["layer_control"], true);

        let (status, body) = send(&app, "/api/options/admin2?admin1=Kinshasa").await;
        assert_eq!(status, StatusCode::OK);
        let options: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(options, ["Funa"]);

        let (status, body) = send(&app, "/api/layers/ports?bbox=12,-6,14,-5").await;
        assert_eq!(status, StatusCode::OK);
        let layer: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(layer["markers"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "/api/layers/schools").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
