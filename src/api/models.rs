//! Request and response records for the ClearSky Vision API.
//!
//! Field names follow the API's PascalCase JSON. Optional request fields are
//! omitted from the body when unset. Geometry is carried opaquely: converting
//! between WKT and GeoJSON is left to a geometry library.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{list_present, text_present, GeometryField, GeometryRequest, Selector};

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Satellite constellations a composite or tasking order can draw from.
///
/// Values the client does not know yet are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SatelliteConstellation {
    Sentinel1,
    Sentinel2,
    Landsat89,
    Other(String),
}

impl SatelliteConstellation {
    pub fn as_str(&self) -> &str {
        match self {
            SatelliteConstellation::Sentinel1 => "Sentinel1",
            SatelliteConstellation::Sentinel2 => "Sentinel2",
            SatelliteConstellation::Landsat89 => "Landsat89",
            SatelliteConstellation::Other(value) => value,
        }
    }
}

impl From<String> for SatelliteConstellation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Sentinel1" => SatelliteConstellation::Sentinel1,
            "Sentinel2" => SatelliteConstellation::Sentinel2,
            "Landsat89" => SatelliteConstellation::Landsat89,
            _ => SatelliteConstellation::Other(value),
        }
    }
}

impl From<SatelliteConstellation> for String {
    fn from(value: SatelliteConstellation) -> Self {
        match value {
            SatelliteConstellation::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SatelliteConstellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing models offered by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageryModel {
    Stratus2,
    Other(String),
}

impl ImageryModel {
    pub fn as_str(&self) -> &str {
        match self {
            ImageryModel::Stratus2 => "Stratus2",
            ImageryModel::Other(value) => value,
        }
    }
}

impl From<String> for ImageryModel {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Stratus2" => ImageryModel::Stratus2,
            _ => ImageryModel::Other(value),
        }
    }
}

impl From<ImageryModel> for String {
    fn from(value: ImageryModel) -> Self {
        match value {
            ImageryModel::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ImageryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// A GeoJSON geometry (`Polygon`, `MultiPolygon` or `GeometryCollection`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometries: Option<Vec<GeoJsonGeometry>>,
}

impl GeoJsonGeometry {
    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: Some(serde_json::json!(rings)),
            geometries: None,
        }
    }

    pub fn collection(geometries: Vec<GeoJsonGeometry>) -> Self {
        Self {
            kind: "GeometryCollection".to_string(),
            coordinates: None,
            geometries: Some(geometries),
        }
    }
}

fn wkt_or_geojson(wkt: &Option<String>, geojson: &Option<GeoJsonGeometry>) -> Vec<Selector> {
    vec![
        Selector::new(GeometryField::Wkt, text_present(wkt)),
        Selector::new(GeometryField::GeoJson, geojson.is_some()),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// API Key Info
// ─────────────────────────────────────────────────────────────────────────────

/// Account and quota information for the calling key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiKeyData {
    pub key: String,
    pub credit_amount: f64,
    pub euro_credit_amount: f64,
    pub credit_limit: i64,
    pub euro_credit_limit: i64,
    pub contact_info: String,
    #[serde(default)]
    pub email: Option<String>,
    pub max_concurrent_connections: i64,
    pub max_composite_area_km2: i64,
    pub max_total_bands: i64,
    #[serde(default)]
    pub current_month_costs: f64,
    #[serde(default)]
    pub next_month_costs: f64,
}

impl ApiKeyData {
    /// The server-imposed connection cap, floored at 1.
    pub fn concurrency_limit(&self) -> usize {
        usize::try_from(self.max_concurrent_connections)
            .unwrap_or(1)
            .max(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Imagery Search
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchAvailableImageryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_json: Option<GeoJsonGeometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
}

impl SearchAvailableImageryQuery {
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            ..Self::default()
        }
    }

    pub fn from_geojson(geojson: GeoJsonGeometry) -> Self {
        Self {
            geo_json: Some(geojson),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, until: NaiveDate) -> Self {
        self.from = Some(from);
        self.until = Some(until);
        self
    }
}

impl GeometryRequest for SearchAvailableImageryQuery {
    fn geometry_selectors(&self) -> Vec<Selector> {
        wkt_or_geojson(&self.wkt, &self.geo_json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatesByGeog {
    pub wkt: String,
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelImageDates {
    pub model: ImageryModel,
    pub satellite_constellations: Vec<SatelliteConstellation>,
    pub dates_by_geog: Vec<DatesByGeog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchAvailableImageryData {
    pub model_image_dates: Vec<ModelImageDates>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite Processing
// ─────────────────────────────────────────────────────────────────────────────

fn default_resolution() -> u32 {
    10
}

fn default_file_type() -> String {
    "tif".to_string()
}

fn default_data_type() -> String {
    "int16".to_string()
}

fn default_utm_data_selection_mode() -> String {
    "combined_utm".to_string()
}

fn default_bandnames() -> String {
    "all".to_string()
}

/// Parameters for a composite estimate. Also the shared core of
/// [`CompositeCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompositeEstimateQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_json: Option<GeoJsonGeometry>,
    /// Pixel resolution in meters.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    pub epsg_projection: u32,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    /// Only applies to UTM projections.
    #[serde(default = "default_utm_data_selection_mode")]
    pub utm_data_selection_mode: String,
    #[serde(default = "default_bandnames")]
    pub bandnames: String,
}

impl CompositeEstimateQuery {
    fn with_geometry(wkt: Option<String>, geo_json: Option<GeoJsonGeometry>, epsg: u32) -> Self {
        Self {
            wkt,
            geo_json,
            resolution: default_resolution(),
            file_type: default_file_type(),
            epsg_projection: epsg,
            data_type: default_data_type(),
            utm_data_selection_mode: default_utm_data_selection_mode(),
            bandnames: default_bandnames(),
        }
    }

    pub fn from_wkt(wkt: impl Into<String>, epsg_projection: u32) -> Self {
        Self::with_geometry(Some(wkt.into()), None, epsg_projection)
    }

    pub fn from_geojson(geojson: GeoJsonGeometry, epsg_projection: u32) -> Self {
        Self::with_geometry(None, Some(geojson), epsg_projection)
    }
}

impl GeometryRequest for CompositeEstimateQuery {
    fn geometry_selectors(&self) -> Vec<Selector> {
        wkt_or_geojson(&self.wkt, &self.geo_json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompositeEstimateData {
    pub area_estimate_km2: f64,
    pub credit_estimate: f64,
}

/// A composite processing command. The response body is the raster itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompositeCommand {
    #[serde(flatten)]
    pub query: CompositeEstimateQuery,
    pub date: NaiveDate,
    /// `Intersect` (all pixels touching the geometry) or `Contained`.
    pub pixel_selection_mode: String,
    pub satellite_constellations: Vec<SatelliteConstellation>,
    pub model: ImageryModel,
    pub utm_grid_force_pixel_resolution_size: bool,
}

impl CompositeCommand {
    pub fn new(
        query: CompositeEstimateQuery,
        date: NaiveDate,
        satellite_constellations: Vec<SatelliteConstellation>,
        model: ImageryModel,
    ) -> Self {
        Self {
            query,
            date,
            pixel_selection_mode: "Intersect".to_string(),
            satellite_constellations,
            model,
            utm_grid_force_pixel_resolution_size: false,
        }
    }

    /// Extension used when the server does not name the file.
    pub fn file_extension(&self) -> &str {
        &self.query.file_type
    }
}

impl GeometryRequest for CompositeCommand {
    fn geometry_selectors(&self) -> Vec<Selector> {
        self.query.geometry_selectors()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasking
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SupportedSatelliteConstellation {
    pub satellite_constellation: SatelliteConstellation,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingModel {
    pub model: ImageryModel,
    pub supported_satellite_constellations: Vec<SupportedSatelliteConstellation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingModelsData {
    pub tasking_models: Vec<TaskingModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskOrder {
    pub task_order_guid: String,
    /// `Monthly` or `Yearly`.
    pub billing_cycle: String,
    pub ordering_process_status: String,
    pub storage_months: i64,
    pub api_requests: i64,
    pub image_frequency: i64,
    pub task_order_area_km2: f64,
    pub model: ImageryModel,
    pub reference_date: NaiveDate,
    pub from: NaiveDate,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    pub satellite_constellations: Vec<SatelliteConstellation>,
    #[serde(default)]
    pub tiles: Option<Vec<String>>,
    #[serde(default)]
    pub wkt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingOrdersData {
    pub task_orders: Vec<TaskOrder>,
}

/// Shared body of the tasking order estimate query and create command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingOrderRequest {
    pub storage_months: u32,
    pub api_requests: u32,
    pub image_frequency: u32,
    pub model: ImageryModel,
    pub reference_date: NaiveDate,
    pub from: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    pub satellite_constellations: Vec<SatelliteConstellation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<Uuid>>,
    /// A geometry collection of polygons; each polygon is one area of interest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_json: Option<GeoJsonGeometry>,
}

impl GeometryRequest for TaskingOrderRequest {
    fn geometry_selectors(&self) -> Vec<Selector> {
        wkt_or_geojson(&self.wkt, &self.geo_json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingOrderEstimateCosts {
    pub currency_code: String,
    pub current_month_order_cost_estimate: f64,
    pub current_month_storage_costs: f64,
    pub next_month_order_cost_estimate: f64,
    pub next_month_storage_costs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingOrderEstimateData {
    pub storage_months: i64,
    pub api_requests: i64,
    pub model: ImageryModel,
    pub cancellation_date: NaiveDate,
    pub area_km2: f64,
    /// Area before every AOI is rounded up to the 1 km² minimum.
    pub area_km2_before_minimum1_km2_per_aoi: f64,
    pub current_month_cost: f64,
    pub next_month_cost: f64,
    pub costs: TaskingOrderEstimateCosts,
    #[serde(default)]
    pub tiles: Option<Vec<String>>,
    pub areas_of_interest_wkt: String,
    pub satellite_constellations: Vec<SatelliteConstellation>,
    #[serde(default)]
    pub image_dates: Vec<NaiveDate>,
}

/// Tile search accepts a geometry or an explicit list of tile ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingTileSearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_json: Option<GeoJsonGeometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_guids: Option<Vec<Uuid>>,
}

impl TaskingTileSearchQuery {
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            ..Self::default()
        }
    }

    pub fn from_tile_guids(tile_guids: Vec<Uuid>) -> Self {
        Self {
            tile_guids: Some(tile_guids),
            ..Self::default()
        }
    }
}

impl GeometryRequest for TaskingTileSearchQuery {
    fn geometry_selectors(&self) -> Vec<Selector> {
        vec![
            Selector::new(GeometryField::Wkt, text_present(&self.wkt)),
            Selector::new(GeometryField::GeoJson, self.geo_json.is_some()),
            Selector::new(GeometryField::TileGuids, list_present(&self.tile_guids)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingTile {
    pub guid: String,
    pub epsg: String,
    pub data_geog_wkt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskingTileSearchData {
    pub tiles: Vec<TaskingTile>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
