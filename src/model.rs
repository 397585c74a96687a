use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::extract::ExtractedFields;

pub const ROUTE_BASE_URL: &str = "https://ridewithgps.com/routes";

/// Closed set of surface classifications. Worklist overrides outside this
/// set are rejected, never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceType {
    Road,
    Gravel,
    Mixed,
}

impl Default for SurfaceType {
    fn default() -> Self {
        SurfaceType::Road
    }
}

impl FromStr for SurfaceType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "road" => Ok(SurfaceType::Road),
            "gravel" => Ok(SurfaceType::Gravel),
            "mixed" => Ok(SurfaceType::Mixed),
            other => Err(ResolveError::InvalidOverride(other.to_string())),
        }
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SurfaceType::Road => "road",
            SurfaceType::Gravel => "gravel",
            SurfaceType::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// One unit of resolution work, derived from a worklist line.
/// `id` holds the numeric route id when the URL carries one; resolution
/// fails the item with InvalidUrl otherwise, before any fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: Option<String>,
    pub url: String,
    pub surface_override: Option<SurfaceType>,
}

/// A resolved route. Field names on the wire match the cache/manifest JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(rename = "rwgpsUrl")]
    pub rwgps_url: String,
    #[serde(rename = "type", default)]
    pub surface: SurfaceType,
    /// Kilometers, one decimal. Null means unresolved, not zero.
    #[serde(default)]
    pub distance: Option<f64>,
    /// Meters, whole. Null means unresolved, not zero.
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "mapImageLarge", default, skip_serializing_if = "Option::is_none")]
    pub image_large: Option<String>,
    /// Derived every run, never authoritative when read back from disk.
    #[serde(rename = "estimatedTime", default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<i64>,
}

fn default_description() -> String {
    "No description available".to_string()
}

impl RouteRecord {
    /// Build a fresh record from extracted fields. The worklist override
    /// wins over the extracted classification; `road` is the last resort.
    pub fn from_fields(
        route_id: &str,
        url: &str,
        fields: ExtractedFields,
        surface_override: Option<SurfaceType>,
    ) -> Self {
        RouteRecord {
            id: format!("route-{route_id}"),
            title: fields.title,
            description: fields
                .description
                .unwrap_or_else(|| "Route from RideWithGPS".to_string()),
            rwgps_url: url.to_string(),
            surface: surface_override.unwrap_or(fields.surface),
            distance: fields.distance_km,
            elevation: fields.elevation_m,
            image: Some(fields.image),
            image_large: None,
            estimated_time: None,
        }
    }
}

/// The resolved output contract handed to the rendering step.
#[derive(Debug, Serialize)]
pub struct Manifest {
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub routes: Vec<RouteRecord>,
}

/// Derive a stable id from a title: lowercase, strip everything but
/// alphanumerics and spaces, collapse whitespace to hyphens.
pub fn slug_from_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Map thumbnail and full-size image URLs for a numeric route id.
pub fn map_image_urls(route_id: &str) -> (String, String) {
    (
        format!("{ROUTE_BASE_URL}/{route_id}/thumb.png"),
        format!("{ROUTE_BASE_URL}/{route_id}/full.png"),
    )
}
