//! Structured fallback tier: field extraction from the route JSON payload.
//!
//! This tier is a safety net, not a quality bar: a missing name falls back
//! to a synthesized "Route <id>" label, and the surface type is always road
//! because the payload carries no classification signal.

use serde_json::Value;

use crate::extract::ExtractedFields;
use crate::model::{map_image_urls, SurfaceType};
use crate::units;

pub fn from_json(payload: &Value, route_id: &str) -> ExtractedFields {
    let route = payload.get("route");

    let title = route
        .and_then(|r| r.get("name"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Route {route_id}"));

    let description = route
        .and_then(|r| r.get("description"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    // Payload distance is meters
    let distance_km = route
        .and_then(|r| r.get("distance"))
        .and_then(Value::as_f64)
        .filter(|d| *d > 0.0)
        .map(|d| units::round1(d / 1000.0));

    let elevation_m = route
        .and_then(|r| r.get("elevation_gain"))
        .and_then(Value::as_f64)
        .filter(|e| *e > 0.0)
        .map(f64::round);

    let (image, image_large) = map_image_urls(route_id);

    ExtractedFields {
        title,
        description,
        surface: SurfaceType::Road,
        distance_km,
        elevation_m,
        image,
        image_large,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_payload() {
        let payload = json!({
            "route": {
                "name": "Purcellville Out and Back",
                "description": "Rail trail spin",
                "distance": 40215.3,
                "elevation_gain": 512.8,
            }
        });
        let f = from_json(&payload, "42");
        assert_eq!(f.title, "Purcellville Out and Back");
        assert_eq!(f.description.as_deref(), Some("Rail trail spin"));
        assert_eq!(f.distance_km, Some(40.2));
        assert_eq!(f.elevation_m, Some(513.0));
        assert_eq!(f.surface, SurfaceType::Road);
        assert_eq!(f.image, "https://ridewithgps.com/routes/42/thumb.png");
    }

    #[test]
    fn missing_name_synthesized() {
        let payload = json!({ "route": { "distance": 12000.0 } });
        let f = from_json(&payload, "77");
        assert_eq!(f.title, "Route 77");
        assert_eq!(f.distance_km, Some(12.0));
    }

    #[test]
    fn empty_payload() {
        let f = from_json(&json!({}), "9");
        assert_eq!(f.title, "Route 9");
        assert!(f.description.is_none());
        assert!(f.distance_km.is_none());
        assert!(f.elevation_m.is_none());
    }

    #[test]
    fn zero_distance_treated_as_unknown() {
        let payload = json!({ "route": { "name": "N", "distance": 0.0 } });
        let f = from_json(&payload, "9");
        assert!(f.distance_km.is_none());
    }

    #[test]
    fn surface_always_road() {
        let payload = json!({ "route": { "name": "Gravel Epic" } });
        assert_eq!(from_json(&payload, "9").surface, SurfaceType::Road);
    }
}
