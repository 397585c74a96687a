//! Field extraction from a fetched route page.
//!
//! Each field has its own ordered cascade of `(pattern, converter)`
//! candidates, from the most specific marker down to loose numeric-with-unit
//! scans. The first pattern that matches wins for that field; there is no
//! merging across patterns. A field with no match stays unset.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{map_image_urls, SurfaceType};
use crate::units;

/// Fields pulled out of one route page (or the fallback payload).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub title: String,
    pub description: Option<String>,
    pub surface: SurfaceType,
    pub distance_km: Option<f64>,
    pub elevation_m: Option<f64>,
    pub image: String,
    pub image_large: String,
}

#[derive(Debug, Clone, Copy)]
enum DistanceUnit {
    /// No unit marker in the pattern; plausibility check decides km vs m.
    Unmarked,
    Km,
    Miles,
}

#[derive(Debug, Clone, Copy)]
enum ElevationUnit {
    Meters,
    Feet,
}

static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<title>([^<]+?)\s*\|\s*Ride with GPS</title>",
        r"(?i)<h1[^>]*>([^<]+)</h1>",
        r#"(?i)"name"\s*:\s*"([^"]+)""#,
        r#"(?i)class="route-title"[^>]*>([^<]+)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TITLE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\|\s*Ride with GPS$").unwrap());

static DESCRIPTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)<meta name="description" content="([^"]+)""#,
        r#"(?i)"description"\s*:\s*"([^"]+)""#,
        r#"(?i)class="description"[^>]*>([^<]+)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DISTANCE_PATTERNS: LazyLock<Vec<(Regex, DistanceUnit)>> = LazyLock::new(|| {
    [
        (r#"(?i)distance["\s]*:\s*([0-9.]+)"#, DistanceUnit::Unmarked),
        (r"(?i)([0-9.]+)\s*km", DistanceUnit::Km),
        (r"(?i)([0-9.]+)\s*miles", DistanceUnit::Miles),
        (r#"(?i)"distance"\s*:\s*([0-9.]+)"#, DistanceUnit::Unmarked),
        (r#"(?i)data-distance="([0-9.]+)""#, DistanceUnit::Unmarked),
    ]
    .iter()
    .map(|(p, u)| (Regex::new(p).unwrap(), *u))
    .collect()
});

static ELEVATION_PATTERNS: LazyLock<Vec<(Regex, ElevationUnit)>> = LazyLock::new(|| {
    [
        (r#"(?i)elevation[_\s]*gain["\s]*:\s*([0-9.]+)"#, ElevationUnit::Meters),
        (r"(?i)([0-9.]+)\s*m\s*elevation", ElevationUnit::Meters),
        (r"(?i)([0-9,]+)\s*ft\s*elevation", ElevationUnit::Feet),
        (r#"(?i)"elevation_gain"\s*:\s*([0-9.]+)"#, ElevationUnit::Meters),
        (r#"(?i)data-elevation-gain="([0-9.]+)""#, ElevationUnit::Meters),
    ]
    .iter()
    .map(|(p, u)| (Regex::new(p).unwrap(), *u))
    .collect()
});

/// Values above this are implausible as km and get treated as meters.
const METERS_THRESHOLD_KM: f64 = 500.0;

const GRAVEL_KEYWORDS: &[&str] = &["gravel", "dirt", "unpaved"];

/// Extract all fields from a route page. Returns None when no title
/// candidate matches, which fails the whole markup tier.
pub fn extract(html: &str, route_id: &str) -> Option<ExtractedFields> {
    let title = extract_title(html)?;
    let (image, image_large) = map_image_urls(route_id);

    Some(ExtractedFields {
        title,
        description: first_capture(&DESCRIPTION_PATTERNS, html),
        surface: classify_surface(html),
        distance_km: extract_distance(html),
        elevation_m: extract_elevation(html),
        image,
        image_large,
    })
}

fn extract_title(html: &str) -> Option<String> {
    let raw = first_capture(&TITLE_PATTERNS, html)?;
    Some(TITLE_SUFFIX_RE.replace(&raw, "").trim().to_string())
}

/// First non-empty capture across an ordered pattern list.
fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    for re in patterns {
        if let Some(caps) = re.captures(text) {
            let value = caps[1].trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Keyword scan over the whole document, lowercased. Heuristic only:
/// worklist overrides always win over this classification.
pub fn classify_surface(text: &str) -> SurfaceType {
    let lower = text.to_lowercase();
    if GRAVEL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        SurfaceType::Gravel
    } else if lower.contains("mixed") || (lower.contains("gravel") && lower.contains("road")) {
        SurfaceType::Mixed
    } else {
        SurfaceType::Road
    }
}

fn extract_distance(html: &str) -> Option<f64> {
    for (re, unit) in DISTANCE_PATTERNS.iter() {
        let Some(caps) = re.captures(html) else {
            continue;
        };
        let Ok(raw) = caps[1].parse::<f64>() else {
            continue;
        };
        let mut km = match unit {
            DistanceUnit::Miles => units::miles_to_km(raw),
            _ => raw,
        };
        if km > METERS_THRESHOLD_KM {
            km /= 1000.0;
        }
        return Some(units::round1(km));
    }
    None
}

fn extract_elevation(html: &str) -> Option<f64> {
    for (re, unit) in ELEVATION_PATTERNS.iter() {
        let Some(caps) = re.captures(html) else {
            continue;
        };
        // Thousands separators show up in feet values ("2,000 ft")
        let Ok(raw) = caps[1].replace(',', "").parse::<f64>() else {
            continue;
        };
        let meters = match unit {
            ElevationUnit::Feet => units::feet_to_meters(raw),
            ElevationUnit::Meters => raw,
        };
        return Some(meters.round());
    }
    None
}
