//! The resolution pipeline: cache short-circuit, two-tier fetch, sticky
//! backfill of missing fields, and final manifest assembly.
//!
//! Processing is strictly sequential over the worklist; each item fully
//! completes before the next begins. Per-item failures are logged and
//! skipped, never fatal.

use std::cmp::Ordering;

use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::cache::RouteCache;
use crate::error::ResolveError;
use crate::extract::ExtractedFields;
use crate::fetch::{route_id_from_url, Fetcher};
use crate::model::{Manifest, RouteRecord, WorkItem};
use crate::units;

/// Owns the cache handle and the append-only resolved list for one run.
pub struct ResolutionContext {
    pub cache: RouteCache,
    pub routes: Vec<RouteRecord>,
}

impl ResolutionContext {
    pub fn new(cache: RouteCache) -> Self {
        ResolutionContext {
            cache,
            routes: Vec::new(),
        }
    }
}

/// Resolve each work item in order. Failing items are skipped; the run
/// proceeds.
pub async fn resolve_worklist(
    ctx: &mut ResolutionContext,
    items: &[WorkItem],
    fetcher: &Fetcher,
) -> Result<()> {
    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    for item in items {
        pb.set_message(item.url.clone());
        match resolve_item(ctx, fetcher, item).await {
            Ok(record) => {
                info!(
                    "added {} ({}km, {}m, {})",
                    record.title,
                    record
                        .distance
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "?".into()),
                    record
                        .elevation
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "?".into()),
                    record.surface
                );
                ctx.routes.push(record);
            }
            Err(e) => warn!("skipping {}: {e}", item.url),
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(())
}

/// One item: cache hit (with URL refresh and override reapplication) or a
/// fresh two-tier fetch persisted to the cache.
async fn resolve_item(
    ctx: &ResolutionContext,
    fetcher: &Fetcher,
    item: &WorkItem,
) -> Result<RouteRecord, ResolveError> {
    let route_id = item
        .id
        .as_deref()
        .ok_or_else(|| ResolveError::InvalidUrl(item.url.clone()))?;
    let cache_id = format!("route-{route_id}");

    if let Some(mut record) = ctx.cache.lookup(&cache_id)? {
        // A cache hit is not immunity from worklist edits: the URL may have
        // rotated and the override always wins.
        record.rwgps_url = item.url.clone();
        if let Some(surface) = item.surface_override {
            record.surface = surface;
        }
        return Ok(record);
    }

    let fields = fetcher.fetch(&item.url, route_id).await?;
    let record = RouteRecord::from_fields(route_id, &item.url, fields, item.surface_override);
    ctx.cache.put(&record)?;
    Ok(record)
}

/// Fill only the null fields of a record from a later fetch. Persisted
/// distance and elevation are sticky: once non-null they are never
/// replaced.
pub fn fill_missing(record: &mut RouteRecord, fields: &ExtractedFields) {
    if record.distance.is_none() {
        record.distance = fields.distance_km;
    }
    if record.elevation.is_none() {
        record.elevation = fields.elevation_m;
    }
    if record.image.is_none() {
        record.image = Some(fields.image.clone());
    }
    if record.image_large.is_none() {
        record.image_large = Some(fields.image_large.clone());
    }
}

fn is_complete(record: &RouteRecord) -> bool {
    record.distance.is_some() && record.elevation.is_some() && record.image.is_some()
}

/// One more two-tier fetch for records still missing distance, elevation,
/// or imagery (typically preloaded partial records). Results are not
/// written back to the cache.
pub async fn backfill_missing(ctx: &mut ResolutionContext, fetcher: &Fetcher) {
    for record in ctx.routes.iter_mut() {
        if is_complete(record) {
            continue;
        }
        let Some(route_id) = route_id_from_url(&record.rwgps_url) else {
            warn!("cannot backfill {}: no route id in URL", record.id);
            continue;
        };
        info!("backfilling missing fields for {}", record.id);
        match fetcher.fetch(&record.rwgps_url, &route_id).await {
            Ok(fields) => fill_missing(record, &fields),
            Err(e) => warn!("could not backfill {}: {e}", record.id),
        }
    }
}

/// Final assembly: zero-default any still-unresolved numeric fields (only
/// here, never in the cache), recompute every time estimate, and sort by
/// distance.
pub fn finalize(mut routes: Vec<RouteRecord>) -> Manifest {
    for record in &mut routes {
        let km = record.distance.unwrap_or(0.0);
        record.distance = Some(km);
        record.elevation = Some(record.elevation.unwrap_or(0.0));
        record.estimated_time = Some(units::estimated_time_min(km));
    }

    routes.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
    });

    Manifest {
        generated_at: Utc::now(),
        count: routes.len(),
        routes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SurfaceType;

    fn record(id: &str, distance: Option<f64>, elevation: Option<f64>) -> RouteRecord {
        RouteRecord {
            id: id.to_string(),
            title: "T".to_string(),
            description: "d".to_string(),
            rwgps_url: "https://ridewithgps.com/routes/1".to_string(),
            surface: SurfaceType::Road,
            distance,
            elevation,
            image: None,
            image_large: None,
            estimated_time: None,
        }
    }

    fn fields(distance: Option<f64>, elevation: Option<f64>) -> ExtractedFields {
        ExtractedFields {
            title: "Fetched".to_string(),
            description: None,
            surface: SurfaceType::Gravel,
            distance_km: distance,
            elevation_m: elevation,
            image: "thumb".to_string(),
            image_large: "full".to_string(),
        }
    }

    #[test]
    fn cached_values_are_sticky() {
        let mut rec = record("route-1", Some(40.2), Some(500.0));
        fill_missing(&mut rec, &fields(Some(38.0), Some(480.0)));
        assert_eq!(rec.distance, Some(40.2));
        assert_eq!(rec.elevation, Some(500.0));
    }

    #[test]
    fn null_fields_get_backfilled() {
        let mut rec = record("route-1", None, Some(500.0));
        fill_missing(&mut rec, &fields(Some(38.0), Some(480.0)));
        assert_eq!(rec.distance, Some(38.0));
        assert_eq!(rec.elevation, Some(500.0));
        assert_eq!(rec.image.as_deref(), Some("thumb"));
        assert_eq!(rec.image_large.as_deref(), Some("full"));
    }

    #[test]
    fn backfill_never_touches_surface() {
        let mut rec = record("route-1", None, None);
        fill_missing(&mut rec, &fields(Some(10.0), None));
        assert_eq!(rec.surface, SurfaceType::Road);
    }

    #[test]
    fn finalize_defaults_and_time() {
        let manifest = finalize(vec![record("route-1", Some(50.0), None)]);
        let rec = &manifest.routes[0];
        assert_eq!(rec.distance, Some(50.0));
        assert_eq!(rec.elevation, Some(0.0));
        assert_eq!(rec.estimated_time, Some(120));
    }

    #[test]
    fn finalize_zero_defaults_unresolved_distance() {
        let manifest = finalize(vec![record("route-1", None, None)]);
        let rec = &manifest.routes[0];
        assert_eq!(rec.distance, Some(0.0));
        assert_eq!(rec.estimated_time, Some(0));
    }

    #[test]
    fn finalize_recomputes_stale_estimate() {
        let mut rec = record("route-1", Some(25.0), Some(100.0));
        rec.estimated_time = Some(999);
        let manifest = finalize(vec![rec]);
        assert_eq!(manifest.routes[0].estimated_time, Some(60));
    }

    #[test]
    fn finalize_sorts_by_distance() {
        let manifest = finalize(vec![
            record("route-long", Some(80.0), None),
            record("route-none", None, None),
            record("route-short", Some(20.0), None),
        ]);
        let ids: Vec<&str> = manifest.routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["route-none", "route-short", "route-long"]);
        assert_eq!(manifest.count, 3);
    }
}
