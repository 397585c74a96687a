mod api;
mod cache;
mod error;
mod extract;
mod fetch;
mod model;
mod resolve;
mod units;
mod worklist;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use cache::RouteCache;
use fetch::Fetcher;
use model::SurfaceType;
use resolve::ResolutionContext;

#[derive(Parser)]
#[command(name = "velo_routes", about = "RideWithGPS route resolver and site data builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the worklist and write the routes manifest
    Build {
        /// Worklist file (overrides VELO_RIDES_FILE)
        #[arg(long)]
        rides: Option<PathBuf>,
        /// Route cache directory (overrides VELO_ROUTES_DIR)
        #[arg(long)]
        routes_dir: Option<PathBuf>,
        /// Output directory for the manifest (overrides VELO_DIST_DIR)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Max routes to resolve (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Summarize the local route cache
    Stats {
        #[arg(long)]
        routes_dir: Option<PathBuf>,
    },
}

/// Defaults for the file layout, overridable via VELO_* environment
/// variables and then by CLI flags.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    rides_file: PathBuf,
    routes_dir: PathBuf,
    dist_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rides_file: "rides.txt".into(),
            routes_dir: "routes".into(),
            dist_dir: "dist".into(),
        }
    }
}

fn load_settings() -> Settings {
    config::Config::builder()
        .add_source(config::Environment::with_prefix("VELO"))
        .build()
        .ok()
        .and_then(|c| c.try_deserialize().ok())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = load_settings();

    let result = match cli.command {
        Commands::Build {
            rides,
            routes_dir,
            out_dir,
            limit,
        } => {
            build(
                rides.unwrap_or(settings.rides_file),
                routes_dir.unwrap_or(settings.routes_dir),
                out_dir.unwrap_or(settings.dist_dir),
                limit,
            )
            .await
        }
        Commands::Stats { routes_dir } => stats(routes_dir.unwrap_or(settings.routes_dir)),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn build(
    rides_file: PathBuf,
    routes_dir: PathBuf,
    out_dir: PathBuf,
    limit: Option<usize>,
) -> Result<()> {
    // Setup failures are the only fatal ones; everything per-item is a skip.
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let mut worklist = worklist::load(&rides_file, &routes_dir)?;
    if let Some(n) = limit {
        worklist.items.truncate(n);
    }
    let total = worklist.len();
    println!("Found {} route references", total);

    let mut ctx = ResolutionContext::new(RouteCache::new(&routes_dir));
    ctx.routes.extend(worklist.preloaded.drain(..));

    let fetcher = Fetcher::new()?;
    resolve::resolve_worklist(&mut ctx, &worklist.items, &fetcher).await?;
    resolve::backfill_missing(&mut ctx, &fetcher).await;

    let manifest = resolve::finalize(ctx.routes);
    let json = serde_json::to_string_pretty(&manifest)?;
    let manifest_path = out_dir.join("routes.json");
    fs::write(&manifest_path, json)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    info!("wrote {}", manifest_path.display());
    println!(
        "Resolved {}/{} routes -> {}",
        manifest.count,
        total,
        manifest_path.display()
    );
    Ok(())
}

fn stats(routes_dir: PathBuf) -> Result<()> {
    let records = worklist::load_records_dir(&routes_dir);
    if records.is_empty() {
        println!("No cached routes in {}", routes_dir.display());
        return Ok(());
    }

    let no_distance = records.iter().filter(|r| r.distance.is_none()).count();
    let no_elevation = records.iter().filter(|r| r.elevation.is_none()).count();
    let no_image = records.iter().filter(|r| r.image.is_none()).count();
    let by_surface = |s: SurfaceType| records.iter().filter(|r| r.surface == s).count();

    println!("Cached:       {}", records.len());
    println!("No distance:  {}", no_distance);
    println!("No elevation: {}", no_elevation);
    println!("No image:     {}", no_image);
    println!(
        "Surfaces:     {} road, {} gravel, {} mixed",
        by_surface(SurfaceType::Road),
        by_surface(SurfaceType::Gravel),
        by_surface(SurfaceType::Mixed)
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
