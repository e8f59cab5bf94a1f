//! rillmap CLI - terrain hydrology and flood risk from a DEM

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rillmap_algorithms::flood::{composite_flood_risk, EvidenceLayer, RiskInputs};
use rillmap_algorithms::hydrology::{
    condition_dem, delineate_watersheds, extract_stream_network, flow_accumulation, flow_direction,
    resolve_depressions, sink_summary, FallbackPolicy, PourPoint, ResolveMode,
};
use rillmap_algorithms::summary::{summarize_by_boundary, SummaryLayers};
use rillmap_algorithms::terrain::{slope, twi, SlopeMethod, SlopeUnits};
use rillmap_algorithms::vector::to_wgs84;
use rillmap_algorithms::{run_pipeline, PipelineConfig, PipelineInputs, PipelineOutput};
use rillmap_core::io::{read_geojson, read_geotiff, write_geojson, write_geotiff};
use rillmap_core::vector::FeatureCollection;
use rillmap_core::{Raster, RasterElement};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "rillmap")]
#[command(author, version, about = "Terrain hydrology and flood risk from elevation models", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline configuration (TOML); flags given on a subcommand override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Run every stage and write all artifacts to a directory
    Run {
        /// Input DEM file
        input: PathBuf,
        /// Output directory
        output: PathBuf,
        /// Pour points (GeoJSON); defaults to the stream network outlets
        #[arg(long)]
        pour_points: Option<PathBuf>,
        /// Inundation evidence (GeoJSON polygons or a GeoTIFF on the DEM grid)
        #[arg(long)]
        evidence: Option<PathBuf>,
        /// Boundary polygons (GeoJSON) to summarize by
        #[arg(long)]
        boundaries: Option<PathBuf>,
    },
    /// Print the effective pipeline configuration as TOML
    Config,
    /// Hydrology stages
    Hydrology {
        #[command(subcommand)]
        algorithm: HydrologyCommands,
    },
    /// Terrain derivatives
    Terrain {
        #[command(subcommand)]
        algorithm: TerrainCommands,
    },
    /// Composite flood risk from a resolved DEM and its accumulation
    Risk {
        /// Resolved DEM file
        dem: PathBuf,
        /// Flow accumulation file
        accumulation: PathBuf,
        /// Output directory
        output: PathBuf,
        /// Depression mask from `hydrology resolve --depressions`
        #[arg(long)]
        depressions: Option<PathBuf>,
        /// Inundation evidence (GeoJSON polygons or a GeoTIFF on the DEM grid)
        #[arg(long)]
        evidence: Option<PathBuf>,
    },
    /// Summarize streams and basins inside boundary polygons
    Summarize {
        /// Flow direction file
        flow_direction: PathBuf,
        /// Flow accumulation file
        accumulation: PathBuf,
        /// Boundary polygons (GeoJSON)
        boundaries: PathBuf,
        /// Output JSON file
        output: PathBuf,
    },
}

// ─── Hydrology subcommands ──────────────────────────────────────────────

#[derive(Subcommand)]
enum HydrologyCommands {
    /// Normalize nodata encodings and validate the grid
    Condition {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Sentinel written for every missing cell
        #[arg(long)]
        nodata: Option<f64>,
        /// Additional values meaning "missing" (repeatable)
        #[arg(long = "extra-nodata")]
        extra_nodata: Vec<f64>,
    },
    /// Breach or fill depressions
    Resolve {
        /// Conditioned DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Strategy: breach, fill
        #[arg(short, long)]
        mode: Option<String>,
        /// Breach search radius in cells
        #[arg(short = 'r', long)]
        search_radius: Option<usize>,
        /// Maximum carve depth below the depression cell
        #[arg(long)]
        max_depth: Option<f64>,
        /// Cells with no breach path: fill, leave-sink, fail
        #[arg(long)]
        fallback: Option<String>,
        /// Also write the depression mask here
        #[arg(long)]
        depressions: Option<PathBuf>,
    },
    /// D8 flow direction
    FlowDirection {
        /// Resolved DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Flow accumulation in cells
    FlowAccumulation {
        /// Flow direction file
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Extract the classified stream network
    Streams {
        /// Flow direction file
        flow_direction: PathBuf,
        /// Flow accumulation file
        accumulation: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Drop segments below this Strahler order
        #[arg(long)]
        min_order: Option<u8>,
        /// Also write the Strahler order raster here
        #[arg(long)]
        order: Option<PathBuf>,
    },
    /// Delineate basins upstream of pour points
    Watersheds {
        /// Flow direction file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Pour points as "row,col;row,col;..."
        #[arg(short, long, conflicts_with = "pour_point_file")]
        pour_points: Option<String>,
        /// Pour points (GeoJSON)
        #[arg(long)]
        pour_point_file: Option<PathBuf>,
        /// Drop basins with fewer cells
        #[arg(long)]
        min_cells: Option<usize>,
        /// Also write the basin label raster here
        #[arg(long)]
        labels: Option<PathBuf>,
    },
}

// ─── Terrain subcommands ────────────────────────────────────────────────

#[derive(Subcommand)]
enum TerrainCommands {
    /// Calculate slope from DEM
    Slope {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Output units: degrees, percent, radians
        #[arg(short, long, default_value = "degrees")]
        units: String,
        /// Gradient estimator: central, horn
        #[arg(short, long, default_value = "central")]
        method: String,
        /// Z-factor for unit conversion
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
    },
    /// Topographic Wetness Index from accumulation and slope in degrees
    Twi {
        /// Flow accumulation file
        accumulation: PathBuf,
        /// Slope file (degrees)
        slope: PathBuf,
        /// Output file
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<T> =
        read_geotiff(path).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_raster<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    write_geotiff(raster, path).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_vector(path: &Path) -> Result<FeatureCollection> {
    read_geojson(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Write a collection in its own CRS and a `<stem>_wgs84.geojson` copy
fn write_vector(fc: &FeatureCollection, path: &Path) -> Result<()> {
    write_geojson(fc, path).with_context(|| format!("Failed to write {}", path.display()))?;
    if fc.crs.is_none() {
        warn!("{} has no CRS; skipping the WGS84 copy", path.display());
        return Ok(());
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let wgs84_path = path.with_file_name(format!("{stem}_wgs84.geojson"));
    let wgs84 = to_wgs84(fc).with_context(|| format!("Failed to reproject {}", path.display()))?;
    write_geojson(&wgs84, &wgs84_path).with_context(|| format!("Failed to write {}", wgs84_path.display()))
}

fn read_evidence(path: &Path) -> Result<EvidenceLayer> {
    let is_tiff = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
    if is_tiff {
        Ok(EvidenceLayer::Raster(read_raster(path)?))
    } else {
        Ok(EvidenceLayer::Polygons(read_vector(path)?))
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_file(p).with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn parse_resolve_mode(s: &str) -> Result<ResolveMode> {
    match s.to_lowercase().as_str() {
        "breach" | "b" => Ok(ResolveMode::Breach),
        "fill" | "f" => Ok(ResolveMode::Fill),
        _ => bail!("Unknown resolve mode: {} (expected breach or fill)", s),
    }
}

fn parse_fallback(s: &str) -> Result<FallbackPolicy> {
    match s.to_lowercase().replace('_', "-").as_str() {
        "fill" => Ok(FallbackPolicy::Fill),
        "leave-sink" | "sink" => Ok(FallbackPolicy::LeaveSink),
        "fail" => Ok(FallbackPolicy::Fail),
        _ => bail!("Unknown fallback policy: {} (expected fill, leave-sink or fail)", s),
    }
}

fn parse_pour_points(s: &str) -> Result<Vec<PourPoint>> {
    s.split(';')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let parts: Vec<&str> = pair.trim().split(',').collect();
            if parts.len() != 2 {
                bail!("Pour point must be 'row,col', got: {}", pair);
            }
            let row: usize = parts[0].trim().parse().context("Invalid row")?;
            let col: usize = parts[1].trim().parse().context("Invalid col")?;
            Ok(PourPoint::cell(row, col))
        })
        .collect()
}

fn write_report<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_run_outputs(out: &PipelineOutput, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let crs = out.flow_direction.crs();

    write_raster(&out.conditioned.dem, &dir.join("conditioned.tif"))?;
    write_raster(&out.resolved.dem, &dir.join("resolved.tif"))?;
    write_raster(&out.resolved.depressions, &dir.join("depressions.tif"))?;
    write_raster(&out.flow_direction, &dir.join("flow_direction.tif"))?;
    write_raster(&out.accumulation, &dir.join("flow_accumulation.tif"))?;
    write_raster(&out.network.order, &dir.join("stream_order.tif"))?;
    write_raster(&out.risk.slope, &dir.join("slope.tif"))?;
    write_raster(&out.risk.twi, &dir.join("twi.tif"))?;
    write_raster(&out.risk.score, &dir.join("risk_score.tif"))?;
    write_raster(&out.risk.classes, &dir.join("risk_class.tif"))?;
    write_raster(&out.watersheds.labels, &dir.join("watersheds.tif"))?;
    if out.resolved.stats.unresolved > 0 {
        write_raster(&out.resolved.unresolved, &dir.join("unresolved_sinks.tif"))?;
    }

    write_vector(&out.network.to_features(crs), &dir.join("streams.geojson"))?;
    write_vector(&out.watersheds.to_features(crs), &dir.join("watersheds.geojson"))?;
    write_vector(&out.risk.zones_to_features(crs), &dir.join("risk_zones.geojson"))?;

    write_report(&out.report, &dir.join("run_report.json"))
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster: Raster<f64> = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: none"),
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
                println!("  Min: {:.4}", min);
                println!("  Max: {:.4}", max);
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Full pipeline ────────────────────────────────────────────
        Commands::Run {
            input,
            output,
            pour_points,
            evidence,
            boundaries,
        } => {
            let dem: Raster<f64> = read_raster(&input)?;
            let inputs = PipelineInputs {
                pour_points: pour_points.as_deref().map(read_vector).transpose()?,
                evidence: evidence.as_deref().map(read_evidence).transpose()?,
                boundaries: boundaries.as_deref().map(read_vector).transpose()?,
            };

            let start = Instant::now();
            let pb = spinner("Running pipeline...");
            let out = run_pipeline(&dem, &inputs, &config).context("Pipeline failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let pb = spinner("Writing outputs...");
            write_run_outputs(&out, &output)?;
            pb.finish_and_clear();

            let r = &out.report;
            println!("Stream segments: {}", out.network.len());
            for (order, count) in &r.segments_by_order {
                println!("  order {}: {}", order, count);
            }
            println!("Watersheds: {} ({} below the size limit)", r.basins, r.basins_dropped);
            println!(
                "Risk cells: low {}, medium {}, high {}; {} zones",
                r.risk_class_cells[0], r.risk_class_cells[1], r.risk_class_cells[2], r.risk_zones
            );
            for w in &r.warnings {
                println!("  warning: {:?}", w);
            }
            done("Outputs", &output, elapsed);
        }

        Commands::Config => {
            print!("{}", config.to_toml_string().context("Failed to serialize config")?);
        }

        // ── Hydrology ────────────────────────────────────────────────
        Commands::Hydrology { algorithm } => match algorithm {
            HydrologyCommands::Condition {
                input,
                output,
                nodata,
                extra_nodata,
            } => {
                let mut params = config.condition;
                if let Some(nd) = nodata {
                    params.nodata = nd;
                }
                params.extra_nodata.extend(extra_nodata);

                let raw = read_raster(&input)?;
                let start = Instant::now();
                let result = condition_dem(&raw, &params).context("Failed to condition DEM")?;
                let elapsed = start.elapsed();
                info!(
                    "Valid cells: {}, missing: {}",
                    result.report.valid_cells,
                    result.report.missing_cells()
                );
                write_raster(&result.dem, &output)?;
                done("Conditioned DEM", &output, elapsed);
            }

            HydrologyCommands::Resolve {
                input,
                output,
                mode,
                search_radius,
                max_depth,
                fallback,
                depressions,
            } => {
                let mut params = config.resolve;
                if let Some(m) = mode {
                    params.mode = parse_resolve_mode(&m)?;
                }
                if let Some(r) = search_radius {
                    params.search_radius = r;
                }
                if max_depth.is_some() {
                    params.max_depth = max_depth;
                }
                if let Some(f) = fallback {
                    params.fallback = parse_fallback(&f)?;
                }

                let dem = read_raster(&input)?;
                let start = Instant::now();
                let pb = spinner("Resolving depressions...");
                let result = resolve_depressions(&dem, &params).context("Failed to resolve depressions")?;
                pb.finish_and_clear();
                let elapsed = start.elapsed();

                let s = &result.stats;
                info!(
                    "Breached {}, filled {}, fallbacks {}, unresolved {}",
                    s.breached, s.filled, s.fallbacks, s.unresolved
                );
                write_raster(&result.dem, &output)?;
                if let Some(path) = depressions {
                    write_raster(&result.depressions, &path)?;
                }
                done("Resolved DEM", &output, elapsed);
            }

            HydrologyCommands::FlowDirection { input, output } => {
                let dem = read_raster(&input)?;
                let start = Instant::now();
                let result = flow_direction(&dem).context("Failed to calculate flow direction")?;
                let elapsed = start.elapsed();
                let sinks = sink_summary(&result);
                if sinks.interior_sinks > 0 {
                    warn!("{} interior sinks; resolve the DEM first", sinks.interior_sinks);
                }
                write_raster(&result, &output)?;
                done("Flow direction", &output, elapsed);
            }

            HydrologyCommands::FlowAccumulation { input, output } => {
                let fdir = read_raster(&input)?;
                let start = Instant::now();
                let pb = spinner("Accumulating flow...");
                let result = flow_accumulation(&fdir).context("Failed to calculate flow accumulation")?;
                pb.finish_and_clear();
                let elapsed = start.elapsed();
                write_raster(&result, &output)?;
                done("Flow accumulation", &output, elapsed);
            }

            HydrologyCommands::Streams {
                flow_direction: fdir_path,
                accumulation,
                output,
                min_order,
                order,
            } => {
                let mut params = config.streams;
                if let Some(o) = min_order {
                    params.min_order = o;
                }
                let fdir: Raster<u8> = read_raster(&fdir_path)?;
                let acc = read_raster(&accumulation)?;

                let start = Instant::now();
                let net = extract_stream_network(&fdir, &acc, &params).context("Failed to extract streams")?;
                let elapsed = start.elapsed();
                if net.is_empty() {
                    warn!(
                        "No channel: max accumulation {} does not exceed {}",
                        net.thresholds.max_accumulation,
                        net.thresholds.initiation()
                    );
                }
                info!("Segments: {}, max order: {}", net.len(), net.max_order());

                write_vector(&net.to_features(fdir.crs()), &output)?;
                if let Some(path) = order {
                    write_raster(&net.order, &path)?;
                }
                done("Stream network", &output, elapsed);
            }

            HydrologyCommands::Watersheds {
                input,
                output,
                pour_points,
                pour_point_file,
                min_cells,
                labels,
            } => {
                let mut params = config.watersheds;
                if let Some(n) = min_cells {
                    params.min_cells = n;
                }
                let fdir: Raster<u8> = read_raster(&input)?;
                let points = match (pour_points, pour_point_file) {
                    (Some(s), _) => parse_pour_points(&s)?,
                    (None, Some(path)) => PourPoint::from_features(&read_vector(&path)?, fdir.crs())
                        .context("Failed to place pour points on the grid")?,
                    (None, None) => bail!("Give --pour-points or --pour-point-file"),
                };

                let start = Instant::now();
                let set = delineate_watersheds(&fdir, &points, &params).context("Failed to delineate watersheds")?;
                let elapsed = start.elapsed();
                info!("Basins: {}, skipped: {}", set.basins.len(), set.skipped.len());

                write_vector(&set.to_features(fdir.crs()), &output)?;
                if let Some(path) = labels {
                    write_raster(&set.labels, &path)?;
                }
                done("Watersheds", &output, elapsed);
            }
        },

        // ── Terrain ──────────────────────────────────────────────────
        Commands::Terrain { algorithm } => match algorithm {
            TerrainCommands::Slope {
                input,
                output,
                units,
                method,
                z_factor,
            } => {
                let mut params = config.risk.slope;
                params.units = match units.to_lowercase().as_str() {
                    "degrees" | "deg" | "d" => SlopeUnits::Degrees,
                    "percent" | "pct" | "%" => SlopeUnits::Percent,
                    "radians" | "rad" | "r" => SlopeUnits::Radians,
                    _ => bail!("Unknown units: {}", units),
                };
                params.method = match method.to_lowercase().as_str() {
                    "central" | "central-difference" => SlopeMethod::CentralDifference,
                    "horn" => SlopeMethod::Horn,
                    _ => bail!("Unknown slope method: {}", method),
                };
                params.z_factor = z_factor;

                let dem = read_raster(&input)?;
                let start = Instant::now();
                let result = slope(&dem, &params).context("Failed to calculate slope")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output)?;
                done("Slope", &output, elapsed);
            }

            TerrainCommands::Twi {
                accumulation,
                slope: slope_path,
                output,
            } => {
                let acc: Raster<f64> = read_raster(&accumulation)?;
                let slope_deg = read_raster(&slope_path)?;
                let start = Instant::now();
                let result = twi(&acc, &slope_deg, acc.cell_size()).context("Failed to calculate TWI")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output)?;
                done("TWI", &output, elapsed);
            }
        },

        // ── Flood risk ───────────────────────────────────────────────
        Commands::Risk {
            dem,
            accumulation,
            output,
            depressions,
            evidence,
        } => {
            let dem = read_raster(&dem)?;
            let acc = read_raster(&accumulation)?;
            let depressions = depressions.as_deref().map(read_raster::<u8>).transpose()?;
            let evidence = evidence.as_deref().map(read_evidence).transpose()?;

            let start = Instant::now();
            let risk = composite_flood_risk(
                RiskInputs {
                    dem: &dem,
                    accumulation: &acc,
                    depressions: depressions.as_ref(),
                    evidence: evidence.as_ref(),
                },
                &config.risk,
            )
            .context("Failed to composite flood risk")?;
            let elapsed = start.elapsed();
            for factor in risk.factors.absent() {
                warn!("Factor absent: {}", factor);
            }

            std::fs::create_dir_all(&output).with_context(|| format!("Failed to create {}", output.display()))?;
            write_raster(&risk.slope, &output.join("slope.tif"))?;
            write_raster(&risk.twi, &output.join("twi.tif"))?;
            write_raster(&risk.score, &output.join("risk_score.tif"))?;
            write_raster(&risk.classes, &output.join("risk_class.tif"))?;
            write_vector(&risk.zones_to_features(dem.crs()), &output.join("risk_zones.geojson"))?;
            done("Flood risk", &output, elapsed);
        }

        Commands::Summarize {
            flow_direction: fdir_path,
            accumulation,
            boundaries,
            output,
        } => {
            let fdir: Raster<u8> = read_raster(&fdir_path)?;
            let acc = read_raster(&accumulation)?;
            let boundaries = read_vector(&boundaries)?;

            let start = Instant::now();
            let net = extract_stream_network(&fdir, &acc, &config.streams).context("Failed to extract streams")?;
            let points = config.pour_points.resolve(&fdir, Some(&net));
            let set = delineate_watersheds(&fdir, &points, &config.watersheds)
                .context("Failed to delineate watersheds")?;
            let layers = SummaryLayers {
                streams: Some(&net),
                watersheds: Some(&set),
                risk: None,
            };
            let summaries = summarize_by_boundary(&boundaries, fdir.crs(), &layers)
                .context("Failed to summarize by boundary")?;
            let elapsed = start.elapsed();

            write_report(&summaries, &output)?;
            done("Boundary summary", &output, elapsed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rillmap_algorithms::hydrology::PourPointLocation;
    use rillmap_core::GeoTransform;

    #[test]
    fn test_parse_pour_points() {
        let points = parse_pour_points("3,4; 10,2;").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].location, PourPointLocation::Cell { row: 10, col: 2 });
        assert!(parse_pour_points("3").is_err());
        assert!(parse_pour_points("a,b").is_err());
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(parse_resolve_mode("Fill").unwrap(), ResolveMode::Fill);
        assert_eq!(parse_fallback("leave_sink").unwrap(), FallbackPolicy::LeaveSink);
        assert!(parse_resolve_mode("carve").is_err());
    }

    #[test]
    fn test_run_writes_artifacts() {
        let mut dem = Raster::new(20, 20);
        dem.set_transform(GeoTransform::new(500_000.0, 4_000_200.0, 10.0, -10.0));
        dem.set_crs(Some(rillmap_core::CRS::from_epsg(32643)));
        for row in 0..20 {
            for col in 0..20 {
                let z = 100.0 - row as f64 + (col as f64 - 10.0).abs() * 0.8;
                dem.set(row, col, z).unwrap();
            }
        }
        let out = run_pipeline(&dem, &PipelineInputs::default(), &PipelineConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        write_run_outputs(&out, dir.path()).unwrap();

        for name in [
            "resolved.tif",
            "flow_accumulation.tif",
            "risk_class.tif",
            "streams.geojson",
            "streams_wgs84.geojson",
            "watersheds_wgs84.geojson",
            "risk_zones.geojson",
            "run_report.json",
        ] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
    }
}
