use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use aoi_tiler::{
    AoiSource, BoundingBox, Crs, JobDataFrameOptions, LocalStorage, ProcessingType, StorageAccess,
    Tiler, TilerConfig,
};

#[derive(Parser)]
#[command(name = "aoi-tiler")]
#[command(about = "Cut an area of interest into grid tiles and write a jobs database")]
struct Args {
    /// Vector file with the area of interest
    #[arg(long, conflicts_with = "bbox")]
    aoi: Option<PathBuf>,

    /// Bounding box as west,south,east,north
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<String>,

    /// CRS of the bounding box
    #[arg(long, default_value = "EPSG:4326")]
    bbox_crs: String,

    /// Tiling grid: EU, global, an http(s) URL or a vector file
    #[arg(short, long, default_value = "EU")]
    grid: String,

    /// AOI columns to copy onto each job (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    merge: Vec<String>,

    /// Directory mirroring the managed storage (needed for the global grid)
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Remote storage URL (needed for the global grid, requires `reqwest-client`)
    #[arg(long, conflicts_with = "storage_dir")]
    storage_url: Option<String>,

    /// Bearer token for the remote storage
    #[arg(long, env = "AOI_TILER_STORAGE_TOKEN")]
    storage_token: Option<String>,

    /// Path of the global grid inside the storage
    #[arg(long)]
    global_grid_path: Option<String>,

    /// Output CSV path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the job manager table for this processing year instead of the plain jobs database
    #[arg(long)]
    year: Option<i32>,

    /// Processing chain for the job manager table
    #[arg(long, default_value = "feature_generation")]
    processing_type: String,

    /// Base of the output file names in the job manager table
    #[arg(long, default_value = "AOI")]
    file_name_base: String,

    /// Also write the job table as GeoJSON
    #[arg(long)]
    geojson: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_bbox(text: &str, crs: &str) -> Result<BoundingBox, String> {
    let values = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Invalid bbox '{}': {}", text, e))?;
    let [west, south, east, north] = values[..] else {
        return Err(format!("Bbox '{}' must have four values", text));
    };
    let crs = Crs::parse(crs).map_err(|e| e.to_string())?;
    Ok(BoundingBox::new(west, south, east, north, crs))
}

fn build_storage(args: &Args) -> Result<Option<Box<dyn StorageAccess>>, String> {
    if let Some(dir) = &args.storage_dir {
        let storage: Box<dyn StorageAccess> = Box::new(LocalStorage::new(dir));
        return Ok(Some(storage));
    }

    let Some(url) = &args.storage_url else {
        return Ok(None);
    };

    #[cfg(feature = "reqwest-client")]
    {
        let client = aoi_tiler::http::create_default_client()?;
        let token = args.storage_token.clone().unwrap_or_default();
        let storage: Box<dyn StorageAccess> = Box::new(aoi_tiler::HttpStorage::new(url, token, client));
        Ok(Some(storage))
    }

    #[cfg(not(feature = "reqwest-client"))]
    {
        let _ = &args.storage_token;
        Err(format!(
            "Remote storage {} needs the 'reqwest-client' feature",
            url
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // logs go to stderr so the CSV can be piped
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("🌍 AOI tiler starting...");
    info!("🔲 Grid: {}", args.grid);

    let aoi: AoiSource = match (&args.aoi, &args.bbox) {
        (Some(path), _) => {
            info!("📍 AOI file: {}", path.display());
            path.clone().into()
        }
        (None, Some(text)) => {
            let bbox = parse_bbox(text, &args.bbox_crs)?;
            info!("📍 AOI bbox: {:?}", bbox);
            match bbox.area_km2() {
                Ok(area) => info!("📐 Approximate area: {:.2} km²", area),
                Err(e) => warn!("Could not estimate AOI area: {}", e),
            }
            bbox.into()
        }
        (None, None) => {
            error!("❌ Either --aoi or --bbox is required");
            return Err("Missing area of interest".to_string());
        }
    };

    let mut config = TilerConfig::default().with_timeout(60);
    if let Some(path) = &args.global_grid_path {
        config = config.with_global_grid_path(path);
    }

    let tiler = Tiler::new(config).map_err(|e| e.to_string())?;
    #[cfg(feature = "reqwest-client")]
    let tiler = tiler.with_http_client(aoi_tiler::http::create_default_client()?);

    let storage = build_storage(&args)?;
    let merge_columns = (!args.merge.is_empty()).then_some(args.merge.as_slice());

    let table = match tiler
        .tile(aoi, args.grid.as_str(), merge_columns, storage.as_deref())
        .await
    {
        Ok(table) => {
            info!(
                "✅ {} jobs generated ({} warnings)",
                table.len(),
                table.warnings.len()
            );
            table
        }
        Err(e) => {
            error!("❌ Tiling failed: {}", e);
            return Err(e.to_string());
        }
    };

    if args.verbose {
        for row in &table.rows {
            info!(
                "  - {} ({:.0}, {:.0}, {:.0}, {:.0} in {})",
                row.tile_id,
                row.bbox_dict.west,
                row.bbox_dict.south,
                row.bbox_dict.east,
                row.bbox_dict.north,
                row.bbox_dict.crs
            );
        }
    }

    let writer: Box<dyn std::io::Write> = match &args.output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    match args.year {
        Some(year) => {
            let processing_type: ProcessingType =
                args.processing_type.parse().map_err(|e: aoi_tiler::TilerError| e.to_string())?;
            let frame = table
                .to_job_dataframe(
                    year,
                    &args.file_name_base,
                    processing_type,
                    &JobDataFrameOptions::default(),
                )
                .map_err(|e| e.to_string())?;
            frame.write_csv(writer).map_err(|e| e.to_string())?;
        }
        None => table.write_job_csv(writer).map_err(|e| e.to_string())?,
    }
    if let Some(path) = &args.output {
        info!("💾 Jobs database saved to: {}", path.display());
    }

    if let Some(path) = &args.geojson {
        let collection = table.to_geojson().map_err(|e| e.to_string())?;
        std::fs::write(path, collection.to_string())
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        info!("💾 GeoJSON saved to: {}", path.display());
    }

    Ok(())
}
