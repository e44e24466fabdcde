//! Définition et implémentation des commandes CLI
//!
//! - `origin` : initialise le repère et affiche l'origine et la matrice
//! - `geoid-height` : ondulation et conversion de hauteur en un point
//! - `to-local` : convertit un fichier de points vers le repère ENU

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand, ValueEnum};
use geoframe::config::parse_triplet;
use geoframe::{Context, FrameConfig, FrameState};
use glam::DVec3;
use rayon::prelude::*;
use tracing::{info, warn};

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the reference frame and print its origin
    Origin {
        #[command(flatten)]
        frame: FrameArgs,

        /// Print the frame state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Geoid undulation and height conversion at a point
    GeoidHeight {
        /// Latitude (degrees)
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude (degrees)
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Height to convert (meters)
        #[arg(long, allow_hyphen_values = true)]
        height: Option<f64>,

        /// Reference of --height
        #[arg(long, value_enum, default_value_t = HeightReference::Orthometric)]
        from: HeightReference,

        /// Geoid model: egm84, egm96, egm2008 (défaut : env GEOFRAME_GEOID_MODEL / egm96)
        #[arg(long)]
        geoid: Option<String>,

        /// Geoid grid directory (défaut : env GEOGRAPHICLIB_GEOID_PATH)
        #[arg(long)]
        geoid_path: Option<PathBuf>,
    },

    /// Convert source CRS points to local ENU coordinates
    ToLocal {
        #[command(flatten)]
        frame: FrameArgs,

        /// Input file, one "x y [z]" point per line (défaut : stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (défaut : stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of worker threads
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,
    },
}

/// Référence d'une hauteur en entrée
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HeightReference {
    Orthometric,
    Ellipsoidal,
}

/// Arguments communs de construction du repère
#[derive(Args, Debug, Default)]
pub struct FrameArgs {
    /// Path to a JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Source CRS EPSG code
    #[arg(long)]
    pub epsg: Option<u32>,

    /// Source CRS WKT (used when no EPSG is given)
    #[arg(long)]
    pub wkt: Option<String>,

    /// Origin "x,y,z" in the source CRS
    #[arg(long, allow_hyphen_values = true)]
    pub origin: Option<String>,

    /// The origin is already geographic "lon,lat,h" (no geoid correction)
    #[arg(long)]
    pub geographic: bool,

    /// Geoid model: none, egm84, egm96, egm2008
    #[arg(long)]
    pub geoid: Option<String>,

    /// Geoid grid directory
    #[arg(long)]
    pub geoid_path: Option<PathBuf>,
}

impl FrameArgs {
    /// Fichier de config, puis environnement, puis arguments CLI
    pub fn resolve(&self) -> Result<FrameConfig> {
        let mut config = match &self.config {
            Some(path) => FrameConfig::load(path)?,
            None => FrameConfig::default(),
        };
        config.apply_env()?;

        if let Some(epsg) = self.epsg {
            config.source_epsg = Some(epsg);
        }
        if let Some(wkt) = &self.wkt {
            config.source_wkt = Some(wkt.clone());
        }
        if let Some(origin) = &self.origin {
            config.origin = Some(parse_triplet(origin)?);
        }
        if self.geographic {
            config.geographic_origin = true;
        }
        if let Some(geoid) = &self.geoid {
            config.geoid = Some(geoid.clone());
        }
        if let Some(path) = &self.geoid_path {
            config.geoid_path = Some(path.clone());
        }
        Ok(config)
    }
}

/// Construit le contexte et initialise le repère
fn build_context(args: &FrameArgs) -> Result<(Context, Arc<FrameState>)> {
    let config = args.resolve()?;
    let context = Context::new();
    let state = context
        .apply_config(&config)?
        .context("No origin given (use --origin, GEOFRAME_ORIGIN or a config file)")?;
    Ok((context, state))
}

/// Exécute la commande origin
pub fn cmd_origin(args: &FrameArgs, json: bool) -> Result<()> {
    let (context, state) = build_context(args)?;

    if json {
        let g = state.geographic_origin;
        let value = serde_json::json!({
            "mode": format!("{:?}", state.mode),
            "source_crs": state.source_crs,
            "raw_origin": state.raw_origin.to_array(),
            "geographic_origin": { "lon": g.lon, "lat": g.lat, "height": g.height },
            "undulation": state.height_correction.undulation(),
            "geoid_model": context.heights.model().as_str(),
            "ecef_to_enu": state.ecef_to_enu.to_cols_array(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let g = state.geographic_origin;
    println!("=== Reference frame ===");
    println!("Mode: {:?}", state.mode);
    match &state.source_crs {
        Some(source) => println!("Source CRS: {}", source),
        None => println!("Source CRS: geographic"),
    }
    println!(
        "Raw origin: {:.3} {:.3} {:.3}",
        state.raw_origin.x, state.raw_origin.y, state.raw_origin.z
    );
    println!("Geographic origin: lon={:.10} lat={:.10} h={:.3}", g.lon, g.lat, g.height);
    match state.height_correction.undulation() {
        Some(n) => println!("Geoid ({}): N={:.3} m", context.heights.model(), n),
        None => println!("Geoid: no correction"),
    }
    println!("ECEF -> ENU:");
    let m = state.ecef_to_enu;
    for row in 0..4 {
        let r = m.row(row);
        println!("  [{:>16.6} {:>16.6} {:>16.6} {:>18.3}]", r.x, r.y, r.z, r.w);
    }
    Ok(())
}

/// Exécute la commande geoid-height
pub fn cmd_geoid_height(
    lat: f64,
    lon: f64,
    height: Option<f64>,
    from: HeightReference,
    geoid: Option<String>,
    geoid_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = FrameConfig::from_env()?;
    if geoid.is_some() {
        config.geoid = geoid;
    }
    if geoid_path.is_some() {
        config.geoid_path = geoid_path;
    }
    let model = height_model(&config)?;

    let context = Context::new();
    context.init_geoid(model, config.geoid_path.as_deref())?;

    let n = context
        .heights
        .geoid_height(lat, lon)
        .with_context(|| format!("No geoid height at lat={} lon={}", lat, lon))?;
    println!("Geoid ({}): N={:.4} m at lat={} lon={}", model, n, lat, lon);

    if let Some(h) = height {
        let converted = match from {
            HeightReference::Orthometric => {
                context.heights.orthometric_to_ellipsoidal(lat, lon, h)
            }
            HeightReference::Ellipsoidal => {
                context.heights.ellipsoidal_to_orthometric(lat, lon, h)
            }
        };
        let target = match from {
            HeightReference::Orthometric => "ellipsoidal",
            HeightReference::Ellipsoidal => "orthometric",
        };
        println!("{} height: {:.4} m", target, converted.value());
    }
    Ok(())
}

/// Modèle pour geoid-height : EGM96 si rien n'est demandé, jamais `none`
fn height_model(config: &FrameConfig) -> Result<geoid::GeoidModel> {
    let Some(name) = config.geoid.as_deref() else {
        return Ok(geoid::GeoidModel::Egm96);
    };
    match geoid::GeoidModel::from_name(name) {
        geoid::GeoidModel::None => {
            bail!("geoid-height needs a geoid model (egm84, egm96, egm2008), got '{}'", name)
        }
        model => Ok(model),
    }
}

/// Exécute la commande to-local
pub fn cmd_to_local(
    args: &FrameArgs,
    input: Option<&Path>,
    output: Option<&Path>,
    jobs: Option<usize>,
) -> Result<()> {
    let (context, state) = build_context(args)?;
    let context = Arc::new(context);

    let points = read_points(input)?;
    info!(points = points.len(), "Points loaded");

    let jobs = jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });

    // Chaque worker libère sa transformation en se terminant
    let exit_context = context.clone();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("geoframe-worker-{}", i))
        .exit_handler(move |_| exit_context.frame.release_thread_transform())
        .build()
        .context("Failed to build worker pool")?;

    let results: Vec<Option<DVec3>> = pool.install(|| {
        points
            .par_iter()
            .map(|p| context.frame.source_to_local(*p))
            .collect()
    });
    drop(pool);

    let failed = results.iter().filter(|r| r.is_none()).count();
    if failed > 0 {
        warn!(failed, "Some points could not be converted");
    }
    if failed == results.len() && !results.is_empty() {
        bail!("No point could be converted (mode {:?})", state.mode);
    }

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path)
                .context(format!("Failed to create output file: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    for result in &results {
        match result {
            Some(p) => writeln!(out, "{:.4} {:.4} {:.4}", p.x, p.y, p.z)?,
            None => writeln!(out, "NaN NaN NaN")?,
        }
    }
    out.flush()?;

    info!(converted = results.len() - failed, failed, "Conversion done");
    Ok(())
}

/// Lit les points « x y [z] » (lignes vides et `#` ignorées)
fn read_points(input: Option<&Path>) -> Result<Vec<DVec3>> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path)
                .context(format!("Failed to open input file: {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin().lock())),
    };

    let mut points = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let xyz = parse_triplet(line).with_context(|| format!("Line {}", n + 1))?;
        points.push(DVec3::from_array(xyz));
    }
    Ok(points)
}
