//! Point d'entrée CLI pour geoframe

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Repère local ENU ancré sur une origine WGS84
#[derive(Parser)]
#[command(name = "geoframe")]
#[command(author, version)]
#[command(about = "Repère local ENU ancré sur une origine WGS84, avec correction de géoïde")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);
    debug!(reproject = geoframe::is_reproject_available(), "geoframe starting");

    match cli.command {
        Commands::Origin { frame, json } => cli::cmd_origin(&frame, json)?,
        Commands::GeoidHeight {
            lat,
            lon,
            height,
            from,
            geoid,
            geoid_path,
        } => cli::cmd_geoid_height(lat, lon, height, from, geoid, geoid_path)?,
        Commands::ToLocal {
            frame,
            input,
            output,
            jobs,
        } => cli::cmd_to_local(&frame, input.as_deref(), output.as_deref(), jobs)?,
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs sur stderr : stdout reste réservé aux résultats
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
