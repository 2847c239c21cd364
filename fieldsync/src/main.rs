//! Point d'entrée CLI pour fieldsync

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use fieldsync::{ClientConfig, ObservationForm};

// Charger .env au démarrage
fn load_env() {
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

/// Saisie terrain hors ligne des parcelles et envoi des observations
#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(author, version)]
#[command(about = "Offline-first parcel survey: cache reference parcels, resolve clicks, queue and upload observations")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier de configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base SQLite locale (défaut : env FIELDSYNC_DB / fieldsync.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Considérer le terminal hors ligne (aucune requête GetFeatureInfo)
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    if let Commands::Serve {
        listen,
        memory,
        conflict_key,
        schema,
        table,
        database,
    } = cli.command
    {
        cli::cmd_serve(listen, memory, conflict_key, &schema, &table, database).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match cli.config.as_deref() {
        Some(path) => ClientConfig::resolve(Some(path))?,
        None => ClientConfig::from_env()?,
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    debug!(?config, "Client configuration");

    let mut ctx = cli::open_context(&config, cli.offline)?;

    let status = match cli.command {
        Commands::SyncParcels => cli::cmd_sync_parcels(&mut ctx).await,
        Commands::ClearParcels => cli::cmd_clear_parcels(&mut ctx),
        Commands::Status => cli::cmd_status(&ctx).await,
        Commands::Resolve { point } => cli::cmd_resolve(&mut ctx, &point).await?,
        Commands::Submit {
            parcel,
            point,
            crop,
            season,
            area_ha,
            expected_yield,
        } => {
            let form = ObservationForm {
                parcel_ref: String::new(),
                crop,
                season,
                area_ha,
                expected_yield,
            };
            cli::cmd_submit(&mut ctx, parcel, &point, form).await?
        }
        Commands::Records { json } => cli::cmd_records(&ctx, json)?,
        Commands::Upload => cli::cmd_upload(&ctx).await,
        Commands::ClearRecords { yes } => cli::cmd_clear_records(&ctx, yes)?,
        Commands::Serve { .. } => None,
    };

    match status {
        Some(status) if status.is_failure() => Ok(ExitCode::FAILURE),
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
