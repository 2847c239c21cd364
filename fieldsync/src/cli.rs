//! Définition et implémentation des commandes CLI
//!
//! Côté terrain : `sync-parcels`, `clear-parcels`, `status`, `resolve`,
//! `submit`, `records`, `upload`, `clear-records`.
//! Côté serveur : `serve` (point d'ingestion `POST /sync`).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use fieldsync::ingest::{self, ConflictKey, MemorySink, ObservationSink};
use fieldsync::parcels::projection::resolution_for_zoom;
use fieldsync::parcels::QueryPoint;
use fieldsync::status::{connectivity_badge, parcel_count_badge, records_table};
use fieldsync::{
    AppContext, ClientConfig, LocalStore, ObservationForm, Remotes, Status, UuidGenerator,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Download all reference parcels (WFS) into the offline store
    SyncParcels,

    /// Delete the offline parcel cache
    ClearParcels,

    /// Show connectivity, cached parcels and pending records
    Status,

    /// Resolve a map point to a parcel id (offline layer first)
    Resolve {
        #[command(flatten)]
        point: PointArgs,
    },

    /// Validate and save an observation offline
    Submit {
        /// Parcel id (landuse_id); resolved from the point when absent
        #[arg(long)]
        parcel: Option<String>,

        #[command(flatten)]
        point: PointArgs,

        /// Crop / variety
        #[arg(long, default_value = "")]
        crop: String,

        /// Season (e.g. Maha, Yala)
        #[arg(long, default_value = "")]
        season: String,

        /// Area in hectares
        #[arg(long, default_value = "", allow_negative_numbers = true)]
        area_ha: String,

        /// Expected yield
        #[arg(long, default_value = "", allow_negative_numbers = true)]
        expected_yield: String,
    },

    /// List local observations and their sync state
    Records {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Upload unsynced observations to the ingestion endpoint
    Upload,

    /// Delete all local observations
    ClearRecords {
        /// Confirm deletion (unsynced records are lost)
        #[arg(long)]
        yes: bool,
    },

    /// Run the ingestion server (POST /sync)
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8000")]
        listen: SocketAddr,

        /// Keep received observations in memory instead of PostgreSQL
        #[arg(long)]
        memory: bool,

        /// Deduplication key: local-id (temp_id) or business (all fields)
        #[arg(long, default_value = "local-id")]
        conflict_key: ConflictKey,

        /// Target PostgreSQL schema
        #[arg(long, default_value = "landuse")]
        schema: String,

        /// Target table
        #[arg(long, default_value = "paddy")]
        table: String,

        #[command(flatten)]
        database: DatabaseArgs,
    },
}

/// Point cliqué : lon/lat WGS84 ou x/y Web Mercator
#[derive(Args, Debug, Clone, Default)]
pub struct PointArgs {
    /// Longitude (WGS84 degrees)
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Latitude (WGS84 degrees)
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// X (EPSG:3857 metres)
    #[arg(long, allow_negative_numbers = true)]
    pub x: Option<f64>,

    /// Y (EPSG:3857 metres)
    #[arg(long, allow_negative_numbers = true)]
    pub y: Option<f64>,

    /// Map zoom level, gives the resolution used for the click tolerance
    #[arg(long, default_value_t = 18.0)]
    pub zoom: f64,
}

impl PointArgs {
    pub fn query_point(&self) -> Result<Option<QueryPoint>> {
        match (self.lon, self.lat, self.x, self.y) {
            (None, None, None, None) => Ok(None),
            (Some(lon), Some(lat), None, None) => {
                Ok(Some(QueryPoint::from_lon_lat(lon, lat, self.zoom)))
            }
            (None, None, Some(x), Some(y)) => {
                Ok(Some(QueryPoint::new(x, y, resolution_for_zoom(self.zoom))))
            }
            _ => bail!("Give either --lon and --lat, or --x and --y"),
        }
    }
}

/// Connexion PostgreSQL du serveur d'ingestion
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / test_db)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

/// Contexte du terminal : base SQLite, clients HTTP, identifiants UUID
pub fn open_context(config: &ClientConfig, offline: bool) -> Result<AppContext> {
    let store = LocalStore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open local store {}",
            config.database_path.display()
        )
    })?;
    let remotes = Remotes::http(config, offline).context("Failed to set up HTTP client")?;
    let ctx = AppContext::new(store, remotes, Box::new(UuidGenerator), config)
        .context("Failed to load offline parcels")?;
    Ok(ctx)
}

/// Affiche le statut et le retourne à l'appelant
fn report(status: Status) -> Option<Status> {
    println!("{}", status);
    Some(status)
}

fn print_parcel_count(ctx: &AppContext) {
    match ctx.parcel_count() {
        Ok(n) => println!("{}", parcel_count_badge(n)),
        Err(e) => println!("Parcels: unknown ({})", e),
    }
}

pub async fn cmd_sync_parcels(ctx: &mut AppContext) -> Option<Status> {
    println!("Fetching WFS...");
    let status = report(Status::from_reference_sync(&ctx.sync_reference_data().await));
    print_parcel_count(ctx);
    status
}

pub fn cmd_clear_parcels(ctx: &mut AppContext) -> Option<Status> {
    let status = match ctx.clear_parcels() {
        Ok(n) => Status::ParcelsCleared(n),
        Err(e) => Status::ClearFailed(e.to_string()),
    };
    let status = report(status);
    print_parcel_count(ctx);
    status
}

/// Vue d'ensemble ; pas d'action, donc pas de statut
pub async fn cmd_status(ctx: &AppContext) -> Option<Status> {
    println!("{}", connectivity_badge(ctx.is_online().await));
    print_parcel_count(ctx);

    match ctx.records() {
        Ok(records) => {
            let pending = records.iter().filter(|o| !o.synced).count();
            println!("Records: {} ({} pending upload)", records.len(), pending);
        }
        Err(e) => println!("Records: unknown ({})", e),
    }

    if ctx.layer().is_empty() {
        println!("{}", Status::NoOfflineParcels);
    }
    None
}

pub async fn cmd_resolve(ctx: &mut AppContext, point: &PointArgs) -> Result<Option<Status>> {
    let Some(point) = point.query_point()? else {
        bail!("resolve needs a point: --lon/--lat or --x/--y");
    };

    if ctx.layer().is_empty() {
        println!("{}", Status::NoOfflineParcels);
    }
    let result = ctx.resolve_at(&point).await;
    Ok(report(Status::from_resolution(&result)))
}

pub async fn cmd_submit(
    ctx: &mut AppContext,
    parcel: Option<String>,
    point: &PointArgs,
    form: ObservationForm,
) -> Result<Option<Status>> {
    let parcel_ref = match (parcel, point.query_point()?) {
        (Some(parcel), _) => parcel,
        (None, Some(point)) => {
            let resolution = ctx.resolve_at(&point).await;
            let status = Status::from_resolution(&resolution);
            if status.is_failure() {
                return Ok(report(status));
            }
            println!("{}", status);
            // Pas de parcelle : la validation signale le champ manquant
            resolution.ok().flatten().map(|r| r.id).unwrap_or_default()
        }
        (None, None) => String::new(),
    };

    let mut form = ObservationForm { parcel_ref, ..form };
    Ok(report(Status::from_submission(&ctx.submit(&mut form))))
}

pub fn cmd_records(ctx: &AppContext, json: bool) -> Result<Option<Status>> {
    let records = match ctx.records() {
        Ok(records) => records,
        Err(e) => return Ok(report(Status::ReadFailed(e.to_string()))),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        println!("{}", records_table(&records));
    }
    Ok(None)
}

pub async fn cmd_upload(ctx: &AppContext) -> Option<Status> {
    if let Ok(pending) = ctx.records().map(|r| r.iter().filter(|o| !o.synced).count()) {
        if pending > 0 {
            println!("Syncing {} record(s)...", pending);
        }
    }
    report(Status::from_upload(&ctx.upload_unsynced().await))
}

pub fn cmd_clear_records(ctx: &AppContext, yes: bool) -> Result<Option<Status>> {
    if !yes {
        bail!("clear-records deletes every local observation, synced or not; pass --yes to confirm");
    }
    let status = match ctx.clear_records() {
        Ok(n) => Status::RecordsCleared(n),
        Err(e) => Status::ClearFailed(e.to_string()),
    };
    Ok(report(status))
}

pub async fn cmd_serve(
    listen: SocketAddr,
    memory: bool,
    conflict_key: ConflictKey,
    schema: &str,
    table: &str,
    database: DatabaseArgs,
) -> Result<()> {
    let sink: Arc<dyn ObservationSink> = if memory {
        info!(conflict_key = ?conflict_key, "Using in-memory sink");
        Arc::new(MemorySink::new(conflict_key))
    } else {
        postgres_sink(conflict_key, schema, table, database).await?
    };

    ingest::serve(listen, sink).await
}

#[cfg(feature = "postgres")]
async fn postgres_sink(
    conflict_key: ConflictKey,
    schema: &str,
    table: &str,
    database: DatabaseArgs,
) -> Result<Arc<dyn ObservationSink>> {
    use fieldsync::ingest::pool::{create_pool, test_connection, DatabaseConfig};
    use fieldsync::ingest::postgres::{PgSink, TableName};

    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, database)?;
    println!(
        "Database: {}@{}:{}/{} (SSL: {})",
        db_config.user, db_config.host, db_config.port, db_config.dbname, db_config.ssl_mode
    );

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;
    println!("Connected to PostgreSQL");

    let sink = PgSink::new(pool, TableName::new(schema, table)?, conflict_key);
    sink.ensure_schema().await?;
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_sink(
    _conflict_key: ConflictKey,
    _schema: &str,
    _table: &str,
    _database: DatabaseArgs,
) -> Result<Arc<dyn ObservationSink>> {
    bail!("Built without PostgreSQL support; use --memory")
}

#[cfg(feature = "postgres")]
fn apply_database_overrides(
    config: &mut fieldsync::ingest::pool::DatabaseConfig,
    args: DatabaseArgs,
) -> Result<()> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(database) = args.database {
        config.dbname = database;
    }
    if let Some(user) = args.user {
        config.user = user;
    }
    if let Some(password) = args.password {
        config.password = Some(password);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = args.ssl {
        config.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
    }
    Ok(())
}
