//! Migrations du schéma local
//!
//! La version 1 ne contenait que la file d'observations ; la version 2
//! ajoute le cache des parcelles de référence. Une base créée en v1 est
//! mise à niveau sans perte d'observations.

use rusqlite::{params, Connection, OptionalExtension, Result};
use tracing::info;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "observation_queue",
        sql: r#"
CREATE TABLE IF NOT EXISTS observations (
    local_id TEXT PRIMARY KEY,
    parcel_ref TEXT NOT NULL,
    crop TEXT NOT NULL,
    season TEXT NOT NULL,
    area_ha REAL NOT NULL,
    expected_yield REAL NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0
);
"#,
    },
    Migration {
        version: 2,
        name: "parcel_cache",
        sql: r#"
CREATE TABLE IF NOT EXISTS parcels (
    id TEXT PRIMARY KEY,
    attributes TEXT NOT NULL,
    geometry TEXT NOT NULL
);
"#,
    },
];

pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        info!(version = migration.version, name = migration.name, "Applied local schema migration");
    }

    tx.commit()
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
}

/// Applique uniquement les migrations jusqu'à `version` incluse
#[cfg(test)]
pub fn apply_up_to(conn: &mut Connection, version: i64) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    for migration in MIGRATIONS.iter().filter(|m| m.version <= version) {
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
    }
    tx.commit()
}
