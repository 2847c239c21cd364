//! Stockage local embarqué (SQLite)
//!
//! Deux tables indépendantes :
//! - `parcels` : cache des parcelles de référence, remplacé en bloc
//! - `observations` : file des saisies terrain, avec le drapeau `synced`
//!
//! Pas de langage de requête au-delà de la clé et du parcours complet ;
//! les filtres (ex: non synchronisées) sont faits par l'appelant.

mod migrations;

use std::path::Path;
use std::time::Duration;

use parcels::Parcel;
use rusqlite::types::Value;
use rusqlite::{params, Connection, DatabaseName, ErrorCode, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info};

use crate::observations::Observation;

pub use migrations::CURRENT_SCHEMA_VERSION;

/// Erreurs du stockage local
#[derive(Debug, Error)]
pub enum StoreError {
    /// Clé primaire déjà présente
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Erreur SQLite
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Enregistrement illisible (JSON stocké invalide)
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Mise à jour d'un champ d'une observation
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    ParcelRef(String),
    Crop(String),
    Season(String),
    AreaHa(f64),
    ExpectedYield(f64),
    Synced(bool),
}

impl FieldUpdate {
    fn column_and_value(self) -> (&'static str, Value) {
        match self {
            FieldUpdate::ParcelRef(v) => ("parcel_ref", Value::Text(v)),
            FieldUpdate::Crop(v) => ("crop", Value::Text(v)),
            FieldUpdate::Season(v) => ("season", Value::Text(v)),
            FieldUpdate::AreaHa(v) => ("area_ha", Value::Real(v)),
            FieldUpdate::ExpectedYield(v) => ("expected_yield", Value::Real(v)),
            FieldUpdate::Synced(v) => ("synced", Value::Integer(i64::from(v))),
        }
    }
}

/// Base locale du terminal de saisie
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Ouvre (ou crée) la base sur disque
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
        conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        info!(path = %path.display(), "Opened local store");
        Self::from_connection(conn)
    }

    /// Base volatile, pour les tests et les essais
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        migrations::apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        Ok(migrations::schema_version(&self.conn)?)
    }

    // --- Parcelles ---

    /// Remplace tout le contenu de `parcels`
    ///
    /// Vidage et insertion dans une seule transaction : un échec (ou un
    /// arrêt brutal) entre les deux étapes laisse l'ancien snapshot intact.
    pub fn put_all(&self, parcels: &[Parcel]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM parcels", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO parcels (id, attributes, geometry) VALUES (?1, ?2, ?3)",
            )?;
            for parcel in parcels {
                let attributes = encode_json(&parcel.id, &parcel.attributes)?;
                let geometry = encode_json(&parcel.id, &parcel.shape)?;
                stmt.execute(params![parcel.id, attributes, geometry])?;
            }
        }

        tx.commit()?;
        let count = self.parcel_count()?;
        debug!(removed, stored = count, "Parcel table replaced");
        Ok(count)
    }

    /// Toutes les parcelles, dans l'ordre d'insertion
    pub fn parcels(&self) -> Result<Vec<Parcel>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, attributes, geometry FROM parcels ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<(String, String, String)>, _>>()?;

        rows.into_iter()
            .map(|(id, attributes, geometry)| decode_parcel(id, &attributes, &geometry))
            .collect()
    }

    pub fn parcel(&self, id: &str) -> Result<Option<Parcel>, StoreError> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, attributes, geometry FROM parcels WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(id, attributes, geometry)| decode_parcel(id, &attributes, &geometry))
            .transpose()
    }

    pub fn parcel_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM parcels", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear_parcels(&self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM parcels", [])?)
    }

    // --- Observations ---

    /// Ajoute une observation ; échoue si `local_id` existe déjà
    pub fn add(&self, observation: &Observation) -> Result<(), StoreError> {
        let result = self.conn.execute(
            "INSERT INTO observations
                (local_id, parcel_ref, crop, season, area_ha, expected_yield, synced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                observation.local_id,
                observation.parcel_ref,
                observation.crop,
                observation.season,
                observation.area_ha,
                observation.expected_yield,
                observation.synced,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateKey(observation.local_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Toutes les observations, dans l'ordre de saisie
    pub fn observations(&self) -> Result<Vec<Observation>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, parcel_ref, crop, season, area_ha, expected_yield, synced
             FROM observations ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], row_to_observation)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn observation(&self, local_id: &str) -> Result<Option<Observation>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT local_id, parcel_ref, crop, season, area_ha, expected_yield, synced
                 FROM observations WHERE local_id = ?1",
                params![local_id],
                row_to_observation,
            )
            .optional()?)
    }

    /// Met à jour un champ ; retourne `false` si l'observation n'existe pas
    pub fn update_field(&self, local_id: &str, update: FieldUpdate) -> Result<bool, StoreError> {
        let (column, value) = update.column_and_value();
        let sql = format!("UPDATE observations SET {} = ?1 WHERE local_id = ?2", column);
        let changed = self.conn.execute(&sql, params![value, local_id])?;
        Ok(changed > 0)
    }

    pub fn clear_observations(&self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM observations", [])?)
    }
}

fn row_to_observation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        local_id: row.get(0)?,
        parcel_ref: row.get(1)?,
        crop: row.get(2)?,
        season: row.get(3)?,
        area_ha: row.get(4)?,
        expected_yield: row.get(5)?,
        synced: row.get(6)?,
    })
}

fn encode_json<T: serde::Serialize>(id: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn decode_parcel(id: String, attributes: &str, geometry: &str) -> Result<Parcel, StoreError> {
    let corrupt = |e: serde_json::Error| StoreError::Corrupt {
        id: id.clone(),
        reason: e.to_string(),
    };
    let attributes = serde_json::from_str(attributes).map_err(corrupt)?;
    let shape = serde_json::from_str(geometry).map_err(corrupt)?;
    Ok(Parcel {
        id,
        attributes,
        shape,
    })
}
