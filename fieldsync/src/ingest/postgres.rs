//! Destination PostgreSQL : `INSERT ... ON CONFLICT DO NOTHING`

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tracing::{debug, info};

use super::{ConflictKey, ObservationSink};
use crate::observations::Observation;

/// Table cible des observations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: String,
    pub table: String,
}

impl Default for TableName {
    fn default() -> Self {
        Self {
            schema: "landuse".into(),
            table: "paddy".into(),
        }
    }
}

impl TableName {
    /// Valide les identifiants (interpolés dans le SQL, jamais échappés)
    pub fn new(schema: &str, table: &str) -> Result<Self> {
        for ident in [schema, table] {
            if !is_identifier(ident) {
                bail!("Invalid SQL identifier: {:?}", ident);
            }
        }
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Observations reçues insérées dans PostgreSQL
pub struct PgSink {
    pool: Pool,
    table: TableName,
    conflict_key: ConflictKey,
}

impl PgSink {
    pub fn new(pool: Pool, table: TableName, conflict_key: ConflictKey) -> Self {
        Self {
            pool,
            table,
            conflict_key,
        }
    }

    /// Crée le schéma, la table et l'index d'unicité de la clé de conflit
    ///
    /// Une table existante sans `temp_id` reçoit la colonne avant la
    /// création de l'index ; ses lignes et colonnes sont conservées.
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;
        let qualified = self.table.qualified();

        client
            .batch_execute(&create_table_sql(&self.table, self.conflict_key))
            .await
            .with_context(|| format!("Failed to create table {}", qualified))?;

        info!(table = %qualified, conflict_key = ?self.conflict_key, "Ingestion table ready");
        Ok(())
    }
}

fn create_table_sql(table: &TableName, conflict_key: ConflictKey) -> String {
    let qualified = table.qualified();
    let unique_columns = match conflict_key {
        ConflictKey::LocalId => "temp_id",
        ConflictKey::BusinessFields => "landuse_id, variety, season, area_ha, expected_yield",
    };
    let index_suffix = match conflict_key {
        ConflictKey::LocalId => "temp_id",
        ConflictKey::BusinessFields => "business",
    };

    format!(
        r#"
        CREATE SCHEMA IF NOT EXISTS {schema};
        CREATE TABLE IF NOT EXISTS {qualified} (
            id BIGSERIAL PRIMARY KEY,
            landuse_id TEXT NOT NULL,
            variety TEXT NOT NULL,
            season TEXT NOT NULL,
            area_ha DOUBLE PRECISION NOT NULL,
            expected_yield DOUBLE PRECISION NOT NULL,
            temp_id TEXT,
            received_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        ALTER TABLE {qualified} ADD COLUMN IF NOT EXISTS temp_id TEXT;
        CREATE UNIQUE INDEX IF NOT EXISTS {table}_{index_suffix}_key
            ON {qualified} ({unique_columns});
        "#,
        schema = table.schema,
        table = table.table,
    )
}

fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} (landuse_id, variety, season, area_ha, expected_yield, temp_id) \
         VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING",
        table.qualified()
    )
}

#[async_trait]
impl ObservationSink for PgSink {
    async fn insert_or_ignore(&self, record: &Observation) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("DB connection failed")?;

        let rows = client
            .execute(
                &insert_sql(&self.table),
                &[
                    &record.parcel_ref,
                    &record.crop,
                    &record.season,
                    &record.area_ha,
                    &record.expected_yield,
                    &record.local_id,
                ],
            )
            .await
            .with_context(|| format!("Insert into {} failed", self.table.qualified()))?;

        debug!(temp_id = %record.local_id, inserted = rows == 1, "Observation received");
        Ok(rows == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(TableName::new("landuse", "paddy").is_ok());
        assert!(TableName::new("survey_2024", "_obs").is_ok());
        assert!(TableName::new("landuse", "paddy; DROP TABLE x").is_err());
        assert!(TableName::new("Landuse", "paddy").is_err());
        assert!(TableName::new("", "paddy").is_err());
        assert!(TableName::new("1abc", "paddy").is_err());
    }

    #[test]
    fn test_insert_sql() {
        let sql = insert_sql(&TableName::default());
        assert!(sql.starts_with("INSERT INTO landuse.paddy (landuse_id, variety"));
        assert!(sql.ends_with("ON CONFLICT DO NOTHING"));
    }

    #[test]
    fn test_create_table_sql_conflict_key() {
        let sql = create_table_sql(&TableName::default(), ConflictKey::LocalId);
        assert!(sql.contains("paddy_temp_id_key"));
        assert!(sql.contains("ON landuse.paddy (temp_id)"));

        // Colonne ajoutée aux tables existantes avant l'index
        let alter = sql
            .find("ALTER TABLE landuse.paddy ADD COLUMN IF NOT EXISTS temp_id TEXT;")
            .unwrap();
        let index = sql.find("CREATE UNIQUE INDEX").unwrap();
        assert!(alter < index);

        let sql = create_table_sql(&TableName::default(), ConflictKey::BusinessFields);
        assert!(sql.contains(
            "ON landuse.paddy (landuse_id, variety, season, area_ha, expected_yield)"
        ));
    }
}
