//! Configuration du client terrain
//!
//! Ordre de priorité : valeurs par défaut < fichier JSON (`--config`) <
//! variables d'environnement `FIELDSYNC_*` (y compris `.env`) < options CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration principale du client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL WFS GetFeature retournant toutes les parcelles en GeoJSON
    pub reference_url: String,

    /// URL WMS pour les requêtes GetFeatureInfo
    pub feature_info_url: String,

    /// Couche interrogée par GetFeatureInfo
    pub feature_info_layer: String,

    /// URL du point d'ingestion des observations
    pub ingest_url: String,

    /// Fichier SQLite local
    pub database_path: PathBuf,

    /// Propriété portant l'identifiant de parcelle
    pub id_property: String,

    /// Tolérance de clic en pixels
    pub hit_tolerance_px: f64,

    /// Délai HTTP explicite (absent = défaut de la pile réseau)
    pub http_timeout_secs: Option<u64>,

    /// Délai de la sonde de connectivité
    pub probe_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reference_url: "http://localhost:8080/geoserver/test/ows?service=WFS&version=1.0.0\
                            &request=GetFeature&typename=test:landuse_master\
                            &outputFormat=application/json"
                .into(),
            feature_info_url: "http://localhost:8080/geoserver/test/wms".into(),
            feature_info_layer: "test:landuse_master".into(),
            ingest_url: "http://localhost:8000/sync".into(),
            database_path: PathBuf::from("fieldsync.db"),
            id_property: parcels::DEFAULT_ID_PROPERTY.into(),
            hit_tolerance_px: parcels::DEFAULT_HIT_TOLERANCE_PX,
            http_timeout_secs: None,
            probe_timeout_ms: 1500,
        }
    }
}

impl ClientConfig {
    /// Charge une configuration depuis un fichier JSON (champs absents = défaut)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Défauts surchargés par les variables `FIELDSYNC_*`
    pub fn from_env() -> Result<Self> {
        Self::resolve(None)
    }

    /// Défauts, puis fichier éventuel, puis variables d'environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applique les variables `FIELDSYNC_*` fournies par `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FIELDSYNC_REFERENCE_URL") {
            self.reference_url = v;
        }
        if let Some(v) = lookup("FIELDSYNC_FEATURE_INFO_URL") {
            self.feature_info_url = v;
        }
        if let Some(v) = lookup("FIELDSYNC_FEATURE_INFO_LAYER") {
            self.feature_info_layer = v;
        }
        if let Some(v) = lookup("FIELDSYNC_INGEST_URL") {
            self.ingest_url = v;
        }
        if let Some(v) = lookup("FIELDSYNC_DB") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FIELDSYNC_ID_PROPERTY") {
            self.id_property = v;
        }
        if let Some(v) = lookup("FIELDSYNC_HIT_TOLERANCE_PX") {
            self.hit_tolerance_px = v
                .parse()
                .context(format!("Invalid FIELDSYNC_HIT_TOLERANCE_PX: {}", v))?;
        }
        if let Some(v) = lookup("FIELDSYNC_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = Some(
                v.parse()
                    .context(format!("Invalid FIELDSYNC_HTTP_TIMEOUT_SECS: {}", v))?,
            );
        }
        if let Some(v) = lookup("FIELDSYNC_PROBE_TIMEOUT_MS") {
            self.probe_timeout_ms = v
                .parse()
                .context(format!("Invalid FIELDSYNC_PROBE_TIMEOUT_MS: {}", v))?;
        }
        Ok(())
    }
}
