//! Collaborateurs distants : service de référence, GetFeatureInfo, ingestion
//!
//! Chaque capacité est un trait, pour que le coeur puisse être exercé sans
//! réseau. Les implémentations HTTP sont dans [`http`].

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use parcels::QueryPoint;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::FieldSyncError;
use crate::observations::Observation;

pub use http::HttpRemote;

/// Source du jeu de référence complet (WFS GetFeature)
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Retourne le corps brut de la FeatureCollection
    async fn fetch_reference(&self) -> Result<String, FieldSyncError>;
}

/// Requête d'information au point (WMS GetFeatureInfo)
#[async_trait]
pub trait FeatureInfoSource: Send + Sync {
    /// Retourne l'identifiant de la première feature au point, s'il y en a une
    async fn feature_info(&self, point: &QueryPoint) -> Result<Option<String>, FieldSyncError>;
}

/// Point d'ingestion des observations
#[async_trait]
pub trait IngestionEndpoint: Send + Sync {
    /// Envoie le lot complet en une seule requête
    async fn submit(&self, records: &[Observation]) -> Result<IngestReply, FieldSyncError>;
}

/// État de la connectivité réseau du terminal
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Corps de la requête d'ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub records: Vec<Observation>,
}

/// Réponse du point d'ingestion : `{status:"ok"}` ou `{status:"error", message}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IngestReply {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }

    /// Seul un `ok` explicite vaut acquittement
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Connectivité fixée (mode `--offline`, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedConnectivity(pub bool);

#[async_trait]
impl Connectivity for FixedConnectivity {
    async fn is_online(&self) -> bool {
        self.0
    }
}

/// Sonde TCP vers le serveur cartographique
///
/// Équivalent de l'indicateur en ligne / hors ligne du navigateur : le
/// terminal est considéré en ligne si l'hôte accepte une connexion.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Construit la sonde depuis l'URL d'un service (hôte + port)
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = reqwest::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port_or_known_default()?;
        Some(Self::new(format!("{}:{}", host, port), timeout))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        let online = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await,
            Ok(Ok(_))
        );
        debug!(address = %self.address, online, "Connectivity probe");
        online
    }
}
