//! Implémentations HTTP des collaborateurs distants (GeoServer + ingestion)

use std::time::Duration;

use async_trait::async_trait;
use parcels::projection::{feature_info_bbox, feature_info_pixel, FEATURE_INFO_SIZE};
use parcels::QueryPoint;
use serde::Serialize;
use tracing::{debug, info};

use super::{FeatureInfoSource, IngestReply, IngestionEndpoint, ReferenceSource};
use crate::config::ClientConfig;
use crate::error::FieldSyncError;
use crate::observations::Observation;

#[derive(Serialize)]
struct IngestBody<'a> {
    records: &'a [Observation],
}

/// Client HTTP vers le serveur cartographique et le point d'ingestion
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    reference_url: String,
    feature_info_url: String,
    feature_info_layer: String,
    ingest_url: String,
    id_property: String,
}

impl HttpRemote {
    /// Crée le client ; sans `http_timeout_secs`, les délais par défaut de la pile réseau s'appliquent
    pub fn new(config: &ClientConfig) -> Result<Self, FieldSyncError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.http_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FieldSyncError::transport(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            reference_url: config.reference_url.clone(),
            feature_info_url: config.feature_info_url.clone(),
            feature_info_layer: config.feature_info_layer.clone(),
            ingest_url: config.ingest_url.clone(),
            id_property: config.id_property.clone(),
        })
    }

    /// Paramètres WMS 1.3.0 GetFeatureInfo pour le point cliqué
    fn feature_info_params(&self, point: &QueryPoint) -> Vec<(&'static str, String)> {
        let [minx, miny, maxx, maxy] = feature_info_bbox(point);
        let (i, j) = feature_info_pixel();
        let size = FEATURE_INFO_SIZE.to_string();

        vec![
            ("SERVICE", "WMS".to_string()),
            ("VERSION", "1.3.0".to_string()),
            ("REQUEST", "GetFeatureInfo".to_string()),
            ("FORMAT", "image/png".to_string()),
            ("TRANSPARENT", "true".to_string()),
            ("QUERY_LAYERS", self.feature_info_layer.clone()),
            ("LAYERS", self.feature_info_layer.clone()),
            ("STYLES", String::new()),
            ("INFO_FORMAT", "application/json".to_string()),
            ("I", i.to_string()),
            ("J", j.to_string()),
            ("WIDTH", size.clone()),
            ("HEIGHT", size),
            ("CRS", "EPSG:3857".to_string()),
            ("BBOX", format!("{},{},{},{}", minx, miny, maxx, maxy)),
        ]
    }
}

/// Lit le corps de la réponse ; un statut non-succès est une erreur de transport
async fn read_body(response: reqwest::Response) -> Result<String, FieldSyncError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(FieldSyncError::http_status(status.as_u16(), &body));
    }
    Ok(body)
}

#[async_trait]
impl ReferenceSource for HttpRemote {
    async fn fetch_reference(&self) -> Result<String, FieldSyncError> {
        info!(url = %self.reference_url, "Fetching reference parcels");
        let response = self.client.get(&self.reference_url).send().await?;
        let body = read_body(response).await?;
        debug!(bytes = body.len(), "Reference payload received");
        Ok(body)
    }
}

#[async_trait]
impl FeatureInfoSource for HttpRemote {
    async fn feature_info(&self, point: &QueryPoint) -> Result<Option<String>, FieldSyncError> {
        let params = self.feature_info_params(point);
        debug!(x = point.x, y = point.y, resolution = point.resolution, "GetFeatureInfo");

        let response = self
            .client
            .get(&self.feature_info_url)
            .query(&params)
            .send()
            .await?;
        let body = read_body(response).await?;

        Ok(parcels::first_feature_id(&body, &self.id_property)?)
    }
}

#[async_trait]
impl IngestionEndpoint for HttpRemote {
    async fn submit(&self, records: &[Observation]) -> Result<IngestReply, FieldSyncError> {
        info!(url = %self.ingest_url, records = records.len(), "Posting observations");
        let response = self
            .client
            .post(&self.ingest_url)
            .json(&IngestBody { records })
            .send()
            .await?;
        let body = read_body(response).await?;

        Ok(serde_json::from_str(&body)?)
    }
}
