//! Service d'ingestion des observations (`POST /sync`)
//!
//! Reçoit `{records:[...]}` et insère chaque observation avec une politique
//! insert-or-ignore. La première insertion en échec interrompt la requête
//! et produit `{status:"error", message}` ; les insertions précédentes
//! restent acquises.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod pool;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::observations::Observation;
use crate::remote::{IngestReply, IngestRequest};

pub use memory::MemorySink;

/// Clé de déduplication côté serveur
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictKey {
    /// `temp_id` unique : deux saisies identiques restent distinctes
    #[default]
    LocalId,
    /// Unicité sur parcelle, culture, saison, surface et rendement
    BusinessFields,
}

impl std::str::FromStr for ConflictKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local-id" | "local_id" | "temp_id" => Ok(ConflictKey::LocalId),
            "business" | "business-fields" => Ok(ConflictKey::BusinessFields),
            _ => Err(format!("Invalid conflict key: {}. Use: local-id, business", s)),
        }
    }
}

/// Destination des observations reçues
#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Insère l'observation ; `false` si elle était déjà présente
    async fn insert_or_ignore(&self, record: &Observation) -> Result<bool>;
}

/// Insère le lot dans l'ordre et construit la réponse
pub async fn ingest_batch(sink: &dyn ObservationSink, records: &[Observation]) -> IngestReply {
    let mut inserted = 0usize;
    let mut ignored = 0usize;

    for record in records {
        match sink.insert_or_ignore(record).await {
            Ok(true) => inserted += 1,
            Ok(false) => ignored += 1,
            Err(e) => {
                error!(temp_id = %record.local_id, error = %e, "Insert failed, aborting batch");
                return IngestReply::error(format!("{:#}", e));
            }
        }
    }

    info!(received = records.len(), inserted, ignored, "Batch ingested");
    IngestReply::ok()
}

async fn handle_sync(
    State(sink): State<Arc<dyn ObservationSink>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> (StatusCode, Json<IngestReply>) {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed sync request");
            return (
                rejection.status(),
                Json(IngestReply::error(rejection.body_text())),
            );
        }
    };

    let reply = ingest_batch(sink.as_ref(), &request.records).await;
    (StatusCode::OK, Json(reply))
}

/// Routeur HTTP du service d'ingestion
pub fn router(sink: Arc<dyn ObservationSink>) -> Router {
    Router::new()
        .route("/sync", post(handle_sync))
        .with_state(sink)
}

/// Sert le routeur sur un listener déjà ouvert
pub async fn serve_on(listener: TcpListener, sink: Arc<dyn ObservationSink>) -> Result<()> {
    axum::serve(listener, router(sink))
        .await
        .context("ingestion server error")
}

/// Ouvre l'adresse d'écoute et sert les requêtes
pub async fn serve(addr: SocketAddr, sink: Arc<dyn ObservationSink>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind ingestion server on {}", addr))?;

    info!(addr = %addr, "Ingestion server listening");
    serve_on(listener, sink).await
}
