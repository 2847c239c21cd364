//! Envoi des observations non synchronisées
//!
//! Le lot complet part en une seule requête. Les observations ne sont
//! marquées synchronisées qu'après un `{status:"ok"}` explicite, une par
//! une : une interruption laisse le reste à renvoyer, ce que la politique
//! insert-or-ignore du serveur rend sans danger. Aucune relance automatique.

use serde::Serialize;
use tracing::{error, info};

use crate::error::FieldSyncError;
use crate::observations::Observation;
use crate::remote::IngestionEndpoint;
use crate::store::{FieldUpdate, LocalStore};

/// Résultat d'un envoi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Aucune observation en attente, pas de requête
    NothingToSync,
    /// Lot acquitté, `count` observations marquées synchronisées
    Uploaded { count: usize },
}

/// Observations en attente (parcours complet de la table)
pub fn pending_observations(store: &LocalStore) -> Result<Vec<Observation>, FieldSyncError> {
    Ok(store
        .observations()?
        .into_iter()
        .filter(|o| !o.synced)
        .collect())
}

/// Envoie les observations en attente et les marque synchronisées
pub async fn upload_unsynced(
    store: &LocalStore,
    endpoint: &dyn IngestionEndpoint,
) -> Result<UploadOutcome, FieldSyncError> {
    let pending = pending_observations(store)?;
    if pending.is_empty() {
        info!("Nothing to sync");
        return Ok(UploadOutcome::NothingToSync);
    }

    info!(records = pending.len(), "Uploading observations");
    let reply = endpoint.submit(&pending).await.map_err(|e| {
        error!(error = %e, "Upload failed");
        e
    })?;

    if !reply.is_ok() {
        let message = reply
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Server error".to_string());
        error!(status = %reply.status, message = %message, "Upload rejected by server");
        return Err(FieldSyncError::ServerLogic(message));
    }

    for observation in &pending {
        store.update_field(&observation.local_id, FieldUpdate::Synced(true))?;
    }

    info!(count = pending.len(), "Upload complete");
    Ok(UploadOutcome::Uploaded {
        count: pending.len(),
    })
}

/// Supprime toutes les observations locales
pub fn clear_records(store: &LocalStore) -> Result<usize, FieldSyncError> {
    let removed = store.clear_observations()?;
    info!(removed, "Local records cleared");
    Ok(removed)
}
