//! Synchronisation des parcelles de référence (WFS → cache local)
//!
//! Remplacement complet : téléchargement, décodage, puis remplacement de la
//! table `parcels` et redessin de la couche. Toute erreur avant le
//! remplacement laisse le snapshot précédent en place.

use parcels::{decode_feature_collection, ParcelLayer};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::FieldSyncError;
use crate::remote::ReferenceSource;
use crate::store::LocalStore;

/// Rapport d'une synchronisation de référence réussie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceSyncReport {
    /// Parcelles présentes dans le cache après remplacement
    pub stored: usize,
    /// Features ignorées au décodage
    pub skipped: usize,
    /// Parcelles dessinées dans la couche
    pub rendered: usize,
}

/// Télécharge le jeu de référence complet et remplace le cache local
pub async fn sync_reference_data(
    store: &LocalStore,
    source: &dyn ReferenceSource,
    layer: &mut ParcelLayer,
    id_property: &str,
) -> Result<ReferenceSyncReport, FieldSyncError> {
    let body = source.fetch_reference().await.map_err(|e| {
        error!(error = %e, "Reference fetch failed, keeping previous snapshot");
        e
    })?;

    let decoded = decode_feature_collection(&body, id_property).map_err(|e| {
        error!(error = %e, "Reference payload rejected, keeping previous snapshot");
        FieldSyncError::from(e)
    })?;

    if decoded.skipped > 0 {
        warn!(skipped = decoded.skipped, "Some reference features were skipped");
    }

    let stored = store.put_all(&decoded.parcels)?;
    let rendered = reload_layer(store, layer)?;

    info!(stored, skipped = decoded.skipped, rendered, "Reference parcels synced");

    Ok(ReferenceSyncReport {
        stored,
        skipped: decoded.skipped,
        rendered,
    })
}

/// Redessine la couche depuis le cache local
pub fn reload_layer(store: &LocalStore, layer: &mut ParcelLayer) -> Result<usize, FieldSyncError> {
    let parcels = store.parcels()?;
    Ok(layer.load(&parcels))
}

/// Vide le cache des parcelles et la couche
pub fn clear_parcels(store: &LocalStore, layer: &mut ParcelLayer) -> Result<usize, FieldSyncError> {
    let removed = store.clear_parcels()?;
    layer.clear();
    info!(removed, "Offline parcels cleared");
    Ok(removed)
}
