//! Résolution d'un point cliqué vers un identifiant de parcelle
//!
//! Ordre strict : couche locale d'abord (même en ligne), puis une seule
//! requête GetFeatureInfo si la couche ne contient rien au point et que le
//! terminal est en ligne. Sinon, pas de correspondance.

use parcels::{HitTest, QueryPoint};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FieldSyncError;
use crate::remote::{Connectivity, FeatureInfoSource};

/// Origine de l'identifiant résolu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    /// Couche locale (cache hors ligne)
    Local,
    /// Requête GetFeatureInfo
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParcel {
    pub id: String,
    pub source: ResolutionSource,
}

/// Résolveur avec la parcelle mise en évidence
#[derive(Debug, Default)]
pub struct Resolver {
    selected: Option<String>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parcelle actuellement mise en évidence (dernier succès local)
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Résout le point ; `Ok(None)` signifie « aucune parcelle ici »
    ///
    /// Un succès local remplace la mise en évidence. Un succès distant la
    /// laisse inchangée.
    pub async fn resolve_at(
        &mut self,
        point: &QueryPoint,
        layer: &dyn HitTest,
        feature_info: &dyn FeatureInfoSource,
        connectivity: &dyn Connectivity,
    ) -> Result<Option<ResolvedParcel>, FieldSyncError> {
        if let Some(id) = layer.hit_test(point) {
            info!(id, "Parcel selected from offline layer");
            self.selected = Some(id.to_string());
            return Ok(Some(ResolvedParcel {
                id: id.to_string(),
                source: ResolutionSource::Local,
            }));
        }

        if !connectivity.is_online().await {
            debug!(x = point.x, y = point.y, "No local hit and offline");
            return Ok(None);
        }

        match feature_info.feature_info(point).await {
            Ok(Some(id)) => {
                info!(id = %id, "Parcel selected from feature info");
                Ok(Some(ResolvedParcel {
                    id,
                    source: ResolutionSource::Remote,
                }))
            }
            Ok(None) => {
                debug!(x = point.x, y = point.y, "Feature info returned no parcel");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Feature info lookup failed");
                Err(e)
            }
        }
    }
}
