//! Types d'erreurs pour le crate parcels

use thiserror::Error;

/// Erreurs pouvant survenir lors du décodage des réponses du serveur cartographique
#[derive(Debug, Error)]
pub enum ParcelError {
    /// Corps de réponse qui n'est pas du JSON valide
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON valide mais pas un GeoJSON exploitable
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(String),

    /// Géométrie non convertible vers les types `geo`
    #[error("Invalid geometry for {parcel_id}: {reason}")]
    InvalidGeometry { parcel_id: String, reason: String },
}

impl ParcelError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(parcel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            parcel_id: parcel_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<geojson::Error> for ParcelError {
    fn from(err: geojson::Error) -> Self {
        Self::GeoJson(err.to_string())
    }
}
